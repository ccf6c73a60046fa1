//! Configuration loading: TOML file with environment variable overrides.
//!
//! Looks for `burrow.toml` in the working directory (or the path in
//! `BURROW_CONFIG`). Every field has a sensible default so the file is
//! optional. Environment variables take precedence over file values.
//!
//! The raw file structs are converted into validated domain settings by
//! [`Config::settings`] before anything starts; any inconsistency is fatal.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use burrow_adapter_storage_json::DEFAULT_PATH;
use burrow_adapter_virtual::FixedAlmanac;
use burrow_app::alarm::AlarmConfig;
use burrow_app::shutters::Shutter;
use burrow_domain::alarm::{AlarmCode, AlarmSettings};
use burrow_domain::environment::{DaycycleSettings, TemperatureThresholds};
use burrow_domain::error::{ConfigurationError, ValidationError};
use burrow_domain::id::ResourceId;
use burrow_domain::opening::OpeningSensor;
use burrow_domain::preset::{PresetRuleSet, ShutterPreset};
use chrono::NaiveTime;
use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub storage: StorageConfig,
    pub alarm: AlarmSection,
    /// Offsets of the intermediate day phases.
    pub daycycle: DaycycleSettings,
    pub location: LocationConfig,
    pub temperature: TemperatureThresholds,
    pub shutters: Vec<ShutterSection>,
    pub lights: Vec<LightSection>,
    pub openings: Vec<OpeningSection>,
    pub cameras: Vec<CameraSection>,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Key-value store configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path of the JSON snapshot file.
    pub path: PathBuf,
}

/// Alarm configuration. The alarm is disabled without a code.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AlarmSection {
    pub code: Option<String>,
    pub arm_grace_secs: u64,
    pub front_door_grace_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_attempts: u32,
    pub trigger_interval_secs: u64,
    pub front_door_burst: u32,
    /// Cameras used by the alarm. Empty means every configured camera.
    pub cameras: Vec<String>,
    pub front_door_camera: Option<String>,
}

/// Sun times used by the day cycle, in UTC.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    /// `HH:MM`.
    pub sunrise: String,
    /// `HH:MM`.
    pub sunset: String,
    pub southern_hemisphere: bool,
}

/// One motorised shutter.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ShutterSection {
    pub name: String,
    pub room: Option<String>,
    pub defective: bool,
    /// Closing percentage of the `half` position.
    pub halfway: u8,
    pub travel_time_secs: u64,
    pub presets: Vec<ShutterPreset>,
}

/// One light.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LightSection {
    pub name: String,
    pub room: Option<String>,
}

/// One door or window contact.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct OpeningSection {
    pub name: String,
    pub room: Option<String>,
    /// Shutter fitted on the same window.
    pub shutter: Option<String>,
    pub front_door: bool,
}

/// One security camera.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CameraSection {
    pub name: String,
}

/// Validated settings, ready for wiring.
#[derive(Debug)]
pub struct Settings {
    pub storage_path: PathBuf,
    pub alarm: Option<AlarmConfig>,
    pub daycycle: DaycycleSettings,
    pub almanac: FixedAlmanac,
    pub thresholds: TemperatureThresholds,
    pub shutters: Vec<Shutter>,
    pub lights: Vec<ResourceId>,
    pub openings: Vec<OpeningSensor>,
    pub cameras: Vec<ResourceId>,
}

impl Config {
    /// Load configuration from `burrow.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("BURROW_CONFIG").unwrap_or_else(|_| "burrow.toml".to_string());
        let mut config = Self::from_file(&path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("BURROW_STORAGE_PATH") {
            self.storage.path = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("BURROW_ALARM_CODE") {
            self.alarm.code = Some(val);
        }
        if let Ok(val) = std::env::var("BURROW_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    /// Validate the configuration and convert it into domain settings.
    ///
    /// # Errors
    ///
    /// Returns the first inconsistency found: bad names, duplicates,
    /// dangling references, ambiguous presets, invalid alarm code or
    /// thresholds.
    pub fn settings(&self) -> Result<Settings, ConfigError> {
        self.daycycle.validate()?;
        self.temperature.validate()?;

        let cameras = unique_ids("camera", self.cameras.iter().map(|c| c.name.as_str()))?;
        let lights = unique_ids("light", self.lights.iter().map(|l| l.name.as_str()))?;
        let shutters = self
            .shutters
            .iter()
            .map(ShutterSection::to_shutter)
            .collect::<Result<Vec<_>, _>>()?;
        unique_ids("shutter", shutters.iter().map(|s| s.id.as_str()))?;

        let shutter_ids: HashSet<&ResourceId> = shutters.iter().map(|s| &s.id).collect();
        let openings = self
            .openings
            .iter()
            .map(|o| o.to_sensor(&shutter_ids))
            .collect::<Result<Vec<_>, _>>()?;
        unique_ids("opening", openings.iter().map(|o| o.id.as_str()))?;

        Ok(Settings {
            storage_path: self.storage.path.clone(),
            alarm: self.alarm.to_alarm(&cameras)?,
            daycycle: self.daycycle,
            almanac: self.location.to_almanac()?,
            thresholds: self.temperature,
            shutters,
            lights,
            openings,
            cameras,
        })
    }
}

fn unique_ids<'a>(
    kind: &'static str,
    names: impl Iterator<Item = &'a str>,
) -> Result<Vec<ResourceId>, ConfigError> {
    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    for name in names {
        let id = ResourceId::parse(name)?;
        if !seen.insert(id.clone()) {
            return Err(ConfigurationError::DuplicateName {
                kind,
                name: id.to_string(),
            }
            .into());
        }
        ids.push(id);
    }
    Ok(ids)
}

fn reference(
    kind: &'static str,
    name: &ResourceId,
    target: &'static str,
    reference: &str,
    known: impl Fn(&ResourceId) -> bool,
) -> Result<ResourceId, ConfigError> {
    let id = ResourceId::parse(reference)?;
    if known(&id) {
        Ok(id)
    } else {
        Err(ConfigurationError::UnknownReference {
            kind,
            name: name.to_string(),
            target,
            reference: id.to_string(),
        }
        .into())
    }
}

impl ShutterSection {
    fn to_shutter(&self) -> Result<Shutter, ConfigError> {
        let id = ResourceId::parse(&self.name)?;
        if self.halfway > 100 {
            return Err(ValidationError::PercentOutOfRange(i64::from(self.halfway)).into());
        }
        if self.travel_time_secs == 0 {
            return Err(ConfigurationError::ZeroDuration("shutters.travel_time_secs").into());
        }
        let presets = PresetRuleSet::new(id, self.presets.clone())?;
        let mut shutter = Shutter::new(presets);
        shutter.halfway = self.halfway;
        shutter.travel_time = Duration::from_secs(self.travel_time_secs);
        if let Some(room) = &self.room {
            shutter = shutter.in_room(room);
        }
        if self.defective {
            shutter = shutter.defective();
        }
        Ok(shutter)
    }
}

impl OpeningSection {
    fn to_sensor(&self, shutters: &HashSet<&ResourceId>) -> Result<OpeningSensor, ConfigError> {
        let id = ResourceId::parse(&self.name)?;
        let shutter = self
            .shutter
            .as_deref()
            .map(|name| reference("opening", &id, "shutter", name, |s| shutters.contains(s)))
            .transpose()?;
        Ok(OpeningSensor {
            room: self.room.as_deref().map(str::to_lowercase),
            shutter,
            front_door: self.front_door,
            ..OpeningSensor::new(id)
        })
    }
}

impl AlarmSection {
    fn to_alarm(&self, cameras: &[ResourceId]) -> Result<Option<AlarmConfig>, ConfigError> {
        let Some(code) = &self.code else {
            return Ok(None);
        };
        let settings = AlarmSettings {
            arm_grace: Duration::from_secs(self.arm_grace_secs),
            front_door_grace: Duration::from_secs(self.front_door_grace_secs),
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
            max_attempts: self.max_attempts,
            trigger_interval: Duration::from_secs(self.trigger_interval_secs),
            front_door_burst: self.front_door_burst,
        };
        settings.validate()?;

        let alarm = ResourceId::new("alarm");
        let known = |id: &ResourceId| cameras.contains(id);
        let mut config = AlarmConfig::new(AlarmCode::parse(code)?);
        config.settings = settings;
        config.cameras = if self.cameras.is_empty() {
            cameras.to_vec()
        } else {
            self.cameras
                .iter()
                .map(|name| reference("alarm", &alarm, "camera", name, known))
                .collect::<Result<_, _>>()?
        };
        config.front_door_camera = self
            .front_door_camera
            .as_deref()
            .map(|name| reference("alarm", &alarm, "camera", name, known))
            .transpose()?;
        Ok(Some(config))
    }
}

impl LocationConfig {
    fn to_almanac(&self) -> Result<FixedAlmanac, ConfigError> {
        let time = |field: &'static str, value: &str| {
            NaiveTime::parse_from_str(value, "%H:%M").map_err(|_| ValidationError::UnknownValue {
                field,
                value: value.to_string(),
            })
        };
        let sunrise = time("location.sunrise", &self.sunrise)?;
        let sunset = time("location.sunset", &self.sunset)?;
        if sunrise >= sunset {
            return Err(ConfigError::Validation(format!(
                "sunrise {sunrise} must be before sunset {sunset}"
            )));
        }
        Ok(FixedAlmanac {
            southern_hemisphere: self.southern_hemisphere,
            ..FixedAlmanac::new(sunrise, sunset)
        })
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "burrowd=info,burrow_app=info,burrow_adapter_virtual=info,burrow_adapter_storage_json=info"
                .to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_PATH),
        }
    }
}

impl Default for AlarmSection {
    fn default() -> Self {
        let settings = AlarmSettings::default();
        Self {
            code: None,
            arm_grace_secs: settings.arm_grace.as_secs(),
            front_door_grace_secs: settings.front_door_grace.as_secs(),
            idle_timeout_secs: settings.idle_timeout.as_secs(),
            max_attempts: settings.max_attempts,
            trigger_interval_secs: settings.trigger_interval.as_secs(),
            front_door_burst: settings.front_door_burst,
            cameras: Vec::new(),
            front_door_camera: None,
        }
    }
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            sunrise: "07:00".to_string(),
            sunset: "19:00".to_string(),
            southern_hemisphere: false,
        }
    }
}

impl Default for ShutterSection {
    fn default() -> Self {
        Self {
            name: String::new(),
            room: None,
            defective: false,
            halfway: 50,
            travel_time_secs: 30,
            presets: Vec::new(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// A value is malformed.
    #[error(transparent)]
    Value(#[from] ValidationError),
    /// Values are inconsistent with each other.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
