//! Line-oriented console standing in for physical sensors and switches.
//!
//! Each stdin line is one command:
//!
//! | Command | Effect |
//! |---------|--------|
//! | `key <0-9/on/off>` | keypad key press |
//! | `open <opening>` / `close <opening>` | contact sensor change |
//! | `sleep <room>` / `wake <room>` | occupants go to bed or get up |
//! | `temp <sensor> <celsius> [inside/outside]` | raw temperature reading |
//! | `shutter <name> <position>` | manual shutter move |
//! | `stop <name>` | halt a shutter |
//! | `light <name> on [percent]` / `light <name> off` | switch a light |
//! | `status` | print the current state |

use std::collections::HashMap;

use burrow_domain::alarm::KeypadKey;
use burrow_domain::environment::SensorLocation;
use burrow_domain::error::ValidationError;
use burrow_domain::event::{Event, EventKind, EventPayload};
use burrow_domain::id::ResourceId;
use burrow_domain::instruction::LightSetting;
use burrow_domain::opening::{OpenState, OpeningSensor};
use burrow_domain::shutter::ShutterPosition;

/// What a console line asks the daemon to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    /// Publish a synthetic sensor event.
    Publish(Event),
    MoveShutter {
        id: ResourceId,
        position: ShutterPosition,
    },
    StopShutter(ResourceId),
    SwitchLight {
        id: ResourceId,
        setting: LightSetting,
    },
    Status,
}

/// Errors in a console line. Reported back to the operator, never fatal.
#[derive(Debug, thiserror::Error)]
pub enum ConsoleError {
    #[error("unknown command {0:?}, expected one of: key, open, close, sleep, wake, temp, shutter, stop, light, status")]
    UnknownCommand(String),

    #[error("missing {0}")]
    MissingArgument(&'static str),

    #[error("unknown opening {0}")]
    UnknownOpening(ResourceId),

    #[error("invalid temperature {0:?}")]
    InvalidTemperature(String),

    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// Parses console lines against the configured openings.
pub struct Console {
    openings: HashMap<ResourceId, OpeningSensor>,
}

impl Console {
    pub fn new(openings: impl IntoIterator<Item = OpeningSensor>) -> Self {
        Self {
            openings: openings.into_iter().map(|o| (o.id.clone(), o)).collect(),
        }
    }

    /// Parse one line. Blank lines yield `None`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConsoleError`] describing what is wrong with the line.
    pub fn parse(&self, line: &str) -> Result<Option<Input>, ConsoleError> {
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            return Ok(None);
        };
        let mut arg = |name: &'static str| words.next().ok_or(ConsoleError::MissingArgument(name));

        let input = match command.to_lowercase().as_str() {
            "key" => Input::Publish(Event::keypad(arg("key")?.parse::<KeypadKey>()?)),
            "open" => Input::Publish(self.opening(arg("opening")?, OpenState::Open)?),
            "close" => Input::Publish(self.opening(arg("opening")?, OpenState::Closed)?),
            "sleep" => Input::Publish(Event::sleep(arg("room")?.to_lowercase())),
            "wake" => Input::Publish(Event::wake_up(arg("room")?.to_lowercase())),
            "temp" => {
                let sensor = ResourceId::parse(arg("sensor")?)?;
                let raw = arg("temperature")?;
                let celsius: f64 = raw
                    .parse()
                    .map_err(|_| ConsoleError::InvalidTemperature(raw.to_string()))?;
                let location = match words.next() {
                    None => SensorLocation::Outside,
                    Some(location) => parse_location(location)?,
                };
                Input::Publish(Event::new(
                    EventKind::TemperatureData,
                    Some(sensor),
                    EventPayload::TemperatureReading { celsius, location },
                ))
            }
            "shutter" => Input::MoveShutter {
                id: ResourceId::parse(arg("shutter")?)?,
                position: arg("position")?.parse()?,
            },
            "stop" => Input::StopShutter(ResourceId::parse(arg("shutter")?)?),
            "light" => {
                let id = ResourceId::parse(arg("light")?)?;
                let setting = match arg("on/off")?.to_lowercase().as_str() {
                    "on" => LightSetting {
                        on: true,
                        brightness: words.next().map(parse_brightness).transpose()?,
                    },
                    "off" => LightSetting {
                        on: false,
                        brightness: None,
                    },
                    other => {
                        return Err(ValidationError::UnknownValue {
                            field: "light",
                            value: other.to_string(),
                        }
                        .into());
                    }
                };
                Input::SwitchLight { id, setting }
            }
            "status" => Input::Status,
            other => return Err(ConsoleError::UnknownCommand(other.to_string())),
        };
        Ok(Some(input))
    }

    fn opening(&self, name: &str, state: OpenState) -> Result<Event, ConsoleError> {
        let id = ResourceId::parse(name)?;
        self.openings
            .get(&id)
            .map(|sensor| sensor.event(state))
            .ok_or(ConsoleError::UnknownOpening(id))
    }
}

fn parse_location(value: &str) -> Result<SensorLocation, ValidationError> {
    match value.to_lowercase().as_str() {
        "inside" | "in" => Ok(SensorLocation::Inside),
        "outside" | "out" => Ok(SensorLocation::Outside),
        _ => Err(ValidationError::UnknownValue {
            field: "location",
            value: value.to_string(),
        }),
    }
}

fn parse_brightness(value: &str) -> Result<u8, ValidationError> {
    let percent: i64 = value
        .trim_end_matches('%')
        .parse()
        .map_err(|_| ValidationError::UnknownValue {
            field: "brightness",
            value: value.to_string(),
        })?;
    u8::try_from(percent)
        .ok()
        .filter(|p| *p <= 100)
        .ok_or(ValidationError::PercentOutOfRange(percent))
}
