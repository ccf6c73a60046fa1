//! Shutter presets and the preset resolver.
//!
//! A [`ShutterPreset`] maps an optional filter on each of the three
//! [`Conditions`] dimensions to a desired [`ShutterPosition`]. An unset
//! filter field is a wildcard.
//!
//! Resolution picks, among the presets matching the current conditions, the
//! most specific one (the most set fields). Ties are broken by which fields
//! are set: temperature beats season, which beats day phase. Two matching
//! presets can only remain tied if their filters are identical, which
//! [`PresetRuleSet::new`] rejects at load time, so resolution is total and
//! deterministic.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::environment::{Conditions, DayPhase, Season, TemperatureBand};
use crate::error::ConfigurationError;
use crate::id::ResourceId;
use crate::shutter::ShutterPosition;

/// Optional constraint on each condition dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PresetFilter {
    pub day_phase: Option<DayPhase>,
    pub season: Option<Season>,
    pub temperature: Option<TemperatureBand>,
}

impl PresetFilter {
    /// Whether every set field equals the corresponding condition.
    #[must_use]
    pub fn matches(&self, conditions: &Conditions) -> bool {
        self.day_phase.is_none_or(|p| p == conditions.day_phase)
            && self.season.is_none_or(|s| s == conditions.season)
            && self.temperature.is_none_or(|t| t == conditions.temperature)
    }

    /// Number of set fields.
    #[must_use]
    pub fn specificity(&self) -> u8 {
        u8::from(self.day_phase.is_some())
            + u8::from(self.season.is_some())
            + u8::from(self.temperature.is_some())
    }

    /// Ordering key: specificity first, then temperature, season and day
    /// phase specificity in that order. Greater wins.
    fn rank(&self) -> (u8, bool, bool, bool) {
        (
            self.specificity(),
            self.temperature.is_some(),
            self.season.is_some(),
            self.day_phase.is_some(),
        )
    }
}

impl fmt::Display for PresetFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn field<T: fmt::Display>(value: Option<T>) -> String {
            value.map_or_else(|| "*".to_string(), |v| v.to_string())
        }
        write!(
            f,
            "{}/{}/{}",
            field(self.day_phase),
            field(self.season),
            field(self.temperature)
        )
    }
}

/// Declarative rule: when `filter` matches, move the shutter to `position`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShutterPreset {
    pub position: ShutterPosition,
    #[serde(flatten)]
    pub filter: PresetFilter,
}

impl ShutterPreset {
    /// A preset matching any conditions.
    #[must_use]
    pub fn fallback(position: ShutterPosition) -> Self {
        Self {
            position,
            filter: PresetFilter::default(),
        }
    }

    #[must_use]
    pub fn when_day_phase(mut self, phase: DayPhase) -> Self {
        self.filter.day_phase = Some(phase);
        self
    }

    #[must_use]
    pub fn when_season(mut self, season: Season) -> Self {
        self.filter.season = Some(season);
        self
    }

    #[must_use]
    pub fn when_temperature(mut self, band: TemperatureBand) -> Self {
        self.filter.temperature = Some(band);
        self
    }
}

/// Pick the preset applying to `conditions`.
///
/// Pure and deterministic for rule sets without duplicate filters. Returns
/// `None` when no preset matches, meaning "no automatic action".
#[must_use]
pub fn resolve<'a>(
    presets: &'a [ShutterPreset],
    conditions: &Conditions,
) -> Option<&'a ShutterPreset> {
    presets
        .iter()
        .filter(|preset| preset.filter.matches(conditions))
        // max_by_key keeps the last maximum; reversing keeps the first one
        // so configuration order decides if a duplicate ever slips through.
        .rev()
        .max_by_key(|preset| preset.filter.rank())
}

/// Validated, immutable preset list for one shutter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresetRuleSet {
    resource: ResourceId,
    presets: Vec<ShutterPreset>,
}

impl PresetRuleSet {
    /// Validate and wrap a shutter's presets.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::AmbiguousPresets`] if two presets share
    /// an identical filter triple.
    pub fn new(
        resource: ResourceId,
        presets: Vec<ShutterPreset>,
    ) -> Result<Self, ConfigurationError> {
        for (second, preset) in presets.iter().enumerate() {
            if let Some(first) = presets[..second]
                .iter()
                .position(|earlier| earlier.filter == preset.filter)
            {
                return Err(ConfigurationError::AmbiguousPresets {
                    resource,
                    filter: preset.filter.to_string(),
                    first,
                    second,
                });
            }
        }
        Ok(Self { resource, presets })
    }

    #[must_use]
    pub fn resource(&self) -> &ResourceId {
        &self.resource
    }

    #[must_use]
    pub fn presets(&self) -> &[ShutterPreset] {
        &self.presets
    }

    /// Resolve the preset applying to `conditions`.
    #[must_use]
    pub fn resolve(&self, conditions: &Conditions) -> Option<&ShutterPreset> {
        resolve(&self.presets, conditions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conditions(phase: DayPhase, season: Season, band: TemperatureBand) -> Conditions {
        Conditions {
            day_phase: phase,
            season,
            temperature: band,
        }
    }

    fn half(p: u8) -> ShutterPosition {
        ShutterPosition::Half(Some(p))
    }

    #[test]
    fn should_pick_summer_hot_preset_over_wildcard() {
        let presets = vec![
            ShutterPreset::fallback(half(40))
                .when_season(Season::Summer)
                .when_temperature(TemperatureBand::Hot),
            ShutterPreset::fallback(ShutterPosition::Open),
        ];
        let hot = conditions(DayPhase::Afternoon, Season::Summer, TemperatureBand::Hot);
        let mild = conditions(DayPhase::Afternoon, Season::Winter, TemperatureBand::Normal);

        assert_eq!(resolve(&presets, &hot).unwrap().position, half(40));
        assert_eq!(
            resolve(&presets, &mild).unwrap().position,
            ShutterPosition::Open
        );
    }

    #[test]
    fn should_return_none_when_nothing_matches() {
        let presets = vec![ShutterPreset::fallback(ShutterPosition::Closed).when_day_phase(DayPhase::Night)];
        let day = conditions(DayPhase::Morning, Season::Spring, TemperatureBand::Normal);
        assert!(resolve(&presets, &day).is_none());
    }

    #[test]
    fn should_prefer_more_specific_preset() {
        let presets = vec![
            ShutterPreset::fallback(ShutterPosition::Closed).when_day_phase(DayPhase::Night),
            ShutterPreset::fallback(half(80))
                .when_day_phase(DayPhase::Night)
                .when_season(Season::Summer),
        ];
        let night = conditions(DayPhase::Night, Season::Summer, TemperatureBand::Normal);
        assert_eq!(resolve(&presets, &night).unwrap().position, half(80));
    }

    #[test]
    fn should_break_ties_by_temperature_then_season_then_phase() {
        let by_phase = ShutterPreset::fallback(half(10)).when_day_phase(DayPhase::Afternoon);
        let by_season = ShutterPreset::fallback(half(20)).when_season(Season::Summer);
        let by_temperature = ShutterPreset::fallback(half(30)).when_temperature(TemperatureBand::Hot);
        let now = conditions(DayPhase::Afternoon, Season::Summer, TemperatureBand::Hot);

        let all = vec![by_phase, by_season, by_temperature];
        assert_eq!(resolve(&all, &now).unwrap().position, half(30));

        let without_temperature = vec![by_phase, by_season];
        assert_eq!(resolve(&without_temperature, &now).unwrap().position, half(20));
    }

    #[test]
    fn should_break_two_field_ties_by_priority_order() {
        let phase_season = ShutterPreset::fallback(half(10))
            .when_day_phase(DayPhase::Afternoon)
            .when_season(Season::Summer);
        let phase_temperature = ShutterPreset::fallback(half(20))
            .when_day_phase(DayPhase::Afternoon)
            .when_temperature(TemperatureBand::Hot);
        let now = conditions(DayPhase::Afternoon, Season::Summer, TemperatureBand::Hot);

        let presets = vec![phase_season, phase_temperature];
        assert_eq!(resolve(&presets, &now).unwrap().position, half(20));
    }

    #[test]
    fn should_resolve_independently_of_declaration_order() {
        let a = ShutterPreset::fallback(half(30)).when_temperature(TemperatureBand::Hot);
        let b = ShutterPreset::fallback(ShutterPosition::Open);
        let now = conditions(DayPhase::Evening, Season::Autumn, TemperatureBand::Hot);
        assert_eq!(resolve(&[a, b], &now), resolve(&[b, a], &now));
    }

    #[test]
    fn should_reject_rule_set_with_identical_filters() {
        let presets = vec![
            ShutterPreset::fallback(ShutterPosition::Open).when_season(Season::Summer),
            ShutterPreset::fallback(ShutterPosition::Closed),
            ShutterPreset::fallback(half(50)).when_season(Season::Summer),
        ];
        let err = PresetRuleSet::new(ResourceId::new("kitchen"), presets).unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::AmbiguousPresets {
                resource: ResourceId::new("kitchen"),
                filter: "*/summer/*".to_string(),
                first: 0,
                second: 2,
            }
        );
    }

    #[test]
    fn should_accept_rule_set_with_distinct_filters() {
        let presets = vec![
            ShutterPreset::fallback(half(40))
                .when_season(Season::Summer)
                .when_temperature(TemperatureBand::Hot),
            ShutterPreset::fallback(ShutterPosition::Open),
        ];
        let rules = PresetRuleSet::new(ResourceId::new("living"), presets).unwrap();
        assert_eq!(rules.resource().as_str(), "living");
        assert_eq!(rules.presets().len(), 2);
    }

    #[test]
    fn should_display_filter_with_wildcards() {
        let filter = PresetFilter {
            day_phase: None,
            season: Some(Season::Summer),
            temperature: Some(TemperatureBand::Hot),
        };
        assert_eq!(filter.to_string(), "*/summer/hot");
    }

    #[test]
    fn should_deserialize_flattened_preset() {
        let json = serde_json::json!({"position": "40%", "season": "summer", "temperature": "hot"});
        let preset: ShutterPreset = serde_json::from_value(json).unwrap();
        assert_eq!(preset.position, half(40));
        assert_eq!(preset.filter.season, Some(Season::Summer));
        assert!(preset.filter.day_phase.is_none());
    }
}
