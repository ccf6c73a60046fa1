use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Requested alarm state sent after the code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeypadCommand {
    On,
    Off,
}

impl KeypadCommand {
    /// Whether the command asks for the alarm to be armed.
    #[must_use]
    pub fn wants_armed(self) -> bool {
        matches!(self, Self::On)
    }
}

impl fmt::Display for KeypadCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::On => "ON",
            Self::Off => "OFF",
        })
    }
}

/// A single key press received from a keypad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum KeypadKey {
    Digit(u8),
    Command(KeypadCommand),
}

impl fmt::Display for KeypadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Digit(d) => write!(f, "{d}"),
            Self::Command(c) => c.fmt(f),
        }
    }
}

impl FromStr for KeypadKey {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim();
        if value.eq_ignore_ascii_case("on") {
            return Ok(Self::Command(KeypadCommand::On));
        }
        if value.eq_ignore_ascii_case("off") {
            return Ok(Self::Command(KeypadCommand::Off));
        }
        let mut chars = value.chars();
        match (chars.next().and_then(|c| c.to_digit(10)), chars.next()) {
            (Some(d), None) => u8::try_from(d)
                .map(Self::Digit)
                .map_err(|_| ValidationError::UnknownKeypadKey(s.to_string())),
            _ => Err(ValidationError::UnknownKeypadKey(s.to_string())),
        }
    }
}

impl TryFrom<String> for KeypadKey {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<KeypadKey> for String {
    fn from(value: KeypadKey) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_parse_digits_and_commands() {
        assert_eq!("7".parse(), Ok(KeypadKey::Digit(7)));
        assert_eq!("ON".parse(), Ok(KeypadKey::Command(KeypadCommand::On)));
        assert_eq!("off".parse(), Ok(KeypadKey::Command(KeypadCommand::Off)));
        assert_eq!(" On ".parse(), Ok(KeypadKey::Command(KeypadCommand::On)));
    }

    #[test]
    fn should_reject_unknown_keys() {
        assert!("12".parse::<KeypadKey>().is_err());
        assert!("#".parse::<KeypadKey>().is_err());
        assert!("".parse::<KeypadKey>().is_err());
    }

    #[test]
    fn should_serialize_as_string() {
        let json = serde_json::to_value(KeypadKey::Command(KeypadCommand::Off)).unwrap();
        assert_eq!(json, serde_json::json!("OFF"));
        let key: KeypadKey = serde_json::from_value(serde_json::json!("4")).unwrap();
        assert_eq!(key, KeypadKey::Digit(4));
    }
}
