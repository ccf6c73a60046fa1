//! Shutter positions.
//!
//! Heights are expressed as a closing percentage: `0` is fully open and
//! `100` fully closed.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Desired position of a motorised shutter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ShutterPosition {
    Open,
    Closed,
    /// Partially closed. `None` means the shutter's configured halfway height.
    Half(Option<u8>),
}

impl ShutterPosition {
    /// Build a position from a closing percentage.
    ///
    /// `0` (or less) collapses to [`Open`](Self::Open) and `100` (or more)
    /// to [`Closed`](Self::Closed).
    #[must_use]
    pub fn from_percent(percent: i64) -> Self {
        match percent {
            i64::MIN..=0 => Self::Open,
            100.. => Self::Closed,
            // 1..=99 fits in u8
            p => Self::Half(Some(u8::try_from(p).unwrap_or(50))),
        }
    }

    /// Closing percentage this position targets.
    #[must_use]
    pub fn percent(self, halfway: u8) -> u8 {
        match self {
            Self::Open => 0,
            Self::Closed => 100,
            Self::Half(p) => p.unwrap_or(halfway),
        }
    }
}

impl fmt::Display for ShutterPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => f.write_str("open"),
            Self::Closed => f.write_str("closed"),
            Self::Half(None) => f.write_str("half"),
            Self::Half(Some(p)) => write!(f, "{p}%"),
        }
    }
}

impl FromStr for ShutterPosition {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim().to_lowercase();
        if let Some(number) = value.strip_suffix('%') {
            let percent: i64 = number
                .trim()
                .parse()
                .map_err(|_| ValidationError::UnknownShutterPosition(s.to_string()))?;
            return Ok(Self::from_percent(percent));
        }
        match value.as_str() {
            "open" => Ok(Self::Open),
            "close" | "closed" => Ok(Self::Closed),
            "half" => Ok(Self::Half(None)),
            _ => Err(ValidationError::UnknownShutterPosition(s.to_string())),
        }
    }
}

impl TryFrom<String> for ShutterPosition {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ShutterPosition> for String {
    fn from(value: ShutterPosition) -> Self {
        value.to_string()
    }
}
