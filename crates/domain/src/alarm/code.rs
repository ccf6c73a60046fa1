use std::fmt;

use subtle::ConstantTimeEq;

use crate::error::ConfigurationError;

/// Shortest accepted alarm code.
pub const MIN_CODE_LENGTH: usize = 6;

/// Secret numeric code unlocking the alarm.
///
/// Never printed: `Debug` and `Display` redact the digits.
#[derive(Clone, PartialEq, Eq)]
pub struct AlarmCode(String);

impl AlarmCode {
    /// Validate a code read from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::AlarmCodeInvalidDigit`] for any
    /// non-digit character and [`ConfigurationError::AlarmCodeTooShort`]
    /// when fewer than [`MIN_CODE_LENGTH`] digits are given.
    pub fn parse(value: &str) -> Result<Self, ConfigurationError> {
        let value = value.trim();
        if let Some(c) = value.chars().find(|c| !c.is_ascii_digit()) {
            return Err(ConfigurationError::AlarmCodeInvalidDigit(c));
        }
        if value.len() < MIN_CODE_LENGTH {
            return Err(ConfigurationError::AlarmCodeTooShort {
                len: value.len(),
                min: MIN_CODE_LENGTH,
            });
        }
        Ok(Self(value.to_string()))
    }

    /// Number of digits, which is also the keypad buffer capacity.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`: a parsed code has at least [`MIN_CODE_LENGTH`] digits.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Compare typed digits with the code.
    ///
    /// Runs in time independent of where the first mismatch is.
    #[must_use]
    pub fn matches(&self, typed: &str) -> bool {
        let expected = self.0.as_bytes();
        let typed = typed.as_bytes();
        if expected.len() != typed.len() {
            return false;
        }
        expected.ct_eq(typed).into()
    }
}

impl fmt::Debug for AlarmCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AlarmCode").field(&"******").finish()
    }
}
