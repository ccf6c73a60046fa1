use std::fmt;
use std::time::Duration;

use crate::error::ConfigurationError;
use crate::time::{Timestamp, delta, elapsed};

use super::code::AlarmCode;
use super::keypad::KeypadCommand;

/// Timing and lockout parameters of the alarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlarmSettings {
    /// Openings are ignored for this long after arming.
    pub arm_grace: Duration,
    /// Delay between a front-door opening and the trigger.
    pub front_door_grace: Duration,
    /// Keypad inactivity after which typed digits and failures are forgotten.
    pub idle_timeout: Duration,
    /// Failed attempts before the keypad locks out.
    pub max_attempts: u32,
    /// Pause between two rounds of the trigger loop.
    pub trigger_interval: Duration,
    /// Number of snapshots sent when the front door opens.
    pub front_door_burst: u32,
}

impl Default for AlarmSettings {
    fn default() -> Self {
        Self {
            arm_grace: Duration::from_secs(75),
            front_door_grace: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(30),
            max_attempts: 3,
            trigger_interval: Duration::from_secs(5),
            front_door_burst: 10,
        }
    }
}

impl AlarmSettings {
    /// # Errors
    ///
    /// Returns [`ConfigurationError::ZeroDuration`] if the idle timeout, the
    /// trigger interval or the attempt limit is zero.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.idle_timeout.is_zero() {
            return Err(ConfigurationError::ZeroDuration("alarm.idle_timeout"));
        }
        if self.trigger_interval.is_zero() {
            return Err(ConfigurationError::ZeroDuration("alarm.trigger_interval"));
        }
        if self.max_attempts == 0 {
            return Err(ConfigurationError::ZeroDuration("alarm.max_attempts"));
        }
        Ok(())
    }
}

/// Observable state of the alarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlarmState {
    Disarmed,
    Armed,
    Triggered,
}

impl fmt::Display for AlarmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disarmed => "disarmed",
            Self::Armed => "armed",
            Self::Triggered => "triggered",
        })
    }
}

/// Result of an `ON`/`OFF` key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeypadOutcome {
    /// No digits were typed; nothing happened.
    Ignored,
    /// Too many failures; the attempt was not evaluated.
    LockedOut,
    /// Wrong code.
    Rejected { remaining: u32 },
    /// Right code but the alarm already is in the requested state.
    AlreadyInState { armed: bool },
    /// The session was armed with the returned arm epoch.
    Armed { epoch: u64 },
    /// The session was disarmed.
    Disarmed,
}

/// What to do with an opening reported while the session is in some state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpeningOutcome {
    /// Alarm disarmed.
    Disarmed,
    /// Within the arming grace window.
    InGrace,
    /// Already triggered; the running trigger loop covers it.
    AlreadyTriggered,
    /// Trigger now. The session is marked triggered.
    Trigger { epoch: u64 },
    /// Front door: wait the front-door grace, then call
    /// [`AlarmSession::confirm_trigger`] with this epoch.
    FrontDoor { epoch: u64 },
}

/// Mutable alarm state.
///
/// Every method is a synchronous read-modify-write meant to run under the
/// owner's lock. The arm epoch changes on every arm and disarm, letting
/// delayed work detect an intervening transition.
#[derive(Debug, Clone, Default)]
pub struct AlarmSession {
    armed: bool,
    armed_at: Option<Timestamp>,
    triggered: bool,
    typed: String,
    typed_at: Option<Timestamp>,
    failed_attempts: u32,
    epoch: u64,
}

impl AlarmSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> AlarmState {
        match (self.armed, self.triggered) {
            (false, _) => AlarmState::Disarmed,
            (true, false) => AlarmState::Armed,
            (true, true) => AlarmState::Triggered,
        }
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    #[must_use]
    pub fn armed_at(&self) -> Option<Timestamp> {
        self.armed_at
    }

    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    #[must_use]
    pub fn failed_attempts(&self) -> u32 {
        self.failed_attempts
    }

    /// Digits currently held in the rolling buffer.
    #[must_use]
    pub fn typed(&self) -> &str {
        &self.typed
    }

    /// Forget typed digits and failures once the keypad has been idle long
    /// enough. Returns whether anything was reset.
    pub fn expire(&mut self, now: Timestamp, settings: &AlarmSettings) -> bool {
        let idle = self
            .typed_at
            .is_some_and(|at| elapsed(at, now) >= settings.idle_timeout);
        if idle {
            self.typed.clear();
            self.failed_attempts = 0;
            self.typed_at = None;
        }
        idle
    }

    /// Append a digit, keeping only the last `code.len()` digits.
    ///
    /// Values above 9 are not keypad digits and leave the buffer untouched.
    pub fn press_digit(
        &mut self,
        digit: u8,
        now: Timestamp,
        code: &AlarmCode,
        settings: &AlarmSettings,
    ) {
        if digit > 9 {
            return;
        }
        self.expire(now, settings);
        self.typed.push(char::from(b'0' + digit));
        if self.typed.len() > code.len() {
            let excess = self.typed.len() - code.len();
            self.typed.drain(..excess);
        }
        self.typed_at = Some(now);
    }

    /// Evaluate the buffer against `code` for an `ON`/`OFF` press.
    ///
    /// On acceptance the session transitions immediately; the caller then
    /// persists and performs side effects.
    pub fn submit(
        &mut self,
        command: KeypadCommand,
        now: Timestamp,
        code: &AlarmCode,
        settings: &AlarmSettings,
    ) -> KeypadOutcome {
        self.expire(now, settings);
        if self.typed.is_empty() {
            return KeypadOutcome::Ignored;
        }
        self.typed_at = Some(now);
        if self.failed_attempts >= settings.max_attempts {
            self.typed.clear();
            return KeypadOutcome::LockedOut;
        }
        let typed = std::mem::take(&mut self.typed);
        if !code.matches(&typed) {
            self.failed_attempts += 1;
            return KeypadOutcome::Rejected {
                remaining: settings.max_attempts.saturating_sub(self.failed_attempts),
            };
        }
        self.failed_attempts = 0;
        match (command.wants_armed(), self.armed) {
            (wanted, current) if wanted == current => {
                KeypadOutcome::AlreadyInState { armed: current }
            }
            (true, _) => KeypadOutcome::Armed {
                epoch: self.arm(now),
            },
            (false, _) => {
                self.disarm();
                KeypadOutcome::Disarmed
            }
        }
    }

    /// Arm at `now`, returning the new arm epoch.
    pub fn arm(&mut self, now: Timestamp) -> u64 {
        self.armed = true;
        self.armed_at = Some(now);
        self.triggered = false;
        self.epoch += 1;
        self.epoch
    }

    /// Arm as if it happened one grace window ago, so the next opening
    /// triggers at once.
    pub fn resume(&mut self, now: Timestamp, settings: &AlarmSettings) -> u64 {
        let epoch = self.arm(now);
        self.armed_at = Some(now - delta(settings.arm_grace));
        epoch
    }

    pub fn disarm(&mut self) {
        self.armed = false;
        self.armed_at = None;
        self.triggered = false;
        self.epoch += 1;
    }

    /// Classify an opening reported at `now`.
    pub fn opening(
        &mut self,
        now: Timestamp,
        front_door: bool,
        settings: &AlarmSettings,
    ) -> OpeningOutcome {
        if !self.armed {
            return OpeningOutcome::Disarmed;
        }
        if self.triggered {
            return OpeningOutcome::AlreadyTriggered;
        }
        let in_grace = self
            .armed_at
            .is_some_and(|at| elapsed(at, now) < settings.arm_grace);
        if in_grace {
            return OpeningOutcome::InGrace;
        }
        if front_door {
            return OpeningOutcome::FrontDoor { epoch: self.epoch };
        }
        self.triggered = true;
        OpeningOutcome::Trigger { epoch: self.epoch }
    }

    /// Trigger after a front-door delay, unless the session was disarmed,
    /// re-armed or already triggered meanwhile.
    pub fn confirm_trigger(&mut self, epoch: u64) -> bool {
        if self.armed && !self.triggered && self.epoch == epoch {
            self.triggered = true;
            true
        } else {
            false
        }
    }

    /// Whether work started under `epoch` should keep running.
    #[must_use]
    pub fn is_current(&self, epoch: u64) -> bool {
        self.armed && self.epoch == epoch
    }
}
