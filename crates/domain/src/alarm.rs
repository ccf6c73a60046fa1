//! Alarm: keypad authentication and the armed/triggered state machine.
//!
//! The pure parts live here: the secret [`AlarmCode`], the [`KeypadKey`]s a
//! keypad can emit, timing [`AlarmSettings`] and the [`AlarmSession`] whose
//! transition methods decide *what* should happen. Side effects
//! (persistence, notifications, cameras, timers) are driven by the alarm
//! service in the app crate.

mod code;
mod keypad;
mod session;

pub use code::{AlarmCode, MIN_CODE_LENGTH};
pub use keypad::{KeypadCommand, KeypadKey};
pub use session::{AlarmSession, AlarmSettings, AlarmState, KeypadOutcome, OpeningOutcome};
