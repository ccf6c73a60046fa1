//! Virtual light: responds to `SwitchLight`.

use std::sync::{Mutex, PoisonError};

use burrow_domain::instruction::{Instruction, LightSetting};

/// A simulated dimmable light.
pub struct VirtualLight {
    setting: Mutex<LightSetting>,
}

impl Default for VirtualLight {
    fn default() -> Self {
        Self {
            setting: Mutex::new(LightSetting {
                on: false,
                brightness: None,
            }),
        }
    }
}

impl VirtualLight {
    #[must_use]
    pub fn setting(&self) -> LightSetting {
        *self.setting.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns `false` for instructions a light does not understand.
    pub fn apply(&self, instruction: &Instruction) -> bool {
        let Instruction::SwitchLight { setting } = instruction else {
            return false;
        };
        let mut current = self.setting.lock().unwrap_or_else(PoisonError::into_inner);
        current.on = setting.on;
        if setting.brightness.is_some() {
            current.brightness = setting.brightness;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn switch(on: bool, brightness: Option<u8>) -> Instruction {
        Instruction::SwitchLight {
            setting: LightSetting { on, brightness },
        }
    }

    #[test]
    fn should_default_to_off() {
        assert!(!VirtualLight::default().setting().on);
    }

    #[test]
    fn should_turn_on_with_brightness() {
        let light = VirtualLight::default();
        assert!(light.apply(&switch(true, Some(60))));
        assert_eq!(
            light.setting(),
            LightSetting {
                on: true,
                brightness: Some(60)
            }
        );
    }

    #[test]
    fn should_keep_brightness_when_switched_off() {
        let light = VirtualLight::default();
        light.apply(&switch(true, Some(60)));
        light.apply(&switch(false, None));
        assert_eq!(
            light.setting(),
            LightSetting {
                on: false,
                brightness: Some(60)
            }
        );
    }

    #[test]
    fn should_refuse_shutter_instruction() {
        assert!(!VirtualLight::default().apply(&Instruction::StopShutter));
    }
}
