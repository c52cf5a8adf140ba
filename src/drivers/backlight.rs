// Panel backlight
// PWM at 8-bit resolution when the pin has a PWM channel (LEDC on the
// board, ~5kHz), otherwise a plain GPIO that is on above half level.

use embedded_hal::digital::OutputPin;
use embedded_hal::pwm::SetDutyCycle;

use crate::error::BusError;

/// Digital backlights switch on above this level.
pub const SWITCH_THRESHOLD: u8 = 128;

pub trait Backlight {
    fn set_brightness(&mut self, level: u8) -> Result<(), BusError>;
    fn brightness(&self) -> u8;

    fn off(&mut self) -> Result<(), BusError> {
        self.set_brightness(0)
    }
}

pub struct PwmBacklight<P> {
    pwm: P,
    level: u8,
}

impl<P: SetDutyCycle> PwmBacklight<P> {
    pub fn new(pwm: P) -> Self {
        Self { pwm, level: 0 }
    }
}

impl<P: SetDutyCycle> Backlight for PwmBacklight<P> {
    fn set_brightness(&mut self, level: u8) -> Result<(), BusError> {
        self.pwm
            .set_duty_cycle_fraction(level as u16, u8::MAX as u16)
            .map_err(BusError::pwm)?;
        self.level = level;
        Ok(())
    }

    fn brightness(&self) -> u8 {
        self.level
    }
}

pub struct SwitchBacklight<P> {
    pin: P,
    level: u8,
}

impl<P: OutputPin> SwitchBacklight<P> {
    pub fn new(pin: P) -> Self {
        Self { pin, level: 0 }
    }
}

impl<P: OutputPin> Backlight for SwitchBacklight<P> {
    fn set_brightness(&mut self, level: u8) -> Result<(), BusError> {
        if level > SWITCH_THRESHOLD {
            self.pin.set_high().map_err(BusError::pin)?;
        } else {
            self.pin.set_low().map_err(BusError::pin)?;
        }
        self.level = level;
        Ok(())
    }

    fn brightness(&self) -> u8 {
        self.level
    }
}
