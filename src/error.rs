// Error types for the display pipeline
//
// BusError is what the panel driver produces; it is reduced to the
// embedded-hal ErrorKind so the pipeline types stay non-generic.
// Error is what the application sees.

use core::fmt;

use embedded_hal::{digital, pwm, spi};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    Spi(spi::ErrorKind),
    Pin(digital::ErrorKind),
    Pwm(pwm::ErrorKind),
}

impl BusError {
    pub fn spi<E: spi::Error>(e: E) -> Self {
        BusError::Spi(e.kind())
    }

    pub fn pin<E: digital::Error>(e: E) -> Self {
        BusError::Pin(e.kind())
    }

    pub fn pwm<E: pwm::Error>(e: E) -> Self {
        BusError::Pwm(e.kind())
    }
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusError::Spi(kind) => write!(f, "spi: {}", kind),
            BusError::Pin(kind) => write!(f, "gpio: {}", kind),
            BusError::Pwm(kind) => write!(f, "pwm: {:?}", kind),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Called before `begin()` or after `end()`.
    NotInitialized,
    /// No idle buffer, a frame is still on the wire, or the job queue is full.
    Busy,
    /// Framebuffer or bounce buffer allocation failed.
    Alloc,
    /// Bus error while talking to the panel.
    TransferFailed(BusError),
    /// `wait_timeout` expired. The transfer keeps running.
    Timeout,
    /// Another `Display` already holds the panel.
    DeviceClaimed,
    /// Geometry the pipeline cannot run with.
    Config(&'static str),
}

impl From<BusError> for Error {
    fn from(e: BusError) -> Self {
        Error::TransferFailed(e)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NotInitialized => write!(f, "display not initialized"),
            Error::Busy => write!(f, "pipeline busy"),
            Error::Alloc => write!(f, "buffer allocation failed"),
            Error::TransferFailed(e) => write!(f, "transfer failed ({})", e),
            Error::Timeout => write!(f, "timed out waiting for transfer"),
            Error::DeviceClaimed => write!(f, "panel already claimed"),
            Error::Config(why) => write!(f, "bad config: {}", why),
        }
    }
}
