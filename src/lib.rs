// Triple-buffered display pipeline for ST7735-class TFT panels
//
// The application draws into a PSRAM framebuffer while a transfer task
// streams the previous frame to the panel in row strips, staged through
// two on-chip bounce buffers. Only the dirty bounding box goes on the wire.
//
// board/ and kernel::tasks are ESP32-S3 specific (feature "board");
// everything else is target independent and runs on the host.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

#[cfg(feature = "board")]
pub mod board;
pub mod config;
pub mod display;
pub mod drivers;
pub mod error;
pub mod framebuffer;
pub mod geometry;
pub mod kernel;

pub use config::{PipelineConfig, Rotation};
pub use display::Display;
pub use error::{BusError, Error};
pub use geometry::Rect;
pub use kernel::Pipeline;
