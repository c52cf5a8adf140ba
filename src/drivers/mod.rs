// Panel-side drivers, board-independent.
//
// st7735: command/window/pixel protocol
// strip: strip layout, chunk plans, bounce buffers
// transfer: the worker that streams frames through the bounce buffers
// backlight: PWM or on/off backlight

pub mod backlight;
pub mod st7735;
pub mod strip;
pub mod transfer;
