//! GPIO |     Function    |      Notes
//! -----+-----------------+----------------------------------
//!  7   | TFT BL          | LEDC channel 0, 5kHz 8-bit PWM
//!  8   | TFT RST         | Reset (active low)
//!  9   | TFT DC          | Data/Command select
//! 10   | TFT CS          | Display chip select
//! 11   | SPI2 MOSI       | Display is write-only, no MISO
//! 12   | SPI2 SCK        |

// ----- TFT -----
pub const TFT_BL: u8 = 7;
pub const TFT_RST: u8 = 8;
pub const TFT_DC: u8 = 9;
pub const TFT_CS: u8 = 10;

// ----- SPI Bus -----
pub const SPI_MOSI: u8 = 11;
pub const SPI_SCK: u8 = 12;
