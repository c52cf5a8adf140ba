// ST7735 TFT driver (board-independent)
// 128x160 RGB565 over a write-only SPI link. DC low = command byte,
// DC high = argument or pixel bytes. Pixels go out big-endian; the
// caller hands over bytes already in wire order.
//
// Async throughout: the transfer task awaits each SPI write so the
// application task keeps running while strips are on the wire.

use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::spi::SpiDevice;

use crate::config::{PipelineConfig, Rotation};
use crate::error::BusError;
use crate::geometry::Rect;

// ST7735 commands
#[allow(dead_code)]
pub mod cmd {
    pub const SWRESET: u8 = 0x01;
    pub const SLPOUT: u8 = 0x11;
    pub const NORON: u8 = 0x13;
    pub const INVOFF: u8 = 0x20;
    pub const INVON: u8 = 0x21;
    pub const DISPOFF: u8 = 0x28;
    pub const DISPON: u8 = 0x29;
    pub const CASET: u8 = 0x2A;
    pub const RASET: u8 = 0x2B;
    pub const RAMWR: u8 = 0x2C;
    pub const MADCTL: u8 = 0x36;
    pub const COLMOD: u8 = 0x3A;
}

/// COLMOD argument for 16 bits per pixel.
pub const COLMOD_RGB565: u8 = 0x05;

const SWRESET_DELAY_MS: u32 = 150;
const SLPOUT_DELAY_MS: u32 = 500;
const NORON_DELAY_MS: u32 = 10;
const DISPON_DELAY_MS: u32 = 100;

/// Settle time after a MADCTL change at runtime.
pub const MADCTL_SETTLE_MS: u64 = 10;

const RESET_PULSE_MS: u32 = 10;
const RESET_RECOVERY_MS: u32 = 120;

/// Pulse the panel's reset line: low 10ms, release, settle 120ms.
pub async fn hardware_reset<RST, D>(rst: &mut RST, delay: &mut D) -> Result<(), BusError>
where
    RST: OutputPin,
    D: DelayNs,
{
    rst.set_low().map_err(BusError::pin)?;
    delay.delay_ms(RESET_PULSE_MS).await;
    rst.set_high().map_err(BusError::pin)?;
    delay.delay_ms(RESET_RECOVERY_MS).await;
    Ok(())
}

/// Bus whose clock can be changed after construction.
///
/// `SpiDevice` has no notion of bus speed, so the board implements this
/// for its concrete device type.
pub trait BusClock {
    fn set_frequency_mhz(&mut self, mhz: u32) -> Result<(), BusError>;
}

pub struct St7735<SPI, DC> {
    spi: SPI,
    dc: DC,
    rotation: Rotation,
    width: u16,
    height: u16,
    offset_x: u16,
    offset_y: u16,
}

impl<SPI, DC> St7735<SPI, DC>
where
    SPI: SpiDevice,
    DC: OutputPin,
{
    pub fn new(spi: SPI, dc: DC, config: &PipelineConfig) -> Self {
        let mut panel = Self {
            spi,
            dc,
            rotation: config.rotation,
            width: config.width(),
            height: config.height(),
            offset_x: 0,
            offset_y: 0,
        };
        panel.set_offsets(config.offset_x, config.offset_y);
        panel
    }

    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    /// Logical (width, height) after rotation.
    pub fn size(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    // negative offsets clamp to 0
    pub fn set_offsets(&mut self, x: i16, y: i16) {
        self.offset_x = x.max(0) as u16;
        self.offset_y = y.max(0) as u16;
    }

    pub fn offsets(&self) -> (u16, u16) {
        (self.offset_x, self.offset_y)
    }

    pub fn release(self) -> (SPI, DC) {
        (self.spi, self.dc)
    }

    // ── Init ────────────────────────────────────────────────

    pub async fn init<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), BusError> {
        self.command(cmd::SWRESET).await?;
        delay.delay_ms(SWRESET_DELAY_MS).await;

        self.command(cmd::SLPOUT).await?;
        delay.delay_ms(SLPOUT_DELAY_MS).await;

        self.command_with(cmd::COLMOD, &[COLMOD_RGB565]).await?;
        self.command_with(cmd::MADCTL, &[self.rotation.madctl()])
            .await?;

        self.set_address_window(Rect::full(self.width, self.height))
            .await?;

        self.command(cmd::NORON).await?;
        delay.delay_ms(NORON_DELAY_MS).await;

        self.command(cmd::DISPON).await?;
        delay.delay_ms(DISPON_DELAY_MS).await;

        log::info!(
            "[TFT] panel up: {}x{} madctl={:#04x}",
            self.width,
            self.height,
            self.rotation.madctl()
        );
        Ok(())
    }

    // ── Runtime control ─────────────────────────────────────

    pub async fn set_inverted(&mut self, inverted: bool) -> Result<(), BusError> {
        self.command(if inverted { cmd::INVON } else { cmd::INVOFF })
            .await
    }

    pub async fn set_display_on(&mut self, on: bool) -> Result<(), BusError> {
        self.command(if on { cmd::DISPON } else { cmd::DISPOFF })
            .await
    }

    /// Re-orient the panel. The logical size follows the rotation even
    /// if the MADCTL write fails, so callers stay in step with it.
    pub async fn set_rotation(&mut self, rotation: Rotation) -> Result<(), BusError> {
        if rotation.is_landscape() != self.rotation.is_landscape() {
            core::mem::swap(&mut self.width, &mut self.height);
        }
        self.rotation = rotation;
        log::info!(
            "[TFT] rotation {:?}: {}x{} madctl={:#04x}",
            rotation,
            self.width,
            self.height,
            rotation.madctl()
        );
        self.command_with(cmd::MADCTL, &[rotation.madctl()]).await
    }

    // ── Address window / pixel data ─────────────────────────

    /// CASET + RASET for `r` (inclusive end coordinates, offsets applied).
    /// An empty `r` sends nothing.
    pub async fn set_address_window(&mut self, r: Rect) -> Result<(), BusError> {
        if r.is_empty() {
            return Ok(());
        }
        let x0 = r.x + self.offset_x;
        let x1 = x0 + r.w - 1;
        let y0 = r.y + self.offset_y;
        let y1 = y0 + r.h - 1;

        self.command_with(cmd::CASET, &window_args(x0, x1)).await?;
        self.command_with(cmd::RASET, &window_args(y0, y1)).await
    }

    /// Window + RAMWR; follow with `write_pixels` for `r.w * r.h` pixels.
    /// An empty `r` sends nothing.
    pub async fn begin_write(&mut self, r: Rect) -> Result<(), BusError> {
        if r.is_empty() {
            return Ok(());
        }
        self.set_address_window(r).await?;
        self.command(cmd::RAMWR).await
    }

    /// Big-endian RGB565 bytes into the open RAMWR.
    pub async fn write_pixels(&mut self, bytes: &[u8]) -> Result<(), BusError> {
        self.data(bytes).await
    }

    // ── Low-level SPI ───────────────────────────────────────

    async fn command(&mut self, cmd: u8) -> Result<(), BusError> {
        self.dc.set_low().map_err(BusError::pin)?;
        self.spi.write(&[cmd]).await.map_err(BusError::spi)
    }

    async fn data(&mut self, bytes: &[u8]) -> Result<(), BusError> {
        self.dc.set_high().map_err(BusError::pin)?;
        self.spi.write(bytes).await.map_err(BusError::spi)
    }

    async fn command_with(&mut self, cmd: u8, args: &[u8]) -> Result<(), BusError> {
        self.command(cmd).await?;
        self.data(args).await
    }
}

impl<SPI: BusClock, DC> St7735<SPI, DC> {
    pub fn set_bus_frequency_mhz(&mut self, mhz: u32) -> Result<(), BusError> {
        self.spi.set_frequency_mhz(mhz)
    }
}

fn window_args(start: u16, end: u16) -> [u8; 4] {
    let [s_hi, s_lo] = start.to_be_bytes();
    let [e_hi, e_lo] = end.to_be_bytes();
    [s_hi, s_lo, e_hi, e_lo]
}

#[cfg(test)]
mod tests {
    use super::window_args;

    #[test]
    fn window_args_are_big_endian_pairs() {
        assert_eq!(window_args(10, 29), [0x00, 0x0A, 0x00, 0x1D]);
        assert_eq!(window_args(0x0102, 0x0304), [0x01, 0x02, 0x03, 0x04]);
    }
}
