// Pipeline configuration
//
// Built the same way as esp-hal configs: Default + with_* setters.
// Panel width/height are the native (portrait) dimensions; rotation
// decides which way round the framebuffer is.

use crate::drivers::strip::StripLayout;
use crate::error::Error;
use crate::kernel::pipeline::JOB_QUEUE_DEPTH;

pub const ST7735_WIDTH: u16 = 128;
pub const ST7735_HEIGHT: u16 = 160;

/// Bytes per on-chip bounce buffer; two of these are allocated.
pub const DEFAULT_BOUNCE_BYTES: usize = 8192;
pub const DEFAULT_SPI_MHZ: u32 = 40;
pub const DEFAULT_BRIGHTNESS: u8 = 255;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// MADCTL value (MY/MX/MV bits, RGB order) for this orientation.
    pub const fn madctl(self) -> u8 {
        match self {
            Rotation::Deg0 => 0x00,
            Rotation::Deg90 => 0x60,
            Rotation::Deg180 => 0xC0,
            Rotation::Deg270 => 0xA0,
        }
    }

    pub const fn is_landscape(self) -> bool {
        matches!(self, Rotation::Deg90 | Rotation::Deg270)
    }

    /// Logical (width, height) of a panel with the given native size.
    pub const fn apply(self, width: u16, height: u16) -> (u16, u16) {
        if self.is_landscape() {
            (height, width)
        } else {
            (width, height)
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PipelineConfig {
    pub panel_width: u16,
    pub panel_height: u16,
    pub rotation: Rotation,
    /// Controller RAM offset of the visible area. Negative values count as 0.
    pub offset_x: i16,
    pub offset_y: i16,
    pub bounce_bytes: usize,
    pub spi_frequency_mhz: u32,
    pub dirty_tracking: bool,
    pub brightness: u8,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineConfig {
    pub const fn new() -> Self {
        Self {
            panel_width: ST7735_WIDTH,
            panel_height: ST7735_HEIGHT,
            rotation: Rotation::Deg0,
            offset_x: 0,
            offset_y: 0,
            bounce_bytes: DEFAULT_BOUNCE_BYTES,
            spi_frequency_mhz: DEFAULT_SPI_MHZ,
            dirty_tracking: true,
            brightness: DEFAULT_BRIGHTNESS,
        }
    }

    pub const fn with_panel_size(mut self, width: u16, height: u16) -> Self {
        self.panel_width = width;
        self.panel_height = height;
        self
    }

    pub const fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    pub const fn with_offsets(mut self, x: i16, y: i16) -> Self {
        self.offset_x = x;
        self.offset_y = y;
        self
    }

    pub const fn with_bounce_bytes(mut self, bytes: usize) -> Self {
        self.bounce_bytes = bytes;
        self
    }

    pub const fn with_spi_frequency_mhz(mut self, mhz: u32) -> Self {
        self.spi_frequency_mhz = mhz;
        self
    }

    pub const fn with_dirty_tracking(mut self, enabled: bool) -> Self {
        self.dirty_tracking = enabled;
        self
    }

    pub const fn with_brightness(mut self, level: u8) -> Self {
        self.brightness = level;
        self
    }

    /// Logical framebuffer width after rotation.
    pub const fn width(&self) -> u16 {
        self.rotation.apply(self.panel_width, self.panel_height).0
    }

    /// Logical framebuffer height after rotation.
    pub const fn height(&self) -> u16 {
        self.rotation.apply(self.panel_width, self.panel_height).1
    }

    pub const fn frame_pixels(&self) -> usize {
        self.panel_width as usize * self.panel_height as usize
    }

    pub const fn layout(&self) -> StripLayout {
        StripLayout::new(self.width(), self.height(), self.bounce_bytes)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.panel_width == 0 || self.panel_height == 0 {
            return Err(Error::Config("zero-sized panel"));
        }
        if self.spi_frequency_mhz == 0 {
            return Err(Error::Config("zero spi frequency"));
        }
        let layout = self.layout();
        if layout.rows() == 0 {
            return Err(Error::Config("bounce buffer smaller than one row"));
        }
        // twice the strip count, leaving room for control messages behind a frame
        if 2 * layout.count() as usize > JOB_QUEUE_DEPTH {
            return Err(Error::Config("too many chunks for the job queue"));
        }
        Ok(())
    }
}
