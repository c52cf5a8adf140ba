//! ESP32-S3 + ST7735 Board Support Package (BSP)
//!
//! Maps the panel wiring onto named hardware so the demo and the
//! transfer task do not need to know GPIO numbers or peripheral details.
//! Framebuffers live in PSRAM (see the allocator setup in main); the
//! bounce buffers come from the internal heap.

pub mod pins;

use embedded_hal_bus::spi::ExclusiveDevice;
use esp_hal::{
    Async,
    gpio::{DriveMode, Level, Output, OutputConfig},
    ledc::{
        LSGlobalClkSource, Ledc, LowSpeed,
        channel::{self, ChannelIFace},
        timer::{self, TimerIFace},
    },
    peripherals::Peripherals,
    spi::{self, Mode},
    time::Rate,
};
use static_cell::StaticCell;

use crate::config::PipelineConfig;
use crate::drivers::backlight::PwmBacklight;
use crate::drivers::st7735::{BusClock, St7735};
use crate::error::BusError;

pub const BACKLIGHT_PWM_KHZ: u32 = 5;

fn spi_config(mhz: u32) -> spi::master::Config {
    spi::master::Config::default()
        .with_frequency(Rate::from_mhz(mhz))
        .with_mode(Mode::_0)
}

// Type Aliases
pub type SpiBus = spi::master::Spi<'static, Async>;
pub type DisplaySpi = ExclusiveDevice<SpiBus, Output<'static>, embassy_time::Delay>;
pub type DcPin = Output<'static>;
pub type Panel = St7735<DisplaySpi, DcPin>;
pub type BacklightPwm = channel::Channel<'static, LowSpeed>;

static LEDC: StaticCell<Ledc<'static>> = StaticCell::new();
static BL_TIMER: StaticCell<timer::Timer<'static, LowSpeed>> = StaticCell::new();

/// Complete board hardware, ready for `Display::begin`.
pub struct Board {
    pub panel: Panel,
    pub rst: Output<'static>,
    pub backlight: PwmBacklight<BacklightPwm>,
}

impl Board {
    pub fn init(p: Peripherals, config: &PipelineConfig) -> Self {
        // GPIO setup
        let cs = Output::new(p.GPIO10, Level::High, OutputConfig::default());
        let dc = Output::new(p.GPIO9, Level::High, OutputConfig::default());
        let rst = Output::new(p.GPIO8, Level::High, OutputConfig::default());

        // SPI bus, mode 0, write-only
        let spi_bus = spi::master::Spi::new(p.SPI2, spi_config(config.spi_frequency_mhz))
            .unwrap()
            .with_sck(p.GPIO12)
            .with_mosi(p.GPIO11)
            .into_async();

        let spi_dev = ExclusiveDevice::new(spi_bus, cs, embassy_time::Delay).unwrap();
        let panel = St7735::new(spi_dev, dc, config);

        // Backlight: LEDC low-speed timer 0 at 5kHz, 8-bit duty
        let ledc = LEDC.init(Ledc::new(p.LEDC));
        ledc.set_global_slow_clock(LSGlobalClkSource::APBClk);
        let bl_timer = BL_TIMER.init(ledc.timer::<LowSpeed>(timer::Number::Timer0));
        bl_timer
            .configure(timer::config::Config {
                duty: timer::config::Duty::Duty8Bit,
                clock_source: timer::LSClockSource::APBClk,
                frequency: Rate::from_khz(BACKLIGHT_PWM_KHZ),
            })
            .unwrap();
        let bl_timer: &'static timer::Timer<'static, LowSpeed> = bl_timer;
        let mut bl_channel = ledc.channel(channel::Number::Channel0, p.GPIO7);
        bl_channel
            .configure(channel::config::Config {
                timer: bl_timer,
                duty_pct: 0,
                drive_mode: DriveMode::PushPull,
            })
            .unwrap();

        log::info!(
            "[TFT] spi2 mosi={} sck={} cs={} dc={} rst={} bl={} @ {}MHz",
            pins::SPI_MOSI,
            pins::SPI_SCK,
            pins::TFT_CS,
            pins::TFT_DC,
            pins::TFT_RST,
            pins::TFT_BL,
            config.spi_frequency_mhz
        );

        Board {
            panel,
            rst,
            backlight: PwmBacklight::new(bl_channel),
        }
    }
}

// Reclocks SPI2 in place; the device keeps its CS pin.
impl BusClock for DisplaySpi {
    fn set_frequency_mhz(&mut self, mhz: u32) -> Result<(), BusError> {
        self.bus_mut().apply_config(&spi_config(mhz)).map_err(|e| {
            log::warn!("[TFT] spi {}MHz rejected: {:?}", mhz, e);
            BusError::Spi(embedded_hal::spi::ErrorKind::Other)
        })
    }
}
