// Recording mocks for the panel bus.
//
// MockSpi and MockDc share one Wire, so every SPI write is logged with
// the DC level it went out under. Helpers decode the log back into
// commands and address windows.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use embassy_futures::yield_now;
use embedded_hal::digital::{self, OutputPin};
use embedded_hal::spi::{self, Operation};
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::spi::SpiDevice;

use tft_pipeline::drivers::st7735::{BusClock, St7735, cmd};
use tft_pipeline::{BusError, PipelineConfig};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Write {
    pub dc: bool,
    pub bytes: Vec<u8>,
}

/// One CASET/RASET/RAMWR group and the pixel bytes that followed it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Window {
    pub x0: u16,
    pub x1: u16,
    pub y0: u16,
    pub y1: u16,
    pub pixels: Vec<u8>,
}

impl Window {
    pub fn area(&self) -> usize {
        (self.x1 - self.x0 + 1) as usize * (self.y1 - self.y0 + 1) as usize
    }
}

#[derive(Default)]
pub struct Wire {
    pub dc_high: bool,
    pub log: Vec<Write>,
    /// Fail this many upcoming pixel writes.
    pub fail_pixel_writes: usize,
    /// Yield to the executor after every write so other tasks interleave.
    pub yield_on_write: bool,
    /// Every bus reclock, in MHz.
    pub clock_mhz: Vec<u32>,
    last_cmd: Option<u8>,
}

impl Wire {
    pub fn clear(&mut self) {
        self.log.clear();
        self.last_cmd = None;
    }

    pub fn total_bytes(&self) -> usize {
        self.log.iter().map(|w| w.bytes.len()).sum()
    }

    pub fn commands(&self) -> Vec<u8> {
        self.log
            .iter()
            .filter(|w| !w.dc)
            .flat_map(|w| w.bytes.iter().copied())
            .collect()
    }

    /// Argument bytes sent after the `n`th occurrence of `command`.
    pub fn args_of(&self, command: u8, n: usize) -> Vec<u8> {
        let mut seen = 0;
        let mut out = Vec::new();
        let mut collecting = false;
        for w in &self.log {
            if !w.dc {
                if collecting {
                    break;
                }
                if w.bytes == [command] {
                    if seen == n {
                        collecting = true;
                    }
                    seen += 1;
                }
            } else if collecting {
                out.extend_from_slice(&w.bytes);
            }
        }
        out
    }

    pub fn windows(&self) -> Vec<Window> {
        let mut out: Vec<Window> = Vec::new();
        let mut caset = [0u8; 4];
        let mut raset = [0u8; 4];
        let mut current: Option<u8> = None;
        let mut args: Vec<u8> = Vec::new();

        for w in &self.log {
            if w.dc {
                args.extend_from_slice(&w.bytes);
            } else {
                close_group(current, &mut args, &mut out, &mut caset, &mut raset);
                current = w.bytes.first().copied();
            }
        }
        close_group(current, &mut args, &mut out, &mut caset, &mut raset);
        out
    }

    pub fn pixel_bytes(&self) -> usize {
        self.windows().iter().map(|w| w.pixels.len()).sum()
    }

    fn record(&mut self, bytes: &[u8]) -> Result<(), spi::ErrorKind> {
        let pixel_write = self.dc_high && self.last_cmd == Some(cmd::RAMWR);
        if pixel_write && self.fail_pixel_writes > 0 {
            self.fail_pixel_writes -= 1;
            return Err(spi::ErrorKind::Other);
        }
        if !self.dc_high {
            self.last_cmd = bytes.first().copied();
        }
        self.log.push(Write {
            dc: self.dc_high,
            bytes: bytes.to_vec(),
        });
        Ok(())
    }
}

// a command's argument bytes are complete once the next command starts
fn close_group(
    current: Option<u8>,
    args: &mut Vec<u8>,
    out: &mut Vec<Window>,
    caset: &mut [u8; 4],
    raset: &mut [u8; 4],
) {
    match current {
        Some(cmd::CASET) if args.len() == 4 => caset.copy_from_slice(args),
        Some(cmd::RASET) if args.len() == 4 => raset.copy_from_slice(args),
        Some(cmd::RAMWR) => out.push(Window {
            x0: u16::from_be_bytes([caset[0], caset[1]]),
            x1: u16::from_be_bytes([caset[2], caset[3]]),
            y0: u16::from_be_bytes([raset[0], raset[1]]),
            y1: u16::from_be_bytes([raset[2], raset[3]]),
            pixels: std::mem::take(args),
        }),
        _ => {}
    }
    args.clear();
}

pub type SharedWire = Rc<RefCell<Wire>>;

pub struct MockSpi {
    wire: SharedWire,
}

impl spi::ErrorType for MockSpi {
    type Error = spi::ErrorKind;
}

impl SpiDevice for MockSpi {
    async fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Self::Error> {
        for op in operations {
            if let Operation::Write(bytes) = op {
                self.wire.borrow_mut().record(&bytes[..])?;
            }
        }
        let yield_on_write = self.wire.borrow().yield_on_write;
        if yield_on_write {
            yield_now().await;
        }
        Ok(())
    }
}

impl BusClock for MockSpi {
    fn set_frequency_mhz(&mut self, mhz: u32) -> Result<(), BusError> {
        self.wire.borrow_mut().clock_mhz.push(mhz);
        Ok(())
    }
}

pub struct MockDc {
    wire: SharedWire,
}

impl digital::ErrorType for MockDc {
    type Error = digital::ErrorKind;
}

impl OutputPin for MockDc {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.wire.borrow_mut().dc_high = false;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.wire.borrow_mut().dc_high = true;
        Ok(())
    }
}

/// Stand-alone pin that remembers every level it was driven to.
#[derive(Default)]
pub struct MockPin {
    pub levels: Vec<bool>,
}

impl digital::ErrorType for MockPin {
    type Error = digital::ErrorKind;
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.levels.push(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.levels.push(true);
        Ok(())
    }
}

/// Records requested delays in milliseconds instead of sleeping.
#[derive(Default)]
pub struct MockDelay {
    pub ms: Vec<u32>,
}

impl DelayNs for MockDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.ms.push(ns / 1_000_000);
    }

    async fn delay_us(&mut self, us: u32) {
        self.ms.push(us / 1_000);
    }

    async fn delay_ms(&mut self, ms: u32) {
        self.ms.push(ms);
    }
}

pub type MockPanel = St7735<MockSpi, MockDc>;

pub fn panel(config: &PipelineConfig) -> (SharedWire, MockPanel) {
    let wire: SharedWire = Rc::new(RefCell::new(Wire::default()));
    let spi = MockSpi { wire: wire.clone() };
    let dc = MockDc { wire: wire.clone() };
    (wire, St7735::new(spi, dc, config))
}

/// Every pixel of `w` decodes to `color`.
pub fn all_pixels(w: &Window, color: u16) -> bool {
    w.pixels.len() % 2 == 0
        && w
            .pixels
            .chunks_exact(2)
            .all(|p| u16::from_be_bytes([p[0], p[1]]) == color)
}
