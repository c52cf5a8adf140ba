// tft-demo entry point
//
// Boot: logger -> clocks -> heaps (internal + PSRAM) -> esp-rtos ->
// board -> panel reset -> Display::begin -> spawn transfer task.
// Main loop: erase sprite, move, redraw, present. Only the two
// sprite positions are dirty each frame, so a frame is a few hundred
// bytes on the wire instead of 40KB.

#![no_std]
#![no_main]

use embassy_executor::Spawner;
use embassy_time::{Duration, Ticker};
use embedded_graphics::{
    mono_font::{MonoTextStyle, ascii::FONT_6X10},
    pixelcolor::Rgb565,
    prelude::*,
    primitives::{PrimitiveStyle, Rectangle},
    text::Text,
};
use esp_backtrace as _;
use esp_hal::clock::CpuClock;
use esp_hal::timer::timg::TimerGroup;
use log::{info, warn};

use tft_pipeline::board::Board;
use tft_pipeline::drivers::backlight::Backlight;
use tft_pipeline::drivers::st7735::hardware_reset;
use tft_pipeline::kernel::tasks::{PIPELINE, transfer_task};
use tft_pipeline::{Display, Error, PipelineConfig};

extern crate alloc;

esp_bootloader_esp_idf::esp_app_desc!();

const SPRITE: u32 = 16;
const FRAME_MS: u64 = 20;
const STATS_EVERY: u32 = 500;

#[esp_rtos::main]
async fn main(spawner: Spawner) -> ! {
    esp_println::logger::init_logger_from_env();
    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    // Internal heap is smaller than one frame, so the framebuffers land
    // in PSRAM and the 8KB bounce buffers stay on-chip.
    esp_alloc::heap_allocator!(size: 24 * 1024);
    esp_alloc::psram_allocator!(unsafe { peripherals.PSRAM.clone_unchecked() }, esp_hal::psram);

    let timg0 = TimerGroup::new(unsafe { peripherals.TIMG0.clone_unchecked() });
    esp_rtos::start(timg0.timer0);

    info!("booting...");

    let cfg = PipelineConfig::default();
    let mut board = Board::init(peripherals, &cfg);
    let mut delay = embassy_time::Delay;
    hardware_reset(&mut board.rst, &mut delay).await.unwrap();
    info!("hardware initialized.");

    let mut display = Display::new(&PIPELINE, cfg);
    let engine = display.begin(board.panel, &mut delay).await.unwrap();
    spawner.spawn(transfer_task(engine).unwrap());
    board.backlight.set_brightness(cfg.brightness).unwrap();

    if let Ok(mut s) = display.surface() {
        s.clear(Rgb565::BLACK).unwrap();
        Text::new(
            "tft-pipeline",
            Point::new(4, 12),
            MonoTextStyle::new(&FONT_6X10, Rgb565::WHITE),
        )
        .draw(&mut s)
        .unwrap();
    }
    display.present().unwrap();

    let (w, h) = (display.width() as i32, display.height() as i32);
    let size = Size::new(SPRITE, SPRITE);
    let (mut x, mut y) = (10i32, 30i32);
    let (mut dx, mut dy) = (2i32, 1i32);
    let mut frame: u32 = 0;
    let mut ticker = Ticker::every(Duration::from_millis(FRAME_MS));

    loop {
        if let Ok(mut s) = display.surface() {
            Rectangle::new(Point::new(x, y), size)
                .into_styled(PrimitiveStyle::with_fill(Rgb565::BLACK))
                .draw(&mut s)
                .unwrap();

            x += dx;
            y += dy;
            if x <= 0 || x + SPRITE as i32 >= w {
                dx = -dx;
            }
            if y <= 16 || y + SPRITE as i32 >= h {
                dy = -dy;
            }

            Rectangle::new(Point::new(x, y), size)
                .into_styled(PrimitiveStyle::with_fill(Rgb565::RED))
                .draw(&mut s)
                .unwrap();
        }

        match display.present() {
            Ok(()) => {}
            Err(Error::Busy) => {
                // previous frame still streaming; let it land, then send
                if let Err(e) = display.wait().await {
                    warn!("wait: {}", e);
                }
                if let Err(e) = display.present() {
                    warn!("present: {}", e);
                }
            }
            Err(e) => warn!("present: {}", e),
        }

        frame = frame.wrapping_add(1);
        if frame % STATS_EVERY == 0 {
            let s = display.stats();
            info!(
                "frames {} ok {} failed {} | {} chunks, {} bytes",
                s.frames_submitted, s.frames_completed, s.frames_failed, s.chunks_sent, s.pixel_bytes
            );
        }

        ticker.next().await;
    }
}
