// Transfer engine: the worker half of the pipeline.
//
// Owns the panel bus and the two on-chip bounce buffers. Consumes jobs
// from the pipeline FIFO, one strip per message:
//   copy the strip's full rows PSRAM -> bounce[k % 2]
//   open the address window on the dirty part of the strip only
//   per dirty row: swap to big-endian, transmit, swap back
// then queues strip k+1 of the same frame behind anything already waiting.
// After the last strip the frame goes back to Idle and completion fires.
//
// A bus error ends the job early. The frame is still released and
// completion still fires, flagged as failed, so the app never hangs.

use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::spi::SpiDevice;
use embassy_sync::channel::TrySendError;
use embassy_time::Timer;
use log::{debug, error, info, warn};

use super::st7735::{BusClock, MADCTL_SETTLE_MS, St7735};
use super::strip::{BounceBuffers, ChunkPlan, StripLayout};
use crate::config::{PipelineConfig, Rotation};
use crate::error::{BusError, Error};
use crate::framebuffer::FrameBuffer;
use crate::kernel::claim::DeviceClaim;
use crate::kernel::pipeline::{EngineState, Pipeline};

/// Panel commands that must be ordered with frame data on the wire.
///
/// They travel through the same FIFO as chunk jobs, so a command queued
/// after a frame is applied only once that frame is fully sent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PanelCommand {
    /// INVON / INVOFF.
    Invert(bool),
    /// DISPON / DISPOFF.
    DisplayOn(bool),
    /// MADCTL for the new orientation. The engine re-plans its strips
    /// for the swapped dimensions before serving the next frame.
    Rotation(Rotation),
    /// Reclock the bus between frames.
    SpiFrequency(u32),
}

/// One strip of one frame. Carries the frame itself: whoever holds the
/// job owns the buffer.
pub struct ChunkJob {
    pub frame: FrameBuffer,
    pub plan: ChunkPlan,
    pub strip: u16,
}

impl ChunkJob {
    /// First job of a frame.
    pub fn start(frame: FrameBuffer, plan: ChunkPlan) -> Self {
        let strip = plan.first();
        Self { frame, plan, strip }
    }
}

/// Everything the transfer task can be asked to do.
pub enum Message {
    /// Send one strip of a frame.
    Chunk(ChunkJob),
    /// Apply a panel command between frames.
    Control(PanelCommand),
    /// Stop serving and hand the panel back.
    Shutdown,
}

/// Worker half of the pipeline.
///
/// Holds the panel claim for as long as it lives: dropping the
/// `Display` alone does not free the panel while the engine still runs.
pub struct TransferEngine<'a, SPI, DC> {
    pipeline: &'a Pipeline,
    panel: St7735<SPI, DC>,
    layout: StripLayout,
    bounce_bytes: usize,
    bounce: BounceBuffers,
    _claim: DeviceClaim<'a>,
}

impl<'a, SPI, DC> TransferEngine<'a, SPI, DC>
where
    SPI: SpiDevice + BusClock,
    DC: OutputPin,
{
    /// Allocate the bounce buffers, sized for either orientation so a
    /// later rotation never has to allocate.
    pub fn new(
        pipeline: &'a Pipeline,
        panel: St7735<SPI, DC>,
        config: &PipelineConfig,
        claim: DeviceClaim<'a>,
    ) -> Result<Self, Error> {
        let layout = config.layout();
        let (w, h) = (config.width(), config.height());
        let turned = StripLayout::new(h, w, config.bounce_bytes);
        let pixels = layout.bounce_pixels().max(turned.bounce_pixels());
        let bounce = BounceBuffers::alloc(pixels)?;
        Ok(Self {
            pipeline,
            panel,
            layout,
            bounce_bytes: config.bounce_bytes,
            bounce,
            _claim: claim,
        })
    }

    /// Strip layout for the current orientation.
    pub fn layout(&self) -> StripLayout {
        self.layout
    }

    /// Run the panel init sequence before the engine starts serving jobs.
    pub async fn init_panel<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), BusError> {
        self.panel.init(delay).await
    }

    /// Serve jobs until Shutdown, then release the claim and hand the
    /// panel back.
    pub async fn run(mut self) -> St7735<SPI, DC> {
        info!(
            "[XFER] running: {} strips of {} rows",
            self.layout.count(),
            self.layout.rows()
        );
        loop {
            match self.pipeline.jobs.receive().await {
                Message::Chunk(job) => self.on_chunk(job).await,
                Message::Control(cmd) => self.on_control(cmd).await,
                Message::Shutdown => break,
            }
        }
        self.set_state(EngineState::Idle);
        let Self {
            pipeline,
            panel,
            _claim: claim,
            ..
        } = self;
        drop(claim);
        info!("[XFER] stopped");
        pipeline.stopped.signal(());
        panel
    }

    fn set_state(&self, state: EngineState) {
        self.pipeline.set_engine_state(state);
    }

    async fn on_control(&mut self, cmd: PanelCommand) {
        let res = match cmd {
            PanelCommand::Invert(on) => self.panel.set_inverted(on).await,
            PanelCommand::DisplayOn(on) => self.panel.set_display_on(on).await,
            PanelCommand::Rotation(rotation) => {
                let res = self.panel.set_rotation(rotation).await;
                let (w, h) = self.panel.size();
                self.layout = StripLayout::new(w, h, self.bounce_bytes);
                Timer::after_millis(MADCTL_SETTLE_MS).await;
                debug!(
                    "[XFER] re-planned: {} strips of {} rows",
                    self.layout.count(),
                    self.layout.rows()
                );
                res
            }
            PanelCommand::SpiFrequency(mhz) => {
                let res = self.panel.set_bus_frequency_mhz(mhz);
                if res.is_ok() {
                    info!("[XFER] spi {}MHz", mhz);
                }
                res
            }
        };
        if let Err(e) = res {
            error!("[XFER] {:?} failed: {}", cmd, e);
        }
    }

    async fn on_chunk(&mut self, job: ChunkJob) {
        let ChunkJob { frame, plan, strip } = job;

        if strip == plan.first() {
            self.set_state(EngineState::Plan);
            if frame.width() != self.layout.width() || frame.height() != self.layout.height() {
                error!(
                    "[XFER] frame {}x{} does not match panel {}x{}",
                    frame.width(),
                    frame.height(),
                    self.layout.width(),
                    self.layout.height()
                );
                self.finish(frame, false);
                return;
            }
            if plan.is_empty() {
                debug!("[XFER] buffer {}: nothing dirty", frame.index());
                self.finish(frame, true);
                return;
            }
            debug!(
                "[XFER] buffer {}: {:?} strips {}..={}",
                frame.index(),
                plan.region(),
                plan.first(),
                plan.last()
            );
        }

        match self.send_strip(&frame, &plan, strip).await {
            Ok(bytes) => self.pipeline.stats.update(|s| {
                s.chunks_sent += 1;
                s.pixel_bytes += bytes as u64;
            }),
            Err(e) => {
                error!("[XFER] strip {} of buffer {} failed: {}", strip, frame.index(), e);
                self.finish(frame, false);
                return;
            }
        }

        if strip >= plan.last() {
            self.finish(frame, true);
            return;
        }

        let next = Message::Chunk(ChunkJob {
            frame,
            plan,
            strip: strip + 1,
        });
        if let Err(TrySendError::Full(msg)) = self.pipeline.jobs.try_send(next) {
            warn!("[XFER] job queue full, dropping rest of frame");
            if let Message::Chunk(job) = msg {
                self.finish(job.frame, false);
            }
        }
    }

    async fn send_strip(
        &mut self,
        frame: &FrameBuffer,
        plan: &ChunkPlan,
        k: u16,
    ) -> Result<usize, BusError> {
        let Some(win) = plan.intersection(k) else {
            return Ok(0);
        };

        self.set_state(EngineState::Copy);
        let (row0, row1) = self.layout.strip_rows(k);
        let src = frame.rows(row0, row1);
        let bounce = self.bounce.for_strip(k);
        bounce[..src.len()].copy_from_slice(src);

        self.pipeline.set_engine_state(EngineState::Transmit);
        self.panel.begin_write(win).await?;

        let stride = self.layout.width() as usize;
        let first = (win.y - row0) as usize;
        let (x, w, h) = (win.x as usize, win.w as usize, win.h as usize);
        if x == 0 && w == stride {
            // full-width rows are contiguous: one write
            let span = &mut bounce[first * stride..(first + h) * stride];
            write_be(&mut self.panel, span).await?;
        } else {
            for row in first..first + h {
                let start = row * stride + x;
                write_be(&mut self.panel, &mut bounce[start..start + w]).await?;
            }
        }
        Ok(2 * w * h)
    }

    fn finish(&mut self, frame: FrameBuffer, ok: bool) {
        self.set_state(EngineState::Done);
        let index = frame.index();
        self.pipeline.stats.update(|s| {
            if ok {
                s.frames_completed += 1;
            } else {
                s.frames_failed += 1;
            }
        });
        self.pipeline.store.release(frame);
        self.pipeline.completion.fire(ok);
        if ok {
            debug!("[XFER] buffer {} done", index);
        } else {
            warn!("[XFER] buffer {} released after failure", index);
        }
        self.set_state(EngineState::Idle);
    }
}

// swap in place, transmit, restore native order
async fn write_be<SPI, DC>(panel: &mut St7735<SPI, DC>, span: &mut [u16]) -> Result<(), BusError>
where
    SPI: SpiDevice,
    DC: OutputPin,
{
    for px in span.iter_mut() {
        *px = px.to_be();
    }
    let res = panel.write_pixels(bytemuck::cast_slice(span)).await;
    for px in span.iter_mut() {
        *px = u16::from_be(*px);
    }
    res
}
