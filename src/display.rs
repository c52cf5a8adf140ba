// Present coordinator: the application half of the pipeline.
//
// Owns the render buffer and the dirty tracker. present() hands the
// render buffer to the transfer task and promotes an Idle one in its
// place without blocking; wait()/done() observe completion.
//
// One frame on the wire at a time. A second present() while the first
// is still transferring returns Busy; the third buffer keeps the next
// render target available while the previous frame drains.
//
// Content carries over between buffers: each buffer remembers what it
// missed since it last held the newest frame (`stale`) and copies
// exactly that in when it becomes the render target. Partial redraws
// therefore always start from what is on the panel.

use embassy_sync::channel::TrySendError;
use embassy_time::{Duration, with_timeout};
use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::spi::SpiDevice;
use log::{debug, info, warn};

use crate::config::{PipelineConfig, Rotation};
use crate::drivers::st7735::{BusClock, St7735};
use crate::drivers::strip::StripLayout;
use crate::drivers::transfer::{ChunkJob, Message, PanelCommand, TransferEngine};
use crate::error::Error;
use crate::framebuffer::dirty::{Damage, Snapshot};
use crate::framebuffer::{BufferState, DirtyTracker, FRAME_COUNT, FrameBuffer, Surface};
use crate::geometry::Rect;
use crate::kernel::claim::DeviceClaim;
use crate::kernel::pipeline::{EngineState, Pipeline};
use crate::kernel::stats::TransferStats;

/// Application handle on one panel.
///
/// Created unbound with `new`; `begin` claims the panel and returns the
/// `TransferEngine` that must run alongside. All drawing goes into the
/// render buffer through `surface`, and `present` ships it.
pub struct Display<'a> {
    pipeline: &'a Pipeline,
    config: PipelineConfig,
    layout: StripLayout,
    render: Option<FrameBuffer>,
    dirty: DirtyTracker,
    stale: [Damage; FRAME_COUNT],
    /// Buffer holding the most recently presented frame.
    latest: Option<usize>,
    /// Damage of the frame on the wire, put back if it fails.
    in_flight: Option<Snapshot>,
}

impl<'a> Display<'a> {
    pub fn new(pipeline: &'a Pipeline, config: PipelineConfig) -> Self {
        Self {
            pipeline,
            config,
            layout: config.layout(),
            render: None,
            dirty: DirtyTracker::new(config.width(), config.height(), config.dirty_tracking),
            stale: [Damage::None; FRAME_COUNT],
            latest: None,
            in_flight: None,
        }
    }

    /// Current configuration, including runtime rotation and bus speed.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Logical width in the current orientation.
    pub fn width(&self) -> u16 {
        self.config.width()
    }

    /// Logical height in the current orientation.
    pub fn height(&self) -> u16 {
        self.config.height()
    }

    pub fn layout(&self) -> StripLayout {
        self.layout
    }

    /// Between a successful `begin` and `end`.
    pub fn is_begun(&self) -> bool {
        self.render.is_some()
    }

    // ── Lifecycle ───────────────────────────────────────────

    /// Claim the panel, allocate all buffers, run the panel init
    /// sequence and return the transfer engine. The engine must be
    /// driven (`run()`, usually from its own task) for frames to move.
    ///
    /// The engine owns the claim: while it is alive no other `Display`
    /// on the same pipeline can begin, even if this one is dropped.
    pub async fn begin<SPI, DC, D>(
        &mut self,
        panel: St7735<SPI, DC>,
        delay: &mut D,
    ) -> Result<TransferEngine<'a, SPI, DC>, Error>
    where
        SPI: SpiDevice + BusClock,
        DC: OutputPin,
        D: DelayNs,
    {
        if self.is_begun() {
            return Err(Error::DeviceClaimed);
        }
        self.config.validate()?;
        let (w, h) = (self.config.width(), self.config.height());
        if panel.size() != (w, h) {
            return Err(Error::Config("panel size differs from config"));
        }

        let pipeline: &'a Pipeline = self.pipeline;
        let claim = DeviceClaim::acquire(&pipeline.claimed)?;

        let render = FrameBuffer::alloc(0, w, h)?;
        let idle = [FrameBuffer::alloc(1, w, h)?, FrameBuffer::alloc(2, w, h)?];
        let mut engine = TransferEngine::new(pipeline, panel, &self.config, claim)?;

        engine.init_panel(delay).await?;

        pipeline.reset();
        pipeline.store.install(&render, idle);
        self.render = Some(render);
        self.dirty = DirtyTracker::new(w, h, self.config.dirty_tracking);
        // panel RAM is undefined after reset
        self.dirty.force_full();
        self.stale = [Damage::None; FRAME_COUNT];
        self.latest = None;
        self.in_flight = None;

        info!(
            "[TFT] begin: {}x{} x{} buffers, {} strips of {} rows, spi {}MHz",
            w,
            h,
            FRAME_COUNT,
            self.layout.count(),
            self.layout.rows(),
            self.config.spi_frequency_mhz
        );
        Ok(engine)
    }

    /// Drain the in-flight frame, stop the transfer engine and free
    /// all buffers. The engine's `run()` returns the panel.
    pub async fn end(&mut self) -> Result<(), Error> {
        self.ensure_begun()?;
        self.wait().await?;

        self.pipeline.jobs.send(Message::Shutdown).await;
        self.pipeline.stopped.wait().await;

        self.render = None;
        self.pipeline.store.drain();
        self.stale = [Damage::None; FRAME_COUNT];
        self.latest = None;
        self.in_flight = None;

        let s = self.pipeline.stats();
        info!(
            "[TFT] end: {} frames ({} failed), {} bytes",
            s.frames_submitted, s.frames_failed, s.pixel_bytes
        );
        Ok(())
    }

    // ── Drawing ─────────────────────────────────────────────

    /// Drawing handle on the render buffer. Everything drawn through it
    /// is marked dirty.
    pub fn surface(&mut self) -> Result<Surface<'_>, Error> {
        let Some(render) = self.render.as_mut() else {
            return Err(not_initialized());
        };
        Ok(Surface::new(render, &mut self.dirty))
    }

    /// Mark an area changed by writing to the raw pixels. Clipped to the
    /// screen; zero-area input is ignored.
    pub fn mark_dirty(&mut self, x: i32, y: i32, w: u32, h: u32) {
        self.dirty.mark(x, y, w, h);
    }

    /// Forget pending damage; the next present sends nothing.
    pub fn clear_dirty(&mut self) {
        self.dirty.clear();
    }

    /// Send the whole frame on the next present, whatever is dirty.
    pub fn force_full_redraw(&mut self) {
        self.dirty.force_full();
    }

    /// With tracking off every present sends the full frame.
    pub fn set_dirty_tracking(&mut self, enabled: bool) {
        self.dirty.set_enabled(enabled);
    }

    pub fn dirty_tracking(&self) -> bool {
        self.dirty.is_enabled()
    }

    /// Area the next present would send. Includes the damage of a frame
    /// that has just failed, even before `wait` or `present` picks it up.
    pub fn dirty_rect(&self) -> Option<Rect> {
        let mut pending = self.dirty.pending();
        if let Some(snap) = self.in_flight {
            if self.last_frame_failed() {
                pending = pending.union(snap.send);
            }
        }
        pending.to_rect(self.width(), self.height())
    }

    // ── Present / wait ──────────────────────────────────────

    /// Queue the render buffer for transfer and switch to the next one.
    /// Never blocks. Busy while the previous frame is on the wire.
    pub fn present(&mut self) -> Result<(), Error> {
        self.reconcile();
        let Some(render) = self.render.as_mut() else {
            return Err(not_initialized());
        };
        if self.in_flight.is_some() {
            return Err(Error::Busy);
        }
        if self.pipeline.jobs.is_full() {
            warn!("[PRESENT] job queue full");
            return Err(Error::Busy);
        }
        let Some(target) = self.pipeline.store.next_idle() else {
            return Err(Error::Busy);
        };

        let outgoing = self.pipeline.store.hand_off(render, target)?;
        let snap = self.dirty.take();
        let (w, h) = (outgoing.width(), outgoing.height());
        let plan = self.layout.plan(snap.send.resolve(w, h));

        // outgoing is now the newest frame; every other buffer is behind
        // by what was drawn into it
        let out = outgoing.index();
        for (i, stale) in self.stale.iter_mut().enumerate() {
            if i != out {
                *stale = stale.union(snap.changed);
            }
        }
        self.stale[out] = Damage::None;
        self.latest = Some(out);
        let catch_up = core::mem::take(&mut self.stale[render.index()]);
        render.copy_damage_from(&outgoing, catch_up);

        self.pipeline.completion.arm();
        self.pipeline.stats.update(|s| s.frames_submitted += 1);

        match self
            .pipeline
            .jobs
            .try_send(Message::Chunk(ChunkJob::start(outgoing, plan)))
        {
            Ok(()) => {
                debug!(
                    "[PRESENT] buffer {} -> wire ({} strips, {} bytes), rendering into {}",
                    out,
                    plan.len(),
                    plan.pixel_bytes(),
                    render.index()
                );
                self.in_flight = Some(snap);
                Ok(())
            }
            Err(TrySendError::Full(msg)) => {
                warn!("[PRESENT] job queue full, frame {} dropped", out);
                if let Message::Chunk(job) = msg {
                    self.pipeline.store.release(job.frame);
                }
                self.pipeline.stats.update(|s| s.frames_failed += 1);
                self.pipeline.completion.fire(false);
                self.dirty.restore(snap);
                Err(Error::Busy)
            }
        }
    }

    /// Wait for the frame on the wire to finish (immediately if none).
    /// A failed frame is not an error here; see `last_frame_failed`.
    pub async fn wait(&mut self) -> Result<(), Error> {
        self.ensure_begun()?;
        self.pipeline.completion.wait().await;
        self.reconcile();
        Ok(())
    }

    /// `wait` with an upper bound. On timeout the transfer keeps going.
    pub async fn wait_timeout(&mut self, timeout: Duration) -> Result<(), Error> {
        self.ensure_begun()?;
        with_timeout(timeout, self.pipeline.completion.wait())
            .await
            .map_err(|_| Error::Timeout)?;
        self.reconcile();
        Ok(())
    }

    /// No frame on the wire.
    pub fn done(&self) -> bool {
        self.pipeline.completion.is_idle()
    }

    /// Whether the most recently finished frame failed on the bus.
    pub fn last_frame_failed(&self) -> bool {
        self.pipeline.completion.is_idle() && self.pipeline.completion.failed()
    }

    /// Abandon the render buffer without sending it and continue in an
    /// Idle one, which starts out holding the last presented frame.
    pub fn swap_buffers(&mut self) -> Result<(), Error> {
        self.reconcile();
        let Some(render) = self.render.as_mut() else {
            return Err(not_initialized());
        };
        let Some(target) = self.pipeline.store.next_idle() else {
            return Err(Error::Busy);
        };
        // catching up needs the newest frame, which may still be on the wire
        if let Some(p) = self.latest {
            if !self.stale[target].is_none()
                && self.pipeline.store.state(p) != Some(BufferState::Idle)
            {
                return Err(Error::Busy);
            }
        }

        let abandoned = render.index();
        self.pipeline.store.retire(render, target)?;
        self.stale[abandoned] = self.stale[abandoned].union(self.dirty.take_changed());

        let catch_up = core::mem::take(&mut self.stale[target]);
        match self.latest {
            // nothing presented yet: buffers start zeroed
            None => render.fill_damage(catch_up, 0),
            Some(p) => {
                self.pipeline
                    .store
                    .with_idle(p, |src| render.copy_damage_from(src, catch_up));
            }
        }
        debug!("[PRESENT] abandoned buffer {}, rendering into {}", abandoned, target);
        Ok(())
    }

    // ── Panel control ───────────────────────────────────────

    /// Queued behind the current frame so it never lands mid-frame.
    pub async fn set_inverted(&mut self, inverted: bool) -> Result<(), Error> {
        self.control(PanelCommand::Invert(inverted)).await
    }

    /// DISPON / DISPOFF, queued like `set_inverted`.
    pub async fn set_display_on(&mut self, on: bool) -> Result<(), Error> {
        self.control(PanelCommand::DisplayOn(on)).await
    }

    /// Re-orient the panel. Waits for the frame on the wire, then queues
    /// MADCTL. All buffers take the new logical size (same pixel count)
    /// and are blanked, and the next present sends the full frame.
    pub async fn set_rotation(&mut self, rotation: Rotation) -> Result<(), Error> {
        self.ensure_begun()?;
        if rotation == self.config.rotation {
            return Ok(());
        }
        let config = self.config.with_rotation(rotation);
        config.validate()?;
        self.control(PanelCommand::Rotation(rotation)).await?;

        let (w, h) = (config.width(), config.height());
        if let Some(render) = self.render.as_mut() {
            render.reshape(w, h)?;
        }
        self.pipeline.store.reshape_parked(w, h)?;
        self.config = config;
        self.layout = config.layout();
        self.dirty = DirtyTracker::new(w, h, self.dirty.is_enabled());
        self.dirty.force_full();
        self.stale = [Damage::None; FRAME_COUNT];
        self.latest = None;
        Ok(())
    }

    /// Change the SPI clock between frames.
    pub async fn set_spi_frequency_mhz(&mut self, mhz: u32) -> Result<(), Error> {
        self.ensure_begun()?;
        if mhz == 0 {
            return Err(Error::Config("zero spi frequency"));
        }
        self.control(PanelCommand::SpiFrequency(mhz)).await?;
        self.config.spi_frequency_mhz = mhz;
        Ok(())
    }

    async fn control(&mut self, cmd: PanelCommand) -> Result<(), Error> {
        self.wait().await?;
        self.pipeline.jobs.send(Message::Control(cmd)).await;
        Ok(())
    }

    // ── Introspection ───────────────────────────────────────

    /// Counters since `begin`.
    pub fn stats(&self) -> TransferStats {
        self.pipeline.stats()
    }

    /// State of each buffer; None when not allocated.
    pub fn buffer_states(&self) -> [Option<BufferState>; FRAME_COUNT] {
        self.pipeline.buffer_states()
    }

    pub fn engine_state(&self) -> EngineState {
        self.pipeline.engine_state()
    }

    // ── Internals ───────────────────────────────────────────

    fn ensure_begun(&self) -> Result<(), Error> {
        if self.is_begun() {
            Ok(())
        } else {
            Err(not_initialized())
        }
    }

    // pick up the outcome of a finished transfer
    fn reconcile(&mut self) {
        if !self.pipeline.completion.is_idle() {
            return;
        }
        if let Some(snap) = self.in_flight.take() {
            if self.pipeline.completion.failed() {
                warn!("[PRESENT] last frame failed, its damage goes out with the next one");
                self.dirty.restore(snap);
            }
        }
    }
}

fn not_initialized() -> Error {
    warn!("[TFT] display used before begin()");
    Error::NotInitialized
}
