// Triple framebuffer store
//
// Three W*H RGB565 buffers, allocated once at begin() (PSRAM on the
// board). Exactly one is Rendering and owned by the application, at
// most one is Transferring and owned by the transfer task, the rest
// are Idle and parked here. Ownership moves with the FrameBuffer value;
// the state tags mirror it so either task can observe the pipeline.
//
// State changes happen inside a critical section: check, then store.

pub mod dirty;
pub mod surface;

use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;
use core::sync::atomic::{AtomicU8, Ordering};

use critical_section::Mutex;

use crate::error::Error;
use crate::geometry::Rect;
use dirty::Damage;

pub use dirty::DirtyTracker;
pub use surface::Surface;

pub const FRAME_COUNT: usize = 3;

const UNALLOCATED: u8 = 0xFF;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum BufferState {
    Rendering = 0,
    Transferring = 1,
    Idle = 2,
}

impl BufferState {
    const fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(BufferState::Rendering),
            1 => Some(BufferState::Transferring),
            2 => Some(BufferState::Idle),
            _ => None,
        }
    }
}

impl fmt::Display for BufferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BufferState::Rendering => write!(f, "RENDERING"),
            BufferState::Transferring => write!(f, "TRANSFERRING"),
            BufferState::Idle => write!(f, "IDLE"),
        }
    }
}

/// One frame of native-endian RGB565 pixels, row-major, stride = width.
pub struct FrameBuffer {
    index: u8,
    width: u16,
    height: u16,
    pixels: Vec<u16>,
}

impl FrameBuffer {
    pub fn alloc(index: u8, width: u16, height: u16) -> Result<Self, Error> {
        let len = width as usize * height as usize;
        let mut pixels = Vec::new();
        pixels.try_reserve_exact(len).map_err(|_| Error::Alloc)?;
        pixels.resize(len, 0);
        Ok(Self {
            index,
            width,
            height,
            pixels,
        })
    }

    pub fn index(&self) -> usize {
        self.index as usize
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.width as usize
    }

    pub fn pixels(&self) -> &[u16] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u16] {
        &mut self.pixels
    }

    /// Rows `y0..y1`, full width.
    pub fn rows(&self, y0: u16, y1: u16) -> &[u16] {
        let w = self.stride();
        &self.pixels[y0 as usize * w..y1 as usize * w]
    }

    pub fn pixel(&self, x: u16, y: u16) -> u16 {
        self.pixels[y as usize * self.stride() + x as usize]
    }

    pub fn fill_rect(&mut self, r: Rect, color: u16) {
        let w = self.stride();
        for y in r.y..r.bottom() {
            let start = y as usize * w + r.x as usize;
            self.pixels[start..start + r.w as usize].fill(color);
        }
    }

    /// Reinterpret the pixels as `width` x `height` (same pixel count,
    /// e.g. after a rotation) and blank them.
    pub fn reshape(&mut self, width: u16, height: u16) -> Result<(), Error> {
        if width as usize * height as usize != self.pixels.len() {
            return Err(Error::Config("reshape changes the frame size"));
        }
        self.width = width;
        self.height = height;
        self.pixels.fill(0);
        Ok(())
    }

    pub fn fill_damage(&mut self, damage: Damage, color: u16) {
        let r = damage.resolve(self.width, self.height);
        if !r.is_empty() {
            self.fill_rect(r, color);
        }
    }

    /// Copy `damage` from `src` so both agree on that area.
    pub fn copy_damage_from(&mut self, src: &FrameBuffer, damage: Damage) {
        let r = damage.resolve(self.width, self.height);
        if r.is_empty() {
            return;
        }
        let w = self.stride();
        if r.x == 0 && r.w == self.width {
            let span = r.y as usize * w..r.bottom() as usize * w;
            self.pixels[span.clone()].copy_from_slice(&src.pixels[span]);
            return;
        }
        for y in r.y..r.bottom() {
            let start = y as usize * w + r.x as usize;
            let span = start..start + r.w as usize;
            self.pixels[span.clone()].copy_from_slice(&src.pixels[span]);
        }
    }
}

impl fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FrameBuffer#{}({}x{})", self.index, self.width, self.height)
    }
}

/// Shared half of the buffer pool: state tags plus the parked Idle buffers.
pub struct FrameStore {
    states: [AtomicU8; FRAME_COUNT],
    parked: Mutex<RefCell<[Option<FrameBuffer>; FRAME_COUNT]>>,
}

impl Default for FrameStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameStore {
    pub const fn new() -> Self {
        Self {
            states: [
                AtomicU8::new(UNALLOCATED),
                AtomicU8::new(UNALLOCATED),
                AtomicU8::new(UNALLOCATED),
            ],
            parked: Mutex::new(RefCell::new([None, None, None])),
        }
    }

    pub fn state(&self, index: usize) -> Option<BufferState> {
        BufferState::from_u8(self.states[index].load(Ordering::Acquire))
    }

    pub fn states(&self) -> [Option<BufferState>; FRAME_COUNT] {
        critical_section::with(|_| [self.state(0), self.state(1), self.state(2)])
    }

    pub fn count(&self, state: BufferState) -> usize {
        self.states().iter().filter(|s| **s == Some(state)).count()
    }

    fn set(&self, index: usize, state: BufferState) {
        self.states[index].store(state as u8, Ordering::Release);
    }

    /// Take ownership of a fresh set: `render` becomes the render target,
    /// the others are parked Idle.
    pub fn install(&self, render: &FrameBuffer, idle: [FrameBuffer; FRAME_COUNT - 1]) {
        critical_section::with(|cs| {
            let mut parked = self.parked.borrow_ref_mut(cs);
            self.set(render.index(), BufferState::Rendering);
            for frame in idle {
                let i = frame.index();
                self.set(i, BufferState::Idle);
                parked[i] = Some(frame);
            }
        });
    }

    /// Lowest-index Idle buffer, if any.
    pub fn next_idle(&self) -> Option<usize> {
        critical_section::with(|cs| {
            let parked = self.parked.borrow_ref(cs);
            (0..FRAME_COUNT)
                .find(|&i| self.state(i) == Some(BufferState::Idle) && parked[i].is_some())
        })
    }

    // swap the render target for parked buffer `target`, retiring the
    // old one to `retire`; returns it unless it was parked
    fn promote(
        &self,
        render: &mut FrameBuffer,
        target: usize,
        retire: BufferState,
    ) -> Result<Option<FrameBuffer>, Error> {
        critical_section::with(|cs| {
            let mut parked = self.parked.borrow_ref_mut(cs);
            if self.state(render.index()) != Some(BufferState::Rendering) {
                return Err(Error::NotInitialized);
            }
            if target == render.index() || self.state(target) != Some(BufferState::Idle) {
                return Err(Error::Busy);
            }
            let Some(next) = parked[target].take() else {
                return Err(Error::Busy);
            };
            let old = core::mem::replace(render, next);
            self.set(target, BufferState::Rendering);
            self.set(old.index(), retire);
            if retire == BufferState::Idle {
                let i = old.index();
                parked[i] = Some(old);
                Ok(None)
            } else {
                Ok(Some(old))
            }
        })
    }

    /// Render target goes out for transfer; `target` takes its place.
    pub fn hand_off(&self, render: &mut FrameBuffer, target: usize) -> Result<FrameBuffer, Error> {
        self.promote(render, target, BufferState::Transferring)?
            .ok_or(Error::Busy)
    }

    /// Render target is abandoned back to Idle; `target` takes its place.
    pub fn retire(&self, render: &mut FrameBuffer, target: usize) -> Result<(), Error> {
        self.promote(render, target, BufferState::Idle).map(|_| ())
    }

    /// Transfer finished (either way): Transferring -> Idle.
    pub fn release(&self, frame: FrameBuffer) {
        critical_section::with(|cs| {
            let i = frame.index();
            if self.state(i) != Some(BufferState::Transferring) {
                log::warn!(
                    "[TFT] release of buffer {} in state {:?}",
                    i,
                    self.state(i)
                );
            }
            self.set(i, BufferState::Idle);
            self.parked.borrow_ref_mut(cs)[i] = Some(frame);
        });
    }

    /// Run `f` on a parked Idle buffer without holding the critical
    /// section for the duration. Only the application task takes buffers
    /// out of Idle, so the slot is free while it is borrowed.
    pub fn with_idle<R>(&self, index: usize, f: impl FnOnce(&FrameBuffer) -> R) -> Option<R> {
        let frame = critical_section::with(|cs| {
            if self.state(index) != Some(BufferState::Idle) {
                return None;
            }
            self.parked.borrow_ref_mut(cs)[index].take()
        })?;
        let out = f(&frame);
        critical_section::with(|cs| {
            self.parked.borrow_ref_mut(cs)[index] = Some(frame);
        });
        Some(out)
    }

    /// `FrameBuffer::reshape` every parked buffer.
    pub fn reshape_parked(&self, width: u16, height: u16) -> Result<(), Error> {
        critical_section::with(|cs| {
            let mut parked = self.parked.borrow_ref_mut(cs);
            for frame in parked.iter_mut().flatten() {
                frame.reshape(width, height)?;
            }
            Ok(())
        })
    }

    /// Free every parked buffer and forget all states.
    pub fn drain(&self) {
        let frames = critical_section::with(|cs| {
            for s in &self.states {
                s.store(UNALLOCATED, Ordering::Release);
            }
            core::mem::replace(&mut *self.parked.borrow_ref_mut(cs), [None, None, None])
        });
        drop(frames);
    }
}
