// Transfer counters, written by both tasks under a critical section.

use core::cell::Cell;

use critical_section::Mutex;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TransferStats {
    pub frames_submitted: u32,
    pub frames_completed: u32,
    pub frames_failed: u32,
    pub chunks_sent: u32,
    pub pixel_bytes: u64,
}

impl TransferStats {
    const ZERO: Self = Self {
        frames_submitted: 0,
        frames_completed: 0,
        frames_failed: 0,
        chunks_sent: 0,
        pixel_bytes: 0,
    };
}

pub struct StatsCell(Mutex<Cell<TransferStats>>);

impl Default for StatsCell {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsCell {
    pub const fn new() -> Self {
        Self(Mutex::new(Cell::new(TransferStats::ZERO)))
    }

    pub fn get(&self) -> TransferStats {
        critical_section::with(|cs| self.0.borrow(cs).get())
    }

    pub fn reset(&self) {
        critical_section::with(|cs| self.0.borrow(cs).set(TransferStats::ZERO));
    }

    pub fn update(&self, f: impl FnOnce(&mut TransferStats)) {
        critical_section::with(|cs| {
            let cell = self.0.borrow(cs);
            let mut s = cell.get();
            f(&mut s);
            cell.set(s);
        });
    }
}
