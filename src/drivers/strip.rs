// Strip layout and bounce buffers for chunked transfer.
// The frame is split into horizontal bands of `rows` lines, each of which
// fits one on-chip bounce buffer (8KB at 128px wide -> 32 rows, 5 strips).
// Strip k is staged in bounce buffer k % 2.
// A ChunkPlan is the set of strips a dirty rect touches.

use alloc::vec::Vec;

use crate::error::Error;
use crate::geometry::Rect;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StripLayout {
    width: u16,
    height: u16,
    rows: u16,
    count: u16,
}

impl StripLayout {
    pub const fn new(width: u16, height: u16, bounce_bytes: usize) -> Self {
        let row_bytes = width as usize * 2;
        let mut rows = if row_bytes == 0 {
            0
        } else {
            bounce_bytes / row_bytes
        };
        if rows > height as usize {
            rows = height as usize;
        }
        let rows = rows as u16;
        let count = if rows == 0 { 0 } else { height.div_ceil(rows) };
        Self {
            width,
            height,
            rows,
            count,
        }
    }

    pub const fn width(&self) -> u16 {
        self.width
    }

    pub const fn height(&self) -> u16 {
        self.height
    }

    /// Lines per strip.
    pub const fn rows(&self) -> u16 {
        self.rows
    }

    /// Number of strips.
    pub const fn count(&self) -> u16 {
        self.count
    }

    /// Pixels one bounce buffer must hold.
    pub const fn bounce_pixels(&self) -> usize {
        self.width as usize * self.rows as usize
    }

    /// Line range `start..end` of strip `k`. The last strip is short
    /// when height is not a multiple of rows.
    pub fn strip_rows(&self, k: u16) -> (u16, u16) {
        let start = k * self.rows;
        let end = (start + self.rows).min(self.height);
        (start, end)
    }

    pub fn plan(&self, region: Rect) -> ChunkPlan {
        if self.rows == 0 {
            return ChunkPlan::empty(0);
        }
        let Some(region) = region.intersection(Rect::full(self.width, self.height)) else {
            return ChunkPlan::empty(self.rows);
        };
        let last_strip = self.count.saturating_sub(1);
        let first = (region.y / self.rows).min(last_strip);
        let last = ((region.bottom() - 1) / self.rows).min(last_strip);
        ChunkPlan {
            region,
            rows: self.rows,
            first,
            last,
        }
    }

    pub fn plan_full(&self) -> ChunkPlan {
        self.plan(Rect::full(self.width, self.height))
    }
}

/// Strips to send for one frame and the dirty region within them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkPlan {
    region: Rect,
    rows: u16,
    first: u16,
    last: u16,
}

impl ChunkPlan {
    pub const fn empty(rows: u16) -> Self {
        Self {
            region: Rect::new(0, 0, 0, 0),
            rows,
            first: 0,
            last: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.region.is_empty()
    }

    pub fn region(&self) -> Rect {
        self.region
    }

    pub fn first(&self) -> u16 {
        self.first
    }

    pub fn last(&self) -> u16 {
        self.last
    }

    /// Number of strips touched.
    pub fn len(&self) -> u16 {
        if self.is_empty() {
            0
        } else {
            self.last - self.first + 1
        }
    }

    /// Pixel payload of the whole frame in bytes.
    pub fn pixel_bytes(&self) -> usize {
        2 * self.region.area() as usize
    }

    /// Part of the region inside strip `k`.
    pub fn intersection(&self, k: u16) -> Option<Rect> {
        if self.is_empty() || k < self.first || k > self.last {
            return None;
        }
        let y0 = self.region.y.max(k * self.rows);
        let y1 = self.region.bottom().min((k + 1) * self.rows);
        if y1 <= y0 {
            return None;
        }
        Some(Rect::new(self.region.x, y0, self.region.w, y1 - y0))
    }
}

/// The two on-chip staging buffers.
pub struct BounceBuffers {
    bufs: [Vec<u16>; 2],
}

impl BounceBuffers {
    pub fn alloc(pixels: usize) -> Result<Self, Error> {
        Ok(Self {
            bufs: [alloc_pixels(pixels)?, alloc_pixels(pixels)?],
        })
    }

    pub fn for_strip(&mut self, k: u16) -> &mut [u16] {
        &mut self.bufs[(k % 2) as usize]
    }

    pub fn capacity(&self) -> usize {
        self.bufs[0].len()
    }
}

fn alloc_pixels(len: usize) -> Result<Vec<u16>, Error> {
    let mut v = Vec::new();
    v.try_reserve_exact(len).map_err(|_| Error::Alloc)?;
    v.resize(len, 0);
    Ok(v)
}
