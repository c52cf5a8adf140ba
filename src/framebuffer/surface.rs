// Drawing surface over the current render buffer
//
// Every write goes to the PSRAM framebuffer and grows the dirty box.
// Implements embedded-graphics DrawTarget so any primitive, text or
// image can be drawn; also exposes the raw pixel slice for rasterizers
// that write directly (those must call mark_dirty themselves).

use core::convert::Infallible;

use embedded_graphics_core::{
    Pixel,
    draw_target::DrawTarget,
    geometry::{OriginDimensions, Size},
    pixelcolor::{IntoStorage, Rgb565},
    primitives::Rectangle,
};

use super::{DirtyTracker, FrameBuffer};
use crate::geometry::Rect;

pub struct Surface<'a> {
    frame: &'a mut FrameBuffer,
    dirty: &'a mut DirtyTracker,
}

impl<'a> Surface<'a> {
    pub(crate) fn new(frame: &'a mut FrameBuffer, dirty: &'a mut DirtyTracker) -> Self {
        Self { frame, dirty }
    }

    pub fn width(&self) -> u16 {
        self.frame.width()
    }

    pub fn height(&self) -> u16 {
        self.frame.height()
    }

    /// Pixels per row in `pixels_mut()`.
    pub fn stride(&self) -> usize {
        self.frame.stride()
    }

    /// Raw native-endian RGB565 pixels. Call `mark_dirty` for what you touch.
    pub fn pixels_mut(&mut self) -> &mut [u16] {
        self.frame.pixels_mut()
    }

    pub fn pixel(&self, x: u16, y: u16) -> Option<u16> {
        if x < self.width() && y < self.height() {
            Some(self.frame.pixel(x, y))
        } else {
            None
        }
    }

    pub fn mark_dirty(&mut self, x: i32, y: i32, w: u32, h: u32) {
        self.dirty.mark(x, y, w, h);
    }

    pub fn draw_pixel(&mut self, x: i32, y: i32, color: u16) {
        self.fill_rect(x, y, 1, 1, color);
    }

    pub fn fill_rect(&mut self, x: i32, y: i32, w: u32, h: u32, color: u16) {
        let Some(r) = Rect::clipped(x, y, w, h, self.width(), self.height()) else {
            return;
        };
        self.frame.fill_rect(r, color);
        self.dirty.mark_rect(r);
    }

    pub fn fill_screen(&mut self, color: u16) {
        let r = Rect::full(self.width(), self.height());
        self.frame.fill_rect(r, color);
        self.dirty.mark_rect(r);
    }
}

impl OriginDimensions for Surface<'_> {
    fn size(&self) -> Size {
        Size::new(self.width() as u32, self.height() as u32)
    }
}

impl DrawTarget for Surface<'_> {
    type Color = Rgb565;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let w = self.width() as i32;
        let h = self.height() as i32;
        let stride = self.stride();
        let buf = self.frame.pixels_mut();

        // bounding box of what landed on screen, marked once at the end
        let (mut x0, mut y0, mut x1, mut y1) = (i32::MAX, i32::MAX, i32::MIN, i32::MIN);
        for Pixel(p, color) in pixels {
            if p.x < 0 || p.y < 0 || p.x >= w || p.y >= h {
                continue;
            }
            buf[p.y as usize * stride + p.x as usize] = color.into_storage();
            x0 = x0.min(p.x);
            y0 = y0.min(p.y);
            x1 = x1.max(p.x);
            y1 = y1.max(p.y);
        }
        if x1 >= x0 {
            self.dirty
                .mark(x0, y0, (x1 - x0 + 1) as u32, (y1 - y0 + 1) as u32);
        }
        Ok(())
    }

    fn fill_solid(&mut self, area: &Rectangle, color: Self::Color) -> Result<(), Self::Error> {
        if let Some(r) = Rect::from_rectangle(area, self.width(), self.height()) {
            self.frame.fill_rect(r, color.into_storage());
            self.dirty.mark_rect(r);
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        self.fill_screen(color.into_storage());
        Ok(())
    }
}
