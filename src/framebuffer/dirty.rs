// Dirty rectangle accumulator
//
// Tracks the bounding box of everything drawn into the render buffer
// since the last present. Owned by the application task; the transfer
// task only ever sees a snapshot inside the job.
//
// Besides the rect that goes on the wire, the tracker keeps `changed`:
// what was actually drawn. The two differ when tracking is disabled or a
// full redraw is forced, and `changed` is what the other buffers need to
// catch up on.

use crate::geometry::Rect;

/// Area of a frame that needs attention.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Damage {
    #[default]
    None,
    Region(Rect),
    Full,
}

impl Damage {
    pub fn union(self, other: Damage) -> Damage {
        match (self, other) {
            (Damage::Full, _) | (_, Damage::Full) => Damage::Full,
            (Damage::None, d) | (d, Damage::None) => d,
            (Damage::Region(a), Damage::Region(b)) => Damage::Region(a.union(b)),
        }
    }

    pub fn is_none(self) -> bool {
        matches!(self, Damage::None)
    }

    /// `resolve`, with None for no damage.
    pub fn to_rect(self, width: u16, height: u16) -> Option<Rect> {
        match self {
            Damage::None => None,
            d => Some(d.resolve(width, height)),
        }
    }

    /// Concrete rect on a `width` x `height` screen; empty for None.
    pub fn resolve(self, width: u16, height: u16) -> Rect {
        match self {
            Damage::None => Rect::default(),
            Damage::Region(r) => r,
            Damage::Full => Rect::full(width, height),
        }
    }
}

/// What a present takes out of the tracker.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Snapshot {
    /// Area to transmit.
    pub send: Damage,
    /// Area drawn since the render buffer was last in sync.
    pub changed: Damage,
    forced: bool,
}

pub struct DirtyTracker {
    width: u16,
    height: u16,
    rect: Rect,
    valid: bool,
    force_full: bool,
    enabled: bool,
    changed: Damage,
}

impl DirtyTracker {
    pub const fn new(width: u16, height: u16, enabled: bool) -> Self {
        Self {
            width,
            height,
            rect: Rect::new(0, 0, 0, 0),
            valid: false,
            force_full: false,
            enabled,
            changed: Damage::None,
        }
    }

    /// Grow the dirty box by `(x, y, w, h)`, clipped to the screen.
    /// Zero-area and fully off-screen input is ignored.
    pub fn mark(&mut self, x: i32, y: i32, w: u32, h: u32) {
        let Some(r) = Rect::clipped(x, y, w, h, self.width, self.height) else {
            return;
        };
        self.mark_rect(r);
    }

    /// `mark` for a rect already known to be on screen.
    pub fn mark_rect(&mut self, r: Rect) {
        if r.is_empty() {
            return;
        }
        self.changed = self.changed.union(Damage::Region(r));
        if !self.enabled {
            return;
        }
        if self.valid {
            self.rect = self.rect.union(r);
        } else {
            self.rect = r;
            self.valid = true;
        }
    }

    pub fn clear(&mut self) {
        if !self.enabled {
            return;
        }
        self.rect = Rect::default();
        self.valid = false;
        self.force_full = false;
    }

    pub fn force_full(&mut self) {
        self.force_full = true;
        self.valid = false;
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if enabled == self.enabled {
            return;
        }
        self.enabled = enabled;
        // every present sent the whole frame while disabled
        self.rect = Rect::default();
        self.valid = false;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_forced(&self) -> bool {
        self.force_full
    }

    /// Current dirty box. Full screen when tracking is off or a full
    /// redraw is pending.
    pub fn rect(&self) -> Option<Rect> {
        self.pending().to_rect(self.width, self.height)
    }

    /// Damage the next present would take, before resolving to a rect.
    pub fn pending(&self) -> Damage {
        if !self.enabled || self.force_full {
            Damage::Full
        } else if self.valid {
            Damage::Region(self.rect)
        } else {
            Damage::None
        }
    }

    /// Hand the accumulated damage to a present and start over.
    pub fn take(&mut self) -> Snapshot {
        let snap = Snapshot {
            send: self.pending(),
            changed: self.changed,
            forced: self.force_full,
        };
        self.rect = Rect::default();
        self.valid = false;
        self.force_full = false;
        self.changed = Damage::None;
        snap
    }

    /// Drop what was drawn without presenting it. The dirty box is kept:
    /// resending an area that has been restored is harmless.
    pub fn take_changed(&mut self) -> Damage {
        core::mem::take(&mut self.changed)
    }

    /// Put back the damage of a frame that never made it to the panel.
    pub fn restore(&mut self, snap: Snapshot) {
        if snap.forced {
            self.force_full = true;
        }
        match snap.send {
            Damage::None => {}
            Damage::Full => {
                if self.enabled {
                    self.force_full = true;
                }
            }
            Damage::Region(r) => {
                if self.enabled {
                    if self.valid {
                        self.rect = self.rect.union(r);
                    } else {
                        self.rect = r;
                        self.valid = true;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> DirtyTracker {
        DirtyTracker::new(128, 160, true)
    }

    #[test]
    fn starts_clean() {
        let t = tracker();
        assert_eq!(t.rect(), None);
    }

    #[test]
    fn marks_accumulate_to_bounding_box() {
        let mut t = tracker();
        t.mark(10, 10, 20, 20);
        assert_eq!(t.rect(), Some(Rect::new(10, 10, 20, 20)));
        t.mark(0, 0, 1, 1);
        t.mark(100, 150, 5, 5);
        assert_eq!(t.rect(), Some(Rect::new(0, 0, 105, 155)));
    }

    #[test]
    fn bounding_box_of_clipped_inputs() {
        // (x, y, w, h) with some partly and fully off-screen
        let inputs: [(i32, i32, u32, u32); 6] = [
            (-10, 40, 20, 5),
            (120, 150, 40, 40),
            (300, 300, 4, 4),
            (50, -8, 3, 10),
            (60, 60, 0, 9),
            (30, 70, 2, 2),
        ];
        let mut t = tracker();
        let mut expected = Rect::default();
        for &(x, y, w, h) in &inputs {
            t.mark(x, y, w, h);
            if let Some(r) = Rect::clipped(x, y, w, h, 128, 160) {
                expected = expected.union(r);
            }
        }
        assert_eq!(expected, Rect::new(0, 0, 128, 160));
        assert_eq!(t.rect(), Some(expected));
    }

    #[test]
    fn zero_area_and_offscreen_ignored() {
        let mut t = tracker();
        t.mark(5, 5, 0, 0);
        t.mark(-50, -50, 10, 10);
        t.mark(128, 0, 10, 10);
        assert_eq!(t.rect(), None);
        assert!(t.take().send.is_none());
    }

    #[test]
    fn take_clears() {
        let mut t = tracker();
        t.mark(1, 2, 3, 4);
        let snap = t.take();
        assert_eq!(snap.send, Damage::Region(Rect::new(1, 2, 3, 4)));
        assert_eq!(snap.changed, Damage::Region(Rect::new(1, 2, 3, 4)));
        assert_eq!(t.rect(), None);
    }

    #[test]
    fn force_full_overrides_region_until_taken() {
        let mut t = tracker();
        t.force_full();
        t.mark(0, 0, 1, 1);
        assert_eq!(t.rect(), Some(Rect::full(128, 160)));
        let snap = t.take();
        assert_eq!(snap.send, Damage::Full);
        assert_eq!(snap.changed, Damage::Region(Rect::new(0, 0, 1, 1)));
        assert!(!t.is_forced());
    }

    #[test]
    fn restore_brings_back_failed_damage() {
        let mut t = tracker();
        t.mark(10, 10, 5, 5);
        let snap = t.take();
        t.mark(40, 40, 2, 2);
        t.restore(snap);
        assert_eq!(t.rect(), Some(Rect::new(10, 10, 32, 32)));

        t.force_full();
        let forced = t.take();
        t.restore(forced);
        assert!(t.is_forced());
    }

    #[test]
    fn disabled_reports_full_screen_and_ignores_clear() {
        let mut t = DirtyTracker::new(128, 160, false);
        assert_eq!(t.rect(), Some(Rect::full(128, 160)));
        t.mark(3, 3, 3, 3);
        t.clear();
        assert_eq!(t.rect(), Some(Rect::full(128, 160)));
        let snap = t.take();
        assert_eq!(snap.send, Damage::Full);
        // drawn area is still known for keeping the other buffers in step
        assert_eq!(snap.changed, Damage::Region(Rect::new(3, 3, 3, 3)));
    }

    #[test]
    fn reenabling_starts_from_clean_rect() {
        let mut t = tracker();
        t.mark(0, 0, 10, 10);
        t.set_enabled(false);
        t.set_enabled(true);
        assert_eq!(t.rect(), None);
    }

    #[test]
    fn damage_union_rules() {
        let r = Damage::Region(Rect::new(0, 0, 2, 2));
        assert_eq!(Damage::None.union(r), r);
        assert_eq!(r.union(Damage::Full), Damage::Full);
        assert_eq!(
            r.union(Damage::Region(Rect::new(4, 4, 1, 1))),
            Damage::Region(Rect::new(0, 0, 5, 5))
        );
        assert_eq!(Damage::Full.resolve(128, 160), Rect::full(128, 160));
        assert!(Damage::None.resolve(128, 160).is_empty());
    }
}
