//! Fading guide lines shown while a snap is active.

use crate::geometry::{Point, Segment};
use std::time::{Duration, Instant};

pub const FADE_DURATION: Duration = Duration::from_millis(150);

/// Exponential decay rate per second; leaves under 1 % after [`FADE_DURATION`].
const DECAY_RATE: f32 = 32.0;

/// Guide lines are pulled in by this much at each end.
pub const INDICATOR_INSET: i32 = 2;

/// Below this opacity a released indicator is removed.
const VISIBLE_THRESHOLD: f32 = 0.01;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapIndicator {
    line: Option<Segment>,
    opacity: f32,
    active: bool,
    last_update: Option<Instant>,
}

impl SnapIndicator {
    pub fn line(&self) -> Option<Segment> {
        self.line
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Show the indicator along `line`, fading in when it was not showing.
    pub fn show(&mut self, line: Segment, now: Instant) {
        self.advance(now);
        self.line = Some(inset(line, INDICATOR_INSET));
        self.active = true;
        self.last_update = Some(now);
    }

    /// Stop tracking a snap; the line decays from its current opacity.
    pub fn release(&mut self, now: Instant) {
        if self.active {
            self.advance(now);
            self.active = false;
            self.last_update = Some(now);
        }
    }

    /// Remove the line at once.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Step the fade animation to `now`.
    pub fn advance(&mut self, now: Instant) {
        let Some(last) = self.last_update else {
            self.last_update = Some(now);
            return;
        };
        let elapsed = now.saturating_duration_since(last).as_secs_f32();
        self.last_update = Some(now);
        if self.active {
            self.opacity = (self.opacity + elapsed / FADE_DURATION.as_secs_f32()).min(1.0);
        } else if self.line.is_some() {
            self.opacity *= (-DECAY_RATE * elapsed).exp();
            if self.opacity < VISIBLE_THRESHOLD {
                self.line = None;
                self.opacity = 0.0;
            }
        }
    }

    /// Whether another frame is needed to finish a fade.
    pub fn needs_repaint(&self) -> bool {
        match self.line {
            Some(_) if self.active => self.opacity < 1.0,
            Some(_) => true,
            None => false,
        }
    }
}

/// Shorten an axis-aligned segment by `amount` at each end.
fn inset(line: Segment, amount: i32) -> Segment {
    let shrink = |a: i32, b: i32| -> (i32, i32) {
        if (b - a).abs() <= 2 * amount {
            (a, b)
        } else if a < b {
            (a + amount, b - amount)
        } else {
            (a - amount, b + amount)
        }
    };
    if line.is_vertical() {
        let (y0, y1) = shrink(line.start.y, line.end.y);
        Segment::new(Point::new(line.start.x, y0), Point::new(line.end.x, y1))
    } else {
        let (x0, x1) = shrink(line.start.x, line.end.x);
        Segment::new(Point::new(x0, line.start.y), Point::new(x1, line.end.y))
    }
}
