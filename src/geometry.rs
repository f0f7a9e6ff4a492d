//! Integer canvas geometry shared by the reconciler, the path engine and the
//! snap engine.
//!
//! All coordinates are canvas pixels. Rectangles are `(x, y, width, height)`
//! with the right/bottom edges exclusive, matching how object bounds are
//! reported by the document model.

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0, y: 0 };

    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn with_x(self, x: i32) -> Self {
        Self { x, y: self.y }
    }

    pub fn with_y(self, y: i32) -> Self {
        Self { x: self.x, y }
    }

    /// Euclidean distance, used when ranking candidates by proximity.
    pub fn distance_to(self, other: Point) -> f32 {
        let dx = (other.x - self.x) as f32;
        let dy = (other.y - self.y) as f32;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn manhattan_to(self, other: Point) -> i64 {
        (other.x as i64 - self.x as i64).abs() + (other.y as i64 - self.y as i64).abs()
    }
}

impl Add for Point {
    type Output = Point;
    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Point {
    fn add_assign(&mut self, rhs: Point) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Point {
    type Output = Point;
    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl SubAssign for Point {
    fn sub_assign(&mut self, rhs: Point) {
        self.x -= rhs.x;
        self.y -= rhs.y;
    }
}

impl Neg for Point {
    type Output = Point;
    fn neg(self) -> Point {
        Point::new(-self.x, -self.y)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_corners(a: Point, b: Point) -> Self {
        let x = a.x.min(b.x);
        let y = a.y.min(b.y);
        Self::new(x, y, (a.x - b.x).abs(), (a.y - b.y).abs())
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn centre_x(&self) -> i32 {
        self.x + self.width / 2
    }

    pub fn centre_y(&self) -> i32 {
        self.y + self.height / 2
    }

    pub fn centre(&self) -> Point {
        Point::new(self.centre_x(), self.centre_y())
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Shrink by `amount` on every side; never produces a negative size.
    pub fn reduced(&self, amount: i32) -> Rect {
        Rect::new(
            self.x + amount,
            self.y + amount,
            (self.width - 2 * amount).max(0),
            (self.height - 2 * amount).max(0),
        )
    }

    pub fn expanded(&self, amount: i32) -> Rect {
        Rect::new(
            self.x - amount,
            self.y - amount,
            self.width + 2 * amount,
            self.height + 2 * amount,
        )
    }

    pub fn translated(&self, delta: Point) -> Rect {
        Rect::new(self.x + delta.x, self.y + delta.y, self.width, self.height)
    }

    pub fn with_position(&self, position: Point) -> Rect {
        Rect::new(position.x, position.y, self.width, self.height)
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x < self.right() && p.y >= self.y && p.y < self.bottom()
    }

    /// True when the two rectangles share a region of non-zero area.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let r = self.right().max(other.right());
        let b = self.bottom().max(other.bottom());
        Rect::new(x, y, r - x, b - y)
    }
}

/// A straight piece of a cable between two canvas points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub start: Point,
    pub end: Point,
}

impl Segment {
    pub fn new(start: Point, end: Point) -> Self {
        Self { start, end }
    }

    pub fn is_horizontal(&self) -> bool {
        self.start.y == self.end.y
    }

    pub fn is_vertical(&self) -> bool {
        self.start.x == self.end.x
    }

    pub fn length(&self) -> i64 {
        self.start.manhattan_to(self.end)
    }

    /// Distance from `p` to the closest point of the segment.
    pub fn distance_to(&self, p: Point) -> f32 {
        let (ax, ay) = (self.start.x as f32, self.start.y as f32);
        let (bx, by) = (self.end.x as f32, self.end.y as f32);
        let (px, py) = (p.x as f32, p.y as f32);
        let dx = bx - ax;
        let dy = by - ay;
        let len_sq = dx * dx + dy * dy;
        if len_sq == 0.0 {
            return ((px - ax).powi(2) + (py - ay).powi(2)).sqrt();
        }
        let t = (((px - ax) * dx + (py - ay) * dy) / len_sq).clamp(0.0, 1.0);
        let cx = ax + t * dx;
        let cy = ay + t * dy;
        ((px - cx).powi(2) + (py - cy).powi(2)).sqrt()
    }

    /// Whether any part of the segment passes through the interior of `rect`.
    ///
    /// Touching the boundary does not count, so cables may run along an
    /// object's edge.
    pub fn intersects_rect(&self, rect: &Rect) -> bool {
        if rect.is_empty() {
            return false;
        }
        // Liang-Barsky clipping against the open rectangle.
        let (x0, y0) = (self.start.x as f64, self.start.y as f64);
        let dx = (self.end.x - self.start.x) as f64;
        let dy = (self.end.y - self.start.y) as f64;
        let left = rect.x as f64;
        let right = rect.right() as f64;
        let top = rect.y as f64;
        let bottom = rect.bottom() as f64;

        let mut t0 = 0.0f64;
        let mut t1 = 1.0f64;
        for (p, q) in [
            (-dx, x0 - left),
            (dx, right - x0),
            (-dy, y0 - top),
            (dy, bottom - y0),
        ] {
            if p == 0.0 {
                if q <= 0.0 {
                    return false;
                }
                continue;
            }
            let r = q / p;
            if p < 0.0 {
                if r > t1 {
                    return false;
                }
                t0 = t0.max(r);
            } else {
                if r < t0 {
                    return false;
                }
                t1 = t1.min(r);
            }
        }
        if t1 <= t0 {
            return false;
        }
        // Reject a clip that only grazes the boundary.
        let mid = (t0 + t1) * 0.5;
        let mx = x0 + mid * dx;
        let my = y0 + mid * dy;
        mx > left && mx < right && my > top && my < bottom
    }
}

/// Iterate the segments of a polyline.
pub fn segments(points: &[Point]) -> impl Iterator<Item = Segment> + '_ {
    points.windows(2).map(|w| Segment::new(w[0], w[1]))
}
