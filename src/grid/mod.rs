//! Object grid: snapping of moved and resized objects.
//!
//! Each axis is resolved on its own. For a move the horizontal axis tries a
//! straight-cable snap, then edges and centres of nearby objects, then the
//! absolute grid; the vertical axis skips the cable step. Once an axis snaps
//! to an object or a cable, the snapped offset is held until the raw offset
//! moves more than the release range away from it.

pub mod indicator;

pub use indicator::SnapIndicator;

use crate::geometry::{Point, Rect, Segment};
use crate::model::OBJECT_MARGIN;
use crate::settings::{GridMode, GridSettings};
use std::time::Instant;

/// What a snapped axis lines up with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapTarget {
    /// Left or top edges.
    Start,
    Centre,
    /// Right or bottom edges.
    End,
    /// The dragged object's cable becomes straight.
    Connection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Horizontal,
    Vertical,
}

impl Axis {
    fn slot(self) -> usize {
        match self {
            Axis::Horizontal => 0,
            Axis::Vertical => 1,
        }
    }
}

/// Iolet bounds of one cable attached to the dragged object, taken at the
/// start of the drag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CableEnds {
    pub outlet: Rect,
    pub inlet: Rect,
    /// The dragged object owns the inlet end.
    pub dragged_is_inlet: bool,
}

/// Everything [`ObjectGrid::perform_move`] needs for one frame.
#[derive(Debug, Clone, Copy)]
pub struct MoveRequest<'a> {
    /// Bounds of the grabbed object at drag start, margin included.
    pub original: Rect,
    /// Raw mouse offset since drag start.
    pub offset: Point,
    /// Bounds of unselected objects in the viewport, margin included.
    pub others: &'a [Rect],
    /// Cables to unselected objects.
    pub cables: &'a [CableEnds],
    /// Canvas position that grid lines are counted from.
    pub origin: Point,
    /// The snap-disable modifier is held.
    pub bypass: bool,
}

/// Which edges a resize drags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResizeEdges {
    pub left: bool,
    pub right: bool,
    pub top: bool,
    pub bottom: bool,
}

impl ResizeEdges {
    pub const BOTTOM_RIGHT: ResizeEdges = ResizeEdges {
        left: false,
        right: true,
        top: false,
        bottom: true,
    };

    /// Apply a mouse offset to `bounds` by moving the dragged edges.
    pub fn apply(&self, bounds: Rect, offset: Point) -> Rect {
        let mut left = bounds.x;
        let mut right = bounds.right();
        let mut top = bounds.y;
        let mut bottom = bounds.bottom();
        if self.left {
            left += offset.x;
        }
        if self.right {
            right += offset.x;
        }
        if self.top {
            top += offset.y;
        }
        if self.bottom {
            bottom += offset.y;
        }
        Rect::new(left, top, right - left, bottom - top)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ResizeRequest<'a> {
    pub original: Rect,
    pub offset: Point,
    pub edges: ResizeEdges,
    /// Width over height of the content that must be kept.
    pub fixed_ratio: Option<f32>,
    pub others: &'a [Rect],
    pub origin: Point,
    pub bypass: bool,
}

/// A held snap on one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HeldSnap {
    /// Offset component the axis is locked to.
    offset: i32,
    target: SnapTarget,
}

/// Result of an object comparison on one axis.
struct Candidate {
    delta: i32,
    target: SnapTarget,
    guide: Segment,
}

#[derive(Debug, Clone)]
pub struct ObjectGrid {
    settings: GridSettings,
    held: [Option<HeldSnap>; 2],
    indicators: [SnapIndicator; 2],
}

impl ObjectGrid {
    pub fn new(settings: GridSettings) -> Self {
        Self {
            settings,
            held: [None, None],
            indicators: [SnapIndicator::default(), SnapIndicator::default()],
        }
    }

    pub fn settings(&self) -> &GridSettings {
        &self.settings
    }

    /// Settings listener: new values apply from the next frame.
    pub fn settings_changed(&mut self, settings: GridSettings) {
        self.settings = settings;
        self.clear_all();
    }

    pub fn indicator(&self, axis: Axis) -> &SnapIndicator {
        &self.indicators[axis.slot()]
    }

    pub fn snapped_to(&self, axis: Axis) -> Option<SnapTarget> {
        self.held[axis.slot()].map(|h| h.target)
    }

    pub fn needs_repaint(&self) -> bool {
        self.indicators.iter().any(SnapIndicator::needs_repaint)
    }

    pub fn advance(&mut self, now: Instant) {
        for indicator in &mut self.indicators {
            indicator.advance(now);
        }
    }

    /// Drop held snaps and indicators immediately.
    pub fn clear_all(&mut self) {
        self.held = [None, None];
        for indicator in &mut self.indicators {
            indicator.clear();
        }
    }

    fn within(&self, distance: i32) -> bool {
        distance.abs() <= self.settings.tolerance
    }

    fn hold(&mut self, axis: Axis, offset: i32, target: SnapTarget, guide: Segment, now: Instant) -> i32 {
        self.held[axis.slot()] = Some(HeldSnap { offset, target });
        self.indicators[axis.slot()].show(guide, now);
        offset
    }

    fn release(&mut self, axis: Axis, now: Instant) {
        self.held[axis.slot()] = None;
        self.indicators[axis.slot()].release(now);
    }

    // ────────────────────────────────────────────────────────────────────
    // Move
    // ────────────────────────────────────────────────────────────────────

    /// Adjust the raw offset of a move so the grabbed object snaps.
    pub fn perform_move(&mut self, request: &MoveRequest<'_>, now: Instant) -> Point {
        if request.bypass || self.settings.mode == GridMode::Off {
            self.clear_all();
            return request.offset;
        }
        let x = self.snap_move_axis(Axis::Horizontal, request, now);
        let y = self.snap_move_axis(Axis::Vertical, request, now);
        Point::new(x, y)
    }

    /// Commit the offset at mouse-up, keeping any held snap, and reset.
    pub fn handle_mouse_up(&mut self, offset: Point) -> Point {
        let mut result = offset;
        if let Some(held) = self.held[Axis::Horizontal.slot()] {
            result.x = held.offset;
        }
        if let Some(held) = self.held[Axis::Vertical.slot()] {
            result.y = held.offset;
        }
        self.clear_all();
        result
    }

    fn snap_move_axis(&mut self, axis: Axis, request: &MoveRequest<'_>, now: Instant) -> i32 {
        let raw = component(request.offset, axis);

        if let Some(held) = self.held[axis.slot()] {
            if (held.offset - raw).abs() <= self.settings.release_range {
                self.indicators[axis.slot()].advance(now);
                return held.offset;
            }
            self.release(axis, now);
        }

        let mode = self.settings.mode;
        if mode.snaps_to_objects() {
            if axis == Axis::Horizontal && self.settings.snap_connections {
                match self.connection_snap(request) {
                    CableSnap::Snap(delta, guide) => {
                        return self.hold(axis, raw + delta, SnapTarget::Connection, guide, now);
                    }
                    CableSnap::Suppress => {
                        self.indicators[axis.slot()].release(now);
                        return raw;
                    }
                    CableSnap::None => {}
                }
            }
            let desired = request.original.translated(request.offset).reduced(OBJECT_MARGIN);
            if let Some(c) = self.object_snap(axis, desired, request.others) {
                return self.hold(axis, raw + c.delta, c.target, c.guide, now);
            }
        }

        self.indicators[axis.slot()].release(now);
        if mode.snaps_to_grid() {
            let corner = component(request.original.translated(request.offset).reduced(OBJECT_MARGIN).position(), axis);
            return raw + grid_delta(corner, component(request.origin, axis), self.settings.size);
        }
        raw
    }

    fn connection_snap(&self, request: &MoveRequest<'_>) -> CableSnap {
        let mut best: Option<(i32, Segment)> = None;
        let mut near = false;
        for cable in request.cables {
            let (outlet, inlet) = if cable.dragged_is_inlet {
                (cable.outlet, cable.inlet.translated(request.offset))
            } else {
                (cable.outlet.translated(request.offset), cable.inlet)
            };
            // Upside-down cables never snap.
            if inlet.y < outlet.y {
                continue;
            }
            let mut distance = inlet.x - outlet.x;
            if cable.dragged_is_inlet {
                distance = -distance;
            }
            if self.within(distance) {
                if best.is_none_or(|(d, _)| distance.abs() < d.abs()) {
                    let x = if cable.dragged_is_inlet { outlet.centre_x() } else { inlet.centre_x() };
                    let guide = Segment::new(Point::new(x, outlet.bottom()), Point::new(x, inlet.y));
                    best = Some((distance, guide));
                }
            } else if distance.abs() < 2 * self.settings.tolerance {
                near = true;
            }
        }
        match best {
            Some((delta, guide)) => CableSnap::Snap(delta, guide),
            None if near => CableSnap::Suppress,
            None => CableSnap::None,
        }
    }

    /// First object feature within tolerance, in object order; per object the
    /// start edge is tried before the centre and the end edge.
    fn object_snap(&self, axis: Axis, desired: Rect, others: &[Rect]) -> Option<Candidate> {
        for other in others {
            let b1 = other.reduced(OBJECT_MARGIN);
            let features = axis_features(b1, desired, axis);
            for (target, delta) in features {
                let enabled = match target {
                    SnapTarget::Centre => self.settings.snap_centres,
                    _ => self.settings.snap_edges,
                };
                if enabled && self.within(delta) {
                    let snapped = translate_axis(desired, axis, delta);
                    return Some(Candidate {
                        delta,
                        target,
                        guide: guide_line(b1, snapped, axis, target),
                    });
                }
            }
        }
        None
    }

    // ────────────────────────────────────────────────────────────────────
    // Resize
    // ────────────────────────────────────────────────────────────────────

    /// Adjust the raw offset of a resize so the dragged edges snap. Only the
    /// dragged edges are compared; a fixed ratio drives the other axis.
    pub fn perform_resize(&mut self, request: &ResizeRequest<'_>, now: Instant) -> Point {
        let mut offset = request.offset;
        let mut snapped = [false, false];

        if request.bypass || self.settings.mode == GridMode::Off {
            self.clear_all();
        } else {
            for axis in [Axis::Horizontal, Axis::Vertical] {
                let (start_dragged, end_dragged) = match axis {
                    Axis::Horizontal => (request.edges.left, request.edges.right),
                    Axis::Vertical => (request.edges.top, request.edges.bottom),
                };
                if !start_dragged && !end_dragged {
                    self.indicators[axis.slot()].release(now);
                    continue;
                }
                let bounds = request.edges.apply(request.original, offset).reduced(OBJECT_MARGIN);
                let edge = match (axis, start_dragged) {
                    (Axis::Horizontal, true) => bounds.x,
                    (Axis::Horizontal, false) => bounds.right(),
                    (Axis::Vertical, true) => bounds.y,
                    (Axis::Vertical, false) => bounds.bottom(),
                };
                if let Some((delta, guide)) = self.edge_snap(axis, edge, bounds, request.others) {
                    let value = component(offset, axis) + delta;
                    set_component(&mut offset, axis, value);
                    self.indicators[axis.slot()].show(guide, now);
                    snapped[axis.slot()] = true;
                    continue;
                }
                self.indicators[axis.slot()].release(now);
                if self.settings.mode.snaps_to_grid() {
                    let delta = grid_delta(edge, component(request.origin, axis), self.settings.size);
                    let value = component(offset, axis) + delta;
                    set_component(&mut offset, axis, value);
                }
            }
        }

        if let Some(ratio) = request.fixed_ratio.filter(|r| *r > 0.0) {
            offset = keep_ratio(request, offset, ratio, snapped);
        }
        offset
    }

    fn edge_snap(&self, axis: Axis, edge: i32, bounds: Rect, others: &[Rect]) -> Option<(i32, Segment)> {
        if !self.settings.mode.snaps_to_objects() {
            return None;
        }
        for other in others {
            let b1 = other.reduced(OBJECT_MARGIN);
            let (start, centre, end) = match axis {
                Axis::Horizontal => (b1.x, b1.centre_x(), b1.right()),
                Axis::Vertical => (b1.y, b1.centre_y(), b1.bottom()),
            };
            for (target, line) in [(SnapTarget::Start, start), (SnapTarget::Centre, centre), (SnapTarget::End, end)] {
                let enabled = match target {
                    SnapTarget::Centre => self.settings.snap_centres,
                    _ => self.settings.snap_edges,
                };
                let delta = line - edge;
                if enabled && self.within(delta) {
                    let span = b1.union(&bounds);
                    let guide = match axis {
                        Axis::Horizontal => Segment::new(Point::new(line, span.y), Point::new(line, span.bottom())),
                        Axis::Vertical => Segment::new(Point::new(span.x, line), Point::new(span.right(), line)),
                    };
                    return Some((delta, guide));
                }
            }
        }
        None
    }
}

enum CableSnap {
    Snap(i32, Segment),
    /// A cable is close to straight; leave the axis alone this frame.
    Suppress,
    None,
}

fn component(p: Point, axis: Axis) -> i32 {
    match axis {
        Axis::Horizontal => p.x,
        Axis::Vertical => p.y,
    }
}

fn set_component(p: &mut Point, axis: Axis, value: i32) {
    match axis {
        Axis::Horizontal => p.x = value,
        Axis::Vertical => p.y = value,
    }
}

fn translate_axis(rect: Rect, axis: Axis, delta: i32) -> Rect {
    match axis {
        Axis::Horizontal => rect.translated(Point::new(delta, 0)),
        Axis::Vertical => rect.translated(Point::new(0, delta)),
    }
}

/// `(target, other - dragged)` for start edge, centre and end edge.
fn axis_features(other: Rect, dragged: Rect, axis: Axis) -> [(SnapTarget, i32); 3] {
    match axis {
        Axis::Horizontal => [
            (SnapTarget::Start, other.x - dragged.x),
            (SnapTarget::Centre, other.centre_x() - dragged.centre_x()),
            (SnapTarget::End, other.right() - dragged.right()),
        ],
        Axis::Vertical => [
            (SnapTarget::Start, other.y - dragged.y),
            (SnapTarget::Centre, other.centre_y() - dragged.centre_y()),
            (SnapTarget::End, other.bottom() - dragged.bottom()),
        ],
    }
}

/// Guide between two aligned content rectangles, drawn along the shared
/// feature from the first rectangle to the far side of the second.
fn guide_line(a: Rect, b: Rect, axis: Axis, target: SnapTarget) -> Segment {
    let span = a.union(&b);
    match axis {
        Axis::Horizontal => {
            let x = match target {
                SnapTarget::Start => a.x,
                SnapTarget::End => a.right(),
                _ => a.centre_x(),
            };
            Segment::new(Point::new(x, span.y), Point::new(x, span.bottom()))
        }
        Axis::Vertical => {
            let y = match target {
                SnapTarget::Start => a.y,
                SnapTarget::End => a.bottom(),
                _ => a.centre_y(),
            };
            Segment::new(Point::new(span.x, y), Point::new(span.right(), y))
        }
    }
}

/// Correction that moves `position` onto the nearest grid line.
pub fn grid_delta(position: i32, origin: i32, size: i32) -> i32 {
    if size <= 0 {
        return 0;
    }
    let relative = position - origin;
    let snapped = (relative as f64 / size as f64).round() as i32 * size;
    snapped - relative
}

/// Recompute one offset component so the content keeps `ratio`.
fn keep_ratio(request: &ResizeRequest<'_>, offset: Point, ratio: f32, snapped: [bool; 2]) -> Point {
    let edges = request.edges;
    let horizontal = edges.left || edges.right;
    let vertical = edges.top || edges.bottom;
    // Width leads unless only the vertical axis is dragged or snapped.
    let width_leads = horizontal && (snapped[0] || !snapped[1] || !vertical);

    let original = request.original.reduced(OBJECT_MARGIN);
    let resized = edges.apply(request.original, offset).reduced(OBJECT_MARGIN);
    let mut result = offset;
    if width_leads {
        let height = (resized.width as f32 / ratio).round() as i32;
        let change = height - original.height;
        result.y = if edges.top { -change } else { change };
    } else if vertical {
        let width = (resized.height as f32 * ratio).round() as i32;
        let change = width - original.width;
        result.x = if edges.left { -change } else { change };
    }
    result
}
