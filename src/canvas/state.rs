//! Interaction state of the canvas: what is being dragged, and the view.

use crate::geometry::{Point, Rect};
use crate::grid::ResizeEdges;
use crate::model::{ConnectionKey, IoletId, ObjectKey};
use crate::path::Route;

// ────────────────────────────────────────────────────────────────────────────
// Drag state
// ────────────────────────────────────────────────────────────────────────────

/// A connection being drawn from one or more iolets.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingConnection {
    /// Iolets the new connections start from; more than one when auto-patching.
    pub sources: Vec<IoletId>,
    /// Loose end of the cable in canvas coordinates.
    pub cursor: Point,
}

/// A segment of a routed cable being dragged.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentDrag {
    pub connection: ConnectionKey,
    /// Index of the grabbed segment in `plan`.
    pub index: usize,
    /// Mouse position at mouse-down.
    pub start: Point,
    /// Route to restore on cancel.
    pub original: Route,
    /// Plan the drag delta is applied to.
    pub plan: Vec<Point>,
    pub moved: bool,
}

/// What the user is currently dragging.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DragMode {
    /// Not dragging anything.
    #[default]
    None,
    /// Moving the selected objects.
    Objects {
        grabbed: ObjectKey,
        start: Point,
        /// Snapped offset applied this frame.
        offset: Point,
    },
    /// Resizing one object by some of its edges.
    Resize {
        object: ObjectKey,
        edges: ResizeEdges,
        start: Point,
        offset: Point,
    },
    /// Drawing new connections.
    Connection(PendingConnection),
    /// Dragging a cable segment.
    Segment(SegmentDrag),
    /// Drawing the lasso.
    Lasso,
}

impl DragMode {
    pub fn is_none(&self) -> bool {
        matches!(self, DragMode::None)
    }

    /// Whether the drag refers to an object that is not in `alive`.
    pub(crate) fn refers_to_missing(&self, object_alive: impl Fn(ObjectKey) -> bool, connection_alive: impl Fn(ConnectionKey) -> bool) -> bool {
        match self {
            DragMode::None | DragMode::Lasso => false,
            DragMode::Objects { grabbed, .. } => !object_alive(*grabbed),
            DragMode::Resize { object, .. } => !object_alive(*object),
            DragMode::Connection(pending) => pending.sources.iter().any(|s| !object_alive(s.object)),
            DragMode::Segment(drag) => !connection_alive(drag.connection),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Viewport
// ────────────────────────────────────────────────────────────────────────────

/// Visible part of the canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Canvas coordinate shown at the top-left corner.
    pub pan: Point,
    pub zoom: f32,
    /// Size of the view in screen pixels; `None` shows the whole canvas.
    pub size: Option<(i32, i32)>,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            pan: Point::ORIGIN,
            zoom: 1.0,
            size: None,
        }
    }
}

impl Viewport {
    /// Visible region in canvas coordinates.
    pub fn view_bounds(&self) -> Option<Rect> {
        let (width, height) = self.size?;
        let zoom = if self.zoom > 0.0 { self.zoom } else { 1.0 };
        Some(Rect::new(
            self.pan.x,
            self.pan.y,
            (width as f32 / zoom).ceil() as i32,
            (height as f32 / zoom).ceil() as i32,
        ))
    }

    pub fn is_visible(&self, bounds: &Rect) -> bool {
        self.view_bounds().is_none_or(|view| view.intersects(bounds))
    }

    pub fn screen_to_canvas(&self, screen: Point) -> Point {
        let zoom = if self.zoom > 0.0 { self.zoom } else { 1.0 };
        Point::new(
            self.pan.x + (screen.x as f32 / zoom).round() as i32,
            self.pan.y + (screen.y as f32 / zoom).round() as i32,
        )
    }

    pub fn pan_by(&mut self, delta: Point) {
        self.pan -= delta;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewport_unbounded_by_default() {
        let viewport = Viewport::default();
        assert!(viewport.view_bounds().is_none());
        assert!(viewport.is_visible(&Rect::new(-5000, 9000, 10, 10)));
    }

    #[test]
    fn test_viewport_bounds_follow_zoom() {
        let viewport = Viewport {
            pan: Point::new(100, 50),
            zoom: 2.0,
            size: Some((800, 600)),
        };
        assert_eq!(viewport.view_bounds(), Some(Rect::new(100, 50, 400, 300)));
        assert_eq!(viewport.screen_to_canvas(Point::new(200, 100)), Point::new(200, 100));
        assert!(!viewport.is_visible(&Rect::new(600, 60, 10, 10)));
    }

    #[test]
    fn test_pan_moves_view_against_drag() {
        let mut viewport = Viewport::default();
        viewport.pan_by(Point::new(30, -10));
        assert_eq!(viewport.pan, Point::new(-30, 10));
    }
}
