//! Iolet bookkeeping: layout along the object edges, port-count updates that
//! keep surviving iolets, the nearest-iolet search for connect-by-drag, and
//! the canvas-wide exclusive drop-target highlight.

use crate::geometry::{Point, Rect};
use crate::model::{CanvasObject, Iolet, IoletId, IoletKind, OBJECT_MARGIN, ObjectKey, Scene};

pub const IOLET_SIZE: i32 = 13;
pub const IOLET_HIT_BOX: i32 = 4;
pub const IOLET_BORDER: i32 = 14;

/// Objects narrower than this with several iolets of a kind get small iolets.
const NARROW_WIDTH: i32 = 45;
const NARROW_IOLET_SIZE: i32 = 10;
const NARROW_BORDER: i32 = 9;

/// A single iolet is centred instead of inset below this width.
const CENTRE_SINGLE_BELOW: i32 = 40;

/// How far from an iolet the cursor may be while still targeting it.
pub const TARGET_RANGE: i32 = 150;

impl CanvasObject {
    /// Bring the iolet lists to the given counts and signal flags.
    ///
    /// Iolets are only removed from or appended to the end of their group, so
    /// an iolet that survives keeps its state. Returns whether anything changed.
    pub fn update_ports(&mut self, inlets: &[bool], outlets: &[bool]) -> bool {
        let before: Vec<(IoletKind, bool)> = self.iolets.iter().map(|i| (i.kind, i.signal)).collect();

        let mut outs = self.iolets.split_off(self.num_inputs);
        let mut ins = std::mem::take(&mut self.iolets);
        resize_group(&mut ins, IoletKind::Inlet, inlets);
        resize_group(&mut outs, IoletKind::Outlet, outlets);

        self.num_inputs = ins.len();
        self.num_outputs = outs.len();
        ins.append(&mut outs);
        self.iolets = ins;

        let after: Vec<(IoletKind, bool)> = self.iolets.iter().map(|i| (i.kind, i.signal)).collect();
        let old_locals: Vec<Rect> = self.iolets.iter().map(|i| i.local).collect();
        self.layout_iolets();
        let moved = self.iolets.iter().zip(&old_locals).any(|(i, old)| i.local != *old);
        before != after || moved
    }

    /// Recompute iolet bounds relative to the object's top-left corner.
    pub fn layout_iolets(&mut self) {
        let width = self.bounds.width;
        let height = self.bounds.height;
        let show = self.widget.shows_iolets();

        let (size, border) = if width < NARROW_WIDTH && (self.num_inputs > 1 || self.num_outputs > 1) {
            (NARROW_IOLET_SIZE, NARROW_BORDER)
        } else {
            (IOLET_SIZE, IOLET_BORDER)
        };

        let span = |count: usize| -> (i32, i32) {
            let remove = (width - IOLET_HIT_BOX * count as i32 - border).clamp(0, border);
            (remove, width - 2 * remove)
        };
        let inlet_span = span(self.num_inputs);
        let outlet_span = span(self.num_outputs);

        for iolet in &mut self.iolets {
            if !show {
                iolet.local = Rect::default();
                continue;
            }
            let is_inlet = iolet.kind == IoletKind::Inlet;
            let total = if is_inlet { self.num_inputs } else { self.num_outputs };
            let (left, span_width) = if is_inlet { inlet_span } else { outlet_span };
            let y = if is_inlet {
                OBJECT_MARGIN + 1 - size / 2
            } else {
                height - OBJECT_MARGIN - size / 2
            };
            let x = if total == 1 {
                if width < CENTRE_SINGLE_BELOW {
                    (width as f32 / 2.0 - size as f32 / 2.0) as i32
                } else {
                    left
                }
            } else {
                let ratio = (span_width - size) as f32 / (total - 1) as f32;
                left + (ratio * iolet.index as f32) as i32
            };
            iolet.local = Rect::new(x, y, size, size);
        }
    }
}

fn resize_group(group: &mut Vec<Iolet>, kind: IoletKind, flags: &[bool]) {
    group.truncate(flags.len());
    for (index, &signal) in flags.iter().enumerate() {
        match group.get_mut(index) {
            Some(iolet) => iolet.signal = signal,
            None => group.push(Iolet::new(kind, index, signal)),
        }
    }
}

/// Find the iolet of `kind` closest to `position`, ignoring iolets on
/// `exclude` and iolets farther than [`TARGET_RANGE`] from the cursor.
pub fn find_nearest_iolet(scene: &Scene, position: Point, kind: IoletKind, exclude: ObjectKey) -> Option<IoletId> {
    let mut nearest: Option<(IoletId, f32)> = None;
    for (key, object) in scene.objects() {
        if key == exclude || !object.widget.shows_iolets() {
            continue;
        }
        let group = match kind {
            IoletKind::Inlet => object.inlets(),
            IoletKind::Outlet => object.outlets(),
        };
        for iolet in group {
            let bounds = object.iolet_canvas_bounds(iolet);
            if !bounds.expanded(TARGET_RANGE).contains(position) {
                continue;
            }
            let distance = bounds.centre().distance_to(position);
            if nearest.is_none_or(|(_, best)| distance < best) {
                nearest = Some((
                    IoletId {
                        object: key,
                        kind,
                        index: iolet.index,
                    },
                    distance,
                ));
            }
        }
    }
    nearest.map(|(id, _)| id)
}

/// The one iolet that is highlighted as a drop target, if any.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IoletTarget {
    current: Option<IoletId>,
}

impl IoletTarget {
    pub fn current(&self) -> Option<IoletId> {
        self.current
    }

    /// Move the highlight, clearing the flag on the previous target first.
    pub fn set(&mut self, scene: &mut Scene, target: Option<IoletId>) {
        if self.current == target {
            return;
        }
        self.clear(scene);
        if let Some(id) = target {
            if let Some(iolet) = scene.iolet_mut(id) {
                iolet.targeted = true;
                self.current = Some(id);
            }
        }
    }

    pub fn clear(&mut self, scene: &mut Scene) {
        if let Some(id) = self.current.take() {
            if let Some(iolet) = scene.iolet_mut(id) {
                iolet.targeted = false;
            }
        }
    }
}

/// Iolet whose canvas bounds contain `position`, topmost object first.
pub fn iolet_at(scene: &Scene, position: Point) -> Option<IoletId> {
    for entry in scene.z_order().iter().rev() {
        let key = entry.object();
        let Some(object) = scene.object(key) else {
            continue;
        };
        if !object.widget.shows_iolets() {
            continue;
        }
        for iolet in &object.iolets {
            if object.iolet_canvas_bounds(iolet).contains(position) {
                return Some(IoletId {
                    object: key,
                    kind: iolet.kind,
                    index: iolet.index,
                });
            }
        }
    }
    None
}

/// Number of iolets canvas-wide with the targeted flag set.
pub fn targeted_count(scene: &Scene) -> usize {
    scene
        .objects()
        .flat_map(|(_, o)| o.iolets.iter())
        .filter(|i| i.targeted)
        .count()
}
