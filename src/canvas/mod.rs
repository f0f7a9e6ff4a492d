//! Canvas controller.
//!
//! Owns the visual collections, the selection, the viewport and lock mode,
//! and drives the reconciler, the path engine and the snap engine from user
//! gestures. Every gesture that changes the document opens exactly one undo
//! sequence; the document's answer comes back through [`Canvas::synchronise`].
//!
//! - **Move / resize**: snapped through [`ObjectGrid`], committed on mouse-up
//! - **Connections**: drag from an iolet, with auto-patching across a selection
//! - **Cable segments**: drag an interior segment, persisted through [`PathUpdater`]
//! - **Selection**: click, toggle and lasso over objects and cables
//! - **New objects**: placed uncommitted, created in the document on commit

pub mod selection;
pub mod state;

pub use selection::{CanvasSelection, Lasso};
pub use state::{DragMode, PendingConnection, SegmentDrag, Viewport};

use crate::document::{ConnectionHandle, ObjectHandle, PatchDocument, with_undo_sequence};
use crate::error::{CanvasError, DocumentError};
use crate::geometry::{Point, Rect, segments};
use crate::grid::{CableEnds, MoveRequest, ObjectGrid, ResizeEdges, ResizeRequest};
use crate::iolet::{IoletTarget, find_nearest_iolet};
use crate::model::{CanvasObject, ConnectionKey, IoletId, IoletKind, OBJECT_MARGIN, ObjectKey, Scene};
use crate::path::state::route_token;
use crate::path::{
    self, PathUpdater, Route, default_plan, default_plan_segment, drag_segment, hit_test, is_draggable_segment,
    update_path,
};
use crate::settings::CanvasSettings;
use crate::sync::{SyncReport, synchronise};
use std::time::Instant;
use tracing::debug;

pub const MOVE_LABEL: &str = "Move";
pub const RESIZE_LABEL: &str = "Resize";
pub const REMOVE_LABEL: &str = "Remove";
pub const CONNECT_LABEL: &str = "Connect";
pub const ALIGN_LABEL: &str = "Align";
pub const CREATE_LABEL: &str = "Create";

/// Which feature of the selected objects an align gesture lines up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    /// Left edges to the leftmost one.
    Left,
    /// Right edges to the rightmost one.
    Right,
    Top,
    Bottom,
    /// Horizontal centres to their average.
    CentreX,
    /// Vertical centres to their average.
    CentreY,
}

#[derive(Debug)]
pub struct Canvas {
    scene: Scene,
    settings: CanvasSettings,
    grid: ObjectGrid,
    updater: PathUpdater,
    selection: CanvasSelection,
    drag: DragMode,
    viewport: Viewport,
    grid_origin: Point,
    locked: bool,
    sync_pending: bool,
    target: IoletTarget,
}

impl Canvas {
    pub fn new(settings: CanvasSettings) -> Self {
        Self {
            scene: Scene::new(),
            grid: ObjectGrid::new(settings.grid.clone()),
            updater: PathUpdater::new(&settings.routing),
            settings,
            selection: CanvasSelection::new(),
            drag: DragMode::None,
            viewport: Viewport::default(),
            grid_origin: Point::ORIGIN,
            locked: false,
            sync_pending: false,
            target: IoletTarget::default(),
        }
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn settings(&self) -> &CanvasSettings {
        &self.settings
    }

    pub fn grid(&self) -> &ObjectGrid {
        &self.grid
    }

    pub fn updater(&self) -> &PathUpdater {
        &self.updater
    }

    pub fn selection(&self) -> &CanvasSelection {
        &self.selection
    }

    pub fn drag(&self) -> &DragMode {
        &self.drag
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn is_sync_pending(&self) -> bool {
        self.sync_pending
    }

    pub fn target(&self) -> Option<IoletId> {
        self.target.current()
    }

    /// Settings listener.
    pub fn apply_settings(&mut self, settings: CanvasSettings) {
        self.grid.settings_changed(settings.grid.clone());
        self.updater.settings_changed(&settings.routing);
        self.settings = settings;
    }

    /// Enter or leave lock (run) mode. Locking abandons any drag and the
    /// selection.
    pub fn set_locked(&mut self, locked: bool) {
        if locked {
            self.cancel_drag();
            self.deselect_all();
        }
        self.locked = locked;
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub fn pan_by(&mut self, delta: Point) {
        self.viewport.pan_by(delta);
    }

    pub fn set_grid_origin(&mut self, origin: Point) {
        self.grid_origin = origin;
    }

    // ────────────────────────────────────────────────────────────────────
    // Synchronisation
    // ────────────────────────────────────────────────────────────────────

    /// Reconcile the visual collections with the document now.
    pub fn synchronise<D>(&mut self, doc: &mut D) -> SyncReport
    where
        D: PatchDocument + ?Sized,
    {
        let report = synchronise(&mut self.scene, doc);
        self.sync_pending = false;
        self.selection.retain_existing(&self.scene);
        self.selection.apply_flags(&mut self.scene);

        let scene = &self.scene;
        let missing = self
            .drag
            .refers_to_missing(|k| scene.object(k).is_some(), |k| scene.connection(k).is_some());
        if missing {
            debug!("drag target left the canvas");
            self.drag = DragMode::None;
            self.target.clear(&mut self.scene);
            self.grid.clear_all();
        }
        report
    }

    /// Mark the canvas dirty; the next [`Canvas::on_idle`] reconciles.
    pub fn request_synchronise(&mut self) {
        self.sync_pending = true;
    }

    /// Run a requested reconciliation. Deferred while objects are being moved
    /// or resized, since their bounds are ahead of the document until mouse-up.
    pub fn on_idle<D>(&mut self, doc: &mut D) -> Option<SyncReport>
    where
        D: PatchDocument + ?Sized,
    {
        if !self.sync_pending || matches!(self.drag, DragMode::Objects { .. } | DragMode::Resize { .. }) {
            return None;
        }
        Some(self.synchronise(doc))
    }

    // ────────────────────────────────────────────────────────────────────
    // Hit testing
    // ────────────────────────────────────────────────────────────────────

    /// Topmost object whose bounds contain `position`.
    pub fn object_at(&self, position: Point) -> Option<ObjectKey> {
        self.scene
            .z_order()
            .iter()
            .rev()
            .map(|z| z.object())
            .find(|&key| self.scene.object(key).is_some_and(|o| o.bounds.contains(position)))
    }

    /// Topmost cable near `position` and the index of the segment hit.
    pub fn connection_at(&self, position: Point) -> Option<(ConnectionKey, usize)> {
        let tolerance = self.settings.routing.hit_tolerance;
        for &key in self.scene.connection_keys().iter().rev() {
            let (Some(connection), Some((start, end))) = (self.scene.connection(key), self.scene.connection_anchors(key))
            else {
                continue;
            };
            let points = connection.route.polyline(start, end);
            if let Some(index) = hit_test(&points, position, tolerance) {
                return Some((key, index));
            }
        }
        None
    }

    /// Iolet under `position`; nothing is targetable while locked.
    pub fn iolet_at(&self, position: Point) -> Option<IoletId> {
        if self.locked {
            return None;
        }
        crate::iolet::iolet_at(&self.scene, position)
    }

    // ────────────────────────────────────────────────────────────────────
    // Selection
    // ────────────────────────────────────────────────────────────────────

    pub fn select_object(&mut self, key: ObjectKey, toggle: bool) {
        if self.locked || self.scene.object(key).is_none() {
            return;
        }
        if toggle {
            self.selection.toggle_object(key);
        } else {
            self.selection.select_object(key);
        }
        self.selection.apply_flags(&mut self.scene);
    }

    pub fn select_connection(&mut self, key: ConnectionKey, toggle: bool) {
        if self.locked || self.scene.connection(key).is_none() {
            return;
        }
        if toggle {
            self.selection.toggle_connection(key);
        } else {
            self.selection.select_connection(key);
        }
        self.selection.apply_flags(&mut self.scene);
    }

    pub fn deselect_all(&mut self) {
        self.selection.clear();
        self.selection.apply_flags(&mut self.scene);
    }

    /// Start a lasso on empty canvas. The previous selection is dropped.
    pub fn begin_lasso(&mut self, position: Point) -> bool {
        if self.locked || !self.drag.is_none() {
            return false;
        }
        self.deselect_all();
        self.selection.start_lasso(position);
        self.drag = DragMode::Lasso;
        true
    }

    pub fn update_lasso(&mut self, position: Point) {
        if self.drag == DragMode::Lasso {
            self.selection.update_lasso(position);
        }
    }

    /// Finish the lasso and return how many items it selected.
    pub fn end_lasso(&mut self) -> usize {
        if self.drag != DragMode::Lasso {
            return 0;
        }
        self.drag = DragMode::None;
        let count = self.selection.finish_lasso(&self.scene).unwrap_or(0);
        self.selection.apply_flags(&mut self.scene);
        count
    }

    // ────────────────────────────────────────────────────────────────────
    // Moving objects
    // ────────────────────────────────────────────────────────────────────

    /// Mouse-down on an object. An unselected object becomes the selection.
    pub fn begin_move(&mut self, grabbed: ObjectKey, position: Point) -> bool {
        if self.locked || !self.drag.is_none() || self.scene.object(grabbed).is_none() {
            return false;
        }
        if !self.selection.contains_object(grabbed) {
            self.selection.select_object(grabbed);
            self.selection.apply_flags(&mut self.scene);
        }
        for &key in self.selection.objects() {
            if let Some(object) = self.scene.object_mut(key) {
                object.original_bounds = object.bounds;
            }
        }
        self.grid.clear_all();
        self.drag = DragMode::Objects {
            grabbed,
            start: position,
            offset: Point::ORIGIN,
        };
        true
    }

    /// Mouse-drag while moving. Returns the snapped offset now applied to
    /// every selected object.
    pub fn drag_move(&mut self, position: Point, bypass: bool, now: Instant) -> Point {
        let DragMode::Objects { grabbed, start, .. } = self.drag else {
            return Point::ORIGIN;
        };
        let Some(original) = self.scene.object(grabbed).map(|o| o.original_bounds) else {
            return Point::ORIGIN;
        };
        let others = self.unselected_bounds_in_view(None);
        let cables = self.cable_ends(grabbed);
        let request = MoveRequest {
            original,
            offset: position - start,
            others: &others,
            cables: &cables,
            origin: self.grid_origin,
            bypass,
        };
        let offset = self.grid.perform_move(&request, now);
        self.apply_move_offset(offset);
        if let DragMode::Objects { offset: current, .. } = &mut self.drag {
            *current = offset;
        }
        offset
    }

    /// Mouse-up after a move: commit the offset in one undo sequence.
    pub fn end_move<D>(&mut self, doc: &mut D, now: Instant) -> Result<Point, CanvasError>
    where
        D: PatchDocument + ?Sized,
    {
        let DragMode::Objects { offset, .. } = std::mem::take(&mut self.drag) else {
            return Ok(Point::ORIGIN);
        };
        let offset = self.grid.handle_mouse_up(offset);
        self.apply_move_offset(offset);
        if offset == Point::ORIGIN {
            return Ok(offset);
        }

        let moved: Vec<ObjectKey> = self.selection.objects().to_vec();
        let handles: Vec<ObjectHandle> = moved
            .iter()
            .filter_map(|&key| self.scene.object(key).and_then(|o| o.handle))
            .collect();
        // A failed write may leave the document half moved; resync either way.
        self.request_synchronise();
        with_undo_sequence(doc, MOVE_LABEL, |doc| {
            for &handle in &handles {
                doc.move_object(handle, offset.x, offset.y)?;
            }
            Ok(())
        })?;

        if self.settings.routing.auto_route_on_overlap {
            self.route_blocked_connections(doc, &moved, now)?;
        }
        Ok(offset)
    }

    fn apply_move_offset(&mut self, offset: Point) {
        let keys: Vec<ObjectKey> = self.selection.objects().to_vec();
        for &key in &keys {
            if let Some(object) = self.scene.object_mut(key) {
                object.bounds = object.original_bounds.translated(offset);
            }
        }
        self.reanchor_connections(&keys);
    }

    /// Bounds of unselected objects in the viewport, optionally skipping one more.
    fn unselected_bounds_in_view(&self, skip: Option<ObjectKey>) -> Vec<Rect> {
        self.scene
            .objects()
            .filter(|(key, o)| {
                Some(*key) != skip && !self.selection.contains_object(*key) && self.viewport.is_visible(&o.bounds)
            })
            .map(|(_, o)| o.bounds)
            .collect()
    }

    /// Cables between the grabbed object and unselected objects, with the
    /// grabbed side taken at its drag-start position.
    fn cable_ends(&self, grabbed: ObjectKey) -> Vec<CableEnds> {
        let Some(object) = self.scene.object(grabbed) else {
            return Vec::new();
        };
        let origin = object.original_bounds.position();
        self.scene
            .connections()
            .filter_map(|(_, c)| {
                let dragged_is_inlet = c.inlet.object == grabbed;
                if dragged_is_inlet == (c.outlet.object == grabbed) {
                    return None;
                }
                let (own, other) = if dragged_is_inlet { (c.inlet, c.outlet) } else { (c.outlet, c.inlet) };
                if self.selection.contains_object(other.object) {
                    return None;
                }
                let own_bounds = object.iolet(own.kind, own.index)?.local_bounds().translated(origin);
                let other_bounds = self.scene.iolet_bounds(other)?;
                let (outlet, inlet) = if dragged_is_inlet { (other_bounds, own_bounds) } else { (own_bounds, other_bounds) };
                Some(CableEnds {
                    outlet,
                    inlet,
                    dragged_is_inlet,
                })
            })
            .collect()
    }

    /// Follow moved objects with their cables. A plan with both ends moved
    /// travels along whole.
    fn reanchor_connections(&mut self, moved: &[ObjectKey]) {
        let keys: Vec<ConnectionKey> = self
            .scene
            .connections()
            .filter(|(_, c)| moved.iter().any(|&k| c.touches(k)))
            .map(|(key, _)| key)
            .collect();
        for key in keys {
            let Some((start, end)) = self.scene.connection_anchors(key) else {
                continue;
            };
            let Some(connection) = self.scene.connection_mut(key) else {
                continue;
            };
            let both = moved.contains(&connection.outlet.object) && moved.contains(&connection.inlet.object);
            connection.route = match &connection.route {
                Route::Segmented(points) if both && !points.is_empty() => {
                    let delta = start - points[0];
                    Route::Segmented(points.iter().map(|&p| p + delta).collect())
                }
                route => update_path(route, start, end),
            };
        }
    }

    /// Reroute cables of `moved` objects that now cross another object.
    fn route_blocked_connections<D>(&mut self, doc: &mut D, moved: &[ObjectKey], now: Instant) -> Result<usize, CanvasError>
    where
        D: PatchDocument + ?Sized,
    {
        let keys: Vec<ConnectionKey> = self
            .scene
            .connections()
            .filter(|(_, c)| moved.iter().any(|&k| c.touches(k)))
            .map(|(key, _)| key)
            .collect();
        let mut rerouted = 0;
        for key in keys {
            let (Some(connection), Some((start, end))) = (self.scene.connection(key), self.scene.connection_anchors(key))
            else {
                continue;
            };
            let obstacles = self
                .scene
                .obstacles_excluding(&[connection.outlet.object, connection.inlet.object]);
            let points = connection.route.polyline(start, end);
            let blocked = segments(&points).any(|s| obstacles.iter().any(|r| s.intersects_rect(r)));
            if blocked && self.find_path(doc, key, now)?.is_some() {
                rerouted += 1;
            }
        }
        Ok(rerouted)
    }

    // ────────────────────────────────────────────────────────────────────
    // Resizing
    // ────────────────────────────────────────────────────────────────────

    pub fn begin_resize(&mut self, object: ObjectKey, edges: ResizeEdges, position: Point) -> bool {
        if self.locked || !self.drag.is_none() {
            return false;
        }
        let Some(target) = self.scene.object_mut(object) else {
            return false;
        };
        if !target.widget.can_resize() {
            return false;
        }
        target.original_bounds = target.bounds;
        self.grid.clear_all();
        self.drag = DragMode::Resize {
            object,
            edges,
            start: position,
            offset: Point::ORIGIN,
        };
        true
    }

    /// Mouse-drag while resizing. Returns the new bounds, margin included.
    pub fn drag_resize(&mut self, position: Point, bypass: bool, now: Instant) -> Option<Rect> {
        let DragMode::Resize { object, edges, start, .. } = self.drag else {
            return None;
        };
        let (original, ratio, minimum) = {
            let target = self.scene.object(object)?;
            (target.original_bounds, target.widget.fixed_ratio(), target.widget.minimum_size())
        };
        let others = self.unselected_bounds_in_view(Some(object));
        let request = ResizeRequest {
            original,
            offset: position - start,
            edges,
            fixed_ratio: ratio,
            others: &others,
            origin: self.grid_origin,
            bypass,
        };
        let offset = self.grid.perform_resize(&request, now);
        let bounds = clamp_to_minimum(edges.apply(original, offset), edges, minimum);

        let target = self.scene.object_mut(object)?;
        target.bounds = bounds;
        target.layout_iolets();
        self.reanchor_connections(&[object]);
        if let DragMode::Resize { offset: current, .. } = &mut self.drag {
            *current = offset;
        }
        Some(bounds)
    }

    /// Mouse-up after a resize: write the new content bounds.
    pub fn end_resize<D>(&mut self, doc: &mut D) -> Result<Option<Rect>, CanvasError>
    where
        D: PatchDocument + ?Sized,
    {
        let DragMode::Resize { object, .. } = std::mem::take(&mut self.drag) else {
            return Ok(None);
        };
        self.grid.clear_all();
        let Some(target) = self.scene.object(object) else {
            return Ok(None);
        };
        let content = target.content_bounds();
        if target.bounds == target.original_bounds {
            return Ok(Some(content));
        }
        if let Some(handle) = target.handle {
            self.request_synchronise();
            with_undo_sequence(doc, RESIZE_LABEL, |doc| doc.set_object_bounds(handle, content))?;
        }
        Ok(Some(content))
    }

    // ────────────────────────────────────────────────────────────────────
    // Delete and align
    // ────────────────────────────────────────────────────────────────────

    /// Remove the selected cables and objects in one undo sequence. Returns
    /// the number of removed items.
    pub fn delete_selection<D>(&mut self, doc: &mut D) -> Result<usize, CanvasError>
    where
        D: PatchDocument + ?Sized,
    {
        if self.locked || self.selection.is_empty() {
            return Ok(0);
        }
        let objects: Vec<ObjectKey> = self.selection.objects().to_vec();
        let mut handles = Vec::new();
        let mut uncommitted = Vec::new();
        for &key in &objects {
            match self.scene.object(key).map(|o| o.handle) {
                Some(Some(handle)) => handles.push(handle),
                Some(None) => uncommitted.push(key),
                None => {}
            }
        }

        // Cables of removed objects go with them; only the rest are removed one by one.
        let mut cables = Vec::new();
        for &key in self.selection.connections() {
            let Some(connection) = self.scene.connection(key) else {
                continue;
            };
            self.updater.cancel(connection.handle);
            if objects.iter().any(|&o| connection.touches(o)) {
                continue;
            }
            let owner = |id: IoletId| self.scene.object(id.object).and_then(|o| o.handle);
            if let (Some(outlet_owner), Some(inlet_owner)) = (owner(connection.outlet), owner(connection.inlet)) {
                cables.push((outlet_owner, connection.outlet.index, inlet_owner, connection.inlet.index, connection.path_state.clone()));
            }
        }
        for &key in &objects {
            for connection in self.scene.connections_of(key) {
                if let Some(c) = self.scene.connection(connection) {
                    self.updater.cancel(c.handle);
                }
            }
        }

        let removed = cables.len() + handles.len() + uncommitted.len();
        if !cables.is_empty() || !handles.is_empty() {
            self.request_synchronise();
            with_undo_sequence(doc, REMOVE_LABEL, |doc| {
                for (outlet_owner, outlet, inlet_owner, inlet, path_state) in &cables {
                    doc.remove_connection(*outlet_owner, *outlet, *inlet_owner, *inlet, path_state)?;
                }
                if !handles.is_empty() {
                    doc.remove_objects(&handles)?;
                }
                Ok(())
            })?;
        }
        for key in uncommitted {
            self.scene.remove_object(key);
        }
        self.selection.clear();
        self.selection.apply_flags(&mut self.scene);
        Ok(removed)
    }

    /// Line up the selected objects. Returns how many objects moved.
    pub fn align_selection<D>(&mut self, doc: &mut D, alignment: Alignment) -> Result<usize, CanvasError>
    where
        D: PatchDocument + ?Sized,
    {
        if self.locked {
            return Ok(0);
        }
        let items: Vec<(ObjectKey, ObjectHandle, Rect)> = self
            .selection
            .objects()
            .iter()
            .filter_map(|&key| {
                let object = self.scene.object(key)?;
                Some((key, object.handle?, object.content_bounds()))
            })
            .collect();
        if items.len() < 2 {
            return Ok(0);
        }

        let rects = || items.iter().map(|(_, _, r)| *r);
        let average = |f: fn(&Rect) -> i32| (rects().map(|r| f(&r) as i64).sum::<i64>() / items.len() as i64) as i32;
        let target = match alignment {
            Alignment::Left => rects().map(|r| r.x).min().unwrap_or_default(),
            Alignment::Right => rects().map(|r| r.right()).max().unwrap_or_default(),
            Alignment::Top => rects().map(|r| r.y).min().unwrap_or_default(),
            Alignment::Bottom => rects().map(|r| r.bottom()).max().unwrap_or_default(),
            Alignment::CentreX => average(Rect::centre_x),
            Alignment::CentreY => average(Rect::centre_y),
        };

        let moves: Vec<(ObjectKey, ObjectHandle, Point)> = items
            .iter()
            .filter_map(|&(key, handle, r)| {
                let position = match alignment {
                    Alignment::Left => r.position().with_x(target),
                    Alignment::Right => r.position().with_x(target - r.width),
                    Alignment::Top => r.position().with_y(target),
                    Alignment::Bottom => r.position().with_y(target - r.height),
                    Alignment::CentreX => r.position().with_x(target - r.width / 2),
                    Alignment::CentreY => r.position().with_y(target - r.height / 2),
                };
                (position != r.position()).then_some((key, handle, position))
            })
            .collect();
        if moves.is_empty() {
            return Ok(0);
        }

        self.request_synchronise();
        with_undo_sequence(doc, ALIGN_LABEL, |doc| {
            for (_, handle, position) in &moves {
                doc.move_object_to(*handle, position.x, position.y)?;
            }
            Ok(())
        })?;

        let keys: Vec<ObjectKey> = moves.iter().map(|(key, _, _)| *key).collect();
        for (key, _, position) in &moves {
            if let Some(object) = self.scene.object_mut(*key) {
                object.bounds = object
                    .bounds
                    .with_position(*position - Point::new(OBJECT_MARGIN, OBJECT_MARGIN));
            }
        }
        self.reanchor_connections(&keys);
        Ok(moves.len())
    }

    // ────────────────────────────────────────────────────────────────────
    // Drawing connections
    // ────────────────────────────────────────────────────────────────────

    /// Mouse-down on an iolet. With `multi` and the owner selected, the
    /// same iolet of every other selected object joins the gesture.
    pub fn begin_connection(&mut self, iolet: IoletId, multi: bool) -> bool {
        if self.locked || !self.drag.is_none() {
            return false;
        }
        let Some(cursor) = self.scene.anchor(iolet) else {
            return false;
        };
        let mut sources = vec![iolet];
        if multi && self.selection.contains_object(iolet.object) {
            for &key in self.selection.objects() {
                let candidate = IoletId { object: key, ..iolet };
                if key != iolet.object && self.scene.iolet(candidate).is_some() {
                    sources.push(candidate);
                }
            }
        }
        self.drag = DragMode::Connection(PendingConnection { sources, cursor });
        true
    }

    /// Mouse-drag while connecting: the nearest suitable iolet becomes the target.
    pub fn drag_connection(&mut self, position: Point) -> Option<IoletId> {
        let DragMode::Connection(pending) = &mut self.drag else {
            return None;
        };
        pending.cursor = position;
        let source = *pending.sources.first()?;
        let target = find_nearest_iolet(&self.scene, position, source.kind.opposite(), source.object);
        self.target.set(&mut self.scene, target);
        target
    }

    /// Mouse-up while connecting: one connection per source to the target,
    /// all in one undo sequence. Pairs the document refuses are skipped.
    pub fn end_connection<D>(&mut self, doc: &mut D) -> Vec<ConnectionHandle>
    where
        D: PatchDocument + ?Sized,
    {
        let DragMode::Connection(pending) = std::mem::take(&mut self.drag) else {
            return Vec::new();
        };
        let target = self.target.current();
        self.target.clear(&mut self.scene);
        let Some(target) = target else {
            return Vec::new();
        };

        let pairs: Vec<(ObjectHandle, usize, ObjectHandle, usize)> = pending
            .sources
            .iter()
            .filter_map(|&source| {
                if source.object == target.object || source.kind == target.kind {
                    return None;
                }
                let (outlet, inlet) = match source.kind {
                    IoletKind::Outlet => (source, target),
                    IoletKind::Inlet => (target, source),
                };
                if self.scene.connection_exists(outlet, inlet) {
                    return None;
                }
                let outlet_owner = self.scene.object(outlet.object)?.handle?;
                let inlet_owner = self.scene.object(inlet.object)?.handle?;
                Some((outlet_owner, outlet.index, inlet_owner, inlet.index))
            })
            .collect();
        if pairs.is_empty() {
            return Vec::new();
        }

        doc.start_undo_sequence(CONNECT_LABEL);
        let mut created = Vec::with_capacity(pairs.len());
        for (outlet_owner, outlet, inlet_owner, inlet) in pairs {
            match doc.create_connection(outlet_owner, outlet, inlet_owner, inlet) {
                Ok(handle) => created.push(handle),
                Err(err) => debug!(%err, "connection refused"),
            }
        }
        doc.end_undo_sequence(CONNECT_LABEL);
        self.request_synchronise();
        created
    }

    pub fn cancel_connection(&mut self) {
        if matches!(self.drag, DragMode::Connection(_)) {
            self.drag = DragMode::None;
            self.target.clear(&mut self.scene);
        }
    }

    // ────────────────────────────────────────────────────────────────────
    // Cable segments
    // ────────────────────────────────────────────────────────────────────

    /// Mouse-down on a cable. A straight cable is turned into a default plan
    /// whose middle run is then the segment being dragged.
    pub fn begin_segment_drag(&mut self, key: ConnectionKey, position: Point) -> bool {
        if self.locked || !self.drag.is_none() {
            return false;
        }
        let (Some(connection), Some((start, end))) = (self.scene.connection(key), self.scene.connection_anchors(key)) else {
            return false;
        };
        let (plan, index) = match &connection.route {
            Route::Segmented(points) => {
                let Some(index) = hit_test(points, position, self.settings.routing.hit_tolerance) else {
                    return false;
                };
                (points.clone(), index)
            }
            Route::Straight => {
                let plan = default_plan(start, end);
                let index = default_plan_segment(&plan);
                (plan, index)
            }
        };
        if !is_draggable_segment(&plan, index) {
            return false;
        }
        self.drag = DragMode::Segment(SegmentDrag {
            connection: key,
            index,
            start: position,
            original: connection.route.clone(),
            plan,
            moved: false,
        });
        true
    }

    /// Mouse-drag on a cable segment. Returns false when nothing moved; a
    /// cable whose ends are gone ends the drag.
    pub fn drag_segment(&mut self, position: Point) -> bool {
        let key = match &self.drag {
            DragMode::Segment(drag) => drag.connection,
            _ => return false,
        };
        let Some((start, end)) = self.scene.connection_anchors(key) else {
            debug!("dragged cable lost an endpoint");
            self.drag = DragMode::None;
            return false;
        };
        let DragMode::Segment(drag) = &mut self.drag else {
            return false;
        };
        let mut points = drag.plan.clone();
        if !drag_segment(&mut points, drag.index, position - drag.start) {
            return false;
        }
        drag.moved = true;
        let route = update_path(&Route::Segmented(points), start, end);
        if let Some(connection) = self.scene.connection_mut(key) {
            connection.route = route;
        }
        true
    }

    /// Mouse-up on a cable segment: queue the new route for the document.
    pub fn end_segment_drag<D>(&mut self, doc: &mut D, now: Instant) -> Result<bool, CanvasError>
    where
        D: PatchDocument + ?Sized,
    {
        let DragMode::Segment(drag) = std::mem::take(&mut self.drag) else {
            return Ok(false);
        };
        if !drag.moved {
            return Ok(false);
        }
        let Some(connection) = self.scene.connection(drag.connection) else {
            return Ok(false);
        };
        let token = route_token(&connection.route)?;
        self.push_path_state(doc, drag.connection, token, now);
        Ok(true)
    }

    /// Escape during a segment drag: the cable goes back to how it was.
    pub fn cancel_segment_drag(&mut self) {
        if let DragMode::Segment(drag) = std::mem::take(&mut self.drag) {
            if let Some(connection) = self.scene.connection_mut(drag.connection) {
                connection.route = drag.original;
            }
        }
    }

    /// Abandon whatever is being dragged without touching the document.
    pub fn cancel_drag(&mut self) {
        match std::mem::take(&mut self.drag) {
            DragMode::None => {}
            DragMode::Objects { .. } => {
                let keys: Vec<ObjectKey> = self.selection.objects().to_vec();
                for &key in &keys {
                    if let Some(object) = self.scene.object_mut(key) {
                        object.bounds = object.original_bounds;
                    }
                }
                self.reanchor_connections(&keys);
                self.grid.clear_all();
            }
            DragMode::Resize { object, .. } => {
                if let Some(target) = self.scene.object_mut(object) {
                    target.bounds = target.original_bounds;
                    target.layout_iolets();
                }
                self.reanchor_connections(&[object]);
                self.grid.clear_all();
            }
            DragMode::Connection(_) => self.target.clear(&mut self.scene),
            drag @ DragMode::Segment(_) => {
                self.drag = drag;
                self.cancel_segment_drag();
            }
            DragMode::Lasso => self.selection.cancel_lasso(),
        }
    }

    // ────────────────────────────────────────────────────────────────────
    // Routing
    // ────────────────────────────────────────────────────────────────────

    /// Route a cable around the other objects and queue the result. Returns
    /// `None` when the cable's ends do not resolve.
    pub fn find_path<D>(&mut self, doc: &mut D, key: ConnectionKey, now: Instant) -> Result<Option<Route>, CanvasError>
    where
        D: PatchDocument + ?Sized,
    {
        let (Some(connection), Some((start, end))) = (self.scene.connection(key), self.scene.connection_anchors(key)) else {
            return Ok(None);
        };
        let obstacles = self
            .scene
            .obstacles_excluding(&[connection.outlet.object, connection.inlet.object]);
        let route = path::find_path(start, end, &obstacles, &self.settings.routing);
        let token = route_token(&route)?;
        if let Some(connection) = self.scene.connection_mut(key) {
            connection.route = route.clone();
        }
        self.push_path_state(doc, key, token, now);
        Ok(Some(route))
    }

    /// Turn a cable back into a straight one.
    pub fn reset_path<D>(&mut self, doc: &mut D, key: ConnectionKey, now: Instant) -> bool
    where
        D: PatchDocument + ?Sized,
    {
        let Some(connection) = self.scene.connection_mut(key) else {
            return false;
        };
        connection.route = Route::Straight;
        self.push_path_state(doc, key, String::new(), now);
        true
    }

    /// Re-anchor a cable's plan to its current iolet positions.
    pub fn update_path(&mut self, key: ConnectionKey) -> bool {
        let Some((start, end)) = self.scene.connection_anchors(key) else {
            return false;
        };
        let Some(connection) = self.scene.connection_mut(key) else {
            return false;
        };
        let route = update_path(&connection.route, start, end);
        let changed = route != connection.route;
        connection.route = route;
        changed
    }

    /// Record a new token locally and queue it for the document.
    pub fn push_path_state<D>(&mut self, doc: &mut D, key: ConnectionKey, token: String, now: Instant)
    where
        D: PatchDocument + ?Sized,
    {
        let Some(connection) = self.scene.connection_mut(key) else {
            return;
        };
        connection.path_state.clone_from(&token);
        connection.unsaved = true;
        let handle = connection.handle;
        self.updater.push(doc, handle, token, now);
    }

    /// Timer callback: write due path states and advance snap indicators.
    pub fn tick<D>(&mut self, doc: &mut D, now: Instant) -> usize
    where
        D: PatchDocument + ?Sized,
    {
        let written = self.updater.tick(doc, now);
        if self.updater.is_empty() {
            self.mark_paths_saved();
        }
        self.grid.advance(now);
        written
    }

    /// Write every queued path state now.
    pub fn flush_paths<D>(&mut self, doc: &mut D) -> usize
    where
        D: PatchDocument + ?Sized,
    {
        let written = self.updater.flush(doc);
        self.mark_paths_saved();
        written
    }

    fn mark_paths_saved(&mut self) {
        let keys: Vec<ConnectionKey> = self.scene.connection_keys().to_vec();
        for key in keys {
            if let Some(connection) = self.scene.connection_mut(key) {
                connection.unsaved = false;
            }
        }
    }

    pub fn needs_repaint(&self) -> bool {
        self.grid.needs_repaint()
    }

    // ────────────────────────────────────────────────────────────────────
    // New objects
    // ────────────────────────────────────────────────────────────────────

    /// Put an empty object with its editor open at `position`.
    pub fn place_new_object(&mut self, position: Point) -> Option<ObjectKey> {
        if self.locked {
            return None;
        }
        let key = self.scene.insert_object(CanvasObject::uncommitted(position));
        self.selection.select_object(key);
        self.selection.apply_flags(&mut self.scene);
        Some(key)
    }

    /// Create the typed object in the document. Empty text discards it.
    pub fn commit_new_object<D>(&mut self, doc: &mut D, key: ObjectKey, text: &str) -> Result<Option<ObjectHandle>, CanvasError>
    where
        D: PatchDocument + ?Sized,
    {
        let Some(position) = self
            .scene
            .object(key)
            .filter(|o| o.handle.is_none())
            .map(|o| o.content_bounds().position())
        else {
            return Ok(None);
        };
        let text = text.trim();
        if text.is_empty() {
            self.cancel_new_object(key);
            return Ok(None);
        }
        let handle: Result<ObjectHandle, DocumentError> =
            with_undo_sequence(doc, CREATE_LABEL, |doc| doc.create_object(text, position.x, position.y));
        let handle = handle?;
        if let Some(object) = self.scene.object_mut(key) {
            object.handle = Some(handle);
            object.initial_editor = false;
        }
        self.request_synchronise();
        Ok(Some(handle))
    }

    /// Drop an object that was never committed.
    pub fn cancel_new_object(&mut self, key: ObjectKey) -> bool {
        if !self.scene.object(key).is_some_and(|o| o.handle.is_none()) {
            return false;
        }
        self.scene.remove_object(key);
        self.selection.remove_object(key);
        true
    }
}

/// Keep the content at least `minimum` large by holding back the dragged edges.
fn clamp_to_minimum(bounds: Rect, edges: ResizeEdges, minimum: (i32, i32)) -> Rect {
    let min_width = minimum.0 + 2 * OBJECT_MARGIN;
    let min_height = minimum.1 + 2 * OBJECT_MARGIN;
    let mut result = bounds;
    if result.width < min_width {
        if edges.left {
            result.x = bounds.right() - min_width;
        }
        result.width = min_width;
    }
    if result.height < min_height {
        if edges.top {
            result.y = bounds.bottom() - min_height;
        }
        result.height = min_height;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_patch::{MemoryPatch, PatchObject};
    use crate::settings::{GridMode, GridSettings};

    fn object(text: &str, x: i32, y: i32) -> PatchObject {
        PatchObject {
            text: text.to_string(),
            bounds: Rect::new(x, y, 50, 50),
            inlets: vec![false, false],
            outlets: vec![false],
        }
    }

    fn free_settings() -> CanvasSettings {
        CanvasSettings {
            grid: GridSettings {
                mode: GridMode::Off,
                ..GridSettings::default()
            },
            ..CanvasSettings::default()
        }
    }

    /// Three objects in a row; the first is wired into the other two.
    fn make_test_canvas() -> (Canvas, MemoryPatch, [ObjectHandle; 3]) {
        let mut patch = MemoryPatch::new();
        let a = patch.insert_object(object("osc~", 100, 100));
        let b = patch.insert_object(object("dac~", 300, 100));
        let c = patch.insert_object(object("print", 500, 100));
        patch.insert_connection(a, 0, b, 0).unwrap();
        patch.insert_connection(a, 0, c, 1).unwrap();
        let mut canvas = Canvas::new(free_settings());
        canvas.synchronise(&mut patch);
        (canvas, patch, [a, b, c])
    }

    fn key(canvas: &Canvas, handle: ObjectHandle) -> ObjectKey {
        canvas.scene().find_object(handle).unwrap()
    }

    #[test]
    fn test_move_commits_one_undo_entry() {
        let (mut canvas, mut patch, [a, b, _]) = make_test_canvas();
        let now = Instant::now();
        canvas.select_object(key(&canvas, a), false);
        canvas.select_object(key(&canvas, b), true);

        assert!(canvas.begin_move(key(&canvas, a), Point::new(120, 120)));
        canvas.drag_move(Point::new(130, 125), false, now);
        assert_eq!(canvas.drag_move(Point::new(140, 160), false, now), Point::new(20, 40));

        let depth = patch.history().undo_depth();
        assert_eq!(canvas.end_move(&mut patch, now).unwrap(), Point::new(20, 40));
        assert_eq!(patch.history().undo_depth(), depth + 1);
        assert_eq!(patch.history().last_label(), Some(MOVE_LABEL));
        assert_eq!(patch.object(a).unwrap().bounds.position(), Point::new(120, 140));
        assert_eq!(patch.object(b).unwrap().bounds.position(), Point::new(320, 140));

        let report = canvas.synchronise(&mut patch);
        assert_eq!(report.objects_updated, 0);
    }

    #[test]
    fn test_begin_move_selects_unselected_object() {
        let (mut canvas, _, [a, b, _]) = make_test_canvas();
        canvas.select_object(key(&canvas, b), false);
        canvas.begin_move(key(&canvas, a), Point::new(110, 110));
        assert_eq!(canvas.selection().objects(), &[key(&canvas, a)]);
        assert!(canvas.scene().object(key(&canvas, a)).unwrap().selected);
        assert!(!canvas.scene().object(key(&canvas, b)).unwrap().selected);
    }

    #[test]
    fn test_cancel_move_restores_bounds() {
        let (mut canvas, _, [a, _, _]) = make_test_canvas();
        let k = key(&canvas, a);
        let before = canvas.scene().object(k).unwrap().bounds;
        canvas.begin_move(k, Point::new(110, 110));
        canvas.drag_move(Point::new(160, 190), false, Instant::now());
        assert_ne!(canvas.scene().object(k).unwrap().bounds, before);
        canvas.cancel_drag();
        assert_eq!(canvas.scene().object(k).unwrap().bounds, before);
        assert!(canvas.drag().is_none());
    }

    #[test]
    fn test_delete_object_takes_its_connections() {
        let (mut canvas, mut patch, [a, _, _]) = make_test_canvas();
        canvas.select_object(key(&canvas, a), false);
        assert_eq!(canvas.delete_selection(&mut patch).unwrap(), 1);
        assert_eq!(patch.history().last_label(), Some(REMOVE_LABEL));
        assert!(canvas.is_sync_pending());

        let report = canvas.on_idle(&mut patch).unwrap();
        assert_eq!(report.objects_removed, 1);
        assert_eq!(report.connections_removed, 2);
        assert_eq!(canvas.scene().connection_count(), 0);
        assert!(canvas.selection().is_empty());
    }

    #[test]
    fn test_delete_selected_connection_only() {
        let (mut canvas, mut patch, _) = make_test_canvas();
        let first = canvas.scene().connection_keys()[0];
        canvas.select_connection(first, false);
        assert_eq!(canvas.delete_selection(&mut patch).unwrap(), 1);
        canvas.synchronise(&mut patch);
        assert_eq!(canvas.scene().connection_count(), 1);
        assert_eq!(canvas.scene().object_count(), 3);
    }

    #[test]
    fn test_connection_drag_targets_nearest_inlet() {
        let (mut canvas, mut patch, [_, b, c]) = make_test_canvas();
        let outlet = IoletId::outlet(key(&canvas, b), 0);
        assert!(canvas.begin_connection(outlet, false));

        let inlet = IoletId::inlet(key(&canvas, c), 0);
        let anchor = canvas.scene().anchor(inlet).unwrap();
        assert_eq!(canvas.drag_connection(anchor + Point::new(2, -3)), Some(inlet));
        assert!(canvas.scene().iolet(inlet).unwrap().targeted);

        let created = canvas.end_connection(&mut patch);
        assert_eq!(created.len(), 1);
        assert_eq!(crate::iolet::targeted_count(canvas.scene()), 0);
        assert_eq!(patch.history().last_label(), Some(CONNECT_LABEL));
        canvas.synchronise(&mut patch);
        assert_eq!(canvas.scene().connection_count(), 3);
    }

    #[test]
    fn test_auto_patching_connects_every_selected_source() {
        let mut patch = MemoryPatch::new();
        let a = patch.insert_object(object("f", 100, 100));
        let b = patch.insert_object(object("f", 200, 100));
        let sink = patch.insert_object(object("pack", 150, 300));
        let mut canvas = Canvas::new(free_settings());
        canvas.synchronise(&mut patch);

        canvas.select_object(key(&canvas, a), false);
        canvas.select_object(key(&canvas, b), true);
        assert!(canvas.begin_connection(IoletId::outlet(key(&canvas, a), 0), true));
        let inlet = IoletId::inlet(key(&canvas, sink), 1);
        let anchor = canvas.scene().anchor(inlet).unwrap();
        canvas.drag_connection(anchor);

        let depth = patch.history().undo_depth();
        assert_eq!(canvas.end_connection(&mut patch).len(), 2);
        assert_eq!(patch.history().undo_depth(), depth + 1);
    }

    #[test]
    fn test_cancel_connection_leaves_nothing_behind() {
        let (mut canvas, mut patch, [_, b, c]) = make_test_canvas();
        canvas.begin_connection(IoletId::outlet(key(&canvas, b), 0), false);
        let inlet = IoletId::inlet(key(&canvas, c), 0);
        canvas.drag_connection(canvas.scene().anchor(inlet).unwrap());
        canvas.cancel_connection();

        assert_eq!(crate::iolet::targeted_count(canvas.scene()), 0);
        assert!(canvas.end_connection(&mut patch).is_empty());
        assert_eq!(canvas.scene().connection_count(), 2);
    }

    #[test]
    fn test_segment_drag_survives_sync_until_written() {
        let (mut canvas, mut patch, _) = make_test_canvas();
        let now = Instant::now();
        let cable = canvas.scene().connection_keys()[0];
        let (start, end) = canvas.scene().connection_anchors(cable).unwrap();
        let grab = Point::new((start.x + end.x) / 2, start.y + (end.y - start.y) / 2);

        assert!(canvas.begin_segment_drag(cable, grab));
        assert!(canvas.drag_segment(grab + Point::new(0, 20)));
        assert!(canvas.end_segment_drag(&mut patch, now).unwrap());
        let route = canvas.scene().connection(cable).unwrap().route.clone();
        assert!(route.is_segmented());
        assert!(canvas.scene().connection(cable).unwrap().unsaved);

        // The document still holds the old token; the local edit must stay.
        canvas.synchronise(&mut patch);
        assert_eq!(canvas.scene().connection(cable).unwrap().route, route);

        let handle = canvas.scene().connection(cable).unwrap().handle;
        canvas.tick(&mut patch, now + std::time::Duration::from_millis(60));
        assert!(!canvas.scene().connection(cable).unwrap().unsaved);
        assert!(!patch.connection(handle).unwrap().path_state.is_empty());
        assert_eq!(patch.history().last_label(), Some(crate::path::updater::UPDATE_PATH_LABEL));
    }

    #[test]
    fn test_cancel_segment_drag_restores_route() {
        let (mut canvas, _, _) = make_test_canvas();
        let cable = canvas.scene().connection_keys()[0];
        let (start, end) = canvas.scene().connection_anchors(cable).unwrap();
        let grab = Point::new(start.x, (start.y + end.y) / 2);
        canvas.begin_segment_drag(cable, grab);
        canvas.drag_segment(grab + Point::new(0, 30));
        canvas.cancel_segment_drag();
        assert_eq!(canvas.scene().connection(cable).unwrap().route, Route::Straight);
        assert!(canvas.updater().is_empty());
    }

    #[test]
    fn test_locked_canvas_ignores_gestures() {
        let (mut canvas, _, [a, b, _]) = make_test_canvas();
        canvas.set_locked(true);
        let k = key(&canvas, a);
        assert!(!canvas.begin_move(k, Point::new(110, 110)));
        assert!(!canvas.begin_connection(IoletId::outlet(key(&canvas, b), 0), false));
        assert!(!canvas.begin_lasso(Point::ORIGIN));
        assert!(canvas.place_new_object(Point::ORIGIN).is_none());
        let outlet_centre = canvas.scene().anchor(IoletId::outlet(k, 0)).unwrap();
        assert_eq!(canvas.iolet_at(outlet_centre), None);
        canvas.select_object(k, false);
        assert!(canvas.selection().is_empty());
    }

    #[test]
    fn test_lasso_selects_objects_and_cables() {
        let (mut canvas, _, [a, b, c]) = make_test_canvas();
        assert!(canvas.begin_lasso(Point::new(90, 90)));
        canvas.update_lasso(Point::new(360, 160));
        let count = canvas.end_lasso();

        let selection = canvas.selection();
        assert!(selection.contains_object(key(&canvas, a)));
        assert!(selection.contains_object(key(&canvas, b)));
        assert!(!selection.contains_object(key(&canvas, c)));
        // Both cables start at the first object's outlet, inside the lasso.
        assert_eq!(selection.connections().len(), 2);
        assert_eq!(count, 4);
    }

    #[test]
    fn test_align_left_in_one_sequence() {
        let mut patch = MemoryPatch::new();
        let a = patch.insert_object(object("f", 100, 100));
        let b = patch.insert_object(object("f", 130, 200));
        let c = patch.insert_object(object("f", 90, 300));
        let mut canvas = Canvas::new(free_settings());
        canvas.synchronise(&mut patch);
        for (i, h) in [a, b, c].into_iter().enumerate() {
            canvas.select_object(key(&canvas, h), i > 0);
        }

        assert_eq!(canvas.align_selection(&mut patch, Alignment::Left).unwrap(), 2);
        assert_eq!(patch.history().undo_depth(), 1);
        for h in [a, b, c] {
            assert_eq!(patch.object(h).unwrap().bounds.x, 90);
        }
        assert_eq!(canvas.scene().object(key(&canvas, a)).unwrap().content_bounds().x, 90);
    }

    #[test]
    fn test_resize_respects_minimum_size() {
        let (mut canvas, mut patch, [a, _, _]) = make_test_canvas();
        let k = key(&canvas, a);
        let now = Instant::now();
        assert!(canvas.begin_resize(k, ResizeEdges::BOTTOM_RIGHT, Point::new(155, 155)));
        let bounds = canvas.drag_resize(Point::new(60, 60), false, now).unwrap();
        let minimum = canvas.scene().object(k).unwrap().widget.minimum_size();
        assert_eq!(bounds.reduced(OBJECT_MARGIN).width, minimum.0);
        assert_eq!(bounds.reduced(OBJECT_MARGIN).height, minimum.1);

        let content = canvas.end_resize(&mut patch).unwrap().unwrap();
        assert_eq!(patch.object(a).unwrap().bounds, content);
        assert_eq!(patch.history().last_label(), Some(RESIZE_LABEL));
    }

    #[test]
    fn test_new_object_commit_keeps_its_key() {
        let mut patch = MemoryPatch::new();
        let mut canvas = Canvas::new(free_settings());
        let k = canvas.place_new_object(Point::new(40, 40)).unwrap();

        // A sync while typing must not drop the placeholder.
        canvas.synchronise(&mut patch);
        assert!(canvas.scene().object(k).is_some());

        let handle = canvas.commit_new_object(&mut patch, k, "metro 100").unwrap().unwrap();
        canvas.synchronise(&mut patch);
        assert_eq!(canvas.scene().find_object(handle), Some(k));
        assert_eq!(canvas.scene().object(k).unwrap().kind(), "metro");
        assert_eq!(patch.object(handle).unwrap().bounds.position(), Point::new(40, 40));
    }

    #[test]
    fn test_empty_new_object_is_discarded() {
        let mut patch = MemoryPatch::new();
        let mut canvas = Canvas::new(free_settings());
        let k = canvas.place_new_object(Point::new(40, 40)).unwrap();
        assert_eq!(canvas.commit_new_object(&mut patch, k, "   ").unwrap(), None);
        assert_eq!(canvas.scene().object_count(), 0);
        assert!(canvas.selection().is_empty());
    }

    #[test]
    fn test_clamp_to_minimum_holds_left_edge_back() {
        let clamped = clamp_to_minimum(
            Rect::new(80, 0, 10, 40),
            ResizeEdges {
                left: true,
                ..ResizeEdges::default()
            },
            (25, 15),
        );
        assert_eq!(clamped, Rect::new(55, 0, 35, 40));
    }

    fn single_iolet(text: &str, x: i32, y: i32) -> PatchObject {
        PatchObject {
            text: text.to_string(),
            bounds: Rect::new(x, y, 50, 50),
            inlets: vec![false],
            outlets: vec![false],
        }
    }

    #[test]
    fn test_failed_move_still_requests_sync() {
        let (mut canvas, mut patch, [a, b, _]) = make_test_canvas();
        let now = Instant::now();
        canvas.select_object(key(&canvas, a), false);
        canvas.select_object(key(&canvas, b), true);
        assert!(canvas.begin_move(key(&canvas, a), Point::new(120, 120)));
        canvas.drag_move(Point::new(140, 160), false, now);

        // The second object disappears from the document behind the canvas.
        patch.remove_objects(&[b]).unwrap();
        let result = canvas.end_move(&mut patch, now);
        assert!(matches!(
            result,
            Err(CanvasError::Document(DocumentError::UnknownObject(h))) if h == b
        ));
        assert_eq!(patch.history().open_sequences(), 0);
        assert!(canvas.is_sync_pending());

        let report = canvas.on_idle(&mut patch).unwrap();
        assert_eq!(report.objects_removed, 1);
        assert_eq!(canvas.scene().find_object(b), None);
        let k = key(&canvas, a);
        assert_eq!(
            canvas.scene().object(k).unwrap().content_bounds(),
            patch.object(a).unwrap().bounds
        );
    }

    #[test]
    fn test_vertical_cable_can_be_pushed_sideways() {
        let mut patch = MemoryPatch::new();
        let a = patch.insert_object(single_iolet("f", 100, 100));
        let b = patch.insert_object(single_iolet("print", 100, 300));
        patch.insert_connection(a, 0, b, 0).unwrap();
        let mut canvas = Canvas::new(free_settings());
        canvas.synchronise(&mut patch);
        let cable = canvas.scene().connection_keys()[0];
        let (start, end) = canvas.scene().connection_anchors(cable).unwrap();
        assert_eq!(start.x, end.x);

        let grab = Point::new(start.x, (start.y + end.y) / 2);
        assert!(canvas.begin_segment_drag(cable, grab));
        assert!(canvas.drag_segment(grab + Point::new(40, 0)));
        let Route::Segmented(points) = canvas.scene().connection(cable).unwrap().route.clone() else {
            panic!("dragged cable should be segmented");
        };
        assert_eq!(points.len(), 6);
        assert_eq!(points[2].x, start.x + 40);
        assert_eq!(points[3].x, start.x + 40);
        assert!(crate::path::is_valid_plan(&points));
    }

    #[test]
    fn test_routes_keep_clear_of_object_margins() {
        let mut patch = MemoryPatch::new();
        let a = patch.insert_object(single_iolet("f", 100, 100));
        let b = patch.insert_object(single_iolet("print", 100, 400));
        patch.insert_connection(a, 0, b, 0).unwrap();
        let mut canvas = Canvas::new(free_settings());
        canvas.synchronise(&mut patch);
        let cable = canvas.scene().connection_keys()[0];
        let (start, _) = canvas.scene().connection_anchors(cable).unwrap();

        // Content spans 18 px either side of the cable, so the nearest lattice
        // columns fall inside the margin but outside the content.
        let blocker = patch.insert_object(PatchObject {
            text: "f".to_string(),
            bounds: Rect::new(start.x - 18, 250, 36, 20),
            inlets: Vec::new(),
            outlets: Vec::new(),
        });
        canvas.synchronise(&mut patch);
        let margin_bounds = canvas.scene().object(key(&canvas, blocker)).unwrap().bounds;

        let route = canvas.find_path(&mut patch, cable, Instant::now()).unwrap();
        let Some(Route::Segmented(points)) = route else {
            panic!("blocked cable should be routed");
        };
        for segment in crate::geometry::segments(&points) {
            assert!(!segment.intersects_rect(&margin_bounds), "{segment:?} crosses {margin_bounds:?}");
        }
    }
}
