//! Visual data model of the canvas.
//!
//! Objects and connections live in generation-checked arenas. A connection
//! never holds a reference to an iolet; it stores an [`IoletId`] and resolves
//! it on every access, so a removed object or a shrunk iolet list reads as
//! "gone" instead of dangling.

use crate::document::{ConnectionHandle, ObjectHandle, ObjectInfo};
use crate::geometry::{Point, Rect};
use crate::path::Route;
use crate::widget::{ObjectWidget, create_widget};
use slotmap::{SlotMap, new_key_type};

new_key_type! {
    pub struct ObjectKey;
    pub struct ConnectionKey;
}

/// Border around an object's content used for hit-testing and iolet placement.
pub const OBJECT_MARGIN: i32 = 5;

/// Content size given to an object placed on the canvas before it has text.
pub const NEW_OBJECT_SIZE: (i32, i32) = (60, 20);

// ────────────────────────────────────────────────────────────────────────────
// Iolets
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IoletKind {
    Inlet,
    Outlet,
}

impl IoletKind {
    pub fn opposite(self) -> Self {
        match self {
            IoletKind::Inlet => IoletKind::Outlet,
            IoletKind::Outlet => IoletKind::Inlet,
        }
    }
}

/// Non-owning reference to an iolet: owner key, direction and index within
/// that direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IoletId {
    pub object: ObjectKey,
    pub kind: IoletKind,
    pub index: usize,
}

impl IoletId {
    pub fn inlet(object: ObjectKey, index: usize) -> Self {
        Self {
            object,
            kind: IoletKind::Inlet,
            index,
        }
    }

    pub fn outlet(object: ObjectKey, index: usize) -> Self {
        Self {
            object,
            kind: IoletKind::Outlet,
            index,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Iolet {
    pub kind: IoletKind,
    pub index: usize,
    pub signal: bool,
    /// Highlighted as the drop target of a connection drag.
    pub targeted: bool,
    /// Bounds relative to the owner's top-left corner (margin included).
    pub(crate) local: Rect,
}

impl Iolet {
    pub fn new(kind: IoletKind, index: usize, signal: bool) -> Self {
        Self {
            kind,
            index,
            signal,
            targeted: false,
            local: Rect::default(),
        }
    }

    pub fn local_bounds(&self) -> Rect {
        self.local
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Objects
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct CanvasObject {
    /// `None` until a freshly placed object is committed to the document.
    pub handle: Option<ObjectHandle>,
    pub widget: Box<dyn ObjectWidget>,
    /// Canvas bounds including [`OBJECT_MARGIN`] on every side.
    pub bounds: Rect,
    /// Inlets followed by outlets.
    pub iolets: Vec<Iolet>,
    pub num_inputs: usize,
    pub num_outputs: usize,
    pub selected: bool,
    /// Bounds captured when a drag or resize started.
    pub original_bounds: Rect,
    /// The inline editor of a newly placed object is open.
    pub initial_editor: bool,
    pub document_index: usize,
}

impl CanvasObject {
    pub fn from_info(handle: ObjectHandle, info: &ObjectInfo, document_index: usize) -> Self {
        let mut object = Self {
            handle: Some(handle),
            widget: create_widget(&info.kind),
            bounds: info.bounds.expanded(OBJECT_MARGIN),
            iolets: Vec::new(),
            num_inputs: 0,
            num_outputs: 0,
            selected: false,
            original_bounds: Rect::default(),
            initial_editor: false,
            document_index,
        };
        object.update_ports(&info.inlets, &info.outlets);
        object
    }

    /// A placeholder for an object the user is still typing.
    pub fn uncommitted(position: Point) -> Self {
        let (width, height) = NEW_OBJECT_SIZE;
        Self {
            handle: None,
            widget: create_widget(""),
            bounds: Rect::new(position.x, position.y, width, height).expanded(OBJECT_MARGIN),
            iolets: Vec::new(),
            num_inputs: 0,
            num_outputs: 0,
            selected: false,
            original_bounds: Rect::default(),
            initial_editor: true,
            document_index: usize::MAX,
        }
    }

    pub fn kind(&self) -> &str {
        self.widget.kind()
    }

    /// Bounds of the drawn content, without the margin.
    pub fn content_bounds(&self) -> Rect {
        self.bounds.reduced(OBJECT_MARGIN)
    }

    /// Re-derive bounds and iolets from the document. Returns whether
    /// anything visible changed.
    pub fn update_from_info(&mut self, info: &ObjectInfo) -> bool {
        let mut changed = false;
        if self.widget.kind() != info.kind {
            self.widget = create_widget(&info.kind);
            changed = true;
        }
        let bounds = info.bounds.expanded(OBJECT_MARGIN);
        if bounds != self.bounds {
            self.bounds = bounds;
            changed = true;
        }
        changed |= self.update_ports(&info.inlets, &info.outlets);
        changed
    }

    pub fn inlets(&self) -> &[Iolet] {
        &self.iolets[..self.num_inputs]
    }

    pub fn outlets(&self) -> &[Iolet] {
        &self.iolets[self.num_inputs..]
    }

    /// Iolet at a flat index, counting inlets first.
    pub fn flat_iolet(&self, flat: usize) -> Option<&Iolet> {
        self.iolets.get(flat)
    }

    pub fn iolet(&self, kind: IoletKind, index: usize) -> Option<&Iolet> {
        self.flat_index(kind, index).and_then(|i| self.iolets.get(i))
    }

    pub fn iolet_mut(&mut self, kind: IoletKind, index: usize) -> Option<&mut Iolet> {
        self.flat_index(kind, index).and_then(|i| self.iolets.get_mut(i))
    }

    fn flat_index(&self, kind: IoletKind, index: usize) -> Option<usize> {
        match kind {
            IoletKind::Inlet if index < self.num_inputs => Some(index),
            IoletKind::Outlet if index < self.num_outputs => Some(self.num_inputs + index),
            _ => None,
        }
    }

    pub fn iolet_canvas_bounds(&self, iolet: &Iolet) -> Rect {
        iolet.local.translated(self.bounds.position())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Connections
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Connection {
    pub handle: ConnectionHandle,
    pub outlet: IoletId,
    pub inlet: IoletId,
    pub route: Route,
    /// Last token read from or written to the document.
    pub path_state: String,
    /// `path_state` is queued for writing and not yet in the document.
    pub unsaved: bool,
    pub selected: bool,
    pub hovered: bool,
}

impl Connection {
    pub fn new(handle: ConnectionHandle, outlet: IoletId, inlet: IoletId) -> Self {
        Self {
            handle,
            outlet,
            inlet,
            route: Route::Straight,
            path_state: String::new(),
            unsaved: false,
            selected: false,
            hovered: false,
        }
    }

    pub fn touches(&self, object: ObjectKey) -> bool {
        self.outlet.object == object || self.inlet.object == object
    }
}

/// One paintable layer in the canvas stacking order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZEntry {
    Object(ObjectKey),
    /// Label sub-component of a GUI control.
    Label(ObjectKey),
}

impl ZEntry {
    pub fn object(self) -> ObjectKey {
        match self {
            ZEntry::Object(key) | ZEntry::Label(key) => key,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Scene: the visual collections
// ────────────────────────────────────────────────────────────────────────────

/// Visual objects and connections in their iteration order, plus the
/// stacking order used for painting and hit-testing.
#[derive(Debug, Default)]
pub struct Scene {
    objects: SlotMap<ObjectKey, CanvasObject>,
    object_order: Vec<ObjectKey>,
    connections: SlotMap<ConnectionKey, Connection>,
    connection_order: Vec<ConnectionKey>,
    z_order: Vec<ZEntry>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn object_count(&self) -> usize {
        self.object_order.len()
    }

    pub fn connection_count(&self) -> usize {
        self.connection_order.len()
    }

    pub fn object(&self, key: ObjectKey) -> Option<&CanvasObject> {
        self.objects.get(key)
    }

    pub fn object_mut(&mut self, key: ObjectKey) -> Option<&mut CanvasObject> {
        self.objects.get_mut(key)
    }

    pub fn object_keys(&self) -> &[ObjectKey] {
        &self.object_order
    }

    pub fn objects(&self) -> impl Iterator<Item = (ObjectKey, &CanvasObject)> + '_ {
        self.object_order
            .iter()
            .filter_map(|&key| self.objects.get(key).map(|o| (key, o)))
    }

    pub fn connection(&self, key: ConnectionKey) -> Option<&Connection> {
        self.connections.get(key)
    }

    pub fn connection_mut(&mut self, key: ConnectionKey) -> Option<&mut Connection> {
        self.connections.get_mut(key)
    }

    pub fn connection_keys(&self) -> &[ConnectionKey] {
        &self.connection_order
    }

    pub fn connections(&self) -> impl Iterator<Item = (ConnectionKey, &Connection)> + '_ {
        self.connection_order
            .iter()
            .filter_map(|&key| self.connections.get(key).map(|c| (key, c)))
    }

    pub fn z_order(&self) -> &[ZEntry] {
        &self.z_order
    }

    pub fn find_object(&self, handle: ObjectHandle) -> Option<ObjectKey> {
        self.objects()
            .find(|(_, o)| o.handle == Some(handle))
            .map(|(key, _)| key)
    }

    pub fn find_connection(&self, handle: ConnectionHandle) -> Option<ConnectionKey> {
        self.connections()
            .find(|(_, c)| c.handle == handle)
            .map(|(key, _)| key)
    }

    /// Connections with either end on `object`, in iteration order.
    pub fn connections_of(&self, object: ObjectKey) -> Vec<ConnectionKey> {
        self.connections()
            .filter(|(_, c)| c.touches(object))
            .map(|(key, _)| key)
            .collect()
    }

    pub fn connection_exists(&self, outlet: IoletId, inlet: IoletId) -> bool {
        self.connections()
            .any(|(_, c)| c.outlet == outlet && c.inlet == inlet)
    }

    pub fn iolet(&self, id: IoletId) -> Option<&Iolet> {
        self.objects.get(id.object)?.iolet(id.kind, id.index)
    }

    pub fn iolet_mut(&mut self, id: IoletId) -> Option<&mut Iolet> {
        self.objects.get_mut(id.object)?.iolet_mut(id.kind, id.index)
    }

    /// Canvas bounds of an iolet, derived from its owner's current bounds.
    pub fn iolet_bounds(&self, id: IoletId) -> Option<Rect> {
        let object = self.objects.get(id.object)?;
        let iolet = object.iolet(id.kind, id.index)?;
        Some(object.iolet_canvas_bounds(iolet))
    }

    /// Point where a cable attaches to an iolet.
    pub fn anchor(&self, id: IoletId) -> Option<Point> {
        self.iolet_bounds(id).map(|r| r.centre())
    }

    /// Outlet and inlet anchors of a connection; `None` when either end is gone.
    pub fn connection_anchors(&self, key: ConnectionKey) -> Option<(Point, Point)> {
        let connection = self.connections.get(key)?;
        Some((self.anchor(connection.outlet)?, self.anchor(connection.inlet)?))
    }

    /// Margin-inclusive bounds of every object except the listed ones, in
    /// order, so routes keep clear of the drawn edges.
    pub fn obstacles_excluding(&self, exclude: &[ObjectKey]) -> Vec<Rect> {
        self.objects()
            .filter(|(key, _)| !exclude.contains(key))
            .map(|(_, o)| o.bounds)
            .collect()
    }

    pub(crate) fn insert_object(&mut self, object: CanvasObject) -> ObjectKey {
        let has_label = object.widget.has_label();
        let key = self.objects.insert(object);
        self.object_order.push(key);
        self.z_order.push(ZEntry::Object(key));
        if has_label {
            self.z_order.push(ZEntry::Label(key));
        }
        key
    }

    pub(crate) fn remove_object(&mut self, key: ObjectKey) -> Option<CanvasObject> {
        let object = self.objects.remove(key)?;
        self.object_order.retain(|&k| k != key);
        self.z_order.retain(|z| z.object() != key);
        Some(object)
    }

    /// Move an object, then its label when it has one, to the top of the
    /// stacking order.
    pub(crate) fn bring_to_front(&mut self, key: ObjectKey) {
        let Some(object) = self.objects.get(key) else {
            return;
        };
        let has_label = object.widget.has_label();
        self.z_order.retain(|z| z.object() != key);
        self.z_order.push(ZEntry::Object(key));
        if has_label {
            self.z_order.push(ZEntry::Label(key));
        }
    }

    /// Stable sort of the iteration order by document index.
    pub(crate) fn sort_objects_by_document_index(&mut self) {
        let objects = &self.objects;
        self.object_order
            .sort_by_key(|&key| objects.get(key).map_or(usize::MAX, |o| o.document_index));
    }

    pub(crate) fn insert_connection(&mut self, connection: Connection) -> ConnectionKey {
        let key = self.connections.insert(connection);
        self.connection_order.push(key);
        key
    }

    /// Swap in a new connection at the iteration slot of `old`.
    pub(crate) fn replace_connection(&mut self, old: ConnectionKey, connection: Connection) -> ConnectionKey {
        self.connections.remove(old);
        let key = self.connections.insert(connection);
        match self.connection_order.iter().position(|&k| k == old) {
            Some(slot) => self.connection_order[slot] = key,
            None => self.connection_order.push(key),
        }
        key
    }

    pub(crate) fn remove_connection(&mut self, key: ConnectionKey) -> Option<Connection> {
        let connection = self.connections.remove(key)?;
        self.connection_order.retain(|&k| k != key);
        Some(connection)
    }

    /// Drop every connection for which `keep` returns false; returns how many went.
    pub(crate) fn retain_connections(&mut self, mut keep: impl FnMut(&Scene, &Connection) -> bool) -> usize {
        let doomed: Vec<ConnectionKey> = self
            .connections()
            .filter(|(_, c)| !keep(self, c))
            .map(|(key, _)| key)
            .collect();
        for &key in &doomed {
            self.remove_connection(key);
        }
        doomed.len()
    }
}
