//! The interface to the interpreter's document model.
//!
//! The canvas never owns the patch. It reads ordered snapshots of live
//! objects and connections, and it mutates the patch only through the
//! transactional calls below, bracketing every user gesture with exactly one
//! [`PatchDocument::start_undo_sequence`] / [`PatchDocument::end_undo_sequence`]
//! pair.

use crate::error::DocumentError;
use crate::geometry::Rect;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identity of an interpreter object. Compared by equality only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectHandle(pub u64);

/// Opaque identity of an interpreter connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionHandle(pub u64);

impl fmt::Display for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obj#{}", self.0)
    }
}

impl fmt::Display for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "con#{}", self.0)
    }
}

/// One live object as listed by the document, in document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectEntry {
    pub handle: ObjectHandle,
    /// Position of the object in the document's own object list.
    pub index: usize,
}

/// One live connection as listed by the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionEntry {
    pub handle: ConnectionHandle,
    pub inlet: usize,
    pub inlet_owner: ObjectHandle,
    pub outlet: usize,
    pub outlet_owner: ObjectHandle,
}

/// Everything the canvas needs to know to draw and wire one object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectInfo {
    /// Type tag used to pick the widget implementation (e.g. `"osc~"`, `"msg"`, `"tgl"`).
    pub kind: String,
    /// Content bounds in canvas coordinates, without the selection margin.
    pub bounds: Rect,
    /// One entry per inlet; `true` marks a signal inlet.
    pub inlets: Vec<bool>,
    /// One entry per outlet; `true` marks a signal outlet.
    pub outlets: Vec<bool>,
}

/// The interpreter-side patch, as seen by the canvas.
///
/// Implementations are responsible for their own locking against the
/// interpreter thread; every call here is made from the UI thread.
pub trait PatchDocument {
    /// Deliver any queued change messages so the next snapshot is current.
    fn flush_messages(&mut self) {}

    /// Live objects, ordered by document index.
    fn objects(&self) -> Vec<ObjectEntry>;

    /// Live connections.
    fn connections(&self) -> Vec<ConnectionEntry>;

    fn object_info(&self, handle: ObjectHandle) -> Option<ObjectInfo>;

    fn contains_connection(&self, handle: ConnectionHandle) -> bool {
        self.connections().iter().any(|c| c.handle == handle)
    }

    /// Persisted path-state token of a connection; empty when never set.
    fn connection_path_state(&self, handle: ConnectionHandle) -> Option<String>;

    fn set_connection_path_state(
        &mut self,
        handle: ConnectionHandle,
        token: &str,
    ) -> Result<(), DocumentError>;

    fn create_object(&mut self, text: &str, x: i32, y: i32) -> Result<ObjectHandle, DocumentError>;

    fn move_object(&mut self, handle: ObjectHandle, dx: i32, dy: i32) -> Result<(), DocumentError>;

    fn move_object_to(&mut self, handle: ObjectHandle, x: i32, y: i32) -> Result<(), DocumentError>;

    /// Change the content size of a resizable object.
    fn set_object_bounds(&mut self, handle: ObjectHandle, bounds: Rect) -> Result<(), DocumentError>;

    fn remove_objects(&mut self, handles: &[ObjectHandle]) -> Result<(), DocumentError>;

    fn create_connection(
        &mut self,
        outlet_owner: ObjectHandle,
        outlet: usize,
        inlet_owner: ObjectHandle,
        inlet: usize,
    ) -> Result<ConnectionHandle, DocumentError>;

    /// Remove a connection; `path_state` is recorded so undo restores the route.
    fn remove_connection(
        &mut self,
        outlet_owner: ObjectHandle,
        outlet: usize,
        inlet_owner: ObjectHandle,
        inlet: usize,
        path_state: &str,
    ) -> Result<(), DocumentError>;

    fn start_undo_sequence(&mut self, label: &str);

    fn end_undo_sequence(&mut self, label: &str);
}

/// Run `body` inside one undo sequence, closing the bracket even when the
/// body fails.
pub fn with_undo_sequence<D, T, F>(doc: &mut D, label: &str, body: F) -> Result<T, DocumentError>
where
    D: PatchDocument + ?Sized,
    F: FnOnce(&mut D) -> Result<T, DocumentError>,
{
    doc.start_undo_sequence(label);
    let result = body(doc);
    doc.end_undo_sequence(label);
    result
}
