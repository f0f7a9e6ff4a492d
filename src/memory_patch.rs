//! In-memory reference implementation of [`PatchDocument`].
//!
//! `MemoryPatch` is what the CLI loads from JSON and what the tests drive.
//! Every mutation is recorded as an invertible [`PatchCommand`]; mutations
//! issued between `start_undo_sequence` and `end_undo_sequence` fold into a
//! single batch entry so one gesture undoes atomically.

use crate::document::{
    ConnectionEntry, ConnectionHandle, ObjectEntry, ObjectHandle, ObjectInfo, PatchDocument,
};
use crate::error::DocumentError;
use crate::geometry::Rect;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

// ────────────────────────────────────────────────────────────────────────────
// Patch contents
// ────────────────────────────────────────────────────────────────────────────

/// One interpreter object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchObject {
    /// Object text, e.g. `"osc~ 440"`. The first word is the type tag.
    pub text: String,
    pub bounds: Rect,
    /// Signal flag per inlet.
    #[serde(default)]
    pub inlets: Vec<bool>,
    /// Signal flag per outlet.
    #[serde(default)]
    pub outlets: Vec<bool>,
}

impl PatchObject {
    pub fn kind(&self) -> &str {
        self.text.split_whitespace().next().unwrap_or("")
    }
}

/// One interpreter connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchConnection {
    pub handle: ConnectionHandle,
    pub outlet_owner: ObjectHandle,
    pub outlet: usize,
    pub inlet_owner: ObjectHandle,
    pub inlet: usize,
    /// Persisted route token; empty for a straight cable.
    #[serde(default)]
    pub path_state: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Patch Command (undo/redo unit)
// ────────────────────────────────────────────────────────────────────────────

/// A single undoable patch mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum PatchCommand {
    AddObject {
        index: usize,
        handle: ObjectHandle,
        object: PatchObject,
    },
    RemoveObject {
        index: usize,
        handle: ObjectHandle,
        object: PatchObject,
    },
    /// Covers moves and resizes.
    SetBounds {
        handle: ObjectHandle,
        old: Rect,
        new: Rect,
    },
    AddConnection {
        index: usize,
        connection: PatchConnection,
    },
    RemoveConnection {
        index: usize,
        connection: PatchConnection,
    },
    SetPathState {
        handle: ConnectionHandle,
        old: String,
        new: String,
    },
    /// Everything recorded inside one undo sequence.
    Batch {
        label: String,
        commands: Vec<PatchCommand>,
    },
}

// ────────────────────────────────────────────────────────────────────────────
// Patch History (undo / redo stack)
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PatchHistory {
    undo_stack: Vec<PatchCommand>,
    redo_stack: Vec<PatchCommand>,
    /// Undo sequences currently open, innermost last.
    open: Vec<(String, Vec<PatchCommand>)>,
    max_size: usize,
}

impl Default for PatchHistory {
    fn default() -> Self {
        Self::new(200)
    }
}

impl PatchHistory {
    pub fn new(max_size: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            open: Vec::new(),
            max_size,
        }
    }

    fn record(&mut self, mut commands: Vec<PatchCommand>) {
        if commands.is_empty() {
            return;
        }
        if let Some((_, frame)) = self.open.last_mut() {
            frame.append(&mut commands);
            return;
        }
        let cmd = if commands.len() == 1 {
            commands.remove(0)
        } else {
            PatchCommand::Batch {
                label: String::new(),
                commands,
            }
        };
        self.push(cmd);
    }

    fn push(&mut self, cmd: PatchCommand) {
        self.undo_stack.push(cmd);
        self.redo_stack.clear();
        if self.undo_stack.len() > self.max_size {
            self.undo_stack.remove(0);
        }
    }

    fn begin(&mut self, label: &str) {
        self.open.push((label.to_string(), Vec::new()));
    }

    fn end(&mut self, label: &str) {
        let Some((open_label, commands)) = self.open.pop() else {
            warn!(label, "end_undo_sequence without a matching start");
            return;
        };
        if open_label != label {
            warn!(expected = %open_label, got = label, "mismatched undo sequence labels");
        }
        if commands.is_empty() {
            return;
        }
        let batch = PatchCommand::Batch {
            label: open_label,
            commands,
        };
        if let Some((_, parent)) = self.open.last_mut() {
            parent.push(batch);
        } else {
            self.push(batch);
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    /// Number of undo sequences started but not yet ended.
    pub fn open_sequences(&self) -> usize {
        self.open.len()
    }

    /// Label of the most recent undo entry, if it came from a sequence.
    pub fn last_label(&self) -> Option<&str> {
        match self.undo_stack.last()? {
            PatchCommand::Batch { label, .. } if !label.is_empty() => Some(label.as_str()),
            _ => None,
        }
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

// ────────────────────────────────────────────────────────────────────────────
// MemoryPatch
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryPatch {
    objects: IndexMap<ObjectHandle, PatchObject>,
    #[serde(default)]
    connections: Vec<PatchConnection>,
    #[serde(default)]
    next_id: u64,
    #[serde(skip)]
    history: PatchHistory,
    #[serde(skip)]
    flushes: usize,
}

impl MemoryPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        let mut patch: MemoryPatch = serde_json::from_str(text)?;
        let highest = patch
            .objects
            .keys()
            .map(|h| h.0)
            .chain(patch.connections.iter().map(|c| c.handle.0))
            .max()
            .unwrap_or(0);
        patch.next_id = patch.next_id.max(highest + 1);
        Ok(patch)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Add an object outside of the undo history, as a loader would.
    pub fn insert_object(&mut self, object: PatchObject) -> ObjectHandle {
        let handle = self.allocate_object_handle();
        self.objects.insert(handle, object);
        handle
    }

    /// Add a connection outside of the undo history, as a loader would.
    pub fn insert_connection(
        &mut self,
        outlet_owner: ObjectHandle,
        outlet: usize,
        inlet_owner: ObjectHandle,
        inlet: usize,
    ) -> Result<ConnectionHandle, DocumentError> {
        self.validate_connection(outlet_owner, outlet, inlet_owner, inlet)?;
        let handle = self.allocate_connection_handle();
        self.connections.push(PatchConnection {
            handle,
            outlet_owner,
            outlet,
            inlet_owner,
            inlet,
            path_state: String::new(),
        });
        Ok(handle)
    }

    pub fn object(&self, handle: ObjectHandle) -> Option<&PatchObject> {
        self.objects.get(&handle)
    }

    /// Replace the iolet layout of an object, as retyping it in the
    /// interpreter would. Connections that no longer fit are dropped.
    pub fn set_object_iolets(&mut self, handle: ObjectHandle, inlets: Vec<bool>, outlets: Vec<bool>) {
        let Some(object) = self.objects.get_mut(&handle) else {
            return;
        };
        object.inlets = inlets;
        object.outlets = outlets;
        let (ins, outs) = (object.inlets.len(), object.outlets.len());
        self.connections.retain(|c| {
            !((c.inlet_owner == handle && c.inlet >= ins) || (c.outlet_owner == handle && c.outlet >= outs))
        });
    }

    /// Swap the document order of two objects, as `tofront`/`toback` would.
    pub fn swap_objects(&mut self, a: usize, b: usize) {
        if a < self.objects.len() && b < self.objects.len() {
            self.objects.swap_indices(a, b);
        }
    }

    pub fn connection(&self, handle: ConnectionHandle) -> Option<&PatchConnection> {
        self.connections.iter().find(|c| c.handle == handle)
    }

    pub fn history(&self) -> &PatchHistory {
        &self.history
    }

    pub fn flush_count(&self) -> usize {
        self.flushes
    }

    pub fn undo(&mut self) -> bool {
        let Some(cmd) = self.history.undo_stack.pop() else {
            return false;
        };
        let inverse = self.apply_inverse(&cmd);
        self.history.redo_stack.push(inverse);
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(cmd) = self.history.redo_stack.pop() else {
            return false;
        };
        let inverse = self.apply_inverse(&cmd);
        self.history.undo_stack.push(inverse);
        true
    }

    fn allocate_object_handle(&mut self) -> ObjectHandle {
        self.next_id = self.next_id.max(1);
        let handle = ObjectHandle(self.next_id);
        self.next_id += 1;
        handle
    }

    fn allocate_connection_handle(&mut self) -> ConnectionHandle {
        self.next_id = self.next_id.max(1);
        let handle = ConnectionHandle(self.next_id);
        self.next_id += 1;
        handle
    }

    fn validate_connection(
        &self,
        outlet_owner: ObjectHandle,
        outlet: usize,
        inlet_owner: ObjectHandle,
        inlet: usize,
    ) -> Result<(), DocumentError> {
        let source = self
            .objects
            .get(&outlet_owner)
            .ok_or(DocumentError::UnknownObject(outlet_owner))?;
        let sink = self
            .objects
            .get(&inlet_owner)
            .ok_or(DocumentError::UnknownObject(inlet_owner))?;
        let Some(&signal_out) = source.outlets.get(outlet) else {
            return Err(DocumentError::IoletOutOfRange {
                object: outlet_owner,
                kind: "outlet",
                index: outlet,
            });
        };
        let Some(&signal_in) = sink.inlets.get(inlet) else {
            return Err(DocumentError::IoletOutOfRange {
                object: inlet_owner,
                kind: "inlet",
                index: inlet,
            });
        };
        let invalid = |reason| DocumentError::InvalidConnection {
            outlet_owner,
            outlet,
            inlet_owner,
            inlet,
            reason,
        };
        if signal_out && !signal_in {
            return Err(invalid("signal outlet into control inlet"));
        }
        let duplicate = self.connections.iter().any(|c| {
            c.outlet_owner == outlet_owner
                && c.outlet == outlet
                && c.inlet_owner == inlet_owner
                && c.inlet == inlet
        });
        if duplicate {
            return Err(invalid("already connected"));
        }
        Ok(())
    }

    fn set_bounds_recorded(&mut self, handle: ObjectHandle, new: Rect) -> Result<(), DocumentError> {
        let object = self
            .objects
            .get_mut(&handle)
            .ok_or(DocumentError::UnknownObject(handle))?;
        let old = object.bounds;
        if old == new {
            return Ok(());
        }
        object.bounds = new;
        self.history
            .record(vec![PatchCommand::SetBounds { handle, old, new }]);
        Ok(())
    }

    /// Apply the inverse of a command, returning the command that re-applies it.
    fn apply_inverse(&mut self, cmd: &PatchCommand) -> PatchCommand {
        match cmd {
            PatchCommand::AddObject {
                index,
                handle,
                object,
            } => {
                self.objects.shift_remove(handle);
                PatchCommand::RemoveObject {
                    index: *index,
                    handle: *handle,
                    object: object.clone(),
                }
            }
            PatchCommand::RemoveObject {
                index,
                handle,
                object,
            } => {
                let at = (*index).min(self.objects.len());
                self.objects.shift_insert(at, *handle, object.clone());
                PatchCommand::AddObject {
                    index: *index,
                    handle: *handle,
                    object: object.clone(),
                }
            }
            PatchCommand::SetBounds { handle, old, new } => {
                if let Some(object) = self.objects.get_mut(handle) {
                    object.bounds = *old;
                }
                PatchCommand::SetBounds {
                    handle: *handle,
                    old: *new,
                    new: *old,
                }
            }
            PatchCommand::AddConnection { index, connection } => {
                self.connections.retain(|c| c.handle != connection.handle);
                PatchCommand::RemoveConnection {
                    index: *index,
                    connection: connection.clone(),
                }
            }
            PatchCommand::RemoveConnection { index, connection } => {
                let at = (*index).min(self.connections.len());
                self.connections.insert(at, connection.clone());
                PatchCommand::AddConnection {
                    index: *index,
                    connection: connection.clone(),
                }
            }
            PatchCommand::SetPathState { handle, old, new } => {
                if let Some(c) = self.connections.iter_mut().find(|c| c.handle == *handle) {
                    c.path_state.clone_from(old);
                }
                PatchCommand::SetPathState {
                    handle: *handle,
                    old: new.clone(),
                    new: old.clone(),
                }
            }
            PatchCommand::Batch { label, commands } => {
                let mut inverses = Vec::with_capacity(commands.len());
                for c in commands.iter().rev() {
                    inverses.push(self.apply_inverse(c));
                }
                inverses.reverse();
                PatchCommand::Batch {
                    label: label.clone(),
                    commands: inverses,
                }
            }
        }
    }
}

impl PatchDocument for MemoryPatch {
    fn flush_messages(&mut self) {
        self.flushes += 1;
    }

    fn objects(&self) -> Vec<ObjectEntry> {
        self.objects
            .keys()
            .enumerate()
            .map(|(index, &handle)| ObjectEntry { handle, index })
            .collect()
    }

    fn connections(&self) -> Vec<ConnectionEntry> {
        self.connections
            .iter()
            .map(|c| ConnectionEntry {
                handle: c.handle,
                inlet: c.inlet,
                inlet_owner: c.inlet_owner,
                outlet: c.outlet,
                outlet_owner: c.outlet_owner,
            })
            .collect()
    }

    fn object_info(&self, handle: ObjectHandle) -> Option<ObjectInfo> {
        let object = self.objects.get(&handle)?;
        Some(ObjectInfo {
            kind: object.kind().to_string(),
            bounds: object.bounds,
            inlets: object.inlets.clone(),
            outlets: object.outlets.clone(),
        })
    }

    fn contains_connection(&self, handle: ConnectionHandle) -> bool {
        self.connections.iter().any(|c| c.handle == handle)
    }

    fn connection_path_state(&self, handle: ConnectionHandle) -> Option<String> {
        self.connection(handle).map(|c| c.path_state.clone())
    }

    fn set_connection_path_state(
        &mut self,
        handle: ConnectionHandle,
        token: &str,
    ) -> Result<(), DocumentError> {
        let connection = self
            .connections
            .iter_mut()
            .find(|c| c.handle == handle)
            .ok_or(DocumentError::UnknownConnection(handle))?;
        if connection.path_state == token {
            return Ok(());
        }
        let old = std::mem::replace(&mut connection.path_state, token.to_string());
        self.history.record(vec![PatchCommand::SetPathState {
            handle,
            old,
            new: token.to_string(),
        }]);
        Ok(())
    }

    fn create_object(&mut self, text: &str, x: i32, y: i32) -> Result<ObjectHandle, DocumentError> {
        let handle = self.allocate_object_handle();
        let object = PatchObject {
            text: text.to_string(),
            bounds: Rect::new(x, y, (text.chars().count() as i32 * 7 + 10).max(30), 20),
            inlets: vec![false],
            outlets: vec![false],
        };
        let index = self.objects.len();
        self.objects.insert(handle, object.clone());
        self.history.record(vec![PatchCommand::AddObject {
            index,
            handle,
            object,
        }]);
        Ok(handle)
    }

    fn move_object(&mut self, handle: ObjectHandle, dx: i32, dy: i32) -> Result<(), DocumentError> {
        let bounds = self
            .objects
            .get(&handle)
            .ok_or(DocumentError::UnknownObject(handle))?
            .bounds;
        self.set_bounds_recorded(handle, Rect::new(bounds.x + dx, bounds.y + dy, bounds.width, bounds.height))
    }

    fn move_object_to(&mut self, handle: ObjectHandle, x: i32, y: i32) -> Result<(), DocumentError> {
        let bounds = self
            .objects
            .get(&handle)
            .ok_or(DocumentError::UnknownObject(handle))?
            .bounds;
        self.set_bounds_recorded(handle, Rect::new(x, y, bounds.width, bounds.height))
    }

    fn set_object_bounds(&mut self, handle: ObjectHandle, bounds: Rect) -> Result<(), DocumentError> {
        self.set_bounds_recorded(handle, bounds)
    }

    fn remove_objects(&mut self, handles: &[ObjectHandle]) -> Result<(), DocumentError> {
        if let Some(missing) = handles.iter().find(|h| !self.objects.contains_key(*h)) {
            return Err(DocumentError::UnknownObject(*missing));
        }
        let mut commands = Vec::new();
        // Attached connections go first so undo restores objects before wires.
        let mut index = 0;
        while index < self.connections.len() {
            let c = &self.connections[index];
            if handles.contains(&c.inlet_owner) || handles.contains(&c.outlet_owner) {
                let connection = self.connections.remove(index);
                commands.push(PatchCommand::RemoveConnection { index, connection });
            } else {
                index += 1;
            }
        }
        for handle in handles {
            if let Some((index, _, object)) = self.objects.shift_remove_full(handle) {
                commands.push(PatchCommand::RemoveObject {
                    index,
                    handle: *handle,
                    object,
                });
            }
        }
        debug!(count = handles.len(), "removed objects");
        self.history.record(commands);
        Ok(())
    }

    fn create_connection(
        &mut self,
        outlet_owner: ObjectHandle,
        outlet: usize,
        inlet_owner: ObjectHandle,
        inlet: usize,
    ) -> Result<ConnectionHandle, DocumentError> {
        let handle = self.insert_connection(outlet_owner, outlet, inlet_owner, inlet)?;
        let index = self.connections.len() - 1;
        let connection = self.connections[index].clone();
        self.history
            .record(vec![PatchCommand::AddConnection { index, connection }]);
        Ok(handle)
    }

    fn remove_connection(
        &mut self,
        outlet_owner: ObjectHandle,
        outlet: usize,
        inlet_owner: ObjectHandle,
        inlet: usize,
        path_state: &str,
    ) -> Result<(), DocumentError> {
        let index = self
            .connections
            .iter()
            .position(|c| {
                c.outlet_owner == outlet_owner
                    && c.outlet == outlet
                    && c.inlet_owner == inlet_owner
                    && c.inlet == inlet
            })
            .ok_or(DocumentError::NoSuchConnection {
                outlet_owner,
                outlet,
                inlet_owner,
                inlet,
            })?;
        let mut connection = self.connections.remove(index);
        connection.path_state = path_state.to_string();
        self.history
            .record(vec![PatchCommand::RemoveConnection { index, connection }]);
        Ok(())
    }

    fn start_undo_sequence(&mut self, label: &str) {
        self.history.begin(label);
    }

    fn end_undo_sequence(&mut self, label: &str) {
        self.history.end(label);
    }
}
