//! Coalescing writer for path-state tokens.
//!
//! Dragging a cable segment produces a new token on every mouse event.
//! Tokens are parked here and written to the document in one undo sequence
//! once the delay has passed, so a whole drag lands as one undo step.

use crate::document::{ConnectionHandle, PatchDocument, with_undo_sequence};
use crate::settings::RoutingSettings;
use indexmap::IndexMap;
use std::time::{Duration, Instant};
use tracing::debug;

pub const UPDATE_PATH_LABEL: &str = "Update path";

#[derive(Debug, Clone)]
pub struct PathUpdater {
    /// Pending tokens in first-push order; a later push replaces the value.
    pending: IndexMap<ConnectionHandle, String>,
    deadline: Option<Instant>,
    delay: Duration,
    capacity: usize,
}

impl PathUpdater {
    pub fn new(settings: &RoutingSettings) -> Self {
        Self {
            pending: IndexMap::new(),
            deadline: None,
            delay: settings.update_delay(),
            capacity: settings.queue_capacity.max(1),
        }
    }

    pub fn settings_changed(&mut self, settings: &RoutingSettings) {
        self.delay = settings.update_delay();
        self.capacity = settings.queue_capacity.max(1);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn pending(&self, handle: ConnectionHandle) -> Option<&str> {
        self.pending.get(&handle).map(String::as_str)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Queue a token for `handle`. A full queue is drained first.
    pub fn push<D>(&mut self, doc: &mut D, handle: ConnectionHandle, token: String, now: Instant)
    where
        D: PatchDocument + ?Sized,
    {
        if !self.pending.contains_key(&handle) && self.pending.len() >= self.capacity {
            self.flush(doc);
        }
        self.pending.insert(handle, token);
        if self.deadline.is_none() {
            self.deadline = Some(now + self.delay);
        }
    }

    /// Forget a pending write, e.g. when its connection is being deleted.
    pub fn cancel(&mut self, handle: ConnectionHandle) -> bool {
        let removed = self.pending.shift_remove(&handle).is_some();
        if self.pending.is_empty() {
            self.deadline = None;
        }
        removed
    }

    /// Write everything out if the coalescing delay has passed. Returns the
    /// number of tokens written.
    pub fn tick<D>(&mut self, doc: &mut D, now: Instant) -> usize
    where
        D: PatchDocument + ?Sized,
    {
        match self.deadline {
            Some(deadline) if now >= deadline => self.flush(doc),
            _ => 0,
        }
    }

    /// Write every pending token now, in push order, inside one undo
    /// sequence. Tokens for connections that left the document are dropped.
    pub fn flush<D>(&mut self, doc: &mut D) -> usize
    where
        D: PatchDocument + ?Sized,
    {
        self.deadline = None;
        if self.pending.is_empty() {
            return 0;
        }
        let pending = std::mem::take(&mut self.pending);
        let result = with_undo_sequence(doc, UPDATE_PATH_LABEL, |doc| {
            let mut written = 0;
            for (handle, token) in pending {
                if !doc.contains_connection(handle) {
                    debug!(%handle, "dropping path state for removed connection");
                    continue;
                }
                match doc.set_connection_path_state(handle, &token) {
                    Ok(()) => written += 1,
                    Err(err) => debug!(%handle, %err, "path state write failed"),
                }
            }
            Ok(written)
        });
        let written = result.unwrap_or(0);
        debug!(written, "flushed path states");
        written
    }
}
