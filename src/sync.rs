//! Reconciliation of the visual collections against the document.
//!
//! One pass prunes what the document no longer lists, creates or refreshes
//! objects in document order, and only then resolves connections, whose
//! endpoints depend on the refreshed iolet lists. Surviving objects and
//! connections keep their arena keys, so selection and other UI state live
//! through any number of passes.

use crate::document::{ConnectionEntry, ConnectionHandle, ObjectHandle, PatchDocument};
use crate::model::{CanvasObject, Connection, ConnectionKey, IoletId, IoletKind, ObjectKey, Scene};
use crate::path::{Route, route_from_token, update_path};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// What one reconciliation pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub objects_added: usize,
    pub objects_updated: usize,
    pub objects_removed: usize,
    pub connections_added: usize,
    pub connections_replaced: usize,
    pub connections_rerouted: usize,
    pub connections_removed: usize,
    /// Snapshot connections whose endpoints did not resolve this pass.
    pub skipped: usize,
}

impl SyncReport {
    /// True when the pass left the collections untouched.
    pub fn is_noop(&self) -> bool {
        self.objects_added
            + self.objects_updated
            + self.objects_removed
            + self.connections_added
            + self.connections_replaced
            + self.connections_rerouted
            + self.connections_removed
            == 0
    }
}

/// Bring `scene` in line with the document.
pub fn synchronise<D>(scene: &mut Scene, doc: &mut D) -> SyncReport
where
    D: PatchDocument + ?Sized,
{
    // A second flush delivers messages queued while the first one ran.
    doc.flush_messages();
    doc.flush_messages();

    let object_entries = doc.objects();
    let connection_entries = doc.connections();
    let live_objects: HashSet<ObjectHandle> = object_entries.iter().map(|e| e.handle).collect();
    let live_connections: HashSet<ConnectionHandle> = connection_entries.iter().map(|e| e.handle).collect();

    let mut report = SyncReport::default();

    // Stale connections go first so no pass below walks a dead endpoint.
    report.connections_removed += scene.retain_connections(|_, c| live_connections.contains(&c.handle));

    let stale: Vec<ObjectKey> = scene
        .objects()
        .filter(|(_, o)| match o.handle {
            Some(handle) => !live_objects.contains(&handle) && !o.initial_editor,
            None => !o.initial_editor,
        })
        .map(|(key, _)| key)
        .collect();
    for key in stale {
        scene.remove_object(key);
        report.objects_removed += 1;
    }

    report.connections_removed += remove_orphans(scene);

    // Object pass.
    let mut by_handle: HashMap<ObjectHandle, ObjectKey> = scene
        .objects()
        .filter_map(|(key, o)| o.handle.map(|h| (h, key)))
        .collect();
    let mut seen = HashSet::new();
    for entry in &object_entries {
        if !seen.insert(entry.handle) {
            continue;
        }
        let Some(info) = doc.object_info(entry.handle) else {
            debug!(handle = %entry.handle, "object vanished during synchronise");
            continue;
        };
        let key = match by_handle.get(&entry.handle) {
            Some(&key) => {
                if let Some(object) = scene.object_mut(key) {
                    if object.update_from_info(&info) {
                        report.objects_updated += 1;
                    }
                    object.document_index = entry.index;
                }
                key
            }
            None => {
                let key = scene.insert_object(CanvasObject::from_info(entry.handle, &info, entry.index));
                by_handle.insert(entry.handle, key);
                report.objects_added += 1;
                key
            }
        };
        scene.bring_to_front(key);
    }
    scene.sort_objects_by_document_index();

    // Port counts may have shrunk under existing connections.
    report.connections_removed += remove_orphans(scene);

    // Connection pass.
    let mut seen = HashSet::new();
    for entry in &connection_entries {
        if !seen.insert(entry.handle) {
            continue;
        }
        let Some((outlet, inlet)) = resolve_terminals(scene, &by_handle, entry) else {
            report.skipped += 1;
            continue;
        };
        let token = doc.connection_path_state(entry.handle).unwrap_or_default();
        let existing = scene.find_connection(entry.handle);
        match existing {
            None => {
                let connection = routed_connection(scene, entry.handle, outlet, inlet, token);
                scene.insert_connection(connection);
                report.connections_added += 1;
            }
            Some(key) => {
                let Some(current) = scene.connection(key) else {
                    continue;
                };
                if current.outlet != outlet || current.inlet != inlet {
                    let replacement = routed_connection(scene, entry.handle, outlet, inlet, token);
                    scene.replace_connection(key, replacement);
                    report.connections_replaced += 1;
                } else if refresh_route(scene, key, token) {
                    report.connections_rerouted += 1;
                }
            }
        }
    }

    debug!(?report, "synchronised canvas");
    report
}

/// Drop connections with an endpoint that no longer resolves.
fn remove_orphans(scene: &mut Scene) -> usize {
    scene.retain_connections(|scene, c| scene.iolet(c.outlet).is_some() && scene.iolet(c.inlet).is_some())
}

fn resolve_terminals(
    scene: &Scene,
    by_handle: &HashMap<ObjectHandle, ObjectKey>,
    entry: &ConnectionEntry,
) -> Option<(IoletId, IoletId)> {
    let outlet = resolve(scene, by_handle, entry.outlet_owner, IoletKind::Outlet, entry.outlet, entry.handle)?;
    let inlet = resolve(scene, by_handle, entry.inlet_owner, IoletKind::Inlet, entry.inlet, entry.handle)?;
    Some((outlet, inlet))
}

fn resolve(
    scene: &Scene,
    by_handle: &HashMap<ObjectHandle, ObjectKey>,
    owner: ObjectHandle,
    kind: IoletKind,
    index: usize,
    connection: ConnectionHandle,
) -> Option<IoletId> {
    let Some(&key) = by_handle.get(&owner) else {
        warn!(%connection, %owner, "connection endpoint object is not on the canvas");
        return None;
    };
    let object = scene.object(key)?;
    // Outlets sit after the inlets in the flat iolet list.
    let flat = match kind {
        IoletKind::Inlet => index,
        IoletKind::Outlet => object.num_inputs + index,
    };
    let in_group = match kind {
        IoletKind::Inlet => index < object.num_inputs,
        IoletKind::Outlet => index < object.num_outputs,
    };
    if !in_group || object.flat_iolet(flat).is_none() {
        warn!(
            %connection,
            %owner,
            ?kind,
            index,
            inlets = object.num_inputs,
            outlets = object.num_outputs,
            "connection terminal index out of range"
        );
        return None;
    }
    Some(IoletId {
        object: key,
        kind,
        index,
    })
}

fn routed_connection(scene: &Scene, handle: ConnectionHandle, outlet: IoletId, inlet: IoletId, token: String) -> Connection {
    let mut connection = Connection::new(handle, outlet, inlet);
    if let (Some(start), Some(end)) = (scene.anchor(outlet), scene.anchor(inlet)) {
        connection.route = route_from_token(&token, start, end);
    }
    connection.path_state = token;
    connection
}

/// Pick up a changed token or re-anchor the current plan. A route with an
/// unsaved local edit ignores the document token until the edit is written.
/// Returns whether the route changed.
fn refresh_route(scene: &mut Scene, key: ConnectionKey, token: String) -> bool {
    let Some((start, end)) = scene.connection_anchors(key) else {
        return false;
    };
    let Some(connection) = scene.connection_mut(key) else {
        return false;
    };
    let route = if token != connection.path_state && !connection.unsaved {
        let route = route_from_token(&token, start, end);
        connection.path_state = token;
        route
    } else if connection.route.is_segmented() {
        update_path(&connection.route, start, end)
    } else {
        Route::Straight
    };
    if route == connection.route {
        return false;
    }
    connection.route = route;
    true
}
