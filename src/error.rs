use crate::document::{ConnectionHandle, ObjectHandle};
use thiserror::Error;

/// Errors reported by a [`PatchDocument`](crate::document::PatchDocument)
/// when a mutation cannot be applied.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    #[error("Object {0} does not exist in the patch")]
    UnknownObject(ObjectHandle),

    #[error("Connection {0} does not exist in the patch")]
    UnknownConnection(ConnectionHandle),

    #[error("Object {object} has no {kind} with index {index}")]
    IoletOutOfRange {
        object: ObjectHandle,
        kind: &'static str,
        index: usize,
    },

    #[error("Cannot connect {outlet_owner}:{outlet} to {inlet_owner}:{inlet}: {reason}")]
    InvalidConnection {
        outlet_owner: ObjectHandle,
        outlet: usize,
        inlet_owner: ObjectHandle,
        inlet: usize,
        reason: &'static str,
    },

    #[error("No connection from {outlet_owner}:{outlet} to {inlet_owner}:{inlet}")]
    NoSuchConnection {
        outlet_owner: ObjectHandle,
        outlet: usize,
        inlet_owner: ObjectHandle,
        inlet: usize,
    },
}

/// Errors decoding a persisted connection path token.
///
/// These never leave the path engine; a failed decode falls back to a
/// straight cable.
#[derive(Error, Debug)]
pub enum PathStateError {
    #[error("Path state is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Path state payload is malformed: {0}")]
    Payload(#[from] bincode::error::DecodeError),

    #[error("Failed to encode path state: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("Path state has trailing bytes after the point list")]
    TrailingBytes,

    #[error("Path plan is not orthogonal: {0}")]
    InvalidPlan(&'static str),
}

/// Errors loading canvas settings.
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to read settings file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse settings JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors from canvas gestures that write to the document.
#[derive(Error, Debug)]
pub enum CanvasError {
    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    PathState(#[from] PathStateError),
}
