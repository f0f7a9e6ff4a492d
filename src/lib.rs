//! Canvas core of a dataflow patch editor.
//!
//! This crate keeps a visual canvas in step with an interpreter-owned patch
//! document, routes connections as orthogonal cables around other objects,
//! and snaps dragged or resized objects to each other, to straight cables
//! and to a grid.
//!
//! The binary `patchcanvas` loads a patch from JSON, reconciles it into a
//! canvas and prints the routed connections.

pub mod canvas;
pub mod document;
pub mod error;
pub mod geometry;
pub mod grid;
pub mod iolet;
pub mod memory_patch;
pub mod model;
pub mod path;
pub mod settings;
pub mod sync;
pub mod widget;

pub use canvas::{Alignment, Canvas, CanvasSelection, DragMode, Viewport};
pub use document::{ConnectionEntry, ConnectionHandle, ObjectEntry, ObjectHandle, ObjectInfo, PatchDocument};
pub use error::{CanvasError, DocumentError, PathStateError, SettingsError};
pub use geometry::{Point, Rect, Segment};
pub use grid::{ObjectGrid, SnapIndicator, SnapTarget};
pub use memory_patch::{MemoryPatch, PatchObject};
pub use model::{CanvasObject, Connection, ConnectionKey, IoletId, IoletKind, ObjectKey, Scene};
pub use path::{PathUpdater, Route};
pub use settings::{CanvasSettings, GridMode, GridSettings, RoutingSettings};
pub use sync::{SyncReport, synchronise};
