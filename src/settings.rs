//! Configuration injected into the canvas.
//!
//! Nothing here is global: a [`CanvasSettings`] value is handed to the canvas
//! at construction and replaced through [`crate::canvas::Canvas::apply_settings`].

use crate::error::SettingsError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Which snap categories are active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridMode {
    Off,
    /// Snap to other objects and straight cables only.
    Objects,
    /// Snap to the absolute grid only.
    Grid,
    #[default]
    Both,
}

impl GridMode {
    /// Map the numeric `grid_enabled` preference (0..=3) onto a mode.
    pub fn from_index(index: u8) -> Self {
        match index {
            1 => GridMode::Objects,
            2 => GridMode::Grid,
            3 => GridMode::Both,
            _ => GridMode::Off,
        }
    }

    pub fn snaps_to_objects(self) -> bool {
        matches!(self, GridMode::Objects | GridMode::Both)
    }

    pub fn snaps_to_grid(self) -> bool {
        matches!(self, GridMode::Grid | GridMode::Both)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSettings {
    pub mode: GridMode,
    /// Grid spacing in pixels.
    pub size: i32,
    /// Largest distance, inclusive, at which a feature snaps.
    pub tolerance: i32,
    /// Distance the raw offset must travel before a held snap lets go.
    pub release_range: i32,
    pub snap_edges: bool,
    pub snap_centres: bool,
    pub snap_connections: bool,
}

impl Default for GridSettings {
    fn default() -> Self {
        Self {
            mode: GridMode::Both,
            size: 25,
            tolerance: 4,
            release_range: 7,
            snap_edges: true,
            snap_centres: true,
            snap_connections: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingSettings {
    pub max_bends: usize,
    /// Total node expansions allowed for one `find_path` call.
    pub max_expansions: usize,
    /// Smallest lattice spacing in pixels.
    pub min_lattice_step: i32,
    /// Extra lattice lines beyond the start/end span, per side.
    pub lattice_padding: i32,
    pub hit_tolerance: i32,
    pub update_delay_ms: u64,
    pub queue_capacity: usize,
    /// Re-route connections whose straight cable crosses an object after a move.
    pub auto_route_on_overlap: bool,
}

impl Default for RoutingSettings {
    fn default() -> Self {
        Self {
            max_bends: 6,
            max_expansions: 20_000,
            min_lattice_step: 20,
            lattice_padding: 2,
            hit_tolerance: 3,
            update_delay_ms: 50,
            queue_capacity: 64,
            auto_route_on_overlap: false,
        }
    }
}

impl RoutingSettings {
    pub fn update_delay(&self) -> Duration {
        Duration::from_millis(self.update_delay_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasSettings {
    pub grid: GridSettings,
    pub routing: RoutingSettings,
}

impl CanvasSettings {
    /// Read settings from a JSON file; missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(text)?)
    }
}
