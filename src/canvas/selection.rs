//! Selection management for the canvas.
//!
//! Tracks selected objects and connections by arena key, supports toggle
//! selection and lasso selection, and mirrors the result into the
//! `selected` flags of the scene.

use crate::geometry::{Point, Rect, segments};
use crate::model::{ConnectionKey, ObjectKey, Scene};

/// A lasso drag is ignored below this size in both directions.
const MIN_LASSO_SIZE: i32 = 3;

/// A rectangle dragged out in canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lasso {
    pub start: Point,
    pub end: Point,
}

impl Lasso {
    pub fn new(start: Point) -> Self {
        Self { start, end: start }
    }

    pub fn update(&mut self, end: Point) {
        self.end = end;
    }

    /// Normalised rectangle spanned by the lasso.
    pub fn rect(&self) -> Rect {
        Rect::from_corners(self.start, self.end)
    }

    pub fn is_meaningful(&self) -> bool {
        let rect = self.rect();
        rect.width >= MIN_LASSO_SIZE || rect.height >= MIN_LASSO_SIZE
    }
}

#[derive(Debug, Clone, Default)]
pub struct CanvasSelection {
    objects: Vec<ObjectKey>,
    connections: Vec<ConnectionKey>,
    lasso: Option<Lasso>,
}

impl CanvasSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn objects(&self) -> &[ObjectKey] {
        &self.objects
    }

    pub fn connections(&self) -> &[ConnectionKey] {
        &self.connections
    }

    pub fn lasso(&self) -> Option<&Lasso> {
        self.lasso.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty() && self.connections.is_empty()
    }

    pub fn contains_object(&self, key: ObjectKey) -> bool {
        self.objects.contains(&key)
    }

    pub fn contains_connection(&self, key: ConnectionKey) -> bool {
        self.connections.contains(&key)
    }

    pub fn clear(&mut self) {
        self.objects.clear();
        self.connections.clear();
        self.lasso = None;
    }

    /// Select one object only.
    pub fn select_object(&mut self, key: ObjectKey) {
        self.objects.clear();
        self.connections.clear();
        self.objects.push(key);
    }

    pub fn select_connection(&mut self, key: ConnectionKey) {
        self.objects.clear();
        self.connections.clear();
        self.connections.push(key);
    }

    pub fn toggle_object(&mut self, key: ObjectKey) {
        match self.objects.iter().position(|&k| k == key) {
            Some(pos) => {
                self.objects.remove(pos);
            }
            None => self.objects.push(key),
        }
    }

    pub fn toggle_connection(&mut self, key: ConnectionKey) {
        match self.connections.iter().position(|&k| k == key) {
            Some(pos) => {
                self.connections.remove(pos);
            }
            None => self.connections.push(key),
        }
    }

    pub fn remove_object(&mut self, key: ObjectKey) {
        self.objects.retain(|&k| k != key);
    }

    pub fn start_lasso(&mut self, at: Point) {
        self.lasso = Some(Lasso::new(at));
    }

    pub fn update_lasso(&mut self, to: Point) {
        if let Some(lasso) = &mut self.lasso {
            lasso.update(to);
        }
    }

    pub fn cancel_lasso(&mut self) {
        self.lasso = None;
    }

    /// Finish the lasso: select every object whose bounds meet the lasso and
    /// every connection with a segment inside it. Returns the number of
    /// selected items, or `None` for a lasso too small to count.
    pub fn finish_lasso(&mut self, scene: &Scene) -> Option<usize> {
        let lasso = self.lasso.take()?;
        if !lasso.is_meaningful() {
            return None;
        }
        let rect = lasso.rect();
        self.objects = scene
            .objects()
            .filter(|(_, o)| o.bounds.intersects(&rect))
            .map(|(key, _)| key)
            .collect();
        self.connections = scene
            .connections()
            .filter(|(key, c)| {
                let Some((start, end)) = scene.connection_anchors(*key) else {
                    return false;
                };
                let points = c.route.polyline(start, end);
                segments(&points).any(|s| rect.contains(s.start) || rect.contains(s.end) || s.intersects_rect(&rect))
            })
            .map(|(key, _)| key)
            .collect();
        Some(self.objects.len() + self.connections.len())
    }

    /// Forget keys that left the scene.
    pub fn retain_existing(&mut self, scene: &Scene) {
        self.objects.retain(|&k| scene.object(k).is_some());
        self.connections.retain(|&k| scene.connection(k).is_some());
    }

    /// Write the selection into the scene's `selected` flags.
    pub fn apply_flags(&self, scene: &mut Scene) {
        let object_keys: Vec<ObjectKey> = scene.object_keys().to_vec();
        for key in object_keys {
            let selected = self.contains_object(key);
            if let Some(object) = scene.object_mut(key) {
                object.selected = selected;
            }
        }
        let connection_keys: Vec<ConnectionKey> = scene.connection_keys().to_vec();
        for key in connection_keys {
            let selected = self.contains_connection(key);
            if let Some(connection) = scene.connection_mut(key) {
                connection.selected = selected;
            }
        }
    }
}
