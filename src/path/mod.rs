//! Connection routing.
//!
//! A connection is either drawn straight between its anchors (as a gentle
//! vertical S-curve) or along an explicit orthogonal plan. Plans always hold
//! the full polyline: outlet anchor, bend points, inlet anchor. The first and
//! last segments are vertical so cables leave outlets and enter inlets
//! head-on.

mod lattice;
pub mod state;
pub mod updater;

pub use lattice::find_route;
pub use state::{decode_points, encode_points, route_from_token};
pub use updater::PathUpdater;

use crate::geometry::{Point, Rect, segments};
use crate::settings::RoutingSettings;

/// Vertical pull of the straight cable curve is clamped to this range.
const CURVE_MIN_OFFSET: i32 = 10;
const CURVE_MAX_OFFSET: i32 = 100;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Route {
    #[default]
    Straight,
    Segmented(Vec<Point>),
}

impl Route {
    pub fn is_segmented(&self) -> bool {
        matches!(self, Route::Segmented(_))
    }

    /// Polyline used for hit-testing and lasso checks.
    pub fn polyline(&self, start: Point, end: Point) -> Vec<Point> {
        match self {
            Route::Straight => vec![start, end],
            Route::Segmented(points) => points.clone(),
        }
    }
}

/// Whether a point list is a usable orthogonal plan.
pub fn is_valid_plan(points: &[Point]) -> bool {
    if points.len() < 4 {
        return false;
    }
    let axis_aligned = segments(points).all(|s| s.is_horizontal() || s.is_vertical());
    let vertical_ends = points[0].x == points[1].x && points[points.len() - 2].x == points[points.len() - 1].x;
    axis_aligned && vertical_ends
}

/// Route between two anchors that avoids `obstacles`, or [`Route::Straight`]
/// when the search finds nothing better than the direct line.
pub fn find_path(start: Point, end: Point, obstacles: &[Rect], settings: &RoutingSettings) -> Route {
    match find_route(start, end, obstacles, settings) {
        Some(points) if points.len() > 2 => Route::Segmented(points),
        _ => Route::Straight,
    }
}

/// Re-anchor a route after its iolets moved.
///
/// The outer points follow the anchors and their neighbours follow on x so
/// the end segments stay vertical. Plans that are not valid revert to
/// straight.
pub fn update_path(route: &Route, start: Point, end: Point) -> Route {
    let Route::Segmented(points) = route else {
        return Route::Straight;
    };
    if !is_valid_plan(points) {
        return Route::Straight;
    }
    let mut points = points.clone();
    let last = points.len() - 1;
    points[0] = start;
    points[1].x = start.x;
    points[last] = end;
    points[last - 1].x = end.x;
    if is_valid_plan(&points) {
        Route::Segmented(points)
    } else {
        Route::Straight
    }
}

/// Index of the segment closest to `position` within `tolerance` pixels.
/// Ties go to the lower index.
pub fn hit_test(points: &[Point], position: Point, tolerance: i32) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (index, segment) in segments(points).enumerate() {
        let distance = segment.distance_to(position);
        if distance > tolerance as f32 {
            continue;
        }
        if best.is_none_or(|(_, d)| distance < d) {
            best = Some((index, distance));
        }
    }
    best.map(|(index, _)| index)
}

/// Whether segment `index` may be dragged: it must not touch an anchor.
pub fn is_draggable_segment(points: &[Point], index: usize) -> bool {
    index >= 1 && index + 2 < points.len()
}

/// Move segment `index` perpendicular to its own axis by the matching
/// component of `delta`.
///
/// Both endpoints of the segment shift; every other point and the coordinate
/// along the segment stay put. Returns false when the segment cannot be
/// dragged.
pub fn drag_segment(points: &mut [Point], index: usize, delta: Point) -> bool {
    if !is_draggable_segment(points, index) {
        return false;
    }
    let (a, b) = (points[index], points[index + 1]);
    if a.y == b.y && a.x != b.x {
        points[index].y += delta.y;
        points[index + 1].y += delta.y;
    } else if a.x == b.x && a.y != b.y {
        points[index].x += delta.x;
        points[index + 1].x += delta.x;
    } else if a == b {
        // Collapsed segment: its axis follows from its neighbours.
        let horizontal = points[index - 1].x == a.x;
        if horizontal {
            points[index].y += delta.y;
            points[index + 1].y += delta.y;
        } else {
            points[index].x += delta.x;
            points[index + 1].x += delta.x;
        }
    } else {
        return false;
    }
    true
}

/// A plan with one horizontal run halfway between the anchors. Used when the
/// user starts dragging a straight cable.
///
/// Vertically aligned anchors get a vertical middle run between two empty
/// horizontal ones instead, so a sideways drag can put a kink in the cable.
/// [`default_plan_segment`] names the run to drag in either case.
pub fn default_plan(start: Point, end: Point) -> Vec<Point> {
    let dy = end.y - start.y;
    if start.x == end.x {
        let upper = Point::new(start.x, start.y + dy / 3);
        let lower = Point::new(start.x, start.y + 2 * dy / 3);
        return vec![start, upper, upper, lower, lower, end];
    }
    let mid = start.y + dy / 2;
    vec![start, Point::new(start.x, mid), Point::new(end.x, mid), end]
}

/// Index of the middle segment of a [`default_plan`].
pub fn default_plan_segment(plan: &[Point]) -> usize {
    (plan.len() / 2).saturating_sub(1)
}

/// Control points of the cubic curve drawn for a straight cable.
pub fn cable_curve(start: Point, end: Point) -> [Point; 4] {
    if (end.x - start.x).abs() < 2 {
        return [start, start, end, end];
    }
    let offset = ((end.y - start.y).abs() / 2).clamp(CURVE_MIN_OFFSET, CURVE_MAX_OFFSET);
    [
        start,
        Point::new(start.x, start.y + offset),
        Point::new(end.x, end.y - offset),
        end,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan() -> Vec<Point> {
        vec![
            Point::new(100, 100),
            Point::new(100, 150),
            Point::new(300, 150),
            Point::new(300, 200),
        ]
    }

    #[test]
    fn test_drag_horizontal_segment_moves_only_y() {
        let mut points = plan();
        assert!(drag_segment(&mut points, 1, Point::new(0, 20)));
        assert_eq!(
            points,
            vec![
                Point::new(100, 100),
                Point::new(100, 170),
                Point::new(300, 170),
                Point::new(300, 200),
            ]
        );
    }

    #[test]
    fn test_drag_ignores_parallel_component() {
        let mut points = plan();
        assert!(drag_segment(&mut points, 1, Point::new(35, 20)));
        assert_eq!(points[1].x, 100);
        assert_eq!(points[2].x, 300);
    }

    #[test]
    fn test_end_segments_are_not_draggable() {
        let mut points = plan();
        assert!(!drag_segment(&mut points, 0, Point::new(10, 10)));
        assert!(!drag_segment(&mut points, 2, Point::new(10, 10)));
        assert_eq!(points, plan());
    }

    #[test]
    fn test_vertical_cable_plan_bends_sideways() {
        let start = Point::new(100, 0);
        let end = Point::new(100, 300);
        let mut points = default_plan(start, end);
        let index = default_plan_segment(&points);
        assert_eq!(index, 2);
        assert!(is_valid_plan(&points));

        assert!(drag_segment(&mut points, index, Point::new(40, 7)));
        assert_eq!(
            points,
            vec![
                start,
                Point::new(100, 100),
                Point::new(140, 100),
                Point::new(140, 200),
                Point::new(100, 200),
                end,
            ]
        );
        assert!(is_valid_plan(&points));
    }

    #[test]
    fn test_offset_cable_plan_drags_its_horizontal_run() {
        let points = default_plan(Point::new(0, 0), Point::new(100, 100));
        assert_eq!(points.len(), 4);
        assert_eq!(default_plan_segment(&points), 1);
    }

    #[test]
    fn test_hit_test_picks_closest_segment() {
        let points = plan();
        assert_eq!(hit_test(&points, Point::new(200, 152), 3), Some(1));
        assert_eq!(hit_test(&points, Point::new(98, 120), 3), Some(0));
        assert_eq!(hit_test(&points, Point::new(200, 160), 3), None);
    }

    #[test]
    fn test_hit_test_tie_goes_to_lower_index() {
        let points = plan();
        // The corner is equidistant from segments 0 and 1.
        assert_eq!(hit_test(&points, Point::new(100, 150), 3), Some(0));
    }

    #[test]
    fn test_update_path_reanchors() {
        let route = Route::Segmented(plan());
        let moved = update_path(&route, Point::new(110, 90), Point::new(320, 210));
        assert_eq!(
            moved,
            Route::Segmented(vec![
                Point::new(110, 90),
                Point::new(110, 150),
                Point::new(320, 150),
                Point::new(320, 210),
            ])
        );
    }

    #[test]
    fn test_update_path_rejects_invalid_plan() {
        let route = Route::Segmented(vec![Point::new(0, 0), Point::new(10, 10), Point::new(20, 20)]);
        assert_eq!(update_path(&route, Point::new(0, 0), Point::new(20, 20)), Route::Straight);
    }

    #[test]
    fn test_cable_curve_clamps_offset() {
        let curve = cable_curve(Point::new(0, 0), Point::new(50, 400));
        assert_eq!(curve[1], Point::new(0, 100));
        assert_eq!(curve[2], Point::new(50, 300));

        let short = cable_curve(Point::new(0, 0), Point::new(50, 6));
        assert_eq!(short[1], Point::new(0, 10));
    }

    #[test]
    fn test_cable_curve_vertical_is_a_line() {
        let curve = cable_curve(Point::new(10, 0), Point::new(11, 80));
        assert_eq!(curve, [Point::new(10, 0), Point::new(10, 0), Point::new(11, 80), Point::new(11, 80)]);
    }
}
