//! Orthogonal route search over a coarse lattice.
//!
//! Candidate bend coordinates are taken from a lattice spanning the two
//! anchors at increasing resolutions. The bend limit is deepened two bends at
//! a time, and for each limit a depth-first branch-and-bound search
//! alternates vertical and horizontal moves, scoring complete routes by
//! `(bends, manhattan length)`. All resolutions compete within one bend
//! limit. The best route only changes on a strict improvement, so the first
//! route found in traversal order wins ties and the result is reproducible
//! for identical input.

use crate::geometry::{Point, Rect, Segment};
use crate::settings::RoutingSettings;
use tracing::trace;

const RESOLUTIONS: std::ops::RangeInclusive<i32> = 3..=6;

/// `(bends, length)`, compared lexicographically.
type Score = (usize, i64);

/// Search for an orthogonal route from `start` (an outlet anchor) to `end`
/// (an inlet anchor). The returned polyline includes both anchors.
///
/// Returns `None` when the search budget runs out without a route.
pub fn find_route(start: Point, end: Point, obstacles: &[Rect], settings: &RoutingSettings) -> Option<Vec<Point>> {
    let lattices: Vec<(i32, Vec<i32>, Vec<i32>)> = RESOLUTIONS
        .map(|r| {
            (
                r,
                lattice_lines(start.y, end.y, r, settings),
                lattice_lines(start.x, end.x, r, settings),
            )
        })
        .collect();

    let mut expansions = 0usize;
    // Bend points come in vertical/horizontal pairs.
    for max_bends in (0..=settings.max_bends).step_by(2) {
        // Every resolution competes at this limit; a later lattice only
        // replaces the route on a strict improvement.
        let mut best: Option<(Score, Vec<Point>)> = None;
        for (resolution, rows, columns) in &lattices {
            let mut search = Search {
                end,
                obstacles,
                rows,
                columns,
                max_bends,
                budget: settings.max_expansions,
                expansions,
                best: best.take(),
            };
            let mut path = vec![start];
            search.visit(&mut path, true, 0);
            expansions = search.expansions;
            best = search.best;
            if let Some(((bends, length), _)) = &best {
                trace!(resolution, max_bends, bends, length, expansions, "best lattice route so far");
            }
            if expansions >= settings.max_expansions {
                trace!(expansions, "lattice search budget exhausted");
                return best.map(|(_, route)| route);
            }
        }
        if let Some((_, route)) = best {
            return Some(route);
        }
    }
    trace!(expansions, "no lattice route");
    None
}

/// Lattice coordinates along one axis, ordered by closeness to `to` so the
/// most promising bends are tried first.
fn lattice_lines(from: i32, to: i32, resolution: i32, settings: &RoutingSettings) -> Vec<i32> {
    let span = to - from;
    let min_step = settings.min_lattice_step.max(1);
    let pad = settings.lattice_padding.max(0);
    let indices = -pad..=resolution + pad;

    let mut lines: Vec<i32> = if (span / resolution).abs() < min_step {
        let step = if span < 0 { -min_step } else { min_step };
        indices.map(|i| from + i * step).collect()
    } else {
        // Scale before dividing so line `resolution` lands exactly on `to`.
        indices.map(|i| from + i * span / resolution).collect()
    };
    lines.push(to);
    lines.push(from);
    lines.sort_unstable_by_key(|&c| ((c - to).abs(), c));
    lines.dedup();
    lines
}

struct Search<'a> {
    end: Point,
    obstacles: &'a [Rect],
    rows: &'a [i32],
    columns: &'a [i32],
    max_bends: usize,
    budget: usize,
    expansions: usize,
    best: Option<(Score, Vec<Point>)>,
}

impl Search<'_> {
    fn is_clear(&self, segment: Segment) -> bool {
        !self.obstacles.iter().any(|r| segment.intersects_rect(r))
    }

    fn beats_best(&self, score: Score) -> bool {
        self.best.as_ref().is_none_or(|(best, _)| score < *best)
    }

    /// Extend `path`, whose next move is vertical when `vertical` is set.
    fn visit(&mut self, path: &mut Vec<Point>, vertical: bool, length: i64) {
        if self.expansions >= self.budget {
            return;
        }
        self.expansions += 1;

        let Some(&current) = path.last() else {
            return;
        };
        let bends = path.len() - 1;
        let end = self.end;

        // Finish with a downward run into the inlet.
        if vertical && current.x == end.x && current.y < end.y {
            let last = Segment::new(current, end);
            if self.is_clear(last) {
                let score = (bends, length + i64::from(end.y - current.y));
                if self.beats_best(score) {
                    let mut route = path.clone();
                    route.push(end);
                    self.best = Some((score, route));
                }
                // Going deeper can only add bends.
                return;
            }
        }

        let remaining = match (vertical, current.x == end.x) {
            (true, true) => 0,
            (true, false) => 2,
            (false, _) => 1,
        };
        if bends + remaining > self.max_bends {
            return;
        }
        if !self.beats_best((bends + remaining, length + current.manhattan_to(end))) {
            return;
        }

        if vertical {
            let leaving_outlet = path.len() == 1;
            // Without room for another bend pair, the next horizontal run
            // must be the one above the inlet.
            let above_inlet_only = bends + 4 > self.max_bends;
            let rows = self.rows;
            for &y in rows {
                if y == current.y || (leaving_outlet && y < current.y) || (above_inlet_only && y >= end.y) {
                    continue;
                }
                let next = current.with_y(y);
                if !self.is_clear(Segment::new(current, next)) {
                    continue;
                }
                path.push(next);
                self.visit(path, false, length + i64::from((y - current.y).abs()));
                path.pop();
            }
        } else {
            // Likewise the last vertical run has to be the inlet's column.
            let inlet_column_only = bends + 3 > self.max_bends;
            let columns = self.columns;
            for &x in columns {
                if x == current.x || (inlet_column_only && x != end.x) {
                    continue;
                }
                let next = current.with_x(x);
                if !self.is_clear(Segment::new(current, next)) {
                    continue;
                }
                path.push(next);
                self.visit(path, true, length + i64::from((x - current.x).abs()));
                path.pop();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lattice_lines_respect_min_step() {
        let settings = RoutingSettings::default();
        let lines = lattice_lines(100, 130, 3, &settings);
        assert!(lines.contains(&120));
        assert!(lines.contains(&130));
        assert!(lines.contains(&60));
        assert_eq!(lines[0], 130);
    }

    #[test]
    fn test_clear_vertical_line_is_trivial() {
        let settings = RoutingSettings::default();
        let route = find_route(Point::new(50, 50), Point::new(50, 200), &[], &settings);
        assert_eq!(route, Some(vec![Point::new(50, 50), Point::new(50, 200)]));
    }

    #[test]
    fn test_offset_anchors_get_a_z_route() {
        let settings = RoutingSettings::default();
        let route = find_route(Point::new(0, 0), Point::new(120, 90), &[], &settings).unwrap();
        assert_eq!(route.len(), 4);
        assert_eq!(route[0], Point::new(0, 0));
        assert_eq!(route[3], Point::new(120, 90));
        assert_eq!(route[1].x, 0);
        assert_eq!(route[2].x, 120);
        assert_eq!(route[1].y, route[2].y);
    }
}
