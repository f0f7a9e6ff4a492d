//! Path-state token codec.
//!
//! A token is the standard base64 text of the bincode encoding of the plan's
//! point list. The empty token means a straight cable.

use super::{Route, is_valid_plan, update_path};
use crate::error::PathStateError;
use crate::geometry::Point;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::debug;

pub fn encode_points(points: &[Point]) -> Result<String, PathStateError> {
    let bytes = bincode::serde::encode_to_vec(points, bincode::config::standard())?;
    Ok(STANDARD.encode(bytes))
}

pub fn decode_points(token: &str) -> Result<Vec<Point>, PathStateError> {
    let bytes = STANDARD.decode(token.trim())?;
    let (points, read): (Vec<Point>, usize) =
        bincode::serde::decode_from_slice(&bytes, bincode::config::standard())?;
    if read != bytes.len() {
        return Err(PathStateError::TrailingBytes);
    }
    if !is_valid_plan(&points) {
        return Err(PathStateError::InvalidPlan("expected at least four axis-aligned points"));
    }
    Ok(points)
}

/// Token for a route; straight routes encode as the empty string.
pub fn route_token(route: &Route) -> Result<String, PathStateError> {
    match route {
        Route::Straight => Ok(String::new()),
        Route::Segmented(points) => encode_points(points),
    }
}

/// Decode a persisted token into a route anchored at `start`/`end`.
/// Anything that does not decode to a valid plan is a straight cable.
pub fn route_from_token(token: &str, start: Point, end: Point) -> Route {
    if token.is_empty() {
        return Route::Straight;
    }
    match decode_points(token) {
        Ok(points) => update_path(&Route::Segmented(points), start, end),
        Err(err) => {
            debug!(%err, "discarding path state");
            Route::Straight
        }
    }
}
