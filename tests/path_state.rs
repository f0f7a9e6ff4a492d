use patchcanvas::PathStateError;
use patchcanvas::path::state::route_token;
use patchcanvas::path::{decode_points, encode_points, route_from_token};
use patchcanvas::{Point, Route};
use rstest::rstest;

fn plan() -> Vec<Point> {
    vec![
        Point::new(120, 60),
        Point::new(120, 90),
        Point::new(-40, 90),
        Point::new(-40, 210),
        Point::new(300, 210),
        Point::new(300, 260),
    ]
}

#[test]
fn test_token_round_trip() -> anyhow::Result<()> {
    let token = encode_points(&plan())?;
    assert!(!token.is_empty());
    assert_eq!(decode_points(&token)?, plan());
    assert_eq!(encode_points(&decode_points(&token)?)?, token);
    Ok(())
}

#[test]
fn test_straight_route_has_empty_token() -> anyhow::Result<()> {
    assert_eq!(route_token(&Route::Straight)?, "");
    assert_eq!(route_from_token("", Point::new(0, 0), Point::new(0, 100)), Route::Straight);
    Ok(())
}

#[test]
fn test_decoded_route_follows_anchors() -> anyhow::Result<()> {
    let token = encode_points(&plan())?;
    let route = route_from_token(&token, Point::new(130, 60), Point::new(310, 270));
    let Route::Segmented(points) = route else {
        panic!("expected a segmented route");
    };
    assert_eq!(points[0], Point::new(130, 60));
    assert_eq!(points[1], Point::new(130, 90));
    assert_eq!(points[4], Point::new(310, 210));
    assert_eq!(points[5], Point::new(310, 270));
    Ok(())
}

#[rstest]
#[case::empty("")]
#[case::not_base64("this is not base64!")]
#[case::trailing_bytes("AAAA")]
#[case::truncated("AQ==")]
#[case::whitespace("   ")]
fn test_garbage_token_is_straight(#[case] token: &str) {
    assert_eq!(
        route_from_token(token, Point::new(0, 0), Point::new(50, 100)),
        Route::Straight
    );
}

#[test]
fn test_two_point_list_is_not_a_plan() -> anyhow::Result<()> {
    let token = encode_points(&[Point::new(0, 0), Point::new(0, 100)])?;
    assert!(matches!(decode_points(&token), Err(PathStateError::InvalidPlan(_))));
    assert_eq!(route_from_token(&token, Point::new(0, 0), Point::new(0, 100)), Route::Straight);
    Ok(())
}

#[test]
fn test_diagonal_plan_is_rejected() -> anyhow::Result<()> {
    let token = encode_points(&[
        Point::new(0, 0),
        Point::new(0, 20),
        Point::new(40, 60),
        Point::new(40, 100),
    ])?;
    assert!(decode_points(&token).is_err());
    Ok(())
}
