use patchcanvas::{CanvasSettings, GridMode, SettingsError};
use std::io::Write;

#[test]
fn test_partial_file_keeps_defaults() -> anyhow::Result<()> {
    let mut file = tempfile::NamedTempFile::new()?;
    write!(file, r#"{{"grid": {{"mode": "objects", "tolerance": 6}}, "routing": {{"max_bends": 4}}}}"#)?;

    let settings = CanvasSettings::load(file.path())?;
    assert_eq!(settings.grid.mode, GridMode::Objects);
    assert_eq!(settings.grid.tolerance, 6);
    assert_eq!(settings.grid.size, 25);
    assert_eq!(settings.routing.max_bends, 4);
    assert_eq!(settings.routing.hit_tolerance, 3);
    Ok(())
}

#[test]
fn test_empty_object_is_default() -> anyhow::Result<()> {
    assert_eq!(CanvasSettings::from_json("{}")?, CanvasSettings::default());
    Ok(())
}

#[test]
fn test_missing_file_reports_path() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("absent.json");
    let err = CanvasSettings::load(&path).unwrap_err();
    assert!(matches!(err, SettingsError::Io { .. }));
    assert!(err.to_string().contains("absent.json"));
    Ok(())
}

#[test]
fn test_malformed_json_is_rejected() {
    let err = CanvasSettings::from_json(r#"{"grid": {"mode": "sometimes"}}"#).unwrap_err();
    assert!(matches!(err, SettingsError::Json(_)));
}

#[test]
fn test_grid_mode_index_mapping() {
    assert_eq!(GridMode::from_index(0), GridMode::Off);
    assert_eq!(GridMode::from_index(2), GridMode::Grid);
    assert_eq!(GridMode::from_index(9), GridMode::Off);
    assert!(GridMode::Both.snaps_to_objects() && GridMode::Both.snaps_to_grid());
    assert!(!GridMode::Grid.snaps_to_objects());
}
