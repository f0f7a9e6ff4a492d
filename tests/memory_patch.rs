use anyhow::Result;
use patchcanvas::document::with_undo_sequence;
use patchcanvas::{DocumentError, MemoryPatch, PatchDocument, PatchObject, Rect};

fn object(text: &str, x: i32, y: i32) -> PatchObject {
    PatchObject {
        text: text.to_string(),
        bounds: Rect::new(x, y, 40, 20),
        inlets: vec![false, true],
        outlets: vec![true],
    }
}

#[test]
fn test_sequence_undoes_as_one_step() -> Result<()> {
    let mut patch = MemoryPatch::new();
    let a = patch.insert_object(object("osc~", 0, 0));
    let b = patch.insert_object(object("lop~", 0, 100));

    with_undo_sequence(&mut patch, "Move", |doc| {
        doc.move_object(a, 10, 0)?;
        doc.move_object(b, 10, 0)
    })?;
    assert_eq!(patch.history().undo_depth(), 1);
    assert_eq!(patch.history().last_label(), Some("Move"));
    assert_eq!(patch.history().open_sequences(), 0);

    assert!(patch.undo());
    assert_eq!(patch.object(a).unwrap().bounds.x, 0);
    assert_eq!(patch.object(b).unwrap().bounds.x, 0);

    assert!(patch.redo());
    assert_eq!(patch.object(a).unwrap().bounds.x, 10);
    assert_eq!(patch.object(b).unwrap().bounds.x, 10);
    Ok(())
}

#[test]
fn test_failed_body_still_closes_sequence() {
    let mut patch = MemoryPatch::new();
    let a = patch.insert_object(object("osc~", 0, 0));

    let result = with_undo_sequence(&mut patch, "Connect", |doc| doc.create_connection(a, 3, a, 0));
    assert!(matches!(result, Err(DocumentError::IoletOutOfRange { .. })));
    assert_eq!(patch.history().open_sequences(), 0);
    assert!(!patch.history().can_undo());
}

#[test]
fn test_unbalanced_end_is_tolerated() {
    let mut patch = MemoryPatch::new();
    patch.end_undo_sequence("Move");
    assert_eq!(patch.history().open_sequences(), 0);
}

#[test]
fn test_connection_rules() -> Result<()> {
    let mut patch = MemoryPatch::new();
    let osc = patch.insert_object(object("osc~", 0, 0));
    let metro = patch.insert_object(PatchObject {
        text: "metro 100".to_string(),
        bounds: Rect::new(0, 100, 60, 20),
        inlets: vec![false, false],
        outlets: vec![false],
    });

    // Signal outlet into a control inlet.
    assert!(matches!(
        patch.create_connection(osc, 0, metro, 0),
        Err(DocumentError::InvalidConnection { .. })
    ));
    patch.create_connection(metro, 0, osc, 0)?;
    assert!(patch.create_connection(metro, 0, osc, 0).is_err());
    Ok(())
}

#[test]
fn test_removing_object_restores_connections_on_undo() -> Result<()> {
    let mut patch = MemoryPatch::new();
    let a = patch.insert_object(object("osc~", 0, 0));
    let b = patch.insert_object(object("lop~", 0, 100));
    let link = patch.insert_connection(a, 0, b, 1)?;
    patch.set_connection_path_state(link, "route")?;

    with_undo_sequence(&mut patch, "Remove", |doc| doc.remove_objects(&[b]))?;
    assert!(patch.connection(link).is_none());
    assert_eq!(patch.objects().len(), 1);

    assert!(patch.undo());
    assert_eq!(patch.objects().len(), 2);
    assert_eq!(patch.connection(link).unwrap().path_state, "route");
    Ok(())
}

#[test]
fn test_json_round_trip_keeps_order_and_ids() -> Result<()> {
    let mut patch = MemoryPatch::new();
    let a = patch.insert_object(object("osc~", 0, 0));
    let b = patch.insert_object(object("dac~", 0, 100));
    patch.insert_connection(a, 0, b, 1)?;

    let loaded = MemoryPatch::from_json(&patch.to_json()?)?;
    let handles: Vec<_> = loaded.objects().iter().map(|e| e.handle).collect();
    assert_eq!(handles, vec![a, b]);
    assert_eq!(loaded.connections(), patch.connections());

    // Fresh handles never collide with loaded ones.
    let mut loaded = loaded;
    let c = loaded.create_object("print", 0, 200)?;
    assert!(c.0 > b.0);
    Ok(())
}
