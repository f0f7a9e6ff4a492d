use anyhow::Result;
use patchcanvas::{
    ConnectionKey, MemoryPatch, ObjectHandle, ObjectKey, PatchDocument, PatchObject, Rect, Scene, synchronise,
};

fn object(text: &str, x: i32, y: i32, inlets: usize, outlets: usize) -> PatchObject {
    PatchObject {
        text: text.to_string(),
        bounds: Rect::new(x, y, 50, 20),
        inlets: vec![false; inlets],
        outlets: vec![false; outlets],
    }
}

/// Three objects; the first feeds the second and the third.
fn three_object_patch() -> (MemoryPatch, [ObjectHandle; 3]) {
    let mut patch = MemoryPatch::new();
    let a = patch.insert_object(object("metro 100", 100, 100, 2, 1));
    let b = patch.insert_object(object("f", 100, 200, 2, 1));
    let c = patch.insert_object(object("print", 300, 200, 2, 0));
    patch.insert_connection(a, 0, b, 0).unwrap();
    patch.insert_connection(a, 0, c, 1).unwrap();
    (patch, [a, b, c])
}

fn handle_order(scene: &Scene) -> Vec<ObjectHandle> {
    scene.objects().filter_map(|(_, o)| o.handle).collect()
}

fn assert_no_dangling(scene: &Scene) {
    for (key, connection) in scene.connections() {
        assert!(scene.object(connection.outlet.object).is_some());
        assert!(scene.object(connection.inlet.object).is_some());
        assert!(scene.connection_anchors(key).is_some());
    }
}

#[test]
fn test_second_pass_is_a_noop() {
    let (mut patch, _) = three_object_patch();
    let mut scene = Scene::new();

    let first = synchronise(&mut scene, &mut patch);
    assert_eq!(first.objects_added, 3);
    assert_eq!(first.connections_added, 2);
    let objects: Vec<ObjectKey> = scene.object_keys().to_vec();
    let connections: Vec<ConnectionKey> = scene.connection_keys().to_vec();

    let second = synchronise(&mut scene, &mut patch);
    assert!(second.is_noop(), "{second:?}");
    assert_eq!(scene.object_keys(), objects.as_slice());
    assert_eq!(scene.connection_keys(), connections.as_slice());
    assert_no_dangling(&scene);
}

#[test]
fn test_flushes_twice_before_snapshot() {
    let (mut patch, _) = three_object_patch();
    let mut scene = Scene::new();
    synchronise(&mut scene, &mut patch);
    assert_eq!(patch.flush_count(), 2);
}

#[test]
fn test_object_order_follows_document() {
    let (mut patch, [a, b, c]) = three_object_patch();
    let mut scene = Scene::new();
    synchronise(&mut scene, &mut patch);
    assert_eq!(handle_order(&scene), vec![a, b, c]);

    patch.swap_objects(0, 2);
    let report = synchronise(&mut scene, &mut patch);
    assert_eq!(report.objects_added, 0);
    assert_eq!(handle_order(&scene), vec![c, b, a]);

    let expected: Vec<ObjectHandle> = patch.objects().iter().map(|e| e.handle).collect();
    assert_eq!(handle_order(&scene), expected);
}

#[test]
fn test_changed_object_keeps_its_identity() -> Result<()> {
    let (mut patch, [a, _, _]) = three_object_patch();
    let mut scene = Scene::new();
    synchronise(&mut scene, &mut patch);
    let marked = scene.find_object(a).unwrap();
    scene.object_mut(marked).unwrap().selected = true;

    // Unchanged pass.
    synchronise(&mut scene, &mut patch);
    assert_eq!(scene.find_object(a), Some(marked));

    // Property-changing pass.
    patch.move_object(a, 40, 0)?;
    let report = synchronise(&mut scene, &mut patch);
    assert_eq!(report.objects_updated, 1);
    assert_eq!(scene.find_object(a), Some(marked));
    let object = scene.object(marked).unwrap();
    assert!(object.selected);
    assert_eq!(object.content_bounds(), Rect::new(140, 100, 50, 20));
    Ok(())
}

#[test]
fn test_removing_middle_object_takes_only_its_connection() -> Result<()> {
    let (mut patch, [a, b, c]) = three_object_patch();
    let mut scene = Scene::new();
    synchronise(&mut scene, &mut patch);
    let survivor = scene
        .connections()
        .find(|(_, conn)| conn.inlet.object == scene.find_object(c).unwrap())
        .map(|(key, _)| key)
        .unwrap();
    let a_key = scene.find_object(a).unwrap();
    let c_key = scene.find_object(c).unwrap();

    patch.remove_objects(&[b])?;
    let report = synchronise(&mut scene, &mut patch);

    assert_eq!(report.objects_removed, 1);
    assert_eq!(report.connections_removed, 1);
    assert_eq!(scene.object_count(), 2);
    assert_eq!(scene.find_object(b), None);
    assert_eq!(scene.find_object(a), Some(a_key));
    assert_eq!(scene.find_object(c), Some(c_key));
    assert_eq!(scene.connection_keys(), &[survivor]);
    assert_no_dangling(&scene);
    Ok(())
}

#[test]
fn test_shrinking_iolets_purges_connections() {
    let (mut patch, [_, _, c]) = three_object_patch();
    let mut scene = Scene::new();
    synchronise(&mut scene, &mut patch);
    let c_key = scene.find_object(c).unwrap();

    patch.set_object_iolets(c, vec![false], Vec::new());
    let report = synchronise(&mut scene, &mut patch);

    assert_eq!(report.connections_removed, 1);
    assert_eq!(scene.connection_count(), 1);
    assert_eq!(scene.object(c_key).unwrap().num_inputs, 1);
    assert_no_dangling(&scene);
}

#[test]
fn test_new_inlet_keeps_existing_iolets() {
    let (mut patch, [_, _, c]) = three_object_patch();
    let mut scene = Scene::new();
    synchronise(&mut scene, &mut patch);
    let c_key = scene.find_object(c).unwrap();

    patch.set_object_iolets(c, vec![false, false, true], Vec::new());
    let report = synchronise(&mut scene, &mut patch);

    assert_eq!(report.objects_updated, 1);
    assert_eq!(report.connections_removed, 0);
    let object = scene.object(c_key).unwrap();
    assert_eq!(object.num_inputs, 3);
    assert!(object.inlets()[2].signal);
    assert_eq!(scene.connection_count(), 2);
}

#[test]
fn test_unresolvable_terminal_is_skipped() -> Result<()> {
    let json = r#"{
        "objects": {
            "1": {"text": "osc~ 440", "bounds": {"x": 100, "y": 100, "width": 60, "height": 20}, "inlets": [true, false], "outlets": [true]},
            "2": {"text": "dac~", "bounds": {"x": 100, "y": 200, "width": 60, "height": 20}, "inlets": [true, true], "outlets": []}
        },
        "connections": [
            {"handle": 3, "outlet_owner": 1, "outlet": 0, "inlet_owner": 2, "inlet": 0},
            {"handle": 4, "outlet_owner": 1, "outlet": 0, "inlet_owner": 2, "inlet": 5}
        ]
    }"#;
    let mut patch = MemoryPatch::from_json(json)?;
    let mut scene = Scene::new();

    let report = synchronise(&mut scene, &mut patch);
    assert_eq!(report.connections_added, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(scene.connection_count(), 1);

    // Skipped again on the next pass, and nothing else moves.
    let again = synchronise(&mut scene, &mut patch);
    assert_eq!(again.skipped, 1);
    assert!(again.is_noop());
    assert_no_dangling(&scene);
    Ok(())
}

#[test]
fn test_gui_label_follows_object_in_z_order() {
    let mut patch = MemoryPatch::new();
    let toggle = patch.insert_object(object("tgl", 0, 0, 1, 1));
    let _ = patch.insert_object(object("f", 100, 0, 2, 1));
    let mut scene = Scene::new();
    synchronise(&mut scene, &mut patch);

    let key = scene.find_object(toggle).unwrap();
    let layers: Vec<ObjectKey> = scene.z_order().iter().map(|z| z.object()).collect();
    assert_eq!(layers.iter().filter(|&&k| k == key).count(), 2);
    assert_eq!(scene.z_order().len(), 3);
}

fn rewired_patch(first_inlet: usize, second_inlet: usize) -> String {
    format!(
        r#"{{
        "objects": {{
            "1": {{"text": "metro 100", "bounds": {{"x": 100, "y": 100, "width": 60, "height": 20}}, "inlets": [false, false], "outlets": [false]}},
            "2": {{"text": "pack 0 0", "bounds": {{"x": 100, "y": 200, "width": 60, "height": 20}}, "inlets": [false, false], "outlets": [false]}}
        }},
        "connections": [
            {{"handle": 3, "outlet_owner": 1, "outlet": 0, "inlet_owner": 2, "inlet": {first_inlet}}},
            {{"handle": 4, "outlet_owner": 1, "outlet": 0, "inlet_owner": 2, "inlet": {second_inlet}}}
        ]
    }}"#
    )
}

fn wiring(scene: &Scene) -> Vec<(u64, usize)> {
    scene.connections().map(|(_, c)| (c.handle.0, c.inlet.index)).collect()
}

#[test]
fn test_rewired_connection_is_replaced_in_place() -> Result<()> {
    let mut before = MemoryPatch::from_json(&rewired_patch(0, 1))?;
    let mut after = MemoryPatch::from_json(&rewired_patch(1, 0))?;
    let mut scene = Scene::new();
    synchronise(&mut scene, &mut before);
    assert_eq!(wiring(&scene), vec![(3, 0), (4, 1)]);

    let report = synchronise(&mut scene, &mut after);
    assert_eq!(report.connections_replaced, 2);
    assert_eq!(report.connections_added, 0);
    assert_eq!(report.connections_removed, 0);
    assert_eq!(wiring(&scene), vec![(3, 1), (4, 0)]);
    assert_no_dangling(&scene);

    assert!(synchronise(&mut scene, &mut after).is_noop());
    Ok(())
}
