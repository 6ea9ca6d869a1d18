use mindmap_core::{
    ChangeType, EngineConfig, LocalChangeTracker, MindMap, Position, RemoteChangeApplier,
    TopicPatch,
};
use serde_json::json;
use tokio::sync::mpsc;

fn drain_types(rx: &mut mpsc::UnboundedReceiver<mindmap_core::ChangeEnvelope>) -> Vec<ChangeType> {
    let mut types = Vec::new();
    while let Ok(envelope) = rx.try_recv() {
        types.push(envelope.change_type);
    }
    types
}

#[test]
fn local_edits_are_forwarded_as_envelopes() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut map = MindMap::default();
    LocalChangeTracker::new(tx).attach(&mut map);

    let a = map.add_main_topic(Position::default()).unwrap();
    let b = map.add_subtopic(a).unwrap();
    map.update_topic(b, &TopicPatch::name("renamed")).unwrap();
    map.move_topic(b, Position::new(300.0, 300.0)).unwrap();
    map.add_relation(a, b).unwrap();
    map.remove_relation(a, b).unwrap();
    map.collapse_toggle(a).unwrap();
    map.delete_topic(b).unwrap();

    assert_eq!(
        drain_types(&mut rx),
        vec![
            ChangeType::Create,
            ChangeType::Create,
            ChangeType::Update,
            ChangeType::Move,
            ChangeType::Connect,
            ChangeType::Disconnect,
            ChangeType::Delete,
        ]
    );
}

#[test]
fn layout_moves_become_move_envelopes() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut map = MindMap::with_central_topic(EngineConfig::default());
    let root = map.roots()[0];
    map.add_subtopic(root).unwrap();
    map.add_subtopic(root).unwrap();
    LocalChangeTracker::new(tx).attach(&mut map);

    let moved = map.perform_auto_layout();
    let types = drain_types(&mut rx);
    assert_eq!(types.len(), moved);
    assert!(types.iter().all(|kind| *kind == ChangeType::Move));
}

#[test]
fn remote_changes_are_not_echoed() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut origin = MindMap::default();
    let id = origin.add_main_topic(Position::new(5.0, 5.0)).unwrap();
    let create = mindmap_core::ChangeEnvelope::create(origin.topic(id).unwrap());

    let mut replica = MindMap::default();
    LocalChangeTracker::new(tx).attach(&mut replica);
    RemoteChangeApplier::new()
        .apply(&mut replica, &create)
        .unwrap();

    assert_eq!(replica.topic(id).unwrap().position, Position::new(5.0, 5.0));
    assert!(drain_types(&mut rx).is_empty());
}

#[test]
fn forwarded_envelopes_replay_on_a_replica() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut source = MindMap::default();
    LocalChangeTracker::new(tx).attach(&mut source);
    let a = source.add_main_topic(Position::default()).unwrap();
    let b = source.add_subtopic(a).unwrap();
    source.update_topic(b, &TopicPatch::color("#123456")).unwrap();
    let patch = TopicPatch {
        position: Some(Position::new(300.0, 40.0)),
        ..TopicPatch::default()
    };
    source.update_topic(a, &patch).unwrap();
    source.add_relation(a, b).unwrap();

    let mut replica = MindMap::default();
    let report = RemoteChangeApplier::new().drain(&mut replica, &mut rx);
    assert_eq!(report.dropped, 0);
    assert_eq!(replica.topic(a).unwrap().position, Position::new(300.0, 40.0));
    assert_eq!(replica.export_document(), source.export_document());
}

#[test]
fn update_envelope_carries_the_new_position() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut map = MindMap::default();
    let a = map.add_main_topic(Position::default()).unwrap();
    LocalChangeTracker::new(tx).attach(&mut map);

    let patch = TopicPatch {
        position: Some(Position::new(300.0, 40.0)),
        ..TopicPatch::default()
    };
    map.update_topic(a, &patch).unwrap();

    let envelope = rx.try_recv().unwrap();
    assert_eq!(envelope.change_type, ChangeType::Update);
    assert_eq!(
        envelope.properties.get("position"),
        Some(&json!({"x": 300.0, "y": 40.0}))
    );
}

#[test]
fn undo_and_redo_replay_on_a_replica() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut source = MindMap::default();
    LocalChangeTracker::new(tx).attach(&mut source);
    let mut replica = MindMap::default();
    let mut applier = RemoteChangeApplier::new();

    let a = source.add_main_topic(Position::default()).unwrap();
    let b = source.add_main_topic(Position::new(400.0, 0.0)).unwrap();
    source.add_relation(a, b).unwrap();
    applier.drain(&mut replica, &mut rx);
    assert!(replica.topic(a).unwrap().relations.contains(&b));

    assert!(source.undo());
    let report = applier.drain(&mut replica, &mut rx);
    assert_eq!(report.dropped, 0);
    assert!(replica.topic(a).unwrap().relations.is_empty());
    assert_eq!(replica.export_document(), source.export_document());

    assert!(source.redo());
    applier.drain(&mut replica, &mut rx);
    assert!(replica.topic(b).unwrap().relations.contains(&a));
    assert_eq!(replica.export_document(), source.export_document());
}

#[test]
fn undoing_a_delete_recreates_the_subtree_on_a_replica() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut source = MindMap::default();
    LocalChangeTracker::new(tx).attach(&mut source);
    let mut replica = MindMap::default();
    let mut applier = RemoteChangeApplier::new();

    let a = source.add_main_topic(Position::default()).unwrap();
    let b = source.add_subtopic(a).unwrap();
    let c = source.add_subtopic(b).unwrap();
    source.update_topic(c, &TopicPatch::name("leaf")).unwrap();
    source.delete_topic(b).unwrap();
    applier.drain(&mut replica, &mut rx);
    assert!(replica.topic(c).is_none());

    assert!(source.undo());
    let types: Vec<ChangeType> = {
        let mut pending = Vec::new();
        while let Ok(envelope) = rx.try_recv() {
            pending.push(envelope);
        }
        let types = pending.iter().map(|envelope| envelope.change_type).collect();
        let report = applier.apply_all(&mut replica, &pending);
        assert_eq!(report.dropped, 0);
        types
    };
    assert_eq!(types, vec![ChangeType::Create, ChangeType::Create]);
    assert_eq!(replica.topic(c).unwrap().name, "leaf");
    assert_eq!(replica.export_document(), source.export_document());

    assert!(source.redo());
    assert_eq!(drain_types(&mut rx), vec![ChangeType::Delete]);
}
