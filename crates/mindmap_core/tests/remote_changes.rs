use mindmap_core::sync::envelope::MalformedEnvelope;
use mindmap_core::sync::remote_applier::SkipReason;
use mindmap_core::{
    ApplyError, ApplyOutcome, ChangeEnvelope, ChangeOrigin, ChangeType, DocumentEvent, Frame,
    MindMap, Position, RemoteChangeApplier, StoreError,
};
use serde_json::json;
use std::cell::RefCell;
use std::rc::Rc;
use uuid::Uuid;

fn create_envelope(id: Uuid, parent: Option<Uuid>) -> ChangeEnvelope {
    let mut body = json!({
        "type": "create",
        "topicId": id.to_string(),
        "properties": { "name": "Remote", "position": { "x": 10.0, "y": 20.0 } }
    });
    if let Some(parent) = parent {
        body["properties"]["parentId"] = json!(parent.to_string());
    }
    serde_json::from_value(body).unwrap()
}

#[test]
fn create_is_idempotent() {
    let mut map = MindMap::default();
    let mut applier = RemoteChangeApplier::new();
    let id = Uuid::new_v4();
    let envelope = create_envelope(id, None);

    assert_eq!(applier.apply(&mut map, &envelope).unwrap(), ApplyOutcome::Applied(id));
    assert_eq!(
        applier.apply(&mut map, &envelope).unwrap(),
        ApplyOutcome::Skipped { topic_id: id, reason: SkipReason::AlreadyExists }
    );
    assert_eq!(map.store().len(), 1);
    let topic = map.topic(id).unwrap();
    assert_eq!(topic.name, "Remote");
    assert_eq!(topic.position, Position::new(10.0, 20.0));
}

#[test]
fn delete_of_absent_topic_is_a_no_op() {
    let mut map = MindMap::default();
    let mut applier = RemoteChangeApplier::new();
    let keep = map.add_main_topic(Position::default()).unwrap();
    let id = Uuid::new_v4();
    applier.apply(&mut map, &create_envelope(id, None)).unwrap();

    let delete = ChangeEnvelope::delete(id);
    assert_eq!(applier.apply(&mut map, &delete).unwrap(), ApplyOutcome::Applied(id));
    assert_eq!(
        applier.apply(&mut map, &delete).unwrap(),
        ApplyOutcome::Skipped { topic_id: id, reason: SkipReason::AlreadyAbsent }
    );
    assert_eq!(map.roots(), &[keep]);
}

#[test]
fn create_under_parent_inherits_style_and_ownership() {
    let mut map = MindMap::default();
    let mut applier = RemoteChangeApplier::new();
    let parent = map.add_main_topic(Position::default()).unwrap();
    let child = Uuid::new_v4();

    applier.apply(&mut map, &create_envelope(child, Some(parent))).unwrap();
    assert_eq!(map.store().children(parent), &[child]);
    assert_eq!(
        map.topic(child).unwrap().style,
        map.topic(parent).unwrap().style
    );

    let orphan = create_envelope(Uuid::new_v4(), Some(Uuid::new_v4()));
    assert!(matches!(
        applier.apply(&mut map, &orphan),
        Err(ApplyError::NotFound(_))
    ));
}

#[test]
fn malformed_envelopes_are_dropped_before_mutation() {
    let mut map = MindMap::default();
    let mut applier = RemoteChangeApplier::new();
    let id = Uuid::new_v4();
    let no_position: ChangeEnvelope = serde_json::from_value(json!({
        "type": "create",
        "topicId": id.to_string(),
        "properties": { "name": "Lost" }
    }))
    .unwrap();

    let err = applier.apply(&mut map, &no_position).unwrap_err();
    assert_eq!(
        err,
        ApplyError::Malformed(MalformedEnvelope::MissingProperty {
            change_type: ChangeType::Create,
            property: "position",
        })
    );
    assert!(map.store().is_empty());
    assert!(map.history().is_empty());

    let empty_update = ChangeEnvelope::new(ChangeType::Update, id);
    assert!(matches!(
        applier.apply(&mut map, &empty_update),
        Err(ApplyError::Malformed(MalformedEnvelope::EmptyUpdate))
    ));
    assert!(matches!(
        applier.apply_frame(&mut map, &Frame::Text("{not json".to_string())),
        Err(ApplyError::Decode(_))
    ));
    assert_eq!(applier.totals().dropped, 3);
}

#[test]
fn move_changes_position_but_not_ownership() {
    let mut map = MindMap::default();
    let mut applier = RemoteChangeApplier::new();
    let parent = map.add_main_topic(Position::default()).unwrap();
    let child = map.add_subtopic(parent).unwrap();

    let envelope = ChangeEnvelope::moved(child, Position::new(-5.0, 7.5));
    assert_eq!(applier.apply(&mut map, &envelope).unwrap(), ApplyOutcome::Applied(child));
    assert_eq!(map.topic(child).unwrap().position, Position::new(-5.0, 7.5));
    assert_eq!(map.topic(child).unwrap().parent_id, Some(parent));
}

#[test]
fn connect_and_disconnect_keep_relations_symmetric() {
    let mut map = MindMap::default();
    let mut applier = RemoteChangeApplier::new();
    let parent = map.add_main_topic(Position::default()).unwrap();
    let child = map.add_subtopic(parent).unwrap();

    let connect = ChangeEnvelope::connect(child, parent);
    assert_eq!(applier.apply(&mut map, &connect).unwrap(), ApplyOutcome::Applied(child));
    assert!(map.topic(parent).unwrap().relations.contains(&child));
    assert!(matches!(
        applier.apply(&mut map, &connect).unwrap(),
        ApplyOutcome::Skipped { reason: SkipReason::NoChange, .. }
    ));

    let self_loop = ChangeEnvelope::connect(child, child);
    assert_eq!(
        applier.apply(&mut map, &self_loop).unwrap_err(),
        ApplyError::Store(StoreError::SelfReference(child))
    );

    applier
        .apply(&mut map, &ChangeEnvelope::disconnect(parent, child))
        .unwrap();
    assert!(map.topic(child).unwrap().relations.is_empty());
    assert!(map.topic(parent).unwrap().relations.is_empty());
}

#[test]
fn later_updates_win_in_arrival_order() {
    let mut map = MindMap::default();
    let mut applier = RemoteChangeApplier::new();
    let id = map.add_main_topic(Position::default()).unwrap();
    let first = ChangeEnvelope::new(ChangeType::Update, id).with_property("name", json!("first"));
    let second = ChangeEnvelope::new(ChangeType::Update, id)
        .with_property("name", json!("second"))
        .with_property("color", json!("#00ff00"));

    let report = applier.apply_all(&mut map, [&first, &second]);
    assert_eq!(report.applied, 2);
    let topic = map.topic(id).unwrap();
    assert_eq!(topic.name, "second");
    assert_eq!(topic.style.background_color, "#00ff00");
}

#[test]
fn remote_edits_publish_remote_origin_events() {
    let mut map = MindMap::default();
    let origins: Rc<RefCell<Vec<Option<ChangeOrigin>>>> = Rc::default();
    let sink = Rc::clone(&origins);
    map.subscribe(move |event: &DocumentEvent| sink.borrow_mut().push(event.origin()));

    let mut applier = RemoteChangeApplier::new();
    applier
        .apply(&mut map, &create_envelope(Uuid::new_v4(), None))
        .unwrap();
    assert_eq!(origins.borrow().as_slice(), &[Some(ChangeOrigin::Remote)]);
}

#[test]
fn drain_applies_everything_queued() {
    let mut map = MindMap::default();
    let mut applier = RemoteChangeApplier::new();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    tx.send(create_envelope(a, None)).unwrap();
    tx.send(create_envelope(b, Some(a))).unwrap();
    tx.send(create_envelope(a, None)).unwrap();
    tx.send(ChangeEnvelope::new(ChangeType::Move, b)).unwrap();

    let report = applier.drain(&mut map, &mut rx);
    assert_eq!((report.applied, report.skipped, report.dropped), (2, 1, 1));
    assert_eq!(report.total(), 4);
    assert_eq!(map.store().children(a), &[b]);
    assert_eq!(applier.drain(&mut map, &mut rx).total(), 0);
}
