use mindmap_core::{
    ChangeOrigin, DocumentEvent, DocumentTree, EditError, EngineConfig, MindMap, Position,
    TopicPatch,
};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

#[test]
fn deleting_main_topic_removes_its_subtopics_and_relations() {
    let mut map = MindMap::default();
    let m = map.add_main_topic(Position::default()).unwrap();
    map.update_topic(m, &TopicPatch::name("M")).unwrap();
    let s1 = map.add_subtopic(m).unwrap();
    let s2 = map.add_subtopic(m).unwrap();
    let other = map.add_main_topic(Position::new(0.0, 500.0)).unwrap();
    map.add_relation(s1, other).unwrap();

    assert_eq!(map.store().children(m), &[s1, s2]);
    assert_eq!(map.delete_topic(m), Some(m));
    assert!(map.topic(s1).is_none());
    assert!(map.topic(s2).is_none());
    assert_eq!(map.roots(), &[other]);
    assert!(map.topic(other).unwrap().relations.is_empty());
}

#[test]
fn subtopics_inherit_parent_style() {
    let mut map = MindMap::default();
    let m = map.add_main_topic(Position::default()).unwrap();
    map.update_topic(m, &TopicPatch::color("#ff0000")).unwrap();

    let child = map.add_subtopic(m).unwrap();
    assert_eq!(map.topic(child).unwrap().style.background_color, "#ff0000");
    assert_eq!(map.topic(child).unwrap().parent_id, Some(m));
    assert!(map.add_subtopic(uuid::Uuid::new_v4()).is_none());
}

#[test]
fn reparent_into_own_descendant_fails_and_leaves_tree_unchanged() {
    let mut map = MindMap::default();
    let x = map.add_main_topic(Position::default()).unwrap();
    let mid = map.add_subtopic(x).unwrap();
    let y = map.add_subtopic(mid).unwrap();
    let before = map.export_document();
    let depth = map.history().len();

    assert_eq!(map.reparent(x, y), Err(EditError::Cycle { child: x, parent: y }));
    assert_eq!(map.export_document(), before);
    assert_eq!(map.history().len(), depth);
    assert_eq!(map.reparent(x, uuid::Uuid::new_v4()), Ok(None));
}

#[test]
fn reparent_moves_the_whole_subtree_into_the_new_slot() {
    let mut map = MindMap::default();
    let left = map.add_main_topic(Position::default()).unwrap();
    let right = map.add_main_topic(Position::new(0.0, 400.0)).unwrap();
    let branch = map.add_subtopic(left).unwrap();
    let leaf = map.add_subtopic(branch).unwrap();
    let offset_before = {
        let b = map.topic(branch).unwrap().position;
        let l = map.topic(leaf).unwrap().position;
        (l.x - b.x, l.y - b.y)
    };

    assert_eq!(map.reparent(branch, right), Ok(Some(branch)));
    assert_eq!(map.store().children(right), &[branch]);
    assert!(map.store().children(left).is_empty());
    let b = map.topic(branch).unwrap().position;
    let l = map.topic(leaf).unwrap().position;
    assert!((l.x - b.x - offset_before.0).abs() < 1e-9);
    assert!((l.y - b.y - offset_before.1).abs() < 1e-9);
    assert_eq!(b.y, 400.0);
}

#[test]
fn sole_empty_root_cannot_be_deleted() {
    let mut map = MindMap::with_central_topic(EngineConfig::default());
    let root = map.roots()[0];

    assert_eq!(map.delete_topic(root), None);
    assert_eq!(map.roots(), &[root]);
    assert!(map.history().is_empty());
}

#[test]
fn adding_to_collapsed_parent_expands_it() {
    let mut map = MindMap::with_central_topic(EngineConfig::default());
    let root = map.roots()[0];
    map.add_subtopic(root).unwrap();
    assert_eq!(map.collapse_toggle(root), Some(true));

    map.add_subtopic(root).unwrap();
    assert!(!map.topic(root).unwrap().is_collapsed);
}

#[test]
fn text_edits_are_coalesced_into_one_undo_step_per_interval() {
    let mut map = MindMap::with_central_topic(EngineConfig::default());
    let root = map.roots()[0];
    let start = Instant::now();
    assert!(map.begin_editing(root));

    map.edit_text(root, "a", start).unwrap();
    map.edit_text(root, "ab", start + Duration::from_millis(100))
        .unwrap();
    assert_eq!(map.history().len(), 1);
    map.edit_text(root, "abc", start + Duration::from_secs(2))
        .unwrap();
    assert_eq!(map.history().len(), 2);
    map.end_editing();
    assert!(!map.topic(root).unwrap().is_editing);

    assert!(map.undo());
    assert_eq!(map.topic(root).unwrap().name, "ab");
    assert!(map.undo());
    assert_eq!(map.topic(root).unwrap().name, "Main Topic");
}

#[test]
fn selection_is_exclusive_and_transient() {
    let mut map = MindMap::default();
    let a = map.add_main_topic(Position::default()).unwrap();
    let b = map.add_main_topic(Position::new(0.0, 200.0)).unwrap();

    assert!(map.select(a));
    assert!(map.select(b));
    assert!(!map.topic(a).unwrap().is_selected);
    assert!(map.topic(b).unwrap().is_selected);
    assert_eq!(map.selection(), Some(b));
    assert!(!map.select(uuid::Uuid::new_v4()));

    map.clear_selection();
    assert_eq!(map.selection(), None);
    assert!(!map.topic(b).unwrap().is_selected);
}

#[test]
fn export_import_round_trips_and_resets_transient_state() {
    let mut map = MindMap::default();
    let a = map.add_main_topic(Position::default()).unwrap();
    let child = map.add_subtopic(a).unwrap();
    let b = map.add_main_topic(Position::new(0.0, 300.0)).unwrap();
    map.add_relation(child, b).unwrap();
    map.begin_editing(child);

    let json = serde_json::to_string(&map.export_document()).unwrap();
    let document: DocumentTree = serde_json::from_str(&json).unwrap();
    assert_eq!(document.topic_count(), 3);

    let mut restored = MindMap::default();
    assert_eq!(restored.import_document(&document).unwrap(), 3);
    assert_eq!(restored.roots(), &[a, b]);
    assert_eq!(restored.store().children(a), &[child]);
    assert!(restored.topic(b).unwrap().relations.contains(&child));
    assert!(restored.store().iter().all(|topic| !topic.is_selected && !topic.is_editing));
    assert!(restored.history().is_empty());
    assert_eq!(restored.selection(), None);
}

#[test]
fn observers_see_local_events_in_order() {
    let mut map = MindMap::default();
    let seen: Rc<RefCell<Vec<&'static str>>> = Rc::default();
    let sink = Rc::clone(&seen);
    let subscription = map.subscribe(move |event| {
        assert_eq!(event.origin().unwrap_or(ChangeOrigin::Local), ChangeOrigin::Local);
        sink.borrow_mut().push(match event {
            DocumentEvent::TopicCreated { .. } => "created",
            DocumentEvent::TopicUpdated { .. } => "updated",
            DocumentEvent::TopicDeleted { .. } => "deleted",
            DocumentEvent::HistoryRestored { .. } => "restored",
            _ => "other",
        });
    });

    let a = map.add_main_topic(Position::default()).unwrap();
    let b = map.add_main_topic(Position::new(0.0, 100.0)).unwrap();
    map.update_topic(a, &TopicPatch::name("renamed")).unwrap();
    map.delete_topic(b).unwrap();
    map.undo();
    assert_eq!(
        seen.borrow().as_slice(),
        &["created", "created", "updated", "deleted", "created", "restored"]
    );

    assert!(map.unsubscribe(subscription));
    map.add_main_topic(Position::default()).unwrap();
    assert_eq!(seen.borrow().len(), 6);
}
