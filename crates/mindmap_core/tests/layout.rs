use mindmap_core::layout::{measure_text, next_child_slot};
use mindmap_core::{compute_layout, EngineConfig, LayoutConfig, MindMap, Position, TopicPatch};

#[test]
fn roots_are_ordered_around_the_selected_anchor() {
    let mut map = MindMap::default();
    let a = map.add_main_topic(Position::new(500.0, 10.0)).unwrap();
    let b = map.add_main_topic(Position::new(-40.0, 75.0)).unwrap();
    let c = map.add_main_topic(Position::new(-900.0, 300.0)).unwrap();
    map.select(b);

    assert_eq!(map.perform_auto_layout(), 2);

    let ax = map.topic(a).unwrap().position.x;
    let bx = map.topic(b).unwrap().position.x;
    let cx = map.topic(c).unwrap().position.x;
    assert!(ax < bx && bx < cx, "expected {ax} < {bx} < {cx}");
    assert_eq!(map.topic(b).unwrap().position, Position::new(-40.0, 75.0));
}

#[test]
fn layout_is_deterministic_for_identical_input() {
    let mut map = MindMap::with_central_topic(EngineConfig::default());
    let root = map.roots()[0];
    let first = map.add_subtopic(root).unwrap();
    map.add_subtopic(first).unwrap();
    map.add_subtopic(root).unwrap();
    map.update_topic(first, &TopicPatch::name("a much longer\ntwo line label"))
        .unwrap();

    let preview_one = map.preview_layout();
    let preview_two = map.preview_layout();
    assert_eq!(preview_one, preview_two);

    map.perform_auto_layout();
    let positions: Vec<Position> = map.store().iter().map(|topic| topic.position).collect();
    assert_eq!(map.perform_auto_layout(), 0);
    let again: Vec<Position> = map.store().iter().map(|topic| topic.position).collect();
    assert_eq!(positions, again);
}

#[test]
fn children_sit_right_of_parent_and_centered() {
    let mut map = MindMap::with_central_topic(EngineConfig::default());
    let root = map.roots()[0];
    let top = map.add_subtopic(root).unwrap();
    let bottom = map.add_subtopic(root).unwrap();
    map.perform_auto_layout();

    let parent = map.topic(root).unwrap().position;
    let top = map.topic(top).unwrap().position;
    let bottom = map.topic(bottom).unwrap().position;
    assert!(top.x > parent.x && bottom.x > parent.x);
    assert!(top.y < bottom.y);
    assert!(((top.y + bottom.y) / 2.0 - parent.y).abs() < 1e-9);
}

#[test]
fn collapsed_descendants_are_not_positioned() {
    let mut map = MindMap::with_central_topic(EngineConfig::default());
    let root = map.roots()[0];
    let branch = map.add_subtopic(root).unwrap();
    let hidden = map.add_subtopic(branch).unwrap();
    map.collapse_toggle(branch).unwrap();

    let result = map.preview_layout();
    assert!(result.position_of(branch).is_some());
    assert!(result.position_of(hidden).is_none());

    let hidden_before = map.topic(hidden).unwrap().position;
    map.perform_auto_layout();
    assert_eq!(map.topic(hidden).unwrap().position, hidden_before);
}

#[test]
fn non_root_anchor_keeps_its_position() {
    let mut map = MindMap::with_central_topic(EngineConfig::default());
    let root = map.roots()[0];
    let child = map.add_subtopic(root).unwrap();
    map.move_topic(child, Position::new(777.0, -333.0)).unwrap();
    map.select(child);

    let result = map.preview_layout();
    assert_eq!(result.anchor, Some(child));
    assert_eq!(result.position_of(child), Some(Position::new(777.0, -333.0)));
    assert!(result.position_of(root).unwrap().x < 777.0);
}

#[test]
fn new_children_take_the_next_free_slot() {
    let config = LayoutConfig::default();
    let mut map = MindMap::with_central_topic(EngineConfig::default());
    let root = map.roots()[0];
    let first = map.add_subtopic(root).unwrap();
    let slot = next_child_slot(map.store(), root, "Subtopic", &config).unwrap();
    let second = map.add_subtopic(root).unwrap();

    assert_eq!(map.topic(second).unwrap().position, slot);
    assert!(slot.y > map.topic(first).unwrap().position.y);
    assert_eq!(slot.x, map.topic(first).unwrap().position.x);
}

#[test]
fn text_boxes_grow_with_lines_and_width() {
    let config = LayoutConfig::default();
    let short = measure_text("a", &config);
    let wide = measure_text("a considerably wider label", &config);
    let tall = measure_text("one\ntwo\nthree", &config);

    assert_eq!(short.width, config.min_box_width);
    assert!(wide.width > short.width);
    assert!(tall.height > short.height);
    assert!(compute_layout(&mindmap_core::TopicStore::new(), None, &config).is_empty());
}
