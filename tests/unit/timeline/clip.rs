use super::*;
use crate::animation::ease::Ease;
use crate::effects::transitions::TransitionKind;
use crate::timeline::expr::TimeExpr;

fn solid() -> Element {
    Element::Solid {
        color: [255, 0, 0, 255],
        rect: None,
        opacity: 1.0,
    }
}

fn crossfade(secs: f64) -> Option<TransitionSpec> {
    Some(TransitionSpec {
        kind: TransitionKind::Crossfade,
        duration_secs: secs,
        ease: Ease::Linear,
    })
}

fn scene(tree: &mut ClipTree, name: &str, secs: f64, trans: Option<TransitionSpec>) -> ClipId {
    tree.add_scene(
        name,
        TimeConfig {
            duration: Some(TimeExpr::Secs(secs)),
            ..Default::default()
        },
        SceneProps {
            transition: trans,
            ..Default::default()
        },
    )
}

fn cfg(start: Option<TimeExpr>, end: Option<TimeExpr>, duration: Option<TimeExpr>) -> TimeConfig {
    TimeConfig {
        start,
        end,
        duration,
    }
}

fn assert_window_consistent(tree: &ClipTree, id: ClipId) {
    let d = tree.end_time(id) - tree.start_time(id);
    assert!((d - tree.duration(id)).abs() < 1e-9);
}

#[test]
fn negative_percent_start_counts_from_parent_end() {
    let mut tree = ClipTree::new();
    let s = scene(&mut tree, "s0", 10.0, None);
    let c = tree
        .add_element(s, "c", cfg(Some(TimeExpr::parse("-30%")), None, None), solid())
        .unwrap();
    assert!((tree.start_time(c) - 7.0).abs() < 1e-9);
    // No end/duration: defaults to the parent's end.
    assert_eq!(tree.end_time(c), 10.0);
    assert_window_consistent(&tree, c);
}

#[test]
fn start_defaults_to_previous_sibling_end() {
    let mut tree = ClipTree::new();
    let s = scene(&mut tree, "s0", 10.0, None);
    let a = tree
        .add_element(s, "a", cfg(None, None, Some(TimeExpr::Secs(2.0))), solid())
        .unwrap();
    let b = tree
        .add_element(s, "b", cfg(None, None, Some(TimeExpr::Secs(3.0))), solid())
        .unwrap();
    assert_eq!(tree.start_time(a), 0.0);
    assert_eq!(tree.start_time(b), 2.0);
    assert_eq!(tree.end_time(b), 5.0);
    assert_eq!(tree.prev_sibling(b), Some(a));
    assert_eq!(tree.next_sibling(a), Some(b));
}

#[test]
fn zero_start_is_honored() {
    let mut tree = ClipTree::new();
    let s = scene(&mut tree, "s0", 10.0, None);
    let _a = tree
        .add_element(s, "a", cfg(None, None, Some(TimeExpr::Secs(4.0))), solid())
        .unwrap();
    let b = tree
        .add_element(s, "b", cfg(Some(TimeExpr::Secs(0.0)), None, None), solid())
        .unwrap();
    assert_eq!(tree.start_time(b), 0.0);
}

#[test]
fn scene_children_are_truncated_to_scene_duration() {
    let mut tree = ClipTree::new();
    let s = scene(&mut tree, "s0", 4.0, None);
    let c = tree
        .add_element(
            s,
            "c",
            cfg(Some(TimeExpr::Secs(1.0)), None, Some(TimeExpr::Secs(30.0))),
            solid(),
        )
        .unwrap();
    assert_eq!(tree.end_time(c), 4.0);
    assert_eq!(tree.duration(c), 3.0);
    assert!(tree.end_time(c) <= tree.duration(s));
}

#[test]
fn collapsed_window_is_floored_to_one_second() {
    let mut tree = ClipTree::new();
    let s = scene(&mut tree, "s0", 10.0, None);
    let c = tree
        .add_element(
            s,
            "c",
            cfg(Some(TimeExpr::parse("60%")), Some(TimeExpr::parse("20%")), None),
            solid(),
        )
        .unwrap();
    assert_eq!(tree.start_time(c), 6.0);
    assert_eq!(tree.end_time(c), 7.0);
    assert_window_consistent(&tree, c);
}

#[test]
fn config_mutation_is_visible_without_recompute() {
    let mut tree = ClipTree::new();
    let s = scene(&mut tree, "s0", 10.0, None);
    let c = tree
        .add_element(s, "c", cfg(None, None, Some(TimeExpr::Secs(2.0))), solid())
        .unwrap();
    assert_eq!(tree.end_time(c), 2.0);
    tree.config_mut(c).start = Some(TimeExpr::Secs(3.0));
    assert_eq!(tree.start_time(c), 3.0);
    assert_eq!(tree.end_time(c), 5.0);
    assert_window_consistent(&tree, c);
    tree.set_config(c, cfg(Some(TimeExpr::parse("50%")), None, None));
    assert_eq!(tree.start_time(c), 5.0);
    assert_eq!(tree.end_time(c), 10.0);
    assert_window_consistent(&tree, c);
}

#[test]
fn nested_percentages_use_group_duration() {
    let mut tree = ClipTree::new();
    let s = scene(&mut tree, "s0", 10.0, None);
    let g = tree
        .add_element(
            s,
            "g",
            cfg(Some(TimeExpr::Secs(2.0)), Some(TimeExpr::Secs(6.0)), None),
            Element::Group,
        )
        .unwrap();
    let c = tree
        .add_element(g, "c", cfg(Some(TimeExpr::parse("50%")), None, None), solid())
        .unwrap();
    assert_eq!(tree.duration(g), 4.0);
    assert_eq!(tree.start_time(c), 2.0);
    assert_eq!(tree.end_time(c), 4.0);
}

#[test]
fn scene_duration_derives_from_children_then_default() {
    let mut tree = ClipTree::new();
    let s = tree.add_scene("s0", TimeConfig::default(), SceneProps::default());
    assert_eq!(tree.scene_duration(s), DEFAULT_SCENE_DURATION_SECS);
    tree.add_element(s, "a", TimeConfig::span(1.0, 2.0), solid())
        .unwrap();
    tree.add_element(s, "b", cfg(None, None, Some(TimeExpr::Secs(4.5))), solid())
        .unwrap();
    // b starts at a's end (3.0) and runs 4.5s.
    assert_eq!(tree.scene_duration(s), 7.5);
    tree.set_default_scene_duration(2.0);
    let empty = tree.add_scene("s1", TimeConfig::default(), SceneProps::default());
    assert_eq!(tree.scene_duration(empty), 2.0);
}

#[test]
fn scene_offsets_subtract_outgoing_transitions() {
    let mut tree = ClipTree::new();
    let s0 = scene(&mut tree, "s0", 6.0, crossfade(1.0));
    let s1 = scene(&mut tree, "s1", 8.0, crossfade(1.0));
    let s2 = scene(&mut tree, "s2", 3.0, crossfade(2.0));
    assert_eq!(tree.scene_real_duration(s0), 5.0);
    assert_eq!(tree.scene_real_duration(s1), 7.0);
    // Last scene has no outgoing edge.
    assert_eq!(tree.scene_transition_secs(s2), 0.0);
    assert_eq!(tree.start_time(s1), 5.0);
    assert_eq!(tree.start_time(s2), 12.0);
    assert_eq!(tree.end_time(s2), 15.0);
    assert_eq!(tree.total_duration(), 15.0);
    assert_eq!(tree.duration(tree.root()), 15.0);
}

#[test]
fn remove_child_refreshes_sibling_links() {
    let mut tree = ClipTree::new();
    let s = scene(&mut tree, "s0", 10.0, None);
    let a = tree.add_element(s, "a", TimeConfig::span(0.0, 1.0), solid()).unwrap();
    let b = tree.add_element(s, "b", TimeConfig::span(1.0, 1.0), solid()).unwrap();
    let c = tree.add_element(s, "c", TimeConfig::span(2.0, 1.0), solid()).unwrap();
    tree.remove_child(s, b).unwrap();
    assert_eq!(tree.children(s), &[a, c]);
    assert_eq!(tree.next_sibling(a), Some(c));
    assert_eq!(tree.prev_sibling(c), Some(a));
    assert_eq!(tree.parent(b), None);
    assert!(tree.remove_child(s, b).is_err());
}

#[test]
fn elements_cannot_hang_off_leaf_or_root() {
    let mut tree = ClipTree::new();
    let s = scene(&mut tree, "s0", 10.0, None);
    let a = tree.add_element(s, "a", TimeConfig::default(), solid()).unwrap();
    assert!(tree.add_element(a, "x", TimeConfig::default(), solid()).is_err());
    let root = tree.root();
    assert!(tree.add_element(root, "x", TimeConfig::default(), solid()).is_err());
}

#[test]
fn annotate_trims_visibility_around_transition_markers() {
    let mut tree = ClipTree::new();
    let _s0 = scene(&mut tree, "s0", 6.0, crossfade(1.0));
    let s1 = scene(&mut tree, "s1", 10.0, None);
    let a = tree.add_element(s1, "a", TimeConfig::span(0.0, 4.0), solid()).unwrap();
    let t = tree
        .add_element(s1, "t", TimeConfig::span(3.0, 1.0), Element::Transition)
        .unwrap();
    let b = tree.add_element(s1, "b", TimeConfig::span(3.0, 4.0), solid()).unwrap();

    let ann = tree.annotate();
    let wa = ann.window(a).unwrap();
    assert_eq!((wa.abs_start, wa.abs_end), (5.0, 9.0));
    assert_eq!(wa.show_end, 8.0);
    let wb = ann.window(b).unwrap();
    assert_eq!((wb.abs_start, wb.show_start), (8.0, 9.0));

    // During the marker both clips keep animating but neither is shown.
    assert!(ann.is_active(a, 8.5) && ann.is_active(b, 8.5));
    assert!(!ann.is_visible(a, 8.5) && !ann.is_visible(b, 8.5));
    assert!(ann.is_active(t, 8.5));
    assert!(ann.is_visible(a, 7.9));
    assert!(ann.is_visible(b, 9.0));
}

#[test]
fn long_sibling_chains_resolve_in_order() {
    let mut tree = ClipTree::new();
    let s = tree.add_scene("s0", TimeConfig::default(), SceneProps::default());
    let step = cfg(None, None, Some(TimeExpr::Secs(0.1)));
    let ids: Vec<ClipId> = (0..300)
        .map(|i| tree.add_element(s, format!("c{i}"), step, solid()).unwrap())
        .collect();

    assert!((tree.scene_duration(s) - 30.0).abs() < 1e-6);
    let last = *ids.last().unwrap();
    assert!((tree.start_time(last) - 29.9).abs() < 1e-6);
    assert!((tree.end_time(last) - 30.0).abs() < 1e-6);

    let ann = tree.annotate();
    for (i, &id) in ids.iter().enumerate() {
        let w = ann.window(id).unwrap();
        assert!((w.abs_start - i as f64 * 0.1).abs() < 1e-6, "clip {i}");
        assert!((w.abs_end - w.abs_start - 0.1).abs() < 1e-6, "clip {i}");
    }
}

#[test]
fn transition_is_clamped_to_the_shorter_neighbour() {
    let mut tree = ClipTree::new();
    let a = scene(&mut tree, "a", 5.0, crossfade(3.0));
    let b = scene(&mut tree, "b", 1.0, None);
    let c = scene(&mut tree, "c", 2.0, None);

    assert_eq!(tree.scene_transition_secs(a), 1.0);
    assert_eq!(tree.scene_real_duration(a), 4.0);
    assert_eq!(tree.start_time(b), 4.0);
    assert_eq!(tree.start_time(c), 5.0);
    assert_eq!(tree.total_duration(), 7.0);

    let ann = tree.annotate();
    assert_eq!(ann.window(c).unwrap().abs_start, 5.0);
    assert_eq!(ann.window(tree.root()).unwrap().abs_end, 7.0);
}
