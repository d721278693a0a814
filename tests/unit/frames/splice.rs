use super::*;

fn info(total: usize, trans: usize) -> SceneFrameInfo {
    SceneFrameInfo { total, trans }
}

#[test]
fn three_scene_sequence_shares_overlaps() {
    let plan = splice_frames(&[info(10, 3), info(12, 2), info(8, 0)]).unwrap();
    assert_eq!(plan.entries.len(), 25);
    assert_eq!(plan.frame_starts, vec![0, 7, 17]);

    let blended_01 = plan
        .entries
        .iter()
        .filter(|e| e.scene_index == 0 && e.blend.is_some())
        .count();
    let blended_12 = plan
        .entries
        .iter()
        .filter(|e| e.scene_index == 1 && e.blend.is_some())
        .count();
    let blended_2 = plan
        .entries
        .iter()
        .filter(|e| e.scene_index == 2 && e.blend.is_some())
        .count();
    assert_eq!((blended_01, blended_12, blended_2), (3, 2, 0));
    assert_eq!(plan.blended_count(), 5);

    for (i, e) in plan.entries.iter().enumerate() {
        assert_eq!(e.index, i);
    }
}

#[test]
fn blend_maps_tail_onto_next_scene_head() {
    let plan = splice_frames(&[info(10, 3), info(12, 2), info(8, 0)]).unwrap();
    let e = plan.entries[8];
    assert_eq!((e.scene_index, e.local_index), (0, 8));
    let b = e.blend.unwrap();
    assert_eq!((b.scene_index, b.local_index), (1, 1));

    // Scene 1 resumes unblended right after the shared window.
    let e = plan.entries[10];
    assert_eq!((e.scene_index, e.local_index, e.blend), (1, 3, None));
}

#[test]
fn progress_starts_at_zero_and_stays_below_one() {
    let plan = splice_frames(&[info(10, 4), info(10, 0)]).unwrap();
    let progress: Vec<f32> = plan
        .entries
        .iter()
        .filter_map(|e| e.blend.map(|b| b.progress))
        .collect();
    assert_eq!(progress, vec![0.0, 0.25, 0.5, 0.75]);
    assert!(progress.iter().all(|p| *p < 1.0));
}

#[test]
fn overlap_is_clamped_to_neighbor_lengths() {
    let plan = splice_frames(&[info(5, 9), info(3, 0)]).unwrap();
    assert_eq!(plan.overlaps, vec![3, 0]);
    assert_eq!(plan.entries.len(), 5);
    let last = plan.entries[4].blend.unwrap();
    assert_eq!(last.local_index, 2);
}

#[test]
fn last_scene_transition_is_ignored() {
    let plan = splice_frames(&[info(4, 2)]).unwrap();
    assert_eq!(plan.entries.len(), 4);
    assert_eq!(plan.blended_count(), 0);
}

#[test]
fn empty_input_is_empty_plan() {
    let plan = splice_frames(&[]).unwrap();
    assert!(plan.entries.is_empty());
}
