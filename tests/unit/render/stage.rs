use std::sync::Arc;

use super::*;
use crate::timeline::clip::SceneProps;
use crate::timeline::expr::{TimeConfig, TimeExpr};

const CANVAS: Canvas = Canvas {
    width: 8,
    height: 8,
};

fn solid(color: [u8; 4], rect: Option<Rect>) -> Element {
    Element::Solid {
        color,
        rect,
        opacity: 1.0,
    }
}

fn one_scene(tree: &mut ClipTree, secs: f64) -> ClipId {
    tree.add_scene(
        "s0",
        TimeConfig {
            duration: Some(TimeExpr::Secs(secs)),
            ..Default::default()
        },
        SceneProps::default(),
    )
}

fn info(tree: &ClipTree, scene: ClipId) -> SceneInfo {
    SceneInfo {
        id: scene,
        index: 0,
        name: tree.node(scene).name.clone(),
        abs_start: tree.start_time(scene),
        duration: tree.duration(scene),
        frame_count: 1,
    }
}

fn pixel(frame: &FrameRGBA, x: u32, y: u32) -> [u8; 4] {
    let i = ((y * frame.width + x) * 4) as usize;
    [
        frame.data[i],
        frame.data[i + 1],
        frame.data[i + 2],
        frame.data[i + 3],
    ]
}

#[test]
fn draw_before_bind_fails() {
    let mut tree = ClipTree::new();
    let s = one_scene(&mut tree, 1.0);
    let ann = tree.annotate();
    let scene = info(&tree, s);
    let mut stage = CpuStage::new();
    assert!(stage.begin_scene(&scene).is_err());
    let frame = StageFrame::sample(&tree, &ann, &scene, 0, 0.0, [0, 0, 0, 255]);
    assert!(stage.draw(&frame).is_err());
}

#[test]
fn background_and_solid_fill() {
    let mut tree = ClipTree::new();
    let s = one_scene(&mut tree, 1.0);
    tree.add_element(
        s,
        "red",
        TimeConfig::default(),
        solid([255, 0, 0, 255], Some(Rect::new(0.0, 0.0, 4.0, 8.0))),
    )
    .unwrap();
    let ann = tree.annotate();
    let scene = info(&tree, s);

    let mut stage = CpuStage::new();
    stage.bind_context(CANVAS, &PreparedAssets::new()).unwrap();
    stage.begin_scene(&scene).unwrap();
    let frame = stage
        .draw(&StageFrame::sample(&tree, &ann, &scene, 0, 0.0, [0, 0, 255, 255]))
        .unwrap();

    assert_eq!(frame.canvas(), CANVAS);
    assert_eq!(pixel(&frame, 1, 4), [255, 0, 0, 255]);
    assert_eq!(pixel(&frame, 6, 4), [0, 0, 255, 255]);
}

#[test]
fn prepared_image_is_drawn_into_rect() {
    let mut tree = ClipTree::new();
    let s = one_scene(&mut tree, 1.0);
    tree.add_element(
        s,
        "img",
        TimeConfig::default(),
        Element::Image {
            source: "green.png".to_owned(),
            rect: Some(Rect::new(0.0, 0.0, 8.0, 8.0)),
            opacity: 1.0,
        },
    )
    .unwrap();
    let mut assets = PreparedAssets::new();
    assets.insert_image(
        "green.png",
        PreparedImage {
            width: 2,
            height: 2,
            rgba8_premul: Arc::new([0, 255, 0, 255].repeat(4)),
        },
    );
    let ann = tree.annotate();
    let scene = info(&tree, s);

    let mut stage = CpuStage::new();
    stage.bind_context(CANVAS, &assets).unwrap();
    let frame = stage
        .draw(&StageFrame::sample(&tree, &ann, &scene, 0, 0.0, [0, 0, 0, 255]))
        .unwrap();
    assert_eq!(pixel(&frame, 4, 4), [0, 255, 0, 255]);
}

#[test]
fn transition_marker_hides_neighbors_but_keeps_them_active() {
    let mut tree = ClipTree::new();
    let s = one_scene(&mut tree, 4.0);
    let a = tree
        .add_element(s, "a", TimeConfig::span(0.0, 2.0), solid([255, 0, 0, 255], None))
        .unwrap();
    tree.add_element(s, "t", TimeConfig::span(1.5, 1.0), Element::Transition)
        .unwrap();
    let b = tree
        .add_element(s, "b", TimeConfig::span(1.5, 2.0), solid([0, 255, 0, 255], None))
        .unwrap();
    let ann = tree.annotate();
    let scene = info(&tree, s);

    let at = |t: f64| StageFrame::sample(&tree, &ann, &scene, 0, t, [0, 0, 0, 255]);
    let find = |f: &StageFrame<'_>, id: ClipId| {
        let item = f.items.iter().find(|i| i.id == id).unwrap();
        (item.visible, item.active)
    };

    let f = at(0.5);
    assert_eq!(find(&f, a), (true, true));
    assert_eq!(find(&f, b), (false, false));

    let f = at(1.7);
    assert_eq!(find(&f, a), (false, true));
    assert_eq!(find(&f, b), (false, true));

    let f = at(3.0);
    assert_eq!(find(&f, a), (false, false));
    assert_eq!(find(&f, b), (true, true));
    let local = f.items.iter().find(|i| i.id == b).unwrap().local_time;
    assert!((local - 1.5).abs() < 1e-9);
}

#[test]
fn release_drops_the_context() {
    let mut stage = CpuStage::new();
    stage.bind_context(CANVAS, &PreparedAssets::new()).unwrap();
    stage.release();
    assert!(stage.is_released());

    let mut tree = ClipTree::new();
    let s = one_scene(&mut tree, 1.0);
    let ann = tree.annotate();
    let scene = info(&tree, s);
    let frame = StageFrame::sample(&tree, &ann, &scene, 0, 0.0, [0, 0, 0, 255]);
    assert!(stage.draw(&frame).is_err());
}
