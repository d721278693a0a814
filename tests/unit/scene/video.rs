use super::*;
use crate::effects::transitions::TransitionKind;
use std::path::PathBuf;

const JSON: &str = r#"{
    "audio": [{ "path": "bed.mp3", "loop": true, "volume": 0.4 }],
    "scenes": [
        {
            "id": "intro",
            "duration": 6,
            "transition": { "kind": "crossfade", "duration": 1 },
            "children": [
                { "id": "bg", "kind": { "type": "solid", "color": [0, 0, 0, 255] } },
                { "id": "logo", "start": "10%", "duration": 2,
                  "kind": { "type": "image", "source": "img/logo.png" } }
            ]
        },
        {
            "id": "body",
            "transition": { "kind": "wipe", "duration": 0.5, "params": { "dir": "up" } },
            "audio": [{ "path": "voice.wav", "start": 1 }],
            "children": [
                { "id": "g", "start": 0, "end": 8, "kind": { "type": "group" }, "children": [
                    { "id": "photo", "start": "-50%", "kind": { "type": "image", "source": "img/logo.png" } }
                ] }
            ]
        },
        { "id": "outro", "duration": 3, "children": [] }
    ]
}"#;

#[test]
fn parses_and_builds_tree() {
    let video = Video::from_reader(JSON.as_bytes()).unwrap();
    let tree = video.tree();
    assert_eq!(video.scene_count(), 3);

    let scenes = tree.scenes().to_vec();
    assert_eq!(tree.duration(scenes[0]), 6.0);
    assert_eq!(tree.duration(scenes[1]), 8.0);
    assert_eq!(tree.start_time(scenes[1]), 5.0);
    assert_eq!(tree.start_time(scenes[2]), 12.5);
    assert_eq!(tree.total_duration(), 15.5);

    let props = tree.scene_props(scenes[1]).unwrap();
    assert_eq!(props.transition.as_ref().unwrap().kind.name(), "wipe");
    assert!(matches!(
        tree.scene_props(scenes[0]).unwrap().transition.as_ref().unwrap().kind,
        TransitionKind::Crossfade
    ));

    let logo = tree.children(scenes[0])[1];
    assert!((tree.start_time(logo) - 0.6).abs() < 1e-9);
    assert!((tree.end_time(logo) - 2.6).abs() < 1e-9);

    let group = tree.children(scenes[1])[0];
    let photo = tree.children(group)[0];
    assert_eq!(tree.start_time(photo), 4.0);
}

#[test]
fn audio_tracks_are_shifted_by_real_durations() {
    let video = Video::from_reader(JSON.as_bytes()).unwrap();
    let tracks = video.audio_tracks();
    assert_eq!(tracks.len(), 2);
    assert_eq!(tracks[0].path, PathBuf::from("bed.mp3"));
    assert!(tracks[0].looped);
    assert_eq!(tracks[1].path, PathBuf::from("voice.wav"));
    assert_eq!(tracks[1].start, 6.0);
}

#[test]
fn scene_audio_follows_a_transition_longer_than_the_next_scene() {
    let json = r#"{
        "scenes": [
            { "id": "a", "duration": 5, "transition": { "kind": "crossfade", "duration": 3 }, "children": [] },
            { "id": "b", "duration": 1, "children": [] },
            { "id": "c", "duration": 2, "audio": [{ "path": "c.wav" }], "children": [] }
        ]
    }"#;
    let video = Video::from_reader(json.as_bytes()).unwrap();
    let tree = video.tree();
    let c = tree.scenes()[2];
    let tracks = video.audio_tracks();
    assert_eq!(tracks.len(), 1);
    assert_eq!(tracks[0].start, 5.0);
    assert_eq!(tracks[0].start, tree.start_time(c));
}

#[test]
fn asset_refs_are_deduplicated() {
    let video = Video::from_reader(JSON.as_bytes()).unwrap();
    assert_eq!(
        video.asset_refs(),
        vec![
            AssetRef::Image("img/logo.png".to_owned()),
            AssetRef::Audio(PathBuf::from("bed.mp3")),
            AssetRef::Audio(PathBuf::from("voice.wav")),
        ]
    );
}

fn scene(id: &str) -> SceneDef {
    SceneDef {
        id: id.to_owned(),
        duration: Some(1.0),
        transition: None,
        audio: Vec::new(),
        background: None,
        children: Vec::new(),
    }
}

#[test]
fn rejects_invalid_descriptions() {
    assert!(Video::from_def(&VideoDef::default()).is_err());

    let dup = VideoDef {
        scenes: vec![scene("a"), scene("a")],
        audio: Vec::new(),
    };
    assert!(matches!(
        Video::from_def(&dup),
        Err(MontageError::Validation(_))
    ));

    let mut neg = scene("a");
    neg.duration = Some(-1.0);
    assert!(Video::from_def(&VideoDef {
        scenes: vec![neg],
        audio: Vec::new()
    })
    .is_err());

    let mut bad_id = scene("a/b");
    bad_id.duration = None;
    assert!(Video::from_def(&VideoDef {
        scenes: vec![bad_id],
        audio: Vec::new()
    })
    .is_err());

    let mut bad_trans = scene("a");
    bad_trans.transition = Some(TransitionDef {
        kind: "spin".to_owned(),
        duration: 1.0,
        ease: Default::default(),
        params: serde_json::Value::Null,
    });
    assert!(Video::from_def(&VideoDef {
        scenes: vec![bad_trans],
        audio: Vec::new()
    })
    .is_err());

    let mut nested = scene("a");
    nested.children = vec![ClipDef {
        id: "solid".to_owned(),
        time: TimeConfig::default(),
        kind: Element::Solid {
            color: [0; 4],
            rect: None,
            opacity: 1.0,
        },
        children: vec![ClipDef {
            id: "child".to_owned(),
            time: TimeConfig::default(),
            kind: Element::Group,
            children: Vec::new(),
        }],
    }];
    assert!(Video::from_def(&VideoDef {
        scenes: vec![nested],
        audio: Vec::new()
    })
    .is_err());

    let mut escape = scene("a");
    escape.children = vec![ClipDef {
        id: "img".to_owned(),
        time: TimeConfig::default(),
        kind: Element::Image {
            source: "../secret.png".to_owned(),
            rect: None,
            opacity: 1.0,
        },
        children: Vec::new(),
    }];
    assert!(Video::from_def(&VideoDef {
        scenes: vec![escape],
        audio: Vec::new()
    })
    .is_err());
}

#[test]
fn malformed_json_is_a_serde_error() {
    assert!(matches!(
        Video::from_reader("{\"scenes\": 3}".as_bytes()),
        Err(MontageError::Serde(_))
    ));
}
