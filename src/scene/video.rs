use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use anyhow::Context;

use crate::assets::prepare::{AssetRef, normalize_rel_path};
use crate::audio::track::{AudioTrack, SceneAudio, merge_audio_tracks};
use crate::effects::transitions::{TransitionDef, TransitionSpec};
use crate::foundation::error::{MontageError, MontageResult};
use crate::scene::element::Element;
use crate::timeline::clip::{ClipId, ClipTree, SceneProps};
use crate::timeline::expr::{TimeConfig, TimeExpr};

/// JSON root of a video description.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct VideoDef {
    /// Scenes in playback order.
    pub scenes: Vec<SceneDef>,
    /// Tracks placed on the absolute timeline.
    #[serde(default)]
    pub audio: Vec<AudioTrack>,
}

/// One scene.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SceneDef {
    /// Unique identifier; prefixes the scene's cache files.
    pub id: String,
    /// Length in seconds. Derived from the children when absent.
    #[serde(default)]
    pub duration: Option<f64>,
    /// Blend into the next scene.
    #[serde(default)]
    pub transition: Option<TransitionDef>,
    /// Scene-relative tracks.
    #[serde(default)]
    pub audio: Vec<AudioTrack>,
    /// Clear color (straight RGBA8).
    #[serde(default)]
    pub background: Option<[u8; 4]>,
    /// Top-level clips.
    #[serde(default)]
    pub children: Vec<ClipDef>,
}

/// One clip inside a scene or a group.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ClipDef {
    /// Identifier for diagnostics.
    #[serde(default)]
    pub id: String,
    /// `start`, `end` and `duration` expressions.
    #[serde(flatten)]
    pub time: TimeConfig,
    /// Content.
    pub kind: Element,
    /// Nested clips (groups only).
    #[serde(default)]
    pub children: Vec<ClipDef>,
}

/// A validated video: the clip tree plus the creator-level audio.
#[derive(Clone, Debug)]
pub struct Video {
    tree: ClipTree,
    audio: Vec<AudioTrack>,
}

impl Video {
    /// Parse and validate a JSON description file.
    pub fn from_path(path: impl AsRef<Path>) -> MontageResult<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .with_context(|| format!("open video description '{}'", path.display()))?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    /// Parse and validate a JSON description.
    pub fn from_reader(mut reader: impl Read) -> MontageResult<Self> {
        let mut buf = String::new();
        reader
            .read_to_string(&mut buf)
            .context("read video description")?;
        let def: VideoDef = serde_json::from_str(&buf)
            .map_err(|e| MontageError::serde(format!("video json: {e}")))?;
        Self::from_def(&def)
    }

    /// Validate `def` and build its clip tree.
    pub fn from_def(def: &VideoDef) -> MontageResult<Self> {
        if def.scenes.is_empty() {
            return Err(MontageError::validation("video must contain at least one scene"));
        }
        for t in &def.audio {
            t.validate()?;
        }

        let mut tree = ClipTree::new();
        let mut seen = HashSet::new();
        for scene in &def.scenes {
            validate_scene_id(&scene.id)?;
            if !seen.insert(scene.id.as_str()) {
                return Err(MontageError::validation(format!(
                    "duplicate scene id '{}'",
                    scene.id
                )));
            }
            if let Some(d) = scene.duration
                && (!d.is_finite() || d < 0.0)
            {
                return Err(MontageError::validation(format!(
                    "scene '{}' duration must be finite and >= 0",
                    scene.id
                )));
            }
            for t in &scene.audio {
                t.validate()?;
            }
            let transition = scene
                .transition
                .as_ref()
                .map(TransitionSpec::from_def)
                .transpose()?;

            let id = tree.add_scene(
                scene.id.clone(),
                TimeConfig {
                    duration: scene.duration.map(TimeExpr::Secs),
                    ..TimeConfig::default()
                },
                SceneProps {
                    transition,
                    audio: scene.audio.clone(),
                    background: scene.background,
                },
            );
            add_clips(&mut tree, id, &scene.children)?;
        }

        Ok(Self {
            tree,
            audio: def.audio.clone(),
        })
    }

    /// Clip tree.
    pub fn tree(&self) -> &ClipTree {
        &self.tree
    }

    /// Mutable clip tree. Time getters see edits immediately.
    pub fn tree_mut(&mut self) -> &mut ClipTree {
        &mut self.tree
    }

    /// Tracks on the absolute timeline.
    pub fn creator_audio(&self) -> &[AudioTrack] {
        &self.audio
    }

    /// Number of scenes.
    pub fn scene_count(&self) -> usize {
        self.tree.scenes().len()
    }

    /// Creator tracks followed by every scene's tracks shifted onto the absolute timeline.
    pub fn audio_tracks(&self) -> Vec<AudioTrack> {
        let scenes: Vec<SceneAudio<'_>> = self
            .tree
            .scenes()
            .iter()
            .map(|&s| SceneAudio {
                real_duration: self.tree.scene_real_duration(s),
                tracks: self
                    .tree
                    .scene_props(s)
                    .map_or(&[][..], |p| p.audio.as_slice()),
            })
            .collect();
        merge_audio_tracks(&self.audio, &scenes)
    }

    /// Media the run needs, images first, without duplicates.
    pub fn asset_refs(&self) -> Vec<AssetRef> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        let mut stack: Vec<ClipId> = self.tree.scenes().iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            if let Some(src) = self.tree.element(id).and_then(Element::asset_source) {
                let r = AssetRef::Image(src.to_owned());
                if seen.insert(r.clone()) {
                    out.push(r);
                }
            }
            stack.extend(self.tree.children(id).iter().rev().copied());
        }
        for t in self.audio_tracks() {
            let r = AssetRef::Audio(t.path);
            if seen.insert(r.clone()) {
                out.push(r);
            }
        }
        out
    }
}

fn validate_scene_id(id: &str) -> MontageResult<()> {
    if id.is_empty() {
        return Err(MontageError::validation("scene id must be non-empty"));
    }
    if id.contains(['/', '\\']) || id == "." || id == ".." {
        return Err(MontageError::validation(format!(
            "scene id '{id}' must be usable as a file name prefix"
        )));
    }
    Ok(())
}

fn add_clips(tree: &mut ClipTree, parent: ClipId, clips: &[ClipDef]) -> MontageResult<()> {
    for clip in clips {
        if let Some(src) = clip.kind.asset_source() {
            normalize_rel_path(src)?;
        }
        if let Element::Solid { opacity, .. } | Element::Image { opacity, .. } = &clip.kind
            && !(0.0..=1.0).contains(opacity)
        {
            return Err(MontageError::validation(format!(
                "clip '{}' opacity must be in [0, 1]",
                clip.id
            )));
        }
        let id = tree.add_element(parent, clip.id.clone(), clip.time, clip.kind.clone())?;
        if !clip.children.is_empty() {
            add_clips(tree, id, &clip.children)?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/scene/video.rs"]
mod tests;
