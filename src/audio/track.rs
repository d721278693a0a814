use std::path::PathBuf;

use crate::foundation::error::{MontageError, MontageResult};

/// An audio input placed on the final timeline.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AudioTrack {
    /// Source file. Relative paths resolve against the asset root.
    pub path: PathBuf,
    /// Offset in seconds. Scene-level tracks are scene-relative until merged.
    #[serde(default)]
    pub start: f64,
    /// Repeat the source until the video ends.
    #[serde(default, rename = "loop")]
    pub looped: bool,
    /// Linear gain.
    #[serde(default = "default_volume")]
    pub volume: f64,
    /// Fade-in length in seconds.
    #[serde(default)]
    pub fade_in: f64,
    /// Fade-out length in seconds, ending with the video.
    #[serde(default)]
    pub fade_out: f64,
}

fn default_volume() -> f64 {
    1.0
}

impl AudioTrack {
    /// Track at `start` seconds with default gain and no fades.
    pub fn new(path: impl Into<PathBuf>, start: f64) -> Self {
        Self {
            path: path.into(),
            start,
            looped: false,
            volume: 1.0,
            fade_in: 0.0,
            fade_out: 0.0,
        }
    }

    /// Reject non-finite or negative parameters.
    pub fn validate(&self) -> MontageResult<()> {
        if self.path.as_os_str().is_empty() {
            return Err(MontageError::validation("audio track path must be non-empty"));
        }
        for (name, v) in [
            ("start", self.start),
            ("volume", self.volume),
            ("fade_in", self.fade_in),
            ("fade_out", self.fade_out),
        ] {
            if !v.is_finite() || v < 0.0 {
                return Err(MontageError::validation(format!(
                    "audio track {name} must be finite and >= 0 (got {v})"
                )));
            }
        }
        Ok(())
    }

    /// Return `true` when the track needs gain or fade filters.
    pub fn has_shaping(&self) -> bool {
        (self.volume - 1.0).abs() > f64::EPSILON || self.fade_in > 0.0 || self.fade_out > 0.0
    }
}

/// Audio owned by one scene, with the scene's real duration.
#[derive(Clone, Copy, Debug)]
pub struct SceneAudio<'a> {
    /// Scene duration minus its own outgoing transition.
    pub real_duration: f64,
    /// Scene-relative tracks.
    pub tracks: &'a [AudioTrack],
}

/// Merge creator-level tracks and per-scene tracks into one absolute list.
///
/// A scene's tracks are shifted by the summed real durations of every scene before it.
pub fn merge_audio_tracks(creator: &[AudioTrack], scenes: &[SceneAudio<'_>]) -> Vec<AudioTrack> {
    let mut out = creator.to_vec();
    let mut offset = 0.0;
    for scene in scenes {
        out.extend(scene.tracks.iter().map(|t| AudioTrack {
            start: t.start + offset,
            ..t.clone()
        }));
        offset += scene.real_duration.max(0.0);
    }
    out
}

#[cfg(test)]
#[path = "../../tests/unit/audio/track.rs"]
mod tests;
