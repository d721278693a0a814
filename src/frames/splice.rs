use crate::foundation::error::{MontageError, MontageResult};
use crate::frames::buffer::Frames;

/// Frame counts of one rendered scene.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SceneFrameInfo {
    /// Frames rendered for the scene.
    pub total: usize,
    /// Frames of its outgoing transition (0 for the last scene).
    pub trans: usize,
}

impl SceneFrameInfo {
    /// Counts taken from a scene's frame buffer.
    pub fn of(frames: &Frames) -> Self {
        Self {
            total: frames.total(),
            trans: frames.trans_frames_num,
        }
    }
}

/// Second input of a blended global frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BlendSource {
    /// Incoming scene.
    pub scene_index: usize,
    /// Frame of the incoming scene, counted from its own start.
    pub local_index: usize,
    /// Blend progress in `[0, 1)`.
    pub progress: f32,
}

/// One frame of the global timeline.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GlobalFrameEntry {
    /// Global frame index.
    pub index: usize,
    /// Scene that produced the frame.
    pub scene_index: usize,
    /// Frame of that scene.
    pub local_index: usize,
    /// `None` passes the frame through unchanged.
    pub blend: Option<BlendSource>,
}

/// Result of [`splice_frames`].
#[derive(Clone, Debug, PartialEq)]
pub struct SplicePlan {
    /// Global frames in index order, without holes.
    pub entries: Vec<GlobalFrameEntry>,
    /// Global offset of each scene's first frame.
    pub frame_starts: Vec<usize>,
    /// Overlap actually used per scene edge, after clamping to both neighbors' lengths.
    pub overlaps: Vec<usize>,
}

impl SplicePlan {
    /// Number of blended frames.
    pub fn blended_count(&self) -> usize {
        self.entries.iter().filter(|e| e.blend.is_some()).count()
    }
}

/// Merge per-scene frame sequences into one global sequence.
///
/// The tail of scene `i` overlaps the head of scene `i + 1` by its transition length; the first
/// writer of a global index wins, so overlapped frames are shared, never duplicated.
pub fn splice_frames(scenes: &[SceneFrameInfo]) -> MontageResult<SplicePlan> {
    let overlaps: Vec<usize> = scenes
        .iter()
        .enumerate()
        .map(|(i, s)| match scenes.get(i + 1) {
            Some(next) => s.trans.min(s.total).min(next.total),
            None => 0,
        })
        .collect();

    let len: usize = scenes
        .iter()
        .zip(&overlaps)
        .map(|(s, &o)| s.total - o)
        .sum();
    let mut slots: Vec<Option<GlobalFrameEntry>> = vec![None; len];
    let mut frame_starts = Vec::with_capacity(scenes.len());

    let mut offset = 0usize;
    for (i, scene) in scenes.iter().enumerate() {
        frame_starts.push(offset);
        let trans = overlaps[i];
        let pre_trans = scene.total - trans;
        for local in 0..scene.total {
            let index = offset + local;
            let slot = slots.get_mut(index).ok_or_else(|| {
                MontageError::render(format!("splice index {index} out of range {len}"))
            })?;
            if slot.is_some() {
                continue;
            }
            let blend = (local >= pre_trans).then(|| {
                let k = local - pre_trans;
                BlendSource {
                    scene_index: i + 1,
                    local_index: k,
                    progress: ((k as f32) / (trans as f32)).clamp(0.0, 1.0),
                }
            });
            *slot = Some(GlobalFrameEntry {
                index,
                scene_index: i,
                local_index: local,
                blend,
            });
        }
        offset += pre_trans;
    }

    let entries = slots
        .into_iter()
        .enumerate()
        .map(|(i, e)| e.ok_or_else(|| MontageError::render(format!("empty frame at index {i}"))))
        .collect::<MontageResult<Vec<_>>>()?;

    Ok(SplicePlan {
        entries,
        frame_starts,
        overlaps,
    })
}

#[cfg(test)]
#[path = "../../tests/unit/frames/splice.rs"]
mod tests;
