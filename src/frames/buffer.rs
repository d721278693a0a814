use std::path::{Path, PathBuf};

use crate::foundation::error::{MontageError, MontageResult};

/// Opaque reference to one captured frame (its cache file).
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct FrameHandle(PathBuf);

impl FrameHandle {
    /// Handle for a frame stored at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    /// Location of the frame data.
    pub fn path(&self) -> &Path {
        &self.0
    }
}

/// Sparse index -> frame map with an explicit occupancy bitset.
///
/// Slots are written at most once. `total` has sparse-array length semantics (highest occupied
/// index + 1), so holes are possible and must be checked before frames leave the renderer.
#[derive(Clone, Debug, Default)]
pub struct Frames {
    handles: Vec<FrameHandle>,
    occupied: Vec<u64>,
    len: usize,
    destroyed: bool,
    /// Offset of this scene's first frame in the global sequence.
    pub frame_start: usize,
    /// Frames overlapped with the next scene's transition.
    pub trans_frames_num: usize,
}

impl Frames {
    /// Empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty buffer pre-sized for `capacity` frames.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            handles: vec![FrameHandle::default(); capacity],
            occupied: vec![0; capacity.div_ceil(64)],
            ..Self::default()
        }
    }

    /// Store `handle` at `index`. Fails when the slot is already taken.
    pub fn add(&mut self, index: usize, handle: FrameHandle) -> MontageResult<()> {
        if self.destroyed {
            return Err(MontageError::render("frames buffer already destroyed"));
        }
        if self.contains(index) {
            return Err(MontageError::render(format!(
                "frame slot {index} is already occupied"
            )));
        }
        if index >= self.handles.len() {
            self.handles.resize(index + 1, FrameHandle::default());
            self.occupied.resize((index + 1).div_ceil(64), 0);
        }
        self.handles[index] = handle;
        self.occupied[index / 64] |= 1u64 << (index % 64);
        self.len = self.len.max(index + 1);
        Ok(())
    }

    /// Handle at `index`, if the slot is occupied.
    pub fn get(&self, index: usize) -> Option<&FrameHandle> {
        self.contains(index).then(|| &self.handles[index])
    }

    /// Return `true` when `index` holds a frame.
    pub fn contains(&self, index: usize) -> bool {
        self.occupied
            .get(index / 64)
            .is_some_and(|w| w & (1u64 << (index % 64)) != 0)
    }

    /// Highest occupied index + 1.
    pub fn total(&self) -> usize {
        self.len
    }

    /// Frames unique to this scene (not blended into the next one).
    pub fn pre_trans_frames_num(&self) -> usize {
        self.total().saturating_sub(self.trans_frames_num)
    }

    /// Occupied slots in index order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &FrameHandle)> + '_ {
        (0..self.len).filter_map(move |i| self.get(i).map(|h| (i, h)))
    }

    /// Indices below `total` with no frame.
    pub fn holes(&self) -> Vec<usize> {
        (0..self.len).filter(|&i| !self.contains(i)).collect()
    }

    /// Log every hole and return them.
    pub fn testing(&self) -> Vec<usize> {
        let holes = self.holes();
        for &i in &holes {
            tracing::warn!(index = i, "empty frame at index {i}");
        }
        holes
    }

    /// Fail with a render error if any hole exists.
    pub fn ensure_contiguous(&self) -> MontageResult<()> {
        let holes = self.testing();
        match holes.first() {
            None => Ok(()),
            Some(first) => Err(MontageError::render(format!(
                "frame sequence has {} hole(s), first at index {first}",
                holes.len()
            ))),
        }
    }

    /// Release every handle. Later calls are no-ops.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.handles = Vec::new();
        self.occupied = Vec::new();
        self.len = 0;
        self.destroyed = true;
    }

    /// Return `true` once [`Self::destroy`] ran.
    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }
}

#[cfg(test)]
#[path = "../../tests/unit/frames/buffer.rs"]
mod tests;
