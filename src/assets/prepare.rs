use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;

use crate::assets::decode::decode_image;
use crate::foundation::error::{MontageError, MontageResult};

/// Media referenced by a video description.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum AssetRef {
    /// Raster image used by an `image` element, as written in the description.
    Image(String),
    /// Audio file used by a track.
    Audio(PathBuf),
}

/// Prepared raster image in premultiplied RGBA8 form.
#[derive(Clone, Debug)]
pub struct PreparedImage {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel bytes in row-major premultiplied RGBA8.
    pub rgba8_premul: Arc<Vec<u8>>,
}

/// Local, decoded media for one run.
#[derive(Clone, Debug, Default)]
pub struct PreparedAssets {
    images: HashMap<String, PreparedImage>,
    audio: HashMap<PathBuf, PathBuf>,
}

impl PreparedAssets {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a decoded image under its description source string.
    pub fn insert_image(&mut self, source: impl Into<String>, image: PreparedImage) {
        self.images.insert(source.into(), image);
    }

    /// Register the local file an audio reference resolved to.
    pub fn insert_audio(&mut self, reference: impl Into<PathBuf>, local: impl Into<PathBuf>) {
        self.audio.insert(reference.into(), local.into());
    }

    /// Decoded image for `source`.
    pub fn image(&self, source: &str) -> MontageResult<&PreparedImage> {
        self.images
            .get(source)
            .ok_or_else(|| MontageError::render(format!("image '{source}' was not prepared")))
    }

    /// Local file for an audio reference, if it was prepared.
    pub fn audio_path(&self, reference: &Path) -> Option<&Path> {
        self.audio.get(reference).map(PathBuf::as_path)
    }

    /// Every prepared image with its source string.
    pub fn images(&self) -> impl Iterator<Item = (&str, &PreparedImage)> + '_ {
        self.images.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of prepared images.
    pub fn image_count(&self) -> usize {
        self.images.len()
    }
}

/// Resolves every referenced media item to local, ready-to-draw data.
pub trait AssetPreparer: Send {
    /// Prepare `refs`. Any failure aborts the run before rendering starts.
    fn prepare(&mut self, refs: &[AssetRef]) -> MontageResult<PreparedAssets>;
}

/// Prepares assets from a local directory.
#[derive(Clone, Debug)]
pub struct LocalAssetPreparer {
    root: PathBuf,
}

impl LocalAssetPreparer {
    /// Preparer resolving relative references against `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Asset root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn read_bytes(&self, norm_path: &str) -> MontageResult<Vec<u8>> {
        let path = self.root.join(Path::new(norm_path));
        std::fs::read(&path)
            .with_context(|| format!("read asset bytes from '{}'", path.display()))
            .map_err(|e| MontageError::preprocessing(format!("{e:#}")))
    }

    fn resolve_audio(&self, reference: &Path) -> MontageResult<PathBuf> {
        let local = if reference.is_absolute() {
            reference.to_path_buf()
        } else {
            let norm = normalize_rel_path(&reference.to_string_lossy())
                .map_err(|e| MontageError::preprocessing(e.to_string()))?;
            self.root.join(norm)
        };
        if !local.is_file() {
            return Err(MontageError::preprocessing(format!(
                "audio file '{}' does not exist",
                local.display()
            )));
        }
        Ok(local)
    }
}

impl AssetPreparer for LocalAssetPreparer {
    #[tracing::instrument(skip_all, fields(refs = refs.len()))]
    fn prepare(&mut self, refs: &[AssetRef]) -> MontageResult<PreparedAssets> {
        let mut out = PreparedAssets::new();
        for r in refs {
            match r {
                AssetRef::Image(source) => {
                    if out.images.contains_key(source) {
                        continue;
                    }
                    let norm = normalize_rel_path(source)
                        .map_err(|e| MontageError::preprocessing(e.to_string()))?;
                    let bytes = self.read_bytes(&norm)?;
                    let image = decode_image(&bytes).map_err(|e| {
                        MontageError::preprocessing(format!("image '{source}': {e}"))
                    })?;
                    out.insert_image(source.clone(), image);
                }
                AssetRef::Audio(path) => {
                    let local = self.resolve_audio(path)?;
                    out.insert_audio(path.clone(), local);
                }
            }
        }
        tracing::debug!(images = out.image_count(), "assets prepared");
        Ok(out)
    }
}

/// Normalize and validate description-relative asset paths.
///
/// The normalized result uses `/` separators, removes `.` segments, and rejects absolute paths or
/// parent traversals (`..`).
pub fn normalize_rel_path(source: &str) -> MontageResult<String> {
    let s = source.replace('\\', "/");
    if s.is_empty() {
        return Err(MontageError::validation("asset path must be non-empty"));
    }
    if s.starts_with('/') {
        return Err(MontageError::validation("asset paths must be relative"));
    }

    let mut out = Vec::<&str>::new();
    for part in s.split('/') {
        if part.is_empty() || part == "." {
            continue;
        }
        if part == ".." {
            return Err(MontageError::validation("asset paths must not contain '..'"));
        }
        out.push(part);
    }

    if out.is_empty() {
        return Err(MontageError::validation(
            "asset path must contain a file name",
        ));
    }
    Ok(out.join("/"))
}

#[cfg(test)]
#[path = "../../tests/unit/assets/prepare.rs"]
mod tests;
