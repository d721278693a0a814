use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::config::CacheFormat;
use crate::foundation::core::Canvas;
use crate::foundation::error::{MontageError, MontageResult};
use crate::foundation::math::flatten_premul_over_bg;
use crate::render::frame::FrameRGBA;

/// Cache directory of one production run.
///
/// Frames are stored flattened over the background, so every cached pixel is opaque.
#[derive(Clone, Debug)]
pub struct FrameCache {
    dir: PathBuf,
    format: CacheFormat,
    quality: u8,
    pad: usize,
    canvas: Canvas,
    background: [u8; 4],
}

impl FrameCache {
    /// Create (or reuse) `dir`.
    pub fn create(
        dir: impl Into<PathBuf>,
        format: CacheFormat,
        quality: u8,
        pad: usize,
        canvas: Canvas,
        background: [u8; 4],
    ) -> MontageResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("create cache directory '{}'", dir.display()))?;
        Ok(Self {
            dir,
            format,
            quality: quality.clamp(1, 100),
            pad: pad.max(1),
            canvas,
            background,
        })
    }

    /// Cache directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File encoding.
    pub fn format(&self) -> CacheFormat {
        self.format
    }

    /// Frame size every cached file has.
    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    /// Per-scene frame file, `<sceneId>_<local>.<ext>`.
    pub fn scene_frame_path(&self, scene_id: &str, local: usize) -> PathBuf {
        self.dir
            .join(format!("{scene_id}_{local}.{}", self.format.extension()))
    }

    /// Stitched frame file, zero padded.
    pub fn global_frame_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!(
            "{index:0width$}.{}",
            self.format.extension(),
            width = self.pad
        ))
    }

    /// printf-style pattern matching [`Self::global_frame_path`].
    pub fn ffmpeg_pattern(&self) -> PathBuf {
        self.dir
            .join(format!("%0{}d.{}", self.pad, self.format.extension()))
    }

    /// Flatten and encode `frame` to `path`.
    pub fn write_frame(&self, path: &Path, frame: &FrameRGBA) -> MontageResult<()> {
        frame.check_size(self.canvas)?;
        let mut flat = vec![0u8; frame.data.len()];
        flatten_premul_over_bg(&mut flat, &frame.data, self.background);

        match self.format {
            CacheFormat::Raw => std::fs::write(path, &flat)
                .with_context(|| format!("write frame '{}'", path.display()))?,
            CacheFormat::Png => image::save_buffer_with_format(
                path,
                &flat,
                frame.width,
                frame.height,
                image::ExtendedColorType::Rgba8,
                image::ImageFormat::Png,
            )
            .with_context(|| format!("write png frame '{}'", path.display()))?,
            CacheFormat::Jpeg => {
                let rgb: Vec<u8> = flat
                    .chunks_exact(4)
                    .flat_map(|px| [px[0], px[1], px[2]])
                    .collect();
                let file = std::fs::File::create(path)
                    .with_context(|| format!("create jpeg frame '{}'", path.display()))?;
                let mut enc = image::codecs::jpeg::JpegEncoder::new_with_quality(
                    BufWriter::new(file),
                    self.quality,
                );
                enc.encode(&rgb, frame.width, frame.height, image::ExtendedColorType::Rgb8)
                    .with_context(|| format!("encode jpeg frame '{}'", path.display()))?;
            }
        }
        Ok(())
    }

    /// Load a cached frame back as opaque RGBA8.
    pub fn read_frame(&self, path: &Path) -> MontageResult<FrameRGBA> {
        let data = match self.format {
            CacheFormat::Raw => std::fs::read(path)
                .with_context(|| format!("read frame '{}'", path.display()))?,
            CacheFormat::Png | CacheFormat::Jpeg => {
                let img = image::open(path)
                    .with_context(|| format!("decode frame '{}'", path.display()))?
                    .to_rgba8();
                if img.dimensions() != (self.canvas.width, self.canvas.height) {
                    return Err(MontageError::synthesis(format!(
                        "cached frame '{}' has unexpected size",
                        path.display()
                    )));
                }
                img.into_raw()
            }
        };
        let frame = FrameRGBA {
            width: self.canvas.width,
            height: self.canvas.height,
            data,
        };
        frame
            .check_size(self.canvas)
            .map_err(|e| MontageError::synthesis(format!("{}: {e}", path.display())))?;
        Ok(frame)
    }

    /// Rename a cached file.
    pub fn move_frame(&self, from: &Path, to: &Path) -> MontageResult<()> {
        std::fs::rename(from, to).with_context(|| {
            format!("move frame '{}' -> '{}'", from.display(), to.display())
        })?;
        Ok(())
    }

    /// Delete the cache directory and everything in it.
    pub fn remove_all(&self) -> MontageResult<()> {
        match std::fs::remove_dir_all(&self.dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(anyhow::Error::new(e)
                .context(format!("remove cache directory '{}'", self.dir.display()))
                .into()),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/cache.rs"]
mod tests;
