//! Run configuration.
//!
//! [`RenderConf`] is read once per run and never mutated by the pipeline.

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::foundation::core::{Canvas, Fps};
use crate::foundation::error::{MontageError, MontageResult};

/// On-disk encoding of cached frames.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheFormat {
    /// Uncompressed RGBA8, streamed to the encoder's stdin.
    #[default]
    Raw,
    /// Lossless PNG, read by the encoder as a numbered sequence.
    Png,
    /// JPEG at `cache_quality`, read by the encoder as a numbered sequence.
    Jpeg,
}

impl CacheFormat {
    /// File extension without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Raw => "rgba",
            Self::Png => "png",
            Self::Jpeg => "jpg",
        }
    }
}

/// Video encoder settings.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct VideoCodecConf {
    /// Encoder name passed to `-c:v`.
    pub codec: String,
    /// Constant rate factor. Ignored when `bitrate` is set.
    pub crf: Option<u8>,
    /// Target bitrate, e.g. `"4M"`.
    pub bitrate: Option<String>,
    /// Encoder preset.
    pub preset: Option<String>,
    /// Output pixel format.
    pub pix_fmt: String,
}

impl Default for VideoCodecConf {
    fn default() -> Self {
        Self {
            codec: "libx264".to_owned(),
            crf: Some(23),
            bitrate: None,
            preset: Some("medium".to_owned()),
            pix_fmt: "yuv420p".to_owned(),
        }
    }
}

/// Settings for one production run.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RenderConf {
    /// Final video file.
    pub output: PathBuf,
    /// Directory for per-run frame files. Created if missing.
    pub cache_dir: PathBuf,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Frame rate written to the output file.
    pub fps: Fps,
    /// Rate at which scenes are sampled. Defaults to `fps`.
    pub render_fps: Option<Fps>,
    /// Cache file encoding.
    pub cache_format: CacheFormat,
    /// JPEG quality, 1-100.
    pub cache_quality: u8,
    /// Zero-pad width of stitched frame names.
    pub frame_pad: usize,
    /// Encoder settings.
    pub video: VideoCodecConf,
    /// Extra arguments placed before the frame input.
    pub input_options: Vec<String>,
    /// Extra arguments placed before the output path.
    pub output_options: Vec<String>,
    /// Keep the cache directory after the run.
    pub debug: bool,
    /// Replace an existing output file.
    pub overwrite: bool,
    /// Depth of the frame write pipeline.
    pub concurrency: usize,
    /// Pause between frame requests, in milliseconds.
    pub frame_pacing_ms: u64,
    /// Scene length when neither the scene nor its children set one.
    pub default_scene_duration: f64,
    /// Clear color for scenes without their own (straight RGBA8).
    pub background: [u8; 4],
}

impl Default for RenderConf {
    fn default() -> Self {
        Self {
            output: PathBuf::from("output.mp4"),
            cache_dir: std::env::temp_dir().join("montage-cache"),
            width: 1280,
            height: 720,
            fps: Fps::integer(30),
            render_fps: None,
            cache_format: CacheFormat::Raw,
            cache_quality: 90,
            frame_pad: 6,
            video: VideoCodecConf::default(),
            input_options: Vec::new(),
            output_options: Vec::new(),
            debug: false,
            overwrite: true,
            concurrency: 1,
            frame_pacing_ms: 0,
            default_scene_duration: crate::timeline::clip::DEFAULT_SCENE_DURATION_SECS,
            background: [0, 0, 0, 255],
        }
    }
}

impl RenderConf {
    /// Load and validate a JSON configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> MontageResult<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .with_context(|| format!("open config '{}'", path.display()))?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    /// Load and validate JSON configuration from a reader.
    pub fn from_reader(mut reader: impl Read) -> MontageResult<Self> {
        let mut buf = String::new();
        reader
            .read_to_string(&mut buf)
            .context("read config json")?;
        let conf: Self = serde_json::from_str(&buf)
            .map_err(|e| MontageError::serde(format!("config json: {e}")))?;
        conf.validate()?;
        Ok(conf)
    }

    /// Sampling rate for scene rendering.
    pub fn render_fps(&self) -> Fps {
        self.render_fps.unwrap_or(self.fps)
    }

    /// Output canvas.
    pub fn canvas(&self) -> Canvas {
        Canvas {
            width: self.width,
            height: self.height,
        }
    }

    /// Check ranges the pipeline relies on.
    pub fn validate(&self) -> MontageResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(MontageError::validation("width/height must be non-zero"));
        }
        if !self.width.is_multiple_of(2) || !self.height.is_multiple_of(2) {
            return Err(MontageError::validation(
                "width/height must be even (required for yuv420p output)",
            ));
        }
        for (name, fps) in [("fps", Some(self.fps)), ("render_fps", self.render_fps)] {
            if let Some(f) = fps
                && (f.num == 0 || f.den == 0)
            {
                return Err(MontageError::validation(format!("{name} must be non-zero")));
            }
        }
        if !(1..=100).contains(&self.cache_quality) {
            return Err(MontageError::validation("cache_quality must be in 1..=100"));
        }
        if self.frame_pad == 0 || self.frame_pad > 12 {
            return Err(MontageError::validation("frame_pad must be in 1..=12"));
        }
        if self.concurrency == 0 {
            return Err(MontageError::validation("concurrency must be >= 1"));
        }
        if !self.default_scene_duration.is_finite() || self.default_scene_duration <= 0.0 {
            return Err(MontageError::validation(
                "default_scene_duration must be finite and > 0",
            ));
        }
        if self.video.codec.trim().is_empty() {
            return Err(MontageError::validation("video codec must be non-empty"));
        }
        if self.output.as_os_str().is_empty() {
            return Err(MontageError::validation("output path must be non-empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../tests/unit/config/conf.rs"]
mod tests;
