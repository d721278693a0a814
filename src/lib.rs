//! Montage assembles a video from timed clips grouped into scenes.
//!
//! A run goes through four phases:
//!
//! - resolve the clip tree's declarative times into concrete windows ([`ClipTree`])
//! - render every scene frame by frame through a [`Stage`] into a cache directory
//! - splice scene boundaries into one global sequence, blending overlaps with a [`Transition`]
//! - hand the sequence and the mixed audio tracks to `ffmpeg` ([`Synthesis`])
//!
//! [`Renderer`] drives the whole pipeline and reports through an [`EventSink`].
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod foundation;

/// Easing curves.
pub mod animation;
/// Asset resolution and decoding.
pub mod assets;
/// Audio track model.
pub mod audio;
pub mod config;
/// Transition definitions and pixel compositing.
pub mod effects;
pub mod encode;
/// Frame buffers and splicing.
pub mod frames;
/// Frame cache, stage, transitions and the renderer.
pub mod render;
/// Video description model.
pub mod scene;
/// Time expressions and the clip tree.
pub mod timeline;

pub use crate::foundation::core::{Affine, Canvas, Fps, Rect};
pub use crate::foundation::error::{ErrorKind, MontageError, MontageResult};

pub use crate::assets::prepare::{AssetPreparer, AssetRef, LocalAssetPreparer, PreparedAssets};
pub use crate::audio::track::AudioTrack;
pub use crate::config::{CacheFormat, RenderConf, VideoCodecConf};
pub use crate::encode::encoder::{Encoder, FfmpegEncoder};
pub use crate::encode::ffmpeg::{
    FrameSource, Synthesis, SynthesisEvent, SynthesisOpts, SynthesisOutput, is_ffmpeg_on_path,
};
pub use crate::frames::buffer::{FrameHandle, Frames};
pub use crate::frames::splice::{GlobalFrameEntry, SceneFrameInfo, SplicePlan, splice_frames};
pub use crate::render::cache::FrameCache;
pub use crate::render::frame::FrameRGBA;
pub use crate::render::progress::{EventSink, InMemoryEvents, PipelineEvent, Progress, Usage};
pub use crate::render::renderer::{RenderOutput, RenderState, Renderer, StopHandle};
pub use crate::render::stage::{CpuStage, SceneInfo, Stage, StageFrame, StageItem};
pub use crate::render::transition::{
    CpuTransition, Transition, TransitionFactory, TransitionRequest, cpu_transition_factory,
};
pub use crate::scene::element::Element;
pub use crate::scene::video::{ClipDef, SceneDef, Video, VideoDef};
pub use crate::timeline::clip::{ClipId, ClipTree};
pub use crate::timeline::expr::{TimeConfig, TimeExpr};
