use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use crate::assets::prepare::{AssetPreparer, LocalAssetPreparer, PreparedAssets};
use crate::audio::track::AudioTrack;
use crate::config::{CacheFormat, RenderConf};
use crate::encode::encoder::{Encoder, FfmpegEncoder};
use crate::encode::ffmpeg::{FrameSource, Synthesis, SynthesisEvent, SynthesisOpts};
use crate::foundation::core::Fps;
use crate::foundation::error::{ErrorKind, MontageError, MontageResult};
use crate::frames::buffer::{FrameHandle, Frames};
use crate::frames::splice::{SceneFrameInfo, SplicePlan, splice_frames};
use crate::render::cache::FrameCache;
use crate::render::frame::FrameRGBA;
use crate::render::progress::{EventSink, PipelineEvent, Progress, Usage};
use crate::render::stage::{CpuStage, SceneInfo, Stage, StageFrame};
use crate::render::transition::{
    Transition, TransitionFactory, TransitionRequest, cpu_transition_factory,
};
use crate::scene::video::Video;
use crate::timeline::clip::{ClipTree, TimelineAnnotation};

/// Where a run currently is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderState {
    /// Not started.
    Idle,
    /// Resolving media.
    Preparing,
    /// Capturing frames of scene `i`.
    RenderingScene(usize),
    /// Building the global frame sequence.
    Stitching,
    /// Encoder running.
    Synthesizing,
    /// Output written.
    Complete,
    /// Cancelled through the stop handle.
    Stopped,
    /// Failed.
    Error,
}

/// Cancels a run from another thread.
#[derive(Clone, Debug, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    /// Request cancellation. In-flight work completes; nothing new is scheduled.
    pub fn stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Return `true` once [`Self::stop`] was called.
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Shared flag.
    pub fn flag(&self) -> Arc<AtomicBool> {
        self.0.clone()
    }
}

/// Result of a successful run.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderOutput {
    /// Written file.
    pub output: PathBuf,
    /// Timing summary.
    pub usage: Usage,
}

/// Scene-by-scene renderer driving stage, transitions, cache and encoder.
///
/// One `Renderer` performs one production run; it owns the stage, the cache directory and every
/// frame buffer until teardown.
pub struct Renderer {
    video: Video,
    conf: RenderConf,
    stage: Box<dyn Stage>,
    transitions: TransitionFactory,
    preparer: Box<dyn AssetPreparer>,
    encoder: Box<dyn Encoder>,
    stop: StopHandle,
    state: RenderState,
    scene_frames: Vec<Frames>,
    global: Frames,
    released: bool,
}

impl Renderer {
    /// Renderer with the CPU stage, CPU transitions, local assets under `.` and `ffmpeg`.
    pub fn new(mut video: Video, conf: RenderConf) -> MontageResult<Self> {
        conf.validate()?;
        video
            .tree_mut()
            .set_default_scene_duration(conf.default_scene_duration);
        Ok(Self {
            video,
            conf,
            stage: Box::new(CpuStage::new()),
            transitions: cpu_transition_factory(),
            preparer: Box::new(LocalAssetPreparer::new(".")),
            encoder: Box::new(FfmpegEncoder),
            stop: StopHandle::default(),
            state: RenderState::Idle,
            scene_frames: Vec::new(),
            global: Frames::new(),
            released: false,
        })
    }

    /// Replace the display stage.
    pub fn with_stage(mut self, stage: Box<dyn Stage>) -> Self {
        self.stage = stage;
        self
    }

    /// Replace how scene-edge transitions are built.
    pub fn with_transition_factory(mut self, factory: TransitionFactory) -> Self {
        self.transitions = factory;
        self
    }

    /// Replace the asset preparer.
    pub fn with_asset_preparer(mut self, preparer: Box<dyn AssetPreparer>) -> Self {
        self.preparer = preparer;
        self
    }

    /// Replace the encoder.
    pub fn with_encoder(mut self, encoder: Box<dyn Encoder>) -> Self {
        self.encoder = encoder;
        self
    }

    /// Handle for cancelling [`Self::run`] from elsewhere.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Current state.
    pub fn state(&self) -> RenderState {
        self.state
    }

    /// Video being rendered.
    pub fn video(&self) -> &Video {
        &self.video
    }

    /// Creator tracks plus scene tracks on the absolute timeline.
    pub fn collect_audio_tracks(&self) -> Vec<AudioTrack> {
        self.video.audio_tracks()
    }

    /// Run the whole pipeline.
    ///
    /// Emits `Progress` ticks, the encoder's `Start`, and finally `Complete` or `Error`. On
    /// failure or cancellation the cache and the stage are torn down before returning.
    pub fn run(&mut self, events: &mut dyn EventSink) -> MontageResult<RenderOutput> {
        if self.state != RenderState::Idle {
            return Err(MontageError::validation("a renderer performs exactly one run"));
        }
        let started = Instant::now();
        let mut cache = None;
        let res = self.execute(events, &mut cache, started);

        match &res {
            Ok(_) => {}
            Err(MontageError::Cancelled) => {
                tracing::info!("render stopped");
                self.state = RenderState::Stopped;
            }
            Err(e) => {
                let kind = e.kind().unwrap_or_else(|| phase_kind(self.state));
                tracing::debug!(%kind, error = %e, "render failed");
                self.state = RenderState::Error;
                events.emit(PipelineEvent::Error {
                    kind,
                    detail: e.to_string(),
                });
            }
        }
        self.teardown(cache.as_ref());

        if let Ok(out) = &res {
            self.state = RenderState::Complete;
            tracing::info!(output = %out.output.display(), "render complete");
            events.emit(PipelineEvent::Complete {
                output: out.output.clone(),
                usage: out.usage.clone(),
            });
        }
        res
    }

    fn execute(
        &mut self,
        events: &mut dyn EventSink,
        cache_slot: &mut Option<FrameCache>,
        started: Instant,
    ) -> MontageResult<RenderOutput> {
        self.state = RenderState::Preparing;
        let assets = self.prepare()?;
        let cache: &FrameCache = cache_slot.insert(
            FrameCache::create(
                &self.conf.cache_dir,
                self.conf.cache_format,
                self.conf.cache_quality,
                self.conf.frame_pad,
                self.conf.canvas(),
                self.conf.background,
            )
            .map_err(|e| in_phase(e, ErrorKind::PreprocessingError))?,
        );
        self.stage
            .bind_context(self.conf.canvas(), &assets)
            .map_err(|e| in_phase(e, ErrorKind::RenderError))?;

        let render_fps = self.conf.render_fps();
        let tree = self.video.tree();
        let scenes: Vec<SceneInfo> = tree
            .scenes()
            .iter()
            .enumerate()
            .map(|(index, &id)| SceneInfo {
                id,
                index,
                name: tree.node(id).name.clone(),
                abs_start: tree.start_time(id),
                duration: tree.duration(id),
                frame_count: frame_count(render_fps, tree.duration(id)),
            })
            .collect();
        let trans_frames: Vec<usize> = scenes
            .iter()
            .map(|s| {
                frame_count(render_fps, tree.scene_transition_secs(s.id)).min(s.frame_count)
            })
            .collect();
        let rendered_frames: usize = scenes.iter().map(|s| s.frame_count).sum();
        let mut progress = Progress::new(rendered_frames, 0);

        // One annotation per render pass.
        let annotation = tree.annotate();
        for (scene, &trans) in scenes.iter().zip(&trans_frames) {
            self.state = RenderState::RenderingScene(scene.index);
            let mut frames = Frames::with_capacity(scene.frame_count);
            frames.trans_frames_num = trans;
            let res = render_scene(
                self.stage.as_mut(),
                SceneRun {
                    tree: self.video.tree(),
                    annotation: &annotation,
                    scene,
                    cache,
                    conf: &self.conf,
                    stop: &self.stop,
                },
                &mut frames,
                &mut progress,
                events,
            );
            self.scene_frames.push(frames);
            res.map_err(|e| in_phase(e, ErrorKind::RenderError))?;
        }

        self.state = RenderState::Stitching;
        let plan = self.stitch(cache, &mut progress, events)?;

        self.state = RenderState::Synthesizing;
        let encode_started = Instant::now();
        let job = self.synthesis_job(cache, &assets, plan.entries.len());
        progress.begin_encode();
        let stop = &self.stop;
        let mut on_event = |ev: SynthesisEvent| match ev {
            SynthesisEvent::Start { command } => events.emit(PipelineEvent::Start { command }),
            SynthesisEvent::Progress { percent } => {
                let percent = progress.encode_progress(percent);
                events.emit(PipelineEvent::Progress { percent });
            }
            SynthesisEvent::Error { detail } => tracing::debug!(%detail, "encoder failed"),
            SynthesisEvent::Complete { .. } => {}
        };
        let encoded = self
            .encoder
            .encode(job, &mut on_event)
            .map_err(|e| in_phase(e, ErrorKind::SynthesisError))?;
        if stop.is_stopped() {
            return Err(MontageError::Cancelled);
        }
        events.emit(PipelineEvent::Progress {
            percent: progress.finish(),
        });

        Ok(RenderOutput {
            output: encoded.output,
            usage: Usage {
                elapsed_secs: started.elapsed().as_secs_f64(),
                encode_secs: encode_started.elapsed().as_secs_f64(),
                rendered_frames,
                output_frames: plan.entries.len(),
                blended_frames: plan.blended_count(),
            },
        })
    }

    fn prepare(&mut self) -> MontageResult<PreparedAssets> {
        let refs = self.video.asset_refs();
        tracing::debug!(assets = refs.len(), "preparing assets");
        let assets = self
            .preparer
            .prepare(&refs)
            .map_err(|e| in_phase(e, ErrorKind::PreprocessingError))?;
        if self.stop.is_stopped() {
            return Err(MontageError::Cancelled);
        }
        Ok(assets)
    }

    #[tracing::instrument(skip_all, fields(scenes = self.scene_frames.len()))]
    fn stitch(
        &mut self,
        cache: &FrameCache,
        progress: &mut Progress,
        events: &mut dyn EventSink,
    ) -> MontageResult<SplicePlan> {
        for frames in &self.scene_frames {
            frames.ensure_contiguous()?;
        }
        let infos: Vec<SceneFrameInfo> = self.scene_frames.iter().map(SceneFrameInfo::of).collect();
        let plan = splice_frames(&infos)?;
        for (frames, &start) in self.scene_frames.iter_mut().zip(&plan.frame_starts) {
            frames.frame_start = start;
        }
        progress.set_stitch_frames(plan.entries.len());
        self.global = Frames::with_capacity(plan.entries.len());

        let tree = self.video.tree();
        let scene_ids: Vec<&str> = tree
            .scenes()
            .iter()
            .map(|&s| tree.node(s).name.as_str())
            .collect();
        let mut edges: Vec<Option<Box<dyn Transition>>> =
            (0..scene_ids.len()).map(|_| None).collect();
        let scene_path = |scene: usize, local: usize| -> MontageResult<PathBuf> {
            self.scene_frames[scene]
                .get(local)
                .map(|h| h.path().to_path_buf())
                .ok_or_else(|| {
                    MontageError::render(format!(
                        "scene '{}' has no frame {local}",
                        scene_ids[scene]
                    ))
                })
        };

        for entry in &plan.entries {
            if self.stop.is_stopped() {
                return Err(MontageError::Cancelled);
            }
            let target = cache.global_frame_path(entry.index);
            let current = scene_path(entry.scene_index, entry.local_index)?;
            match entry.blend {
                None => cache
                    .move_frame(&current, &target)
                    .map_err(|e| in_phase(e, ErrorKind::SynthesisError))?,
                Some(blend) => {
                    let next = scene_path(blend.scene_index, blend.local_index)?;
                    let slot = &mut edges[entry.scene_index];
                    if slot.is_none() {
                        let scene = tree.scenes()[entry.scene_index];
                        let spec = tree
                            .scene_props(scene)
                            .and_then(|p| p.transition.as_ref())
                            .ok_or_else(|| {
                                MontageError::synthesis("blend without a scene transition")
                            })?;
                        let mut t = (self.transitions)(spec)
                            .map_err(|e| in_phase(e, ErrorKind::SynthesisError))?;
                        t.bind_context(cache.canvas())
                            .map_err(|e| in_phase(e, ErrorKind::SynthesisError))?;
                        tracing::debug!(scene = scene_ids[entry.scene_index], kind = t.name(), "transition bound");
                        *slot = Some(t);
                    }
                    let Some(transition) = slot.as_mut() else {
                        continue;
                    };
                    blend_frame(
                        cache,
                        transition.as_mut(),
                        &current,
                        &next,
                        blend.progress,
                        &target,
                    )
                    .map_err(|e| in_phase(e, ErrorKind::SynthesisError))?;
                }
            }
            self.global.add(entry.index, FrameHandle::new(target))?;
            events.emit(PipelineEvent::Progress {
                percent: progress.stitch_tick(),
            });
        }

        self.global.ensure_contiguous()?;
        tracing::debug!(
            frames = plan.entries.len(),
            blended = plan.blended_count(),
            "stitched"
        );
        Ok(plan)
    }

    fn synthesis_job(&self, cache: &FrameCache, assets: &PreparedAssets, frames: usize) -> Synthesis {
        let source = match cache.format() {
            CacheFormat::Raw => FrameSource::Raw {
                files: (0..frames).map(|i| cache.global_frame_path(i)).collect(),
            },
            CacheFormat::Png | CacheFormat::Jpeg => FrameSource::Sequence {
                pattern: cache.ffmpeg_pattern(),
            },
        };
        let tracks = self
            .collect_audio_tracks()
            .into_iter()
            .map(|t| match assets.audio_path(&t.path) {
                Some(local) => AudioTrack {
                    path: local.to_path_buf(),
                    ..t
                },
                None => t,
            })
            .collect();

        let mut job = Synthesis::new(SynthesisOpts {
            output: self.conf.output.clone(),
            overwrite: self.conf.overwrite,
            frames: source,
            canvas: self.conf.canvas(),
            input_fps: self.conf.render_fps(),
            output_fps: self.conf.fps,
            frame_count: frames,
            video: self.conf.video.clone(),
            input_options: self.conf.input_options.clone(),
            output_options: self.conf.output_options.clone(),
        });
        job.set_audio_tracks(tracks);
        job.set_stop_flag(self.stop.flag());
        job
    }

    fn teardown(&mut self, cache: Option<&FrameCache>) {
        if !self.released {
            self.stage.release();
            self.released = true;
        }
        for frames in &mut self.scene_frames {
            frames.destroy();
        }
        self.global.destroy();
        if let Some(cache) = cache {
            if self.conf.debug {
                tracing::debug!(dir = %cache.dir().display(), "keeping frame cache");
            } else if let Err(e) = cache.remove_all() {
                tracing::warn!(error = %e, "failed to remove frame cache");
            }
        }
    }
}

struct SceneRun<'a> {
    tree: &'a ClipTree,
    annotation: &'a TimelineAnnotation,
    scene: &'a SceneInfo,
    cache: &'a FrameCache,
    conf: &'a RenderConf,
    stop: &'a StopHandle,
}

struct FrameWrite {
    index: usize,
    path: PathBuf,
    frame: FrameRGBA,
}

#[tracing::instrument(skip_all, fields(scene = %run.scene.name, frames = run.scene.frame_count))]
fn render_scene(
    stage: &mut dyn Stage,
    run: SceneRun<'_>,
    frames: &mut Frames,
    progress: &mut Progress,
    events: &mut dyn EventSink,
) -> MontageResult<()> {
    stage.begin_scene(run.scene)?;
    let scene_props = run.tree.scene_props(run.scene.id);
    let background = scene_props
        .and_then(|p| p.background)
        .unwrap_or(run.conf.background);
    let fps = run.conf.render_fps();
    let depth = run.conf.concurrency.max(1);
    let cache = run.cache;

    let (produced, written) = std::thread::scope(|s| {
        let (tx, rx) = mpsc::sync_channel::<FrameWrite>(depth);
        let writer = s.spawn(move || -> MontageResult<Vec<(usize, PathBuf)>> {
            let mut done = Vec::new();
            for msg in rx {
                cache.write_frame(&msg.path, &msg.frame)?;
                done.push((msg.index, msg.path));
            }
            Ok(done)
        });

        let produced = (|| -> MontageResult<()> {
            for f in 0..run.scene.frame_count {
                if run.stop.is_stopped() {
                    return Err(MontageError::Cancelled);
                }
                let t = fps.frames_to_secs(f as u64);
                let sample =
                    StageFrame::sample(run.tree, run.annotation, run.scene, f, t, background);
                let frame = stage.draw(&sample)?;
                tx.send(FrameWrite {
                    index: f,
                    path: cache.scene_frame_path(&run.scene.name, f),
                    frame,
                })
                .map_err(|_| MontageError::render("frame writer is not accepting frames"))?;
                events.emit(PipelineEvent::Progress {
                    percent: progress.render_tick(),
                });
                if run.conf.frame_pacing_ms > 0 {
                    std::thread::sleep(Duration::from_millis(run.conf.frame_pacing_ms));
                }
            }
            Ok(())
        })();
        drop(tx);

        let written = writer
            .join()
            .unwrap_or_else(|_| Err(MontageError::render("frame writer panicked")));
        (produced, written)
    });

    let written = written?;
    for (index, path) in written {
        frames.add(index, FrameHandle::new(path))?;
    }
    produced
}

fn blend_frame(
    cache: &FrameCache,
    transition: &mut dyn Transition,
    from: &std::path::Path,
    to: &std::path::Path,
    progress: f32,
    target: &std::path::Path,
) -> MontageResult<()> {
    let from = cache.read_frame(from)?;
    let to = cache.read_frame(to)?;
    let mut out = FrameRGBA::blank(cache.canvas());
    transition.render(
        &TransitionRequest {
            from: &from,
            to: &to,
            progress,
        },
        &mut out,
    )?;
    cache.write_frame(target, &out)
}

fn frame_count(fps: Fps, secs: f64) -> usize {
    fps.secs_to_frames_round(secs) as usize
}

fn phase_kind(state: RenderState) -> ErrorKind {
    match state {
        RenderState::Idle | RenderState::Preparing => ErrorKind::PreprocessingError,
        RenderState::RenderingScene(_) => ErrorKind::RenderError,
        _ => ErrorKind::SynthesisError,
    }
}

fn in_phase(e: MontageError, kind: ErrorKind) -> MontageError {
    if matches!(e, MontageError::Cancelled) || e.kind() == Some(kind) {
        return e;
    }
    let msg = e.to_string();
    match kind {
        ErrorKind::PreprocessingError => MontageError::preprocessing(msg),
        ErrorKind::RenderError => MontageError::render(msg),
        ErrorKind::SynthesisError => MontageError::synthesis(msg),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/renderer.rs"]
mod tests;
