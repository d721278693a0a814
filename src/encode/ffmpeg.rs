use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use anyhow::Context;

use crate::audio::track::AudioTrack;
use crate::config::VideoCodecConf;
use crate::foundation::core::{Canvas, Fps};
use crate::foundation::error::{MontageError, MontageResult};

/// Where the encoder reads frames from.
#[derive(Clone, Debug, PartialEq)]
pub enum FrameSource {
    /// Numbered image files matched by a printf pattern, starting at 0.
    Sequence {
        /// e.g. `cache/%06d.png`.
        pattern: PathBuf,
    },
    /// Raw opaque RGBA8 files streamed to stdin in order.
    Raw {
        /// Frame files in index order.
        files: Vec<PathBuf>,
    },
}

/// Options for [`Synthesis`].
#[derive(Clone, Debug)]
pub struct SynthesisOpts {
    /// Output file.
    pub output: PathBuf,
    /// Replace an existing output file.
    pub overwrite: bool,
    /// Frame input.
    pub frames: FrameSource,
    /// Frame size.
    pub canvas: Canvas,
    /// Rate the frames were sampled at.
    pub input_fps: Fps,
    /// Rate written to the output.
    pub output_fps: Fps,
    /// Number of input frames.
    pub frame_count: usize,
    /// Encoder settings.
    pub video: VideoCodecConf,
    /// Extra arguments placed before the frame input.
    pub input_options: Vec<String>,
    /// Extra arguments placed before the output path.
    pub output_options: Vec<String>,
}

impl SynthesisOpts {
    /// Length of the encoded video in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.input_fps.frames_to_secs(self.frame_count as u64)
    }

    /// Output frames the encoder is expected to produce.
    pub fn expected_output_frames(&self) -> u64 {
        self.output_fps.secs_to_frames_round(self.duration_secs())
    }
}

/// Encoder lifecycle notification.
#[derive(Clone, Debug, PartialEq)]
pub enum SynthesisEvent {
    /// The subprocess is running.
    Start {
        /// Literal command line.
        command: String,
    },
    /// Encoded fraction in `[0, 1]`.
    Progress {
        /// Completion fraction.
        percent: f64,
    },
    /// The subprocess failed. Carries its stderr.
    Error {
        /// Status and captured output.
        detail: String,
    },
    /// The output file is complete.
    Complete {
        /// Written file.
        output: PathBuf,
    },
}

/// Encoder statistics.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EncodeUsage {
    /// Wall-clock seconds the subprocess ran.
    pub elapsed_secs: f64,
    /// Last frame count the encoder reported.
    pub frames: u64,
}

/// Result of a successful [`Synthesis::start`].
#[derive(Clone, Debug, PartialEq)]
pub struct SynthesisOutput {
    /// Written file.
    pub output: PathBuf,
    /// Encoder statistics.
    pub usage: EncodeUsage,
}

/// Drives the system `ffmpeg` over the stitched frames and the audio tracks.
pub struct Synthesis {
    opts: SynthesisOpts,
    tracks: Vec<AudioTrack>,
    stop: Option<Arc<AtomicBool>>,
}

impl Synthesis {
    /// Encoder job without audio.
    pub fn new(opts: SynthesisOpts) -> Self {
        Self {
            opts,
            tracks: Vec::new(),
            stop: None,
        }
    }

    /// Replace the audio track list.
    pub fn set_audio_tracks(&mut self, tracks: Vec<AudioTrack>) {
        self.tracks = tracks;
    }

    /// Kill the subprocess once `flag` is set.
    pub fn set_stop_flag(&mut self, flag: Arc<AtomicBool>) {
        self.stop = Some(flag);
    }

    /// Current audio track list.
    pub fn audio_tracks(&self) -> &[AudioTrack] {
        &self.tracks
    }

    /// Options this job was built with.
    pub fn opts(&self) -> &SynthesisOpts {
        &self.opts
    }

    /// Audio mixing graph, or `None` without tracks.
    pub fn audio_filter(&self) -> Option<String> {
        build_audio_filter(&self.tracks, self.opts.duration_secs())
    }

    /// Arguments passed to `ffmpeg`, in order.
    pub fn command_args(&self) -> Vec<String> {
        let o = &self.opts;
        let mut args: Vec<String> = Vec::new();
        let mut push = |xs: &[&str]| args.extend(xs.iter().map(|s| (*s).to_owned()));

        push(&[if o.overwrite { "-y" } else { "-n" }]);
        push(&["-hide_banner", "-loglevel", "error", "-progress", "pipe:1", "-nostats"]);
        args.extend(o.input_options.iter().cloned());

        let rate = o.input_fps.to_ffmpeg_rate();
        match &o.frames {
            FrameSource::Raw { .. } => {
                let size = format!("{}x{}", o.canvas.width, o.canvas.height);
                args.extend(
                    [
                        "-f", "rawvideo", "-pix_fmt", "rgba", "-s", size.as_str(), "-framerate", rate.as_str(),
                        "-i", "pipe:0",
                    ]
                    .map(str::to_owned),
                );
            }
            FrameSource::Sequence { pattern } => {
                args.extend(
                    ["-f", "image2", "-framerate", rate.as_str(), "-start_number", "0", "-i"]
                        .map(str::to_owned),
                );
                args.push(pattern.to_string_lossy().into_owned());
            }
        }

        for t in &self.tracks {
            if t.looped {
                args.extend(["-stream_loop", "-1"].map(str::to_owned));
            }
            args.push("-i".to_owned());
            args.push(t.path.to_string_lossy().into_owned());
        }

        if let Some(graph) = self.audio_filter() {
            args.extend(
                ["-filter_complex", graph.as_str(), "-map", "0:v", "-map", "[aout]"].map(str::to_owned),
            );
        } else {
            args.push("-an".to_owned());
        }

        let v = &o.video;
        args.extend(["-c:v", v.codec.as_str(), "-pix_fmt", v.pix_fmt.as_str()].map(str::to_owned));
        if let Some(bitrate) = &v.bitrate {
            args.extend(["-b:v", bitrate.as_str()].map(str::to_owned));
        } else if let Some(crf) = v.crf {
            args.extend(["-crf".to_owned(), crf.to_string()]);
        }
        if let Some(preset) = &v.preset {
            args.extend(["-preset", preset.as_str()].map(str::to_owned));
        }
        args.extend(["-r".to_owned(), o.output_fps.to_ffmpeg_rate()]);
        if !self.tracks.is_empty() {
            args.extend(["-c:a", "aac", "-shortest"].map(str::to_owned));
        }
        args.extend(["-movflags", "+faststart"].map(str::to_owned));
        args.extend(o.output_options.iter().cloned());
        args.push(o.output.to_string_lossy().into_owned());
        args
    }

    /// Run the encoder to completion.
    ///
    /// `on_event` sees `Start` once the subprocess is spawned, then `Progress` per progress
    /// block, then exactly one of `Complete` or `Error`.
    #[tracing::instrument(skip_all, fields(output = %self.opts.output.display()))]
    pub fn start(
        &mut self,
        on_event: &mut dyn FnMut(SynthesisEvent),
    ) -> MontageResult<SynthesisOutput> {
        let res = self.run(on_event);
        if let Err(e) = &res {
            on_event(SynthesisEvent::Error {
                detail: e.to_string(),
            });
        }
        res
    }

    fn run(&self, on_event: &mut dyn FnMut(SynthesisEvent)) -> MontageResult<SynthesisOutput> {
        let o = &self.opts;
        if o.canvas.width == 0 || o.canvas.height == 0 {
            return Err(MontageError::synthesis("encoder canvas must be non-empty"));
        }
        if o.frame_count == 0 {
            return Err(MontageError::synthesis("no frames to encode"));
        }
        if let FrameSource::Raw { files } = &o.frames
            && files.len() != o.frame_count
        {
            return Err(MontageError::synthesis(format!(
                "raw input lists {} files for {} frames",
                files.len(),
                o.frame_count
            )));
        }
        ensure_parent_dir(&o.output)?;
        if !o.overwrite && o.output.exists() {
            return Err(MontageError::synthesis(format!(
                "output file '{}' already exists",
                o.output.display()
            )));
        }
        if !is_ffmpeg_on_path() {
            return Err(MontageError::synthesis(
                "ffmpeg is required for encoding, but was not found on PATH",
            ));
        }

        let args = self.command_args();
        let command = format!("ffmpeg {}", args.join(" "));
        let raw_files = match &o.frames {
            FrameSource::Raw { files } => Some(files.as_slice()),
            FrameSource::Sequence { .. } => None,
        };

        let mut cmd = Command::new("ffmpeg");
        cmd.args(&args)
            .stdin(if raw_files.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let started = Instant::now();
        let mut child = cmd.spawn().map_err(|e| {
            MontageError::synthesis(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;
        tracing::debug!(%command, "ffmpeg started");
        on_event(SynthesisEvent::Start { command });

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MontageError::synthesis("failed to open ffmpeg stdout (unexpected)"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| MontageError::synthesis("failed to open ffmpeg stderr (unexpected)"))?;
        let stdin = child.stdin.take();

        let expected = o.expected_output_frames().max(1);
        let stop = self.stop.clone();
        let mut frames_done = 0u64;
        let mut cancelled = false;

        let (feed_res, stderr_bytes) = std::thread::scope(|s| {
            let stderr_drain = s.spawn(move || {
                let mut bytes = Vec::new();
                let _ = stderr.read_to_end(&mut bytes);
                bytes
            });
            let feeder = s.spawn(move || -> MontageResult<()> {
                let (Some(files), Some(mut stdin)) = (raw_files, stdin) else {
                    return Ok(());
                };
                for path in files {
                    let bytes = std::fs::read(path)
                        .with_context(|| format!("read frame '{}'", path.display()))?;
                    if stdin.write_all(&bytes).is_err() {
                        // Encoder went away; its exit status carries the reason.
                        break;
                    }
                }
                Ok(())
            });

            for line in BufReader::new(stdout).lines() {
                let Ok(line) = line else { break };
                if let Some(frame) = parse_progress_frame(&line) {
                    frames_done = frame;
                    on_event(SynthesisEvent::Progress {
                        percent: progress_fraction(frame, expected),
                    });
                }
                if stop.as_ref().is_some_and(|f| f.load(Ordering::Relaxed)) {
                    cancelled = true;
                    let _ = child.kill();
                    break;
                }
            }

            let feed = feeder
                .join()
                .unwrap_or_else(|_| Err(MontageError::synthesis("frame feeder panicked")));
            let err = stderr_drain.join().unwrap_or_default();
            (feed, err)
        });

        let status = child
            .wait()
            .map_err(|e| MontageError::synthesis(format!("failed to wait for ffmpeg: {e}")))?;
        if cancelled {
            return Err(MontageError::Cancelled);
        }
        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr_bytes);
            return Err(MontageError::synthesis(format!(
                "ffmpeg exited with status {status}: {}",
                stderr.trim()
            )));
        }
        feed_res.map_err(|e| MontageError::synthesis(e.to_string()))?;

        let output = o.output.clone();
        tracing::info!(output = %output.display(), frames = frames_done, "encode complete");
        on_event(SynthesisEvent::Complete {
            output: output.clone(),
        });
        Ok(SynthesisOutput {
            output,
            usage: EncodeUsage {
                elapsed_secs: started.elapsed().as_secs_f64(),
                frames: frames_done,
            },
        })
    }
}

/// Build `[k]adelay=D|D[aj];...;[a0][a1]...amix=N[aout]` for `tracks`.
///
/// Input 0 is the video, so track `j` is input `j + 1`. Gain and fades are prepended to a
/// track's chain only when they differ from the defaults.
pub fn build_audio_filter(tracks: &[AudioTrack], video_secs: f64) -> Option<String> {
    if tracks.is_empty() {
        return None;
    }
    let mut chains = Vec::with_capacity(tracks.len() + 1);
    for (j, t) in tracks.iter().enumerate() {
        let mut filters = Vec::new();
        if (t.volume - 1.0).abs() > f64::EPSILON {
            filters.push(format!("volume={}", fmt_num(t.volume)));
        }
        if t.fade_in > 0.0 {
            filters.push(format!("afade=t=in:st=0:d={}", fmt_num(t.fade_in)));
        }
        if t.fade_out > 0.0 {
            let st = (video_secs - t.start - t.fade_out).max(0.0);
            filters.push(format!(
                "afade=t=out:st={}:d={}",
                fmt_num(st),
                fmt_num(t.fade_out)
            ));
        }
        let delay_ms = (t.start.max(0.0) * 1000.0).round() as u64;
        filters.push(format!("adelay={delay_ms}|{delay_ms}"));
        chains.push(format!("[{}]{}[a{j}]", j + 1, filters.join(",")));
    }
    let inputs: String = (0..tracks.len()).map(|j| format!("[a{j}]")).collect();
    chains.push(format!("{inputs}amix={}[aout]", tracks.len()));
    Some(chains.join(";"))
}

fn fmt_num(v: f64) -> String {
    let s = format!("{v:.3}");
    s.trim_end_matches('0').trim_end_matches('.').to_owned()
}

/// Frame count from one `-progress` line (`frame=N`).
pub fn parse_progress_frame(line: &str) -> Option<u64> {
    line.trim().strip_prefix("frame=")?.trim().parse().ok()
}

/// `frames / expected`, clamped to `[0, 1]`.
pub fn progress_fraction(frames: u64, expected: u64) -> f64 {
    if expected == 0 {
        return 1.0;
    }
    (frames as f64 / expected as f64).clamp(0.0, 1.0)
}

/// Ensure the parent directory of `path` exists.
pub fn ensure_parent_dir(path: &Path) -> MontageResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Return `true` when `ffmpeg` can be invoked from `PATH`.
pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(test)]
#[path = "../../tests/unit/encode/ffmpeg.rs"]
mod tests;
