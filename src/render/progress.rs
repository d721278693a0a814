use std::path::PathBuf;
use std::sync::mpsc;

use crate::foundation::error::ErrorKind;

/// Share of the bar owned by scene rendering.
pub const RENDER_WEIGHT: f64 = 0.7;
/// Share of the bar owned by stitching.
pub const STITCH_WEIGHT: f64 = 0.2;

/// Resource summary reported on completion.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Usage {
    /// Wall-clock seconds for the whole run.
    pub elapsed_secs: f64,
    /// Wall-clock seconds spent in the encoder.
    pub encode_secs: f64,
    /// Frames rendered across all scenes.
    pub rendered_frames: usize,
    /// Frames in the stitched sequence.
    pub output_frames: usize,
    /// Stitched frames produced by a transition blend.
    pub blended_frames: usize,
}

/// Observable pipeline event.
#[derive(Clone, Debug, PartialEq)]
pub enum PipelineEvent {
    /// The encoder subprocess started.
    Start {
        /// Literal command line, for diagnostics.
        command: String,
    },
    /// Overall completion in `[0, 1]`, never decreasing within a run.
    Progress {
        /// Completion fraction.
        percent: f64,
    },
    /// The run failed. Terminal.
    Error {
        /// Failure category.
        kind: ErrorKind,
        /// Human-readable context (encoder stderr included).
        detail: String,
    },
    /// The run produced its output. Terminal.
    Complete {
        /// Written file.
        output: PathBuf,
        /// Timing summary.
        usage: Usage,
    },
}

/// Receiver of pipeline events.
pub trait EventSink {
    /// Deliver one event.
    fn emit(&mut self, event: PipelineEvent);
}

impl EventSink for mpsc::Sender<PipelineEvent> {
    fn emit(&mut self, event: PipelineEvent) {
        // A dropped receiver only means nobody is listening anymore.
        let _ = self.send(event);
    }
}

/// Sink collecting events in memory (useful for tests).
#[derive(Debug, Default)]
pub struct InMemoryEvents {
    /// Events in emission order.
    pub events: Vec<PipelineEvent>,
}

impl InMemoryEvents {
    /// Every `Progress` percent in order.
    pub fn percents(&self) -> Vec<f64> {
        self.events
            .iter()
            .filter_map(|e| match e {
                PipelineEvent::Progress { percent } => Some(*percent),
                _ => None,
            })
            .collect()
    }

    /// The error event, if any.
    pub fn error(&self) -> Option<(ErrorKind, &str)> {
        self.events.iter().find_map(|e| match e {
            PipelineEvent::Error { kind, detail } => Some((*kind, detail.as_str())),
            _ => None,
        })
    }
}

impl EventSink for InMemoryEvents {
    fn emit(&mut self, event: PipelineEvent) {
        self.events.push(event);
    }
}

/// Monotonic progress accumulator.
///
/// Rendering fills up to [`RENDER_WEIGHT`], stitching up to [`STITCH_WEIGHT`] more, and the
/// encoder the remainder. Each tick only ever raises the value; the result is clamped to 1.
#[derive(Clone, Debug, Default)]
pub struct Progress {
    value: f64,
    render_step: f64,
    stitch_step: f64,
    encode_base: f64,
}

impl Progress {
    /// Accumulator for `render_frames` scene frames and `stitch_frames` stitched frames.
    pub fn new(render_frames: usize, stitch_frames: usize) -> Self {
        Self {
            value: 0.0,
            render_step: step(RENDER_WEIGHT, render_frames),
            stitch_step: step(STITCH_WEIGHT, stitch_frames),
            encode_base: RENDER_WEIGHT + STITCH_WEIGHT,
        }
    }

    /// Current value.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Set the stitched frame count once it is known.
    pub fn set_stitch_frames(&mut self, frames: usize) {
        self.stitch_step = step(STITCH_WEIGHT, frames);
    }

    /// One scene frame was rendered.
    pub fn render_tick(&mut self) -> f64 {
        self.advance(self.render_step)
    }

    /// One stitched frame was written.
    pub fn stitch_tick(&mut self) -> f64 {
        self.advance(self.stitch_step)
    }

    /// Encoder reported `fraction` of its work.
    pub fn encode_progress(&mut self, fraction: f64) -> f64 {
        let fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let target = self.encode_base + (1.0 - self.encode_base) * fraction;
        self.raise_to(target)
    }

    /// Close the encode phase by adding whatever remains.
    pub fn finish(&mut self) -> f64 {
        self.raise_to(1.0)
    }

    /// Start of the encoder's share. Called when the encode phase begins.
    pub fn begin_encode(&mut self) {
        self.encode_base = self.value.max(self.encode_base.min(1.0));
    }

    fn advance(&mut self, by: f64) -> f64 {
        self.raise_to(self.value + by)
    }

    fn raise_to(&mut self, target: f64) -> f64 {
        if target > self.value {
            self.value = target.min(1.0);
        }
        self.value
    }
}

fn step(weight: f64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        weight / count as f64
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/progress.rs"]
mod tests;
