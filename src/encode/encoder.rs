use crate::encode::ffmpeg::{Synthesis, SynthesisEvent, SynthesisOutput};
use crate::foundation::error::MontageResult;

/// Runs a prepared [`Synthesis`] job.
///
/// The renderer hands every job to an encoder; tests swap in one that never spawns a process.
pub trait Encoder: Send {
    /// Encode and report through `on_event`.
    fn encode(
        &mut self,
        job: Synthesis,
        on_event: &mut dyn FnMut(SynthesisEvent),
    ) -> MontageResult<SynthesisOutput>;
}

/// Encoder backed by the system `ffmpeg`.
#[derive(Clone, Copy, Debug, Default)]
pub struct FfmpegEncoder;

impl Encoder for FfmpegEncoder {
    fn encode(
        &mut self,
        mut job: Synthesis,
        on_event: &mut dyn FnMut(SynthesisEvent),
    ) -> MontageResult<SynthesisOutput> {
        job.start(on_event)
    }
}
