//! Encoding of stitched frames and audio into the output file.

/// Encoder seam used by the renderer.
pub mod encoder;
/// `ffmpeg` invocation, audio filter graph and progress parsing.
pub mod ffmpeg;
