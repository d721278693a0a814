/// Sparse frame buffer.
pub mod buffer;
/// Global sequence splicing.
pub mod splice;
