/// Clip contents.
pub mod element;
/// Video description and its validation.
pub mod video;
