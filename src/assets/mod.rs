/// Image decoding.
pub mod decode;
/// Asset preparation.
pub mod prepare;
