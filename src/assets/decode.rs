use std::sync::Arc;

use anyhow::Context;

use crate::assets::prepare::PreparedImage;
use crate::foundation::error::MontageResult;
use crate::foundation::math::premultiply_rgba8_in_place;

/// Decode an encoded raster (png, jpeg, ...) into premultiplied RGBA8.
pub fn decode_image(bytes: &[u8]) -> MontageResult<PreparedImage> {
    let dyn_img = image::load_from_memory(bytes).context("decode image from memory")?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut rgba8_premul = rgba.into_raw();
    premultiply_rgba8_in_place(&mut rgba8_premul);

    Ok(PreparedImage {
        width,
        height,
        rgba8_premul: Arc::new(rgba8_premul),
    })
}

#[cfg(test)]
#[path = "../../tests/unit/assets/decode.rs"]
mod tests;
