use crate::foundation::core::Canvas;
use crate::foundation::error::{MontageError, MontageResult};

/// A captured frame as premultiplied RGBA8 pixels.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameRGBA {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// RGBA8 bytes, tightly packed, row-major, premultiplied alpha.
    pub data: Vec<u8>,
}

impl FrameRGBA {
    /// Transparent frame of the canvas size.
    pub fn blank(canvas: Canvas) -> Self {
        Self {
            width: canvas.width,
            height: canvas.height,
            data: vec![0; canvas.rgba_len()],
        }
    }

    /// Frame filled with one straight-alpha color.
    pub fn filled(canvas: Canvas, rgba: [u8; 4]) -> Self {
        let mut px = rgba;
        crate::foundation::math::premultiply_rgba8_in_place(&mut px);
        Self {
            width: canvas.width,
            height: canvas.height,
            data: px.repeat((canvas.width as usize) * (canvas.height as usize)),
        }
    }

    /// Canvas this frame covers.
    pub fn canvas(&self) -> Canvas {
        Canvas {
            width: self.width,
            height: self.height,
        }
    }

    /// Fail unless the frame matches `canvas` and its byte length is consistent.
    pub fn check_size(&self, canvas: Canvas) -> MontageResult<()> {
        if self.canvas() != canvas {
            return Err(MontageError::render(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                self.width, self.height, canvas.width, canvas.height
            )));
        }
        if self.data.len() != canvas.rgba_len() {
            return Err(MontageError::render(
                "frame data size mismatch with width*height*4",
            ));
        }
        Ok(())
    }
}
