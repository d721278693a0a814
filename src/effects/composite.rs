use rayon::prelude::*;

use crate::effects::transitions::WipeDir;
use crate::foundation::error::{MontageError, MontageResult};
use crate::foundation::math::mul_div255_u8;

pub(crate) type PremulRgba8 = [u8; 4];

pub(crate) fn crossfade(a: PremulRgba8, b: PremulRgba8, t: f32) -> PremulRgba8 {
    let t = t.clamp(0.0, 1.0);
    let tt = ((t * 255.0).round() as i32).clamp(0, 255) as u16;
    let it = 255u16 - tt;

    let mut out = [0u8; 4];
    for i in 0..4 {
        let av = mul_div255_u8(u16::from(a[i]), it);
        let bv = mul_div255_u8(u16::from(b[i]), tt);
        out[i] = av.saturating_add(bv);
    }
    out
}

fn check_lens(dst: &[u8], a: &[u8], b: &[u8], expected: usize) -> MontageResult<()> {
    if dst.len() != expected || a.len() != expected || b.len() != expected {
        return Err(MontageError::synthesis(format!(
            "blend expects rgba8 buffers of {expected} bytes (got {}, {}, {})",
            dst.len(),
            a.len(),
            b.len()
        )));
    }
    Ok(())
}

/// Write `mix(a, b, t)` into `dst`, row by row in parallel.
pub(crate) fn crossfade_into(
    dst: &mut [u8],
    a: &[u8],
    b: &[u8],
    width: u32,
    t: f32,
) -> MontageResult<()> {
    check_lens(dst, a, b, a.len())?;
    if !a.len().is_multiple_of(4) {
        return Err(MontageError::synthesis("rgba8 buffer length must be a multiple of 4"));
    }
    let row = (width as usize).max(1) * 4;
    dst.par_chunks_mut(row)
        .zip(a.par_chunks(row).zip(b.par_chunks(row)))
        .for_each(|(d, (a, b))| {
            for ((d, a), b) in d
                .chunks_exact_mut(4)
                .zip(a.chunks_exact(4))
                .zip(b.chunks_exact(4))
            {
                d.copy_from_slice(&crossfade([a[0], a[1], a[2], a[3]], [b[0], b[1], b[2], b[3]], t));
            }
        });
    Ok(())
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct WipeParams {
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) t: f32,
    pub(crate) dir: WipeDir,
    pub(crate) soft_edge: f32,
}

/// Reveal `b` over `a` behind a moving (optionally soft) edge.
pub(crate) fn wipe_into(dst: &mut [u8], a: &[u8], b: &[u8], params: WipeParams) -> MontageResult<()> {
    let WipeParams {
        width,
        height,
        t,
        dir,
        soft_edge,
    } = params;
    let expected = (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(4))
        .ok_or_else(|| MontageError::synthesis("wipe buffer size overflow"))?;
    check_lens(dst, a, b, expected)?;
    if expected == 0 {
        return Ok(());
    }

    let t = t.clamp(0.0, 1.0);
    let axis_len = match dir {
        WipeDir::LeftToRight | WipeDir::RightToLeft => width as f32,
        WipeDir::TopToBottom | WipeDir::BottomToTop => height as f32,
    };
    let soft_px = soft_edge.max(0.0) * axis_len;
    let edge = t * (axis_len + 2.0 * soft_px) - soft_px;
    let (a_edge, b_edge) = (edge - soft_px, edge + soft_px);

    let row = (width as usize) * 4;
    dst.par_chunks_mut(row)
        .zip(a.par_chunks(row).zip(b.par_chunks(row)))
        .enumerate()
        .for_each(|(y, (d, (a, b)))| {
            for x in 0..width as usize {
                let pos = match dir {
                    WipeDir::LeftToRight => x as f32,
                    WipeDir::RightToLeft => (width as usize - 1 - x) as f32,
                    WipeDir::TopToBottom => y as f32,
                    WipeDir::BottomToTop => (height as usize - 1 - y) as f32,
                };
                let m = if soft_px <= 0.0 {
                    if pos < edge { 1.0 } else { 0.0 }
                } else {
                    1.0 - smoothstep(a_edge, b_edge, pos)
                };
                let i = x * 4;
                let px = crossfade(
                    [a[i], a[i + 1], a[i + 2], a[i + 3]],
                    [b[i], b[i + 1], b[i + 2], b[i + 3]],
                    m,
                );
                d[i..i + 4].copy_from_slice(&px);
            }
        });
    Ok(())
}

fn smoothstep(a: f32, b: f32, x: f32) -> f32 {
    if x <= a {
        return 0.0;
    }
    if x >= b {
        return 1.0;
    }
    let t = (x - a) / (b - a);
    (t * t * (3.0 - 2.0 * t)).clamp(0.0, 1.0)
}

#[cfg(test)]
#[path = "../../tests/unit/effects/composite.rs"]
mod tests;
