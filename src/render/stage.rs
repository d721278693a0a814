use std::collections::HashMap;

use crate::assets::prepare::{PreparedAssets, PreparedImage};
use crate::foundation::core::{Canvas, Rect};
use crate::foundation::error::{MontageError, MontageResult};
use crate::render::frame::FrameRGBA;
use crate::scene::element::Element;
use crate::timeline::clip::{ClipId, ClipKind, ClipTree, TimelineAnnotation};

/// Scene about to be rendered.
#[derive(Clone, Debug)]
pub struct SceneInfo {
    /// Scene clip.
    pub id: ClipId,
    /// Position among the video's scenes.
    pub index: usize,
    /// Scene identifier from the description.
    pub name: String,
    /// Absolute start in seconds.
    pub abs_start: f64,
    /// Scene length in seconds.
    pub duration: f64,
    /// Frames the renderer will request.
    pub frame_count: usize,
}

/// One element as seen at a given instant.
#[derive(Clone, Debug)]
pub struct StageItem<'a> {
    /// Clip of the element.
    pub id: ClipId,
    /// What to draw.
    pub element: &'a Element,
    /// Inside its transition-trimmed window.
    pub visible: bool,
    /// Inside its untrimmed window (animations keep running).
    pub active: bool,
    /// Seconds since the element's own start.
    pub local_time: f64,
}

/// Everything a stage needs to draw one frame of one scene.
#[derive(Clone, Debug)]
pub struct StageFrame<'a> {
    /// Scene position among the video's scenes.
    pub scene_index: usize,
    /// Frame cursor inside the scene.
    pub frame: usize,
    /// Seconds since the scene started.
    pub scene_time: f64,
    /// Absolute time on the assembled timeline.
    pub abs_time: f64,
    /// Clear color (straight RGBA8).
    pub background: [u8; 4],
    /// Scene elements in paint order (depth-first, children after their parent).
    pub items: Vec<StageItem<'a>>,
}

impl<'a> StageFrame<'a> {
    /// Sample `scene` at `scene_time` seconds.
    pub fn sample(
        tree: &'a ClipTree,
        annotation: &TimelineAnnotation,
        scene: &SceneInfo,
        frame: usize,
        scene_time: f64,
        background: [u8; 4],
    ) -> Self {
        let abs_time = scene.abs_start + scene_time;
        let mut items = Vec::new();
        collect_items(tree, annotation, scene.id, abs_time, true, &mut items);
        Self {
            scene_index: scene.index,
            frame,
            scene_time,
            abs_time,
            background,
            items,
        }
    }

    /// Items that should be painted.
    pub fn visible_items(&self) -> impl Iterator<Item = &StageItem<'a>> + '_ {
        self.items.iter().filter(|i| i.visible)
    }
}

fn collect_items<'a>(
    tree: &'a ClipTree,
    annotation: &TimelineAnnotation,
    parent: ClipId,
    t: f64,
    parent_visible: bool,
    out: &mut Vec<StageItem<'a>>,
) {
    for &c in tree.children(parent) {
        let ClipKind::Element(element) = &tree.node(c).kind else {
            continue;
        };
        let visible = parent_visible && annotation.is_visible(c, t);
        let local_time = annotation.window(c).map_or(0.0, |w| t - w.abs_start);
        out.push(StageItem {
            id: c,
            element,
            visible,
            active: annotation.is_active(c, t),
            local_time,
        });
        collect_items(tree, annotation, c, t, visible, out);
    }
}

/// Display library plus off-screen context. Draw calls are strictly serialized.
pub trait Stage: Send {
    /// Attach to the canvas and the prepared media. Called once per run.
    fn bind_context(&mut self, canvas: Canvas, assets: &PreparedAssets) -> MontageResult<()>;

    /// Make `scene` the only visible subtree and reset its clock.
    fn begin_scene(&mut self, scene: &SceneInfo) -> MontageResult<()>;

    /// Rasterize one frame and read it back.
    fn draw(&mut self, frame: &StageFrame<'_>) -> MontageResult<FrameRGBA>;

    /// Release the off-screen context. The renderer calls this exactly once per run.
    fn release(&mut self);
}

/// `vello_cpu` stage drawing solid fills and prepared images.
#[derive(Default)]
pub struct CpuStage {
    canvas: Option<(Canvas, u16, u16)>,
    pixmap: Option<vello_cpu::Pixmap>,
    image_cache: HashMap<String, CachedImage>,
    released: bool,
}

struct CachedImage {
    paint: vello_cpu::Image,
    width: f64,
    height: f64,
}

impl CpuStage {
    /// Unbound stage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `true` once [`Stage::release`] ran.
    pub fn is_released(&self) -> bool {
        self.released
    }

    fn draw_item(&self, ctx: &mut vello_cpu::RenderContext, canvas: Canvas, element: &Element) {
        ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
        ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
        match element {
            Element::Solid {
                color,
                rect,
                opacity,
            } => {
                let r = rect.unwrap_or_else(|| {
                    Rect::new(0.0, 0.0, f64::from(canvas.width), f64::from(canvas.height))
                });
                ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
                    color[0], color[1], color[2], color[3],
                ));
                with_opacity(ctx, *opacity, |ctx| ctx.fill_rect(&rect_to_cpu(r)));
            }
            Element::Image {
                source,
                rect,
                opacity,
            } => {
                let Some(cached) = self.image_cache.get(source) else {
                    tracing::debug!(%source, "image not prepared; skipped");
                    return;
                };
                let (w, h) = (cached.width, cached.height);
                if let Some(r) = rect
                    && w > 0.0
                    && h > 0.0
                {
                    ctx.set_transform(
                        vello_cpu::kurbo::Affine::translate((r.x0, r.y0))
                            * vello_cpu::kurbo::Affine::scale_non_uniform(
                                r.width() / w,
                                r.height() / h,
                            ),
                    );
                }
                ctx.set_paint(cached.paint.clone());
                with_opacity(ctx, *opacity, |ctx| {
                    ctx.fill_rect(&vello_cpu::kurbo::Rect::new(0.0, 0.0, w, h));
                });
            }
            Element::Custom { kind, .. } => {
                tracing::debug!(%kind, "custom element has no cpu renderer; skipped");
            }
            Element::Group | Element::Transition => {}
        }
    }
}

impl Stage for CpuStage {
    fn bind_context(&mut self, canvas: Canvas, assets: &PreparedAssets) -> MontageResult<()> {
        let width: u16 = canvas
            .width
            .try_into()
            .map_err(|_| MontageError::render("canvas width exceeds u16"))?;
        let height: u16 = canvas
            .height
            .try_into()
            .map_err(|_| MontageError::render("canvas height exceeds u16"))?;
        self.canvas = Some((canvas, width, height));
        self.pixmap = Some(vello_cpu::Pixmap::new(width, height));
        self.image_cache.clear();
        for (source, img) in assets.images() {
            let pixmap = image_premul_bytes_to_pixmap(img)?;
            self.image_cache.insert(
                source.to_owned(),
                CachedImage {
                    paint: vello_cpu::Image {
                        image: vello_cpu::ImageSource::Pixmap(std::sync::Arc::new(pixmap)),
                        sampler: vello_cpu::peniko::ImageSampler::default(),
                    },
                    width: f64::from(img.width),
                    height: f64::from(img.height),
                },
            );
        }
        self.released = false;
        Ok(())
    }

    fn begin_scene(&mut self, scene: &SceneInfo) -> MontageResult<()> {
        if self.canvas.is_none() {
            return Err(MontageError::render("stage used before bind_context"));
        }
        tracing::debug!(scene = %scene.name, frames = scene.frame_count, "begin scene");
        Ok(())
    }

    fn draw(&mut self, frame: &StageFrame<'_>) -> MontageResult<FrameRGBA> {
        let (canvas, width, height) = self
            .canvas
            .ok_or_else(|| MontageError::render("stage used before bind_context"))?;
        let mut pixmap = self
            .pixmap
            .take()
            .ok_or_else(|| MontageError::render("stage context was released"))?;

        let mut ctx = vello_cpu::RenderContext::new(width, height);
        let [r, g, b, a] = frame.background;
        ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(r, g, b, a));
        ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
            0.0,
            0.0,
            f64::from(canvas.width),
            f64::from(canvas.height),
        ));
        for item in frame.visible_items() {
            self.draw_item(&mut ctx, canvas, item.element);
        }
        ctx.flush();
        ctx.render_to_pixmap(&mut pixmap);

        let out = FrameRGBA {
            width: canvas.width,
            height: canvas.height,
            data: pixmap.data_as_u8_slice().to_vec(),
        };
        self.pixmap = Some(pixmap);
        Ok(out)
    }

    fn release(&mut self) {
        self.pixmap = None;
        self.image_cache.clear();
        self.released = true;
    }
}

fn with_opacity(
    ctx: &mut vello_cpu::RenderContext,
    opacity: f32,
    draw: impl FnOnce(&mut vello_cpu::RenderContext),
) {
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity < 1.0 {
        ctx.push_opacity_layer(opacity);
    }
    draw(ctx);
    if opacity < 1.0 {
        ctx.pop_layer();
    }
}

fn rect_to_cpu(r: Rect) -> vello_cpu::kurbo::Rect {
    vello_cpu::kurbo::Rect::new(r.x0, r.y0, r.x1, r.y1)
}

fn image_premul_bytes_to_pixmap(img: &PreparedImage) -> MontageResult<vello_cpu::Pixmap> {
    let w: u16 = img
        .width
        .try_into()
        .map_err(|_| MontageError::render("image width exceeds u16"))?;
    let h: u16 = img
        .height
        .try_into()
        .map_err(|_| MontageError::render("image height exceeds u16"))?;
    if img.rgba8_premul.len() != img.width as usize * img.height as usize * 4 {
        return Err(MontageError::render("prepared image byte length mismatch"));
    }

    let mut may_have_opacities = false;
    let pixels = img
        .rgba8_premul
        .chunks_exact(4)
        .map(|px| {
            may_have_opacities |= px[3] != 255;
            vello_cpu::peniko::color::PremulRgba8 {
                r: px[0],
                g: px[1],
                b: px[2],
                a: px[3],
            }
        })
        .collect::<Vec<_>>();

    Ok(vello_cpu::Pixmap::from_parts_with_opacity(
        pixels,
        w,
        h,
        may_have_opacities,
    ))
}

#[cfg(test)]
#[path = "../../tests/unit/render/stage.rs"]
mod tests;
