use crate::effects::composite::{WipeParams, crossfade_into, wipe_into};
use crate::effects::transitions::{TransitionKind, TransitionSpec};
use crate::foundation::core::Canvas;
use crate::foundation::error::{MontageError, MontageResult};
use crate::render::frame::FrameRGBA;

/// Input of one transition blend.
#[derive(Clone, Copy, Debug)]
pub struct TransitionRequest<'a> {
    /// Outgoing scene frame.
    pub from: &'a FrameRGBA,
    /// Incoming scene frame.
    pub to: &'a FrameRGBA,
    /// Linear progress in `[0, 1]`; easing is the transition's business.
    pub progress: f32,
}

/// Blend between two frames, bound to one scene edge.
pub trait Transition: Send {
    /// Short kind name for diagnostics.
    fn name(&self) -> &str;

    /// Overlap length in seconds.
    fn duration_secs(&self) -> f64;

    /// Attach to the render context. Called once before the first `render`.
    fn bind_context(&mut self, canvas: Canvas) -> MontageResult<()>;

    /// Write the blended result into `out`.
    fn render(&mut self, req: &TransitionRequest<'_>, out: &mut FrameRGBA) -> MontageResult<()>;
}

/// Builds the transition instance for a scene edge.
pub type TransitionFactory =
    Box<dyn Fn(&TransitionSpec) -> MontageResult<Box<dyn Transition>> + Send>;

/// Factory producing [`CpuTransition`]s.
pub fn cpu_transition_factory() -> TransitionFactory {
    Box::new(|spec| Ok(Box::new(CpuTransition::new(spec.clone())) as Box<dyn Transition>))
}

/// CPU implementation of the built-in transition kinds.
#[derive(Clone, Debug)]
pub struct CpuTransition {
    spec: TransitionSpec,
    canvas: Option<Canvas>,
}

impl CpuTransition {
    /// Unbound transition for `spec`.
    pub fn new(spec: TransitionSpec) -> Self {
        Self { spec, canvas: None }
    }
}

impl Transition for CpuTransition {
    fn name(&self) -> &str {
        self.spec.kind.name()
    }

    fn duration_secs(&self) -> f64 {
        self.spec.duration_secs
    }

    fn bind_context(&mut self, canvas: Canvas) -> MontageResult<()> {
        if canvas.width == 0 || canvas.height == 0 {
            return Err(MontageError::synthesis(
                "transition context needs a non-empty canvas",
            ));
        }
        self.canvas = Some(canvas);
        Ok(())
    }

    fn render(&mut self, req: &TransitionRequest<'_>, out: &mut FrameRGBA) -> MontageResult<()> {
        let canvas = self
            .canvas
            .ok_or_else(|| MontageError::synthesis("transition used before bind_context"))?;
        for f in [req.from, req.to, &*out] {
            f.check_size(canvas)
                .map_err(|e| MontageError::synthesis(e.to_string()))?;
        }

        let t = self.spec.ease.apply(f64::from(req.progress)) as f32;
        match self.spec.kind {
            TransitionKind::Crossfade => {
                crossfade_into(&mut out.data, &req.from.data, &req.to.data, canvas.width, t)
            }
            TransitionKind::Wipe { dir, soft_edge } => wipe_into(
                &mut out.data,
                &req.from.data,
                &req.to.data,
                WipeParams {
                    width: canvas.width,
                    height: canvas.height,
                    t,
                    dir,
                    soft_edge,
                },
            ),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/transition.rs"]
mod tests;
