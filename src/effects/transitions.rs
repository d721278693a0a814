use crate::animation::ease::Ease;
use crate::foundation::error::{MontageError, MontageResult};

/// JSON form of a scene's outgoing transition.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TransitionDef {
    /// Transition name, e.g. `crossfade` or `wipe`.
    pub kind: String,
    /// Overlap length in seconds.
    pub duration: f64,
    /// Curve applied to the blend progress.
    #[serde(default)]
    pub ease: Ease,
    /// Kind-specific parameters.
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Wipe sweep direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WipeDir {
    /// Reveal from the left edge.
    LeftToRight,
    /// Reveal from the right edge.
    RightToLeft,
    /// Reveal from the top edge.
    TopToBottom,
    /// Reveal from the bottom edge.
    BottomToTop,
}

/// Parsed transition kind.
#[derive(Clone, Debug, PartialEq)]
pub enum TransitionKind {
    /// Linear mix of both frames.
    Crossfade,
    /// Moving edge reveals the incoming frame.
    Wipe {
        /// Sweep direction.
        dir: WipeDir,
        /// Edge softness as a fraction of the sweep axis, in `[0, 1]`.
        soft_edge: f32,
    },
}

impl TransitionKind {
    /// Short name used in logs and events.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Crossfade => "crossfade",
            Self::Wipe { .. } => "wipe",
        }
    }
}

/// Validated transition attached to the boundary between two scenes.
#[derive(Clone, Debug, PartialEq)]
pub struct TransitionSpec {
    /// Blend kind.
    pub kind: TransitionKind,
    /// Overlap length in seconds.
    pub duration_secs: f64,
    /// Curve applied to the blend progress.
    pub ease: Ease,
}

impl TransitionSpec {
    /// Parse and validate a [`TransitionDef`].
    pub fn from_def(def: &TransitionDef) -> MontageResult<Self> {
        if !def.duration.is_finite() || def.duration < 0.0 {
            return Err(MontageError::validation(
                "transition duration must be finite and >= 0",
            ));
        }
        Ok(Self {
            kind: parse_transition(def)?,
            duration_secs: def.duration,
            ease: def.ease,
        })
    }
}

/// Parse the kind and parameters of a transition definition.
pub fn parse_transition(def: &TransitionDef) -> MontageResult<TransitionKind> {
    let kind = def.kind.trim().to_ascii_lowercase();
    if kind.is_empty() {
        return Err(MontageError::validation("transition kind must be non-empty"));
    }

    match kind.as_str() {
        "crossfade" | "fade" => Ok(TransitionKind::Crossfade),
        "wipe" => {
            let params = if def.params.is_null() {
                None
            } else {
                Some(
                    def.params
                        .as_object()
                        .ok_or_else(|| MontageError::validation("wipe params must be an object"))?,
                )
            };

            let dir = match params.and_then(|p| p.get("dir")).and_then(|v| v.as_str()) {
                None => WipeDir::LeftToRight,
                Some(s) => match s.trim().to_ascii_lowercase().as_str() {
                    "left_to_right" | "lefttoright" | "ltr" | "right" => WipeDir::LeftToRight,
                    "right_to_left" | "righttoleft" | "rtl" | "left" => WipeDir::RightToLeft,
                    "top_to_bottom" | "toptobottom" | "ttb" | "down" => WipeDir::TopToBottom,
                    "bottom_to_top" | "bottomtotop" | "btt" | "up" => WipeDir::BottomToTop,
                    other => {
                        return Err(MontageError::validation(format!(
                            "unknown wipe.dir '{other}'"
                        )));
                    }
                },
            };

            let soft_edge = match params
                .and_then(|p| p.get("soft_edge"))
                .and_then(|v| v.as_f64())
            {
                None => 0.0,
                Some(v) => {
                    let f = v as f32;
                    if !f.is_finite() {
                        return Err(MontageError::validation(
                            "wipe.soft_edge must be finite when set",
                        ));
                    }
                    f.clamp(0.0, 1.0)
                }
            };

            Ok(TransitionKind::Wipe { dir, soft_edge })
        }
        _ => Err(MontageError::validation(format!(
            "unknown transition kind '{kind}'"
        ))),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/effects/transitions.rs"]
mod tests;
