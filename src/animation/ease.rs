/// Shape of a transition's blend over its overlap.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ease {
    /// Constant rate.
    #[default]
    Linear,
    /// Slow start (cubic).
    EaseIn,
    /// Slow finish (cubic).
    EaseOut,
    /// Slow at both ends, the two cubic halves joined at the midpoint.
    EaseInOut,
    /// Hermite `3t² - 2t³`.
    Smoothstep,
}

impl Ease {
    /// Reshape blend progress. `t` outside `[0, 1]` is clamped; `NaN` reads as 0.
    pub fn apply(self, t: f64) -> f64 {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        let cube = |x: f64| x * x * x;
        match self {
            Self::Linear => t,
            Self::EaseIn => cube(t),
            Self::EaseOut => 1.0 - cube(1.0 - t),
            Self::EaseInOut if t < 0.5 => 0.5 * Self::EaseIn.apply(2.0 * t),
            Self::EaseInOut => 0.5 + 0.5 * Self::EaseOut.apply(2.0 * t - 1.0),
            Self::Smoothstep => t * t * (3.0 - 2.0 * t),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/animation/ease.rs"]
mod tests;
