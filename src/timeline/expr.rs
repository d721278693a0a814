use serde::{Deserialize, Serialize};

/// Raw time expression from a clip configuration.
///
/// Numbers are seconds. Strings ending in `%` are a share of the parent duration. Negative
/// values (after percentage resolution) count back from the parent's end.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TimeExpr {
    /// Seconds, possibly negative.
    Secs(f64),
    /// Percentage of the parent duration, possibly negative.
    Percent(f64),
}

impl TimeExpr {
    /// Parse the string form. Unparseable input resolves to `NaN`.
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        match s.strip_suffix('%') {
            Some(num) => Self::Percent(num.trim().parse().unwrap_or(f64::NAN)),
            None => Self::Secs(s.parse().unwrap_or(f64::NAN)),
        }
    }

    /// Resolve against the parent duration (seconds).
    ///
    /// `NaN` propagates: an unknown parent duration makes relative expressions `NaN`.
    pub fn resolve(self, parent_duration: f64) -> f64 {
        let t = match self {
            Self::Secs(s) => s,
            Self::Percent(p) => parent_duration * p / 100.0,
        };
        if t < 0.0 { parent_duration + t } else { t }
    }

    /// Return `true` when the value depends on the parent duration.
    pub fn is_relative(self) -> bool {
        match self {
            Self::Secs(s) => s < 0.0,
            Self::Percent(_) => true,
        }
    }
}

impl Serialize for TimeExpr {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Self::Secs(s) => serializer.serialize_f64(*s),
            Self::Percent(p) => serializer.serialize_str(&format!("{p}%")),
        }
    }
}

impl<'de> Deserialize<'de> for TimeExpr {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Num(f64),
            Str(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Num(n) => Ok(Self::Secs(n)),
            Repr::Str(s) => Ok(Self::parse(&s)),
        }
    }
}

/// Declarative time window of a clip. Every field is optional.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeConfig {
    /// Start offset within the parent.
    #[serde(default)]
    pub start: Option<TimeExpr>,
    /// End offset within the parent.
    #[serde(default)]
    pub end: Option<TimeExpr>,
    /// Duration, used when `end` is absent.
    #[serde(default)]
    pub duration: Option<TimeExpr>,
}

impl TimeConfig {
    /// Window with explicit `start` and `duration` in seconds.
    pub fn span(start: f64, duration: f64) -> Self {
        Self {
            start: Some(TimeExpr::Secs(start)),
            end: None,
            duration: Some(TimeExpr::Secs(duration)),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/timeline/expr.rs"]
mod tests;
