/// Convenience result alias used across the crate.
pub type MontageResult<T> = Result<T, MontageError>;

/// Pipeline failure category reported through the `Error` event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    /// Asset resolution failed before any frame was rendered.
    PreprocessingError,
    /// A frame failed to capture, or the frame sequence has holes.
    RenderError,
    /// Stitching I/O, transition blending, or the encoder subprocess failed.
    SynthesisError,
}

impl ErrorKind {
    /// Stable kebab-case name, as carried in error events.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PreprocessingError => "preprocessing-error",
            Self::RenderError => "render-error",
            Self::SynthesisError => "synthesis-error",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Crate error type.
#[derive(thiserror::Error, Debug)]
pub enum MontageError {
    /// Invalid video description or configuration.
    #[error("validation error: {0}")]
    Validation(String),

    /// Asset preparation failed.
    #[error("preprocessing error: {0}")]
    Preprocessing(String),

    /// Frame capture failed or produced an incomplete sequence.
    #[error("render error: {0}")]
    Render(String),

    /// Stitching or encoding failed.
    #[error("synthesis error: {0}")]
    Synthesis(String),

    /// The run was stopped through its stop handle.
    #[error("render cancelled")]
    Cancelled,

    /// JSON (de)serialization failed.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Any other error.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl MontageError {
    /// Build a [`MontageError::Validation`].
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`MontageError::Preprocessing`].
    pub fn preprocessing(msg: impl Into<String>) -> Self {
        Self::Preprocessing(msg.into())
    }

    /// Build a [`MontageError::Render`].
    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    /// Build a [`MontageError::Synthesis`].
    pub fn synthesis(msg: impl Into<String>) -> Self {
        Self::Synthesis(msg.into())
    }

    /// Build a [`MontageError::Serde`].
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// Pipeline category of this error, if it belongs to one.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Preprocessing(_) => Some(ErrorKind::PreprocessingError),
            Self::Render(_) => Some(ErrorKind::RenderError),
            Self::Synthesis(_) => Some(ErrorKind::SynthesisError),
            _ => None,
        }
    }
}
