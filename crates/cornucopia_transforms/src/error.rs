//! Error types for cornucopia_transforms.

use thiserror::Error;

/// Result type alias using [`TransformError`].
pub type Result<T> = std::result::Result<T, TransformError>;

/// Errors raised while parsing or building transform configurations.
///
/// Errors raised while sampling or applying are [`cornucopia_core::CoreError`]s.
#[derive(Error, Debug)]
pub enum TransformError {
    /// The configuration document could not be parsed (includes unknown
    /// transform or distribution kinds).
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Unsupported configuration version.
    #[error("Unsupported config version {found} (supported: {supported})")]
    UnsupportedVersion {
        /// Version found in the document.
        found: u32,
        /// Version this crate understands.
        supported: u32,
    },

    /// Core error.
    #[error("Core error: {0}")]
    Core(#[from] cornucopia_core::CoreError),
}

impl From<serde_json::Error> for TransformError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidConfig(err.to_string())
    }
}
