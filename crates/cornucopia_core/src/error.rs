//! Error types for cornucopia_core.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using [`CoreError`].
pub type Result<T> = std::result::Result<T, CoreError>;

/// Position of a transform node in a transform tree.
///
/// Stored as the list of child indices walked from the root, so `/` is the
/// root itself and `/0/1` is the second child of the root's first child.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodePath(Vec<usize>);

impl NodePath {
    /// The root position.
    #[must_use]
    pub const fn root() -> Self {
        Self(Vec::new())
    }

    /// Child indices from the root.
    #[must_use]
    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    /// Depth of the node (0 for the root).
    #[must_use]
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// Position of this node as seen from a parent that holds it at `index`.
    #[must_use]
    pub fn under(mut self, index: usize) -> Self {
        self.0.insert(0, index);
        self
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "/");
        }
        for index in &self.0 {
            write!(f, "/{index}")?;
        }
        Ok(())
    }
}

impl From<Vec<usize>> for NodePath {
    fn from(indices: Vec<usize>) -> Self {
        Self(indices)
    }
}

/// Errors raised while sampling, applying, running or replaying transforms.
///
/// Tree-located variants name the node position and the transform that
/// raised them. Combinators re-locate child errors with [`CoreError::nested`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// Bad or unknown distribution / parameter specification.
    #[error("Configuration error at {path} ({transform}): {message}")]
    Configuration {
        /// Position of the offending node.
        path: NodePath,
        /// Name of the offending transform.
        transform: String,
        /// What was wrong.
        message: String,
    },

    /// Bundle members disagree on spatial extent, or a parameter's shape is
    /// incompatible with a tensor.
    #[error("Shape mismatch at {path} ({transform}), role `{role}`: {message}")]
    ShapeMismatch {
        /// Position of the offending node.
        path: NodePath,
        /// Name of the offending transform.
        transform: String,
        /// Role key (or parameter name) that violated the constraint.
        role: String,
        /// What was wrong.
        message: String,
    },

    /// A required role is absent from the bundle.
    #[error("Role error at {path} ({transform}): required role `{role}` is absent from the bundle")]
    Role {
        /// Position of the offending node.
        path: NodePath,
        /// Name of the offending transform.
        transform: String,
        /// The missing role key.
        role: String,
    },

    /// A realized parameter tree does not match the transform tree.
    #[error("Replay mismatch at {path} ({transform}): {message}")]
    ReplayMismatch {
        /// Position of the offending node.
        path: NodePath,
        /// Name of the offending transform.
        transform: String,
        /// What was wrong.
        message: String,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl CoreError {
    /// Configuration error raised by `transform` at its own position.
    pub fn configuration(transform: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            path: NodePath::root(),
            transform: transform.into(),
            message: message.into(),
        }
    }

    /// Shape mismatch raised by `transform` at its own position.
    pub fn shape_mismatch(
        transform: impl Into<String>,
        role: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::ShapeMismatch {
            path: NodePath::root(),
            transform: transform.into(),
            role: role.into(),
            message: message.into(),
        }
    }

    /// Missing-role error raised by `transform` at its own position.
    pub fn role(transform: impl Into<String>, role: impl Into<String>) -> Self {
        Self::Role {
            path: NodePath::root(),
            transform: transform.into(),
            role: role.into(),
        }
    }

    /// Replay mismatch raised by `transform` at its own position.
    pub fn replay_mismatch(transform: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ReplayMismatch {
            path: NodePath::root(),
            transform: transform.into(),
            message: message.into(),
        }
    }

    /// Re-locate an error raised by the child held at `index`.
    #[must_use]
    pub fn nested(self, index: usize) -> Self {
        match self {
            Self::Configuration { path, transform, message } => Self::Configuration {
                path: path.under(index),
                transform,
                message,
            },
            Self::ShapeMismatch { path, transform, role, message } => Self::ShapeMismatch {
                path: path.under(index),
                transform,
                role,
                message,
            },
            Self::Role { path, transform, role } => Self::Role {
                path: path.under(index),
                transform,
                role,
            },
            Self::ReplayMismatch { path, transform, message } => Self::ReplayMismatch {
                path: path.under(index),
                transform,
                message,
            },
            other @ Self::Serialization(_) => other,
        }
    }

    /// Position of the node that raised the error, if it is tree-located.
    #[must_use]
    pub fn path(&self) -> Option<&NodePath> {
        match self {
            Self::Configuration { path, .. }
            | Self::ShapeMismatch { path, .. }
            | Self::Role { path, .. }
            | Self::ReplayMismatch { path, .. } => Some(path),
            Self::Serialization(_) => None,
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
