use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ConfigError;

/// Error type for binding, resolution and assisted construction
#[derive(Debug, Error)]
pub enum InjectorError {
    #[error("Unsatisfied requirement on {}: {requirement}", .owner.as_deref().unwrap_or("<root>"))]
    UnsatisfiedRequirement {
        owner: Option<String>,
        requirement: String,
    },

    #[error("Circular dependency detected: {path} (cycle at: {cycle_at})")]
    CircularDependency { path: String, cycle_at: String },

    #[error("Call to '{target}' failed: {message}")]
    CallError {
        target: String,
        message: String,
        stack: Vec<String>,
    },

    #[error("Unknown provider: {message}")]
    UnknownProvider { message: String },

    #[error("Unknown argument '{argument}' declared for '{target}'")]
    UnknownArgument { target: String, argument: String },

    #[error("Invalid binding for '{key}': {message}")]
    InvalidBinding { key: String, message: String },

    #[error("{what} has been dropped")]
    Disposed { what: String },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl InjectorError {
    /// Create a new unsatisfied requirement error
    pub fn unsatisfied(owner: Option<String>, requirement: impl Into<String>) -> Self {
        Self::UnsatisfiedRequirement {
            owner,
            requirement: requirement.into(),
        }
    }

    /// Create a new circular dependency error
    pub fn circular(path: impl Into<String>, cycle_at: impl Into<String>) -> Self {
        Self::CircularDependency {
            path: path.into(),
            cycle_at: cycle_at.into(),
        }
    }

    /// Create a new call error with an empty resolution stack
    pub fn call_error(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CallError {
            target: target.into(),
            message: message.into(),
            stack: Vec::new(),
        }
    }

    /// Create a new unknown provider error
    pub fn unknown_provider(message: impl Into<String>) -> Self {
        Self::UnknownProvider {
            message: message.into(),
        }
    }

    /// Create a new unknown argument error
    pub fn unknown_argument(target: impl Into<String>, argument: impl Into<String>) -> Self {
        Self::UnknownArgument {
            target: target.into(),
            argument: argument.into(),
        }
    }

    /// Create a new invalid binding error
    pub fn invalid_binding(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidBinding {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create a new disposed error
    pub fn disposed(what: impl Into<String>) -> Self {
        Self::Disposed { what: what.into() }
    }

    /// Attach the type that needed an unsatisfied requirement, keeping the innermost owner
    pub fn with_owner(self, owner: impl Into<String>) -> Self {
        match self {
            Self::UnsatisfiedRequirement {
                owner: None,
                requirement,
            } => Self::UnsatisfiedRequirement {
                owner: Some(owner.into()),
                requirement,
            },
            other => other,
        }
    }

    /// Attach the resolution stack to a call error
    pub fn with_stack(self, frames: Vec<String>) -> Self {
        match self {
            Self::CallError {
                target,
                message,
                stack,
            } if stack.is_empty() => Self::CallError {
                target,
                message,
                stack: frames,
            },
            other => other,
        }
    }

    /// Stable machine-readable code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnsatisfiedRequirement { .. } => "UNSATISFIED_REQUIREMENT",
            Self::CircularDependency { .. } => "CIRCULAR_DEPENDENCY",
            Self::CallError { .. } => "CALL_ERROR",
            Self::UnknownProvider { .. } => "UNKNOWN_PROVIDER",
            Self::UnknownArgument { .. } => "UNKNOWN_ARGUMENT",
            Self::InvalidBinding { .. } => "INVALID_BINDING",
            Self::Disposed { .. } => "DISPOSED",
            Self::Config(_) => "CONFIG_ERROR",
        }
    }

    /// Check if the error is an unsatisfied requirement
    pub fn is_unsatisfied(&self) -> bool {
        matches!(self, Self::UnsatisfiedRequirement { .. })
    }

    /// Check if the error is a circular dependency
    pub fn is_circular(&self) -> bool {
        matches!(self, Self::CircularDependency { .. })
    }

    /// Check if the error is a call error
    pub fn is_call_error(&self) -> bool {
        matches!(self, Self::CallError { .. })
    }

    /// Check if the error is an unknown provider error
    pub fn is_unknown_provider(&self) -> bool {
        matches!(self, Self::UnknownProvider { .. })
    }

    /// Check if the error was raised while binding
    pub fn is_invalid_binding(&self) -> bool {
        matches!(self, Self::InvalidBinding { .. })
    }
}

/// Serializable view of an [`InjectorError`] for diagnostics output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stack: Vec<String>,
}

impl From<&InjectorError> for ErrorReport {
    fn from(error: &InjectorError) -> Self {
        let stack = match error {
            InjectorError::CallError { stack, .. } => stack.clone(),
            _ => Vec::new(),
        };
        Self {
            code: error.code().to_string(),
            message: error.to_string(),
            stack,
        }
    }
}
