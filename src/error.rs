//! Error taxonomy for binding and rendering.

use thiserror::Error;

/// Errors surfaced by the binding engine.
///
/// Every variant is meant to reach the user as a notification; none of them
/// are swallowed inside the engine.
#[derive(Debug, Error)]
pub enum VizError {
    /// Dataset is empty or malformed. Fatal for that upload.
    #[error("cannot introspect dataset '{dataset}': {reason}")]
    Introspection { dataset: String, reason: String },

    /// Unknown component name.
    #[error("component '{name}' not found in catalog")]
    NotFound { name: String },

    /// A component with this name is already registered.
    #[error("component '{name}' is already registered")]
    DuplicateComponent { name: String },

    /// Catalog definition could not be loaded.
    #[error("invalid catalog definition: {reason}")]
    Catalog { reason: String },

    /// A value was rejected for a parameter. The previous value is kept.
    #[error("invalid value for '{key}': {reason}")]
    Validation { key: String, reason: String },

    /// Submit attempted while required parameters are unset.
    #[error("form is incomplete, missing: {}", missing.join(", "))]
    IncompleteForm { missing: Vec<String> },

    /// The render entry point of a component failed.
    #[error("failed to render '{component}'")]
    Render {
        component: String,
        #[source]
        source: anyhow::Error,
    },

    /// Command script could not be parsed.
    #[error("parse error at '{remaining}'")]
    Parse { remaining: String },

    /// A command is not valid in the current session state.
    #[error("invalid command in state {state}: {reason}")]
    InvalidState { state: String, reason: String },
}

impl VizError {
    pub(crate) fn validation(key: &str, reason: impl Into<String>) -> Self {
        Self::Validation {
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn render(component: &str, source: anyhow::Error) -> Self {
        Self::Render {
            component: component.to_string(),
            source,
        }
    }

    /// Whether the session can continue after this error.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Introspection { .. } | Self::Catalog { .. })
    }
}

/// Result type for binding operations.
pub type Result<T> = std::result::Result<T, VizError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incomplete_form_lists_keys() {
        let err = VizError::IncompleteForm {
            missing: vec!["x".to_string(), "y".to_string()],
        };
        assert_eq!(err.to_string(), "form is incomplete, missing: x, y");
    }

    #[test]
    fn test_render_error_keeps_source() {
        let err = VizError::render("BarChart", anyhow::anyhow!("no rows"));
        assert_eq!(err.to_string(), "failed to render 'BarChart'");
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("no rows"));
    }

    #[test]
    fn test_recoverable() {
        assert!(VizError::validation("x", "bad").is_recoverable());
        let fatal = VizError::Introspection {
            dataset: "d".to_string(),
            reason: "empty".to_string(),
        };
        assert!(!fatal.is_recoverable());
    }
}
