/// Result alias that carries the custom [`VisualiserError`] type.
pub type Result<T> = std::result::Result<T, VisualiserError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum VisualiserError {
    /// A preset referenced a component type that is not in the registry.
    #[error("unknown component type `{kind}` at {path}")]
    UnknownComponent { kind: String, path: String },
    /// Missing required option, malformed option value or unknown mode name.
    #[error("invalid configuration at {path}: {message}")]
    Config { path: String, message: String },
    /// More surfaces were requested than the pool may hand out at once.
    #[error("surface pool exhausted: all {capacity} surfaces are checked out")]
    ResourceExhausted { capacity: usize },
    /// A surface was returned while a more recently acquired one was still out.
    #[error("surface {released} released out of order (expected {expected})")]
    SurfaceOrder { released: u64, expected: u64 },
    /// A tick finished with surfaces still checked out.
    #[error("{outstanding} surface(s) still checked out at the end of the tick")]
    SurfaceLeak { outstanding: usize },
    #[error("surface size mismatch: expected {expected:?}, got {actual:?}")]
    SurfaceMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },
    /// The host has no usable graphics context.
    #[error("graphics context unavailable")]
    ContextUnavailable,
    #[error("no component with handle {0}")]
    UnknownNode(u32),
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl VisualiserError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub fn config(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Returns true for errors that reject a preset at load time.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::UnknownComponent { .. } | Self::Config { .. })
    }
}

impl From<&str> for VisualiserError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for VisualiserError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_component_names_type_and_path() {
        let err = VisualiserError::UnknownComponent {
            kind: "Tunnel".to_string(),
            path: "components[2]".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("Tunnel"));
        assert!(text.contains("components[2]"));
        assert!(err.is_config());
    }

    #[test]
    fn exhaustion_is_not_a_config_error() {
        let err = VisualiserError::ResourceExhausted { capacity: 4 };
        assert!(!err.is_config());
        assert!(err.to_string().contains('4'));
    }
}
