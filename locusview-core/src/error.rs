//! Error handling for LocusView

use thiserror::Error;

/// Errors surfaced by the engine.
///
/// Only resource and context failures are expected to reach the host at
/// runtime; the remaining variants guard programming errors and input that
/// cannot be repaired locally.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Buffer length mismatch for {attribute}: expected {expected}, found {found}")]
    BufferLengthMismatch {
        attribute: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Invalid write to {attribute} buffer: {message}")]
    InvalidBufferWrite {
        attribute: &'static str,
        message: String,
    },

    #[error("Graphics context lost")]
    ContextLost,

    #[error("Resource initialization failed: {message}")]
    ResourceInit { message: String },

    #[error("Invalid record {id}: {message}")]
    InvalidRecord { id: String, message: String },

    #[error("Panel index {index} out of range ({count} panels)")]
    PanelOutOfRange { index: usize, count: usize },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Input/Output error: {message}")]
    Io { message: String },
}

impl EngineError {
    pub fn buffer_length_mismatch(attribute: &'static str, expected: usize, found: usize) -> Self {
        Self::BufferLengthMismatch {
            attribute,
            expected,
            found,
        }
    }

    pub fn invalid_buffer_write<S: Into<String>>(attribute: &'static str, message: S) -> Self {
        Self::InvalidBufferWrite {
            attribute,
            message: message.into(),
        }
    }

    pub fn resource_init<S: Into<String>>(message: S) -> Self {
        Self::ResourceInit {
            message: message.into(),
        }
    }

    pub fn invalid_record<S: Into<String>>(id: S, message: S) -> Self {
        Self::InvalidRecord {
            id: id.into(),
            message: message.into(),
        }
    }

    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Whether the host has to re-provision GPU resources to recover.
    pub fn requires_rebuild(&self) -> bool {
        matches!(self, Self::ContextLost | Self::ResourceInit { .. })
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        Self::io(err.to_string())
    }
}

impl From<toml::de::Error> for EngineError {
    fn from(err: toml::de::Error) -> Self {
        Self::config(format!("TOML parsing error: {}", err))
    }
}

impl From<toml::ser::Error> for EngineError {
    fn from(err: toml::ser::Error) -> Self {
        Self::config(format!("TOML serialization error: {}", err))
    }
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = EngineError::buffer_length_mismatch("color", 3, 2);
        assert!(matches!(err, EngineError::BufferLengthMismatch { .. }));
        assert_eq!(
            err.to_string(),
            "Buffer length mismatch for color: expected 3, found 2"
        );
    }

    #[test]
    fn test_requires_rebuild() {
        assert!(EngineError::ContextLost.requires_rebuild());
        assert!(EngineError::resource_init("no adapter").requires_rebuild());
        assert!(!EngineError::config("bad").requires_rebuild());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: EngineError = io_err.into();
        assert!(matches!(err, EngineError::Io { .. }));
    }
}
