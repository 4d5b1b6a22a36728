//! Error types for atlas.

use thiserror::Error;

/// Result type alias using atlas's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for atlas operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A non-optional store dependency is missing or the store is unreachable
    #[error("Capability error: {0}")]
    Capability(String),

    /// Table, function or trigger creation failed
    #[error("Provisioning error: {0}")]
    Provisioning(String),

    /// Dataset-level ingestion failure (unreadable or malformed input)
    #[error("Ingestion error: {0}")]
    Ingestion(String),

    /// Geometry could not be parsed or converted
    #[error("Geometry error: {0}")]
    Geometry(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_capability() {
        let err = Error::Capability("gen_random_uuid() unavailable".to_string());
        assert_eq!(
            err.to_string(),
            "Capability error: gen_random_uuid() unavailable"
        );
    }

    #[test]
    fn test_error_display_provisioning() {
        let err = Error::Provisioning("villages: permission denied".to_string());
        assert_eq!(
            err.to_string(),
            "Provisioning error: villages: permission denied"
        );
    }

    #[test]
    fn test_error_display_ingestion() {
        let err = Error::Ingestion("not a FeatureCollection".to_string());
        assert_eq!(err.to_string(), "Ingestion error: not a FeatureCollection");
    }

    #[test]
    fn test_error_display_geometry() {
        let err = Error::Geometry("position needs two coordinates".to_string());
        assert_eq!(
            err.to_string(),
            "Geometry error: position needs two coordinates"
        );
    }

    #[test]
    fn test_error_display_invalid_input() {
        let err = Error::InvalidInput("negative limit".to_string());
        assert_eq!(err.to_string(), "Invalid input: negative limit");
    }

    #[test]
    fn test_error_display_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::Io(io_err);
        assert!(err.to_string().contains("I/O error:"));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number");
        assert!(json_err.is_err());

        let err: Error = json_err.unwrap_err().into();
        match err {
            Error::Serialization(msg) => {
                assert!(!msg.is_empty());
            }
            _ => panic!("Expected Serialization error"),
        }
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
