//! Error types for the instance store
//!
//! Pattern adapted from doorway's `types/error.rs`.

/// Main error type for instance store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Record or document could not be converted. Never retried.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The document store failed or is unreachable
    #[error("Database error: {0}")]
    Database(String),

    /// The blob store failed or is unreachable
    #[error("Blob store error: {0}")]
    Blob(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// The backend cannot evaluate the requested operation
    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(format!("JSON error: {}", err))
    }
}

impl From<bson::ser::Error> for StoreError {
    fn from(err: bson::ser::Error) -> Self {
        Self::Serialization(format!("BSON encode failed: {}", err))
    }
}

impl From<bson::de::Error> for StoreError {
    fn from(err: bson::de::Error) -> Self {
        Self::Serialization(format!("BSON decode failed: {}", err))
    }
}

impl From<mongodb::error::Error> for StoreError {
    fn from(err: mongodb::error::Error) -> Self {
        Self::Database(err.to_string())
    }
}

/// Result type alias for instance store operations
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bson_decode_error_is_serialization() {
        let err: StoreError = bson::from_document::<String>(bson::doc! {}).unwrap_err().into();
        assert!(matches!(err, StoreError::Serialization(_)));
    }

    #[test]
    fn test_json_error_is_serialization() {
        let err: StoreError = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
        assert!(matches!(err, StoreError::Serialization(_)));
    }
}
