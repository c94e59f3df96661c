//! Error types for ArborDB.

use crate::page::PageId;
use thiserror::Error;

/// Result type alias using ArborError.
pub type Result<T> = std::result::Result<T, ArborError>;

/// Errors that can occur in ArborDB operations.
#[derive(Debug, Error)]
pub enum ArborError {
    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Buffer pool errors
    #[error("Page not found: {page_id}")]
    PageNotFound { page_id: PageId },

    #[error("Buffer pool exhausted, unable to allocate frame")]
    BufferPoolExhausted,

    // Index errors
    #[error("Page corrupted: {page_id}, reason: {reason}")]
    CorruptPage { page_id: PageId, reason: String },

    // Configuration errors
    #[error("Invalid parameter: {name} = {value}")]
    InvalidParameter { name: String, value: String },

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error as IoError, ErrorKind};

    #[test]
    fn test_io_error_conversion() {
        let io_err = IoError::new(ErrorKind::NotFound, "file not found");
        let arbor_err: ArborError = io_err.into();
        assert!(matches!(arbor_err, ArborError::Io(_)));
        assert!(arbor_err.to_string().contains("I/O error"));
    }

    #[test]
    fn test_page_not_found_display() {
        let err = ArborError::PageNotFound {
            page_id: PageId(42),
        };
        assert_eq!(err.to_string(), "Page not found: 42");
    }

    #[test]
    fn test_buffer_pool_exhausted_display() {
        let err = ArborError::BufferPoolExhausted;
        assert_eq!(
            err.to_string(),
            "Buffer pool exhausted, unable to allocate frame"
        );
    }

    #[test]
    fn test_corrupt_page_display() {
        let err = ArborError::CorruptPage {
            page_id: PageId(100),
            reason: "unknown node kind 7".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Page corrupted: 100, reason: unknown node kind 7"
        );
    }

    #[test]
    fn test_invalid_parameter_display() {
        let err = ArborError::InvalidParameter {
            name: "leaf_max_size".to_string(),
            value: "1".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid parameter: leaf_max_size = 1");
    }

    #[test]
    fn test_internal_error_display() {
        let err = ArborError::Internal("descent stack empty".to_string());
        assert_eq!(err.to_string(), "Internal error: descent stack empty");
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_ok() -> Result<i32> {
            Ok(42)
        }

        fn returns_err() -> Result<i32> {
            Err(ArborError::Internal("test".to_string()))
        }

        assert!(returns_ok().is_ok());
        assert!(returns_err().is_err());
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ArborError>();
    }
}
