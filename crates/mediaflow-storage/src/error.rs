use mediaflow_core::AppError;

/// Storage error types
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Upload session not found: {0}")]
    SessionNotFound(String),

    #[error("Invalid part number: {0}")]
    InvalidPart(u32),

    #[error("Missing part {part}")]
    MissingPart { part: u32 },

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidKey(msg) => AppError::InvalidInput(msg),
            StorageError::SessionNotFound(id) => {
                AppError::NotFound(format!("Upload session {} not found", id))
            }
            StorageError::InvalidPart(part) => {
                AppError::InvalidInput(format!("Invalid part number {}", part))
            }
            StorageError::MissingPart { part } => AppError::MissingPart { part },
            other => AppError::Internal(other.to_string()),
        }
    }
}
