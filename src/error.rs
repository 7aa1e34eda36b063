//! Error handling for the PassFlow gateway

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Serial device discovery failure
    #[error("Sensor device not found: {0}")]
    DeviceNotFound(String),

    /// Serial port open/configure failure
    #[error("Serial link error: {0}")]
    Link(#[from] tokio_serial::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// SQLx database error
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Config error
    #[error("Config error: {0}")]
    Config(String),

    /// Video capture/extraction error
    #[error("Video error: {0}")]
    Video(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
