//! Error types for the iris hub.

/// Top-level error type for the glasses control hub.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// A peripheral is not registered, flagged offline, or unreachable.
    #[error("device offline: {0}")]
    DeviceOffline(String),

    /// A mandatory device never appeared within its wait timeout.
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    /// HTTP transport failure talking to a peripheral or provider.
    #[error("transport error: {0}")]
    Transport(String),

    /// A peripheral answered with an unexpected payload shape.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Configuration file missing, unparseable, or invalid.
    #[error("config error: {0}")]
    Config(String),

    /// Todo store read/write failure.
    #[error("store error: {0}")]
    Store(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, HubError>;
