//! Error types for Order Desk.

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Channel-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel {name} failed to start: {reason}")]
    StartupFailed { name: String, reason: String },

    #[error("Failed to send response on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },

    #[error("No channel registered under {name}")]
    UnknownChannel { name: String },
}

/// Order draft and input validation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderError {
    #[error("Line {index} is out of range (order has {len} lines)")]
    LineOutOfRange { index: usize, len: usize },

    #[error("Order has no lines")]
    NoLines,

    #[error("Order has no customer")]
    NoCustomer,

    #[error("Invalid quantity: {0:?}")]
    InvalidQuantity(String),

    #[error("Invalid dispatch date: {0:?}")]
    InvalidDate(String),

    #[error("Invalid quick order: {0}")]
    InvalidQuickOrder(String),
}

/// Structural violations inside a conversation session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Stored order {id} disappeared while session {key} was editing it")]
    OrderVanished { key: String, id: i64 },
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
