use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Sample capacity must be greater than 0, got {0}")]
    InvalidCapacity(usize),

    #[error("Metric {name} is registered as a {found}, not a {expected}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Metric not found: {0}")]
    NotFound(String),

    #[error("Mailbox reply lost: the message was dropped before it executed")]
    ReplyLost,

    #[error("Executor has been shut down")]
    ExecutorShutdown,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type alias for metrics operations
pub type Result<T> = std::result::Result<T, MetricsError>;

impl MetricsError {
    /// Creates a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a new not-found error
    pub fn not_found<S: Into<String>>(name: S) -> Self {
        Self::NotFound(name.into())
    }

    /// Returns the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) | Self::InvalidCapacity(_) => "config",
            Self::TypeMismatch { .. } => "registry",
            Self::NotFound(_) => "not_found",
            Self::ReplyLost | Self::ExecutorShutdown => "dispatch",
            Self::Io(_) => "io",
            Self::Serialization(_) | Self::Yaml(_) => "serialization",
        }
    }
}
