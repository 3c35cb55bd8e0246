use thiserror::Error;

#[derive(Error, Debug)]
pub enum MessagesError {
    #[error("Failed to launch Chrome: {0}")]
    LaunchFailed(String),

    #[error("Chrome connection lost")]
    ConnectionLost,

    #[error("Page is closed")]
    PageClosed,

    #[error("Required control not found: {0}")]
    PreconditionNotFound(String),

    #[error("Timed out after {ms}ms waiting for {what}")]
    TimeoutExceeded { what: String, ms: u64 },

    #[error("Element not found at step '{step}'")]
    ElementNotFound { step: String },

    #[error("Malformed credentials: {0}")]
    MalformedCredentials(String),

    #[error("Navigation failed: {0}")]
    NavigationError(String),

    #[error("Send failed after {attempts} attempt(s): {reason}")]
    SendFailed { attempts: u32, reason: String },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("JavaScript evaluation failed: {0}")]
    EvaluationError(String),

    #[error("Storage operation failed: {0}")]
    StorageError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid port: {0}")]
    InvalidPort(u16),

    #[error("File I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDeError(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerError(#[from] toml::ser::Error),

    #[error("General error: {0}")]
    General(String),
}

impl MessagesError {
    /// Errors the dispatcher answers with a single reload-and-retry.
    pub fn is_missing_input(&self) -> bool {
        matches!(self, Self::ElementNotFound { .. })
    }

    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Self::LaunchFailed(_) => vec![
                "Ensure Chrome/Chromium is installed".into(),
                "Check if another Chrome instance is using the debugging port".into(),
                "Try specifying Chrome path with --chrome-path".into(),
            ],
            Self::ConnectionLost | Self::PageClosed => vec![
                "Check if Chrome was closed manually".into(),
                "Run the command again to start a fresh browser".into(),
            ],
            Self::PreconditionNotFound(name) => vec![
                format!("The page markup may have changed; override locator '{}'", name),
                "Run with --verbose to see which step failed".into(),
            ],
            Self::TimeoutExceeded { ms, .. } => vec![
                format!("Increase the matching value in [timeouts] (currently {}ms)", ms),
                "Check network connectivity".into(),
            ],
            Self::ElementNotFound { step } => vec![
                format!("Check the locator used for step '{}'", step),
                "Override locators in the [locators] section of the config".into(),
            ],
            Self::MalformedCredentials(_) => vec![
                "Delete the credentials file and pair again with: messages-web login".into(),
                "Use --force-pairing to ignore stored credentials".into(),
            ],
            Self::NavigationError(_) => vec![
                "Check network connectivity".into(),
                "Verify the [urls] section of the config".into(),
            ],
            Self::SendFailed { .. } => vec![
                "Verify the recipient number is valid".into(),
                "Retry the command; the page may still have been loading".into(),
            ],
            Self::ConfigError(_) => vec![
                "Check configuration file syntax".into(),
                "Run with --verbose to see detailed error".into(),
                "Use --config to specify a different config file".into(),
            ],
            Self::InvalidPort(port) => vec![
                format!("Port {} is out of valid range (1024-65535)", port),
                "Use --port to specify a different port".into(),
            ],
            _ => vec![
                "Run with --verbose for more details".into(),
                "Check the documentation for help".into(),
            ],
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Self::LaunchFailed(_) | Self::ConnectionLost | Self::PageClosed => 3,
            Self::NavigationError(_) | Self::TimeoutExceeded { .. } => 4,
            Self::ElementNotFound { .. } | Self::PreconditionNotFound(_) => 5,
            Self::SendFailed { .. } => 6,
            Self::MalformedCredentials(_) | Self::IoError(_) | Self::StorageError(_) => 8,
            Self::ConfigError(_)
            | Self::TomlDeError(_)
            | Self::TomlSerError(_)
            | Self::InvalidPort(_) => 7,
            _ => 1,
        }
    }
}
