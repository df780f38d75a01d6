use thiserror::Error;

/// Failures raised by a tabular data provider for a single sheet.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Sheet not found: {spreadsheet_id}")]
    NotFound { spreadsheet_id: String },

    #[error("Malformed provider response: {message}")]
    Decode { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV processing error: {0}")]
    Csv(#[from] csv::Error),
}

/// A source could not be fetched. Carries the internal source id so the
/// aggregator can attribute the failure.
#[derive(Error, Debug)]
#[error("Failed to fetch source {source_id}: {detail}")]
pub struct SourceFetchError {
    pub source_id: String,
    pub detail: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("Invalid roll number. Please check your roll number and try again.")]
    NoSuchStudent,

    #[error("Security Alert: The email you entered does not match our official records.")]
    EmailMismatch,

    #[error("This roll number is already registered. Please login instead.")]
    AlreadyRegistered,

    #[error("{message}")]
    InvalidRequest { message: String },

    #[error("Account storage error: {message}")]
    Storage { message: String },

    #[error("Password hashing failed: {message}")]
    Hashing { message: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoginError {
    #[error("You are not registered. Please register first.")]
    NotRegistered,

    // 刻意模糊：不透露是哪個欄位錯誤
    #[error("Invalid credentials.")]
    InvalidCredentials,

    #[error("Account update required. Please register again to set a password.")]
    LegacyAccountNeedsUpgrade,

    #[error("{message}")]
    InvalidRequest { message: String },

    #[error("Account storage error: {message}")]
    Storage { message: String },

    #[error("Token issuance failed: {message}")]
    TokenIssuance { message: String },
}

impl LoginError {
    /// Whether the caller should be sent to the registration flow.
    pub fn needs_registration(&self) -> bool {
        matches!(self, Self::NotRegistered | Self::LegacyAccountNeedsUpgrade)
    }
}

#[derive(Error, Debug)]
pub enum PortalError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Provider error: {0}")]
    ProviderError(#[from] ProviderError),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Storage error: {message}")]
    StorageError { message: String },

    #[error("{what} not found")]
    NotFound { what: String },

    #[error("Permission denied: {message}")]
    PermissionDenied { message: String },
}

impl PortalError {
    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::IoError(_) | Self::SerializationError(_) | Self::StorageError { .. } => {
                "Failed to read or write portal data".to_string()
            }
            Self::ProviderError(e) => format!("The sheet provider rejected the request: {}", e),
            Self::ConfigError { .. }
            | Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => format!("Configuration problem: {}", self),
            Self::ValidationError { message } => message.clone(),
            Self::NotFound { .. } | Self::PermissionDenied { .. } => self.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            Self::IoError(_) | Self::StorageError { .. } => {
                "Check that storage.data_dir exists and is writable"
            }
            Self::SerializationError(_) => "Inspect the JSON files under storage.data_dir",
            Self::ProviderError(_) => "Verify the spreadsheet id, tab name and API credentials",
            Self::ConfigError { .. }
            | Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => "Fix portal.toml and try again",
            Self::ValidationError { .. } => "Correct the input and retry",
            Self::NotFound { .. } => "Run `sources list` to see the available ids",
            Self::PermissionDenied { .. } => "Only the owning admin can change this source",
        }
    }
}

pub type Result<T> = std::result::Result<T, PortalError>;
