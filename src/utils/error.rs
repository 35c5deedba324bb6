use thiserror::Error;

/// 模型或編碼器檔案載入失敗
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Artifact not found: {path}")]
    NotFound { path: String },

    #[error("Artifact unreadable: {path}: {source}")]
    Unreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Artifact corrupt: {path}: {message}")]
    Corrupt { path: String, message: String },

    #[error("Artifact format not supported: {path}: {message}")]
    Unsupported { path: String, message: String },

    #[error("Artifact does not match the trained feature layout: {message}")]
    Mismatch { message: String },
}

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("Invalid input for '{field}': {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Predicted class id {class_id} is unknown to the label encoder ({known_classes} classes)")]
    Decode { class_id: usize, known_classes: usize },

    #[error("Model does not support {capability}")]
    CapabilityUnsupported { capability: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid configuration value for '{field}' ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing configuration: {field}")]
    MissingConfigError { field: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Load,
    InvalidInput,
    Decode,
    Capability,
    Config,
    System,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::InvalidInput => "invalid_input",
            Self::Decode => "decode",
            Self::Capability => "capability",
            Self::Config => "config",
            Self::System => "system",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl InferenceError {
    pub fn invalid_input(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Load(_) => ErrorCategory::Load,
            Self::InvalidInput { .. } => ErrorCategory::InvalidInput,
            Self::Decode { .. } => ErrorCategory::Decode,
            Self::CapabilityUnsupported { .. } => ErrorCategory::Capability,
            Self::ConfigError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => ErrorCategory::Config,
            Self::IoError(_) | Self::SerializationError(_) | Self::CsvError(_) => {
                ErrorCategory::System
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            // 單筆請求失敗，服務仍可使用
            ErrorCategory::InvalidInput => ErrorSeverity::Medium,
            ErrorCategory::Decode | ErrorCategory::Capability => ErrorSeverity::High,
            ErrorCategory::Load | ErrorCategory::Config | ErrorCategory::System => {
                ErrorSeverity::Critical
            }
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            Self::Load(LoadError::NotFound { path }) => {
                format!("Check that '{}' exists or point the service at the right file", path)
            }
            Self::Load(LoadError::Unreadable { path, .. }) => {
                format!("Check the permissions of '{}'", path)
            }
            Self::Load(LoadError::Corrupt { .. }) => {
                "Re-export the artifact from the training pipeline".to_string()
            }
            Self::Load(LoadError::Unsupported { .. }) => {
                "Export the model with Booster.save_model(\"model.json\") and the encoder classes as JSON"
                    .to_string()
            }
            Self::Load(LoadError::Mismatch { .. }) => {
                "Use a model trained on the eight exoplanet features in their canonical order"
                    .to_string()
            }
            Self::InvalidInput { field, .. } => {
                format!("Provide a finite numeric value for '{}'", field)
            }
            Self::Decode { .. } => {
                "Make sure the model and label encoder come from the same training run".to_string()
            }
            Self::CapabilityUnsupported { .. } => {
                "Check the capability before calling it; the model objective does not provide it"
                    .to_string()
            }
            Self::ConfigError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => {
                "Review the configuration file, environment variables and CLI flags".to_string()
            }
            Self::IoError(_) => "Check file paths and permissions".to_string(),
            Self::SerializationError(_) => "Check that the input is valid JSON".to_string(),
            Self::CsvError(_) => "Check that the input is a well-formed CSV file".to_string(),
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Load => format!("無法載入模型檔案: {}", self),
            ErrorCategory::InvalidInput => format!("輸入資料無效: {}", self),
            ErrorCategory::Decode => format!("無法解碼預測類別: {}", self),
            ErrorCategory::Capability => format!("模型不支援此功能: {}", self),
            ErrorCategory::Config => format!("配置錯誤: {}", self),
            ErrorCategory::System => format!("系統錯誤: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, InferenceError>;
