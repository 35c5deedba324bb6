#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

use crate::core::service::ArtifactPaths;
use crate::utils::error::Result;
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;
use toml_config::TomlConfig;

pub const DEFAULT_MODEL_PATH: &str = "xgb.json";
pub const DEFAULT_ENCODER_PATH: &str = "disp_encode.json";
pub const DEFAULT_BIND: &str = "127.0.0.1:8080";
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

/// 命令列或環境變數提供的覆蓋值；`None` 表示沿用設定檔或預設值
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub model_path: Option<String>,
    pub encoder_path: Option<String>,
    pub artifact_dir: Option<String>,
    pub bind: Option<String>,
    pub request_timeout_seconds: Option<u64>,
    pub log_format: Option<LogFormat>,
    pub verbose: bool,
}

/// 合併後的服務設定。優先順序：TOML < 環境變數 < 命令列
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSettings {
    pub artifact_dir: String,
    pub model_path: String,
    pub encoder_path: String,
    pub bind: String,
    pub request_timeout_seconds: u64,
    pub log_format: LogFormat,
    pub verbose: bool,
}

impl ServiceSettings {
    pub fn resolve(file: Option<&TomlConfig>, overrides: Overrides) -> Self {
        let file = file.cloned().unwrap_or_default();

        Self {
            artifact_dir: overrides
                .artifact_dir
                .or(file.artifacts.base_dir.clone())
                .unwrap_or_else(|| ".".to_string()),
            model_path: overrides
                .model_path
                .or_else(|| file.model_path().map(str::to_string))
                .unwrap_or_else(|| DEFAULT_MODEL_PATH.to_string()),
            encoder_path: overrides
                .encoder_path
                .or_else(|| file.encoder_path().map(str::to_string))
                .unwrap_or_else(|| DEFAULT_ENCODER_PATH.to_string()),
            bind: overrides
                .bind
                .or_else(|| file.bind().map(str::to_string))
                .unwrap_or_else(|| DEFAULT_BIND.to_string()),
            request_timeout_seconds: overrides
                .request_timeout_seconds
                .or(file.request_timeout_seconds())
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECONDS),
            log_format: overrides
                .log_format
                .or(file.log_format())
                .unwrap_or_default(),
            verbose: overrides.verbose
                || file
                    .logging
                    .as_ref()
                    .and_then(|l| l.verbose)
                    .unwrap_or(false),
        }
    }

    pub fn artifact_paths(&self) -> ArtifactPaths {
        ArtifactPaths::new(self.model_path.clone(), self.encoder_path.clone())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        validation::validate_socket_addr("server.bind", &self.bind)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl Validate for ServiceSettings {
    fn validate(&self) -> Result<()> {
        validation::validate_path("artifacts.base_dir", &self.artifact_dir)?;
        validation::validate_path("artifacts.model_path", &self.model_path)?;
        validation::validate_path("artifacts.encoder_path", &self.encoder_path)?;
        // 副檔名只提示；檔案格式交給載入器判斷，pickle 才會回報 Unsupported
        if let Err(e) = validation::validate_file_extensions(
            "artifacts",
            &[self.model_path.clone(), self.encoder_path.clone()],
            &["json"],
        ) {
            tracing::warn!("⚠️ {}", e);
        }
        self.socket_addr()?;
        validation::validate_range(
            "server.request_timeout_seconds",
            self.request_timeout_seconds,
            1,
            300,
        )?;
        Ok(())
    }
}
