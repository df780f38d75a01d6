use crate::adapters::sheets::{SheetsSettings, DEFAULT_SHEETS_BASE_URL};
use crate::core::cache::DEFAULT_TTL;
use crate::utils::error::{PortalError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Sheets,
    Csv,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub kind: ProviderKind,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    pub api_key: Option<String>,
    pub bearer_token: Option<String>,
    pub timeout_seconds: Option<u64>,
    /// Directory of exported sheets when `kind = "csv"`.
    pub csv_dir: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::default(),
            base_url: default_base_url(),
            api_key: None,
            bearer_token: None,
            timeout_seconds: None,
            csv_dir: None,
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_SHEETS_BASE_URL.to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheConfig {
    pub ttl_seconds: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    File,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            data_dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> String {
    "./data".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub format: Option<String>,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(PortalError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| PortalError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${GOOGLE_API_KEY})；未設定的變數保留原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| PortalError::ConfigError {
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn cache_ttl(&self) -> Duration {
        self.cache
            .ttl_seconds
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TTL)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.provider.timeout_seconds.unwrap_or(30))
    }

    pub fn sheets_settings(&self) -> SheetsSettings {
        SheetsSettings {
            base_url: self.provider.base_url.clone(),
            api_key: non_placeholder(&self.provider.api_key),
            bearer_token: non_placeholder(&self.provider.bearer_token),
            timeout: self.request_timeout(),
        }
    }

    pub fn json_logs(&self) -> bool {
        self.logging
            .as_ref()
            .and_then(|l| l.format.as_deref())
            .map(|f| f == "json")
            .unwrap_or(false)
    }
}

/// Treats blank values and unresolved `${VAR}` placeholders as unset.
fn non_placeholder(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty() && !(v.starts_with("${") && v.ends_with('}')))
        .map(str::to_string)
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_url("provider.base_url", &self.provider.base_url)?;

        if let Some(timeout) = self.provider.timeout_seconds {
            validation::validate_positive_number("provider.timeout_seconds", timeout, 1)?;
        }

        if self.provider.kind == ProviderKind::Csv {
            let dir = self
                .provider
                .csv_dir
                .as_deref()
                .ok_or_else(|| PortalError::MissingConfigError {
                    field: "provider.csv_dir".to_string(),
                })?;
            validation::validate_path("provider.csv_dir", dir)?;
        }

        if let Some(ttl) = self.cache.ttl_seconds {
            validation::validate_positive_number("cache.ttl_seconds", ttl, 1)?;
        }

        validation::validate_path("storage.data_dir", &self.storage.data_dir)?;

        if let Some(format) = self.logging.as_ref().and_then(|l| l.format.as_deref()) {
            validation::validate_one_of("logging.format", format, &["compact", "json"])?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_basic_toml_config() {
        let toml_content = r#"
[provider]
kind = "sheets"
api_key = "abc123"
timeout_seconds = 10

[cache]
ttl_seconds = 60

[storage]
backend = "memory"
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(config.provider.kind, ProviderKind::Sheets);
        assert_eq!(config.provider.base_url, DEFAULT_SHEETS_BASE_URL);
        assert_eq!(config.cache_ttl(), Duration::from_secs(60));
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.storage.data_dir, "./data");
        assert_eq!(config.sheets_settings().api_key.as_deref(), Some("abc123"));
        assert_eq!(config.sheets_settings().timeout, Duration::from_secs(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = TomlConfig::from_toml_str("").unwrap();

        assert_eq!(config.cache_ttl(), DEFAULT_TTL);
        assert_eq!(config.storage.backend, StorageBackend::File);
        assert!(!config.json_logs());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("MARKS_PORTAL_TEST_KEY", "key-from-env");

        let toml_content = r#"
[provider]
api_key = "${MARKS_PORTAL_TEST_KEY}"
bearer_token = "${MARKS_PORTAL_UNSET_TOKEN}"
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        let settings = config.sheets_settings();
        assert_eq!(settings.api_key.as_deref(), Some("key-from-env"));
        assert_eq!(settings.bearer_token, None);

        std::env::remove_var("MARKS_PORTAL_TEST_KEY");
    }

    #[test]
    fn test_config_validation() {
        let bad_url = TomlConfig::from_toml_str("[provider]\nbase_url = \"invalid-url\"\n").unwrap();
        assert!(bad_url.validate().is_err());

        let csv_without_dir = TomlConfig::from_toml_str("[provider]\nkind = \"csv\"\n").unwrap();
        assert!(matches!(
            csv_without_dir.validate(),
            Err(PortalError::MissingConfigError { .. })
        ));

        let zero_ttl = TomlConfig::from_toml_str("[cache]\nttl_seconds = 0\n").unwrap();
        assert!(zero_ttl.validate().is_err());

        let bad_format = TomlConfig::from_toml_str("[logging]\nformat = \"xml\"\n").unwrap();
        assert!(bad_format.validate().is_err());
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        let result = TomlConfig::from_toml_str("[storage]\nbackend = \"mongo\"\n");
        assert!(matches!(
            result,
            Err(PortalError::ConfigValidationError { .. })
        ));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();

        let toml_content = r#"
[provider]
kind = "csv"
csv_dir = "./sheets"

[logging]
format = "json"
"#;

        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = TomlConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.provider.kind, ProviderKind::Csv);
        assert_eq!(config.provider.csv_dir.as_deref(), Some("./sheets"));
        assert!(config.json_logs());
    }
}
