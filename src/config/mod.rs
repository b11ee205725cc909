/// 扩展配置系统
///
/// 提供TOML/JSON配置文件和环境变量覆盖。配置只在初始化时读取一次，
/// 之后以不可变的 [`ProviderConfig`] 形式交给扩展。
use crate::iap::constants::ProviderId;
use crate::impl_default;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// 扩展配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 文件读取错误
    #[error("Config file error: {0}")]
    FileError(#[from] std::io::Error),
    /// 解析错误
    #[error("Config parse error: {0}")]
    ParseError(String),
    /// 验证错误
    #[error("Config validation error: {0}")]
    ValidationError(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// 扩展主配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtensionConfig {
    /// 购买行为配置
    #[serde(default)]
    pub iap: IapSettings,

    /// Android 计费服务配置
    #[serde(default)]
    pub android: AndroidSettings,

    /// 日志配置
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// 购买行为配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IapSettings {
    /// 购买成功后是否自动完成交易
    #[serde(default = "default_true")]
    pub auto_finish_transactions: bool,
}

impl_default!(IapSettings {
    auto_finish_transactions: true,
});

/// Android 计费服务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AndroidSettings {
    /// 计费服务名称（"GooglePlay" 或 "Amazon"）
    #[serde(default = "default_provider_name")]
    pub iap_provider: String,
}

impl_default!(AndroidSettings {
    iap_provider: default_provider_name(),
});

fn default_true() -> bool {
    true
}

fn default_provider_name() -> String {
    ProviderId::Google.config_name().to_string()
}

/// 初始化后只读的计费服务配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderConfig {
    /// 当前使用的计费服务
    pub provider: ProviderId,
    /// 是否自动完成交易
    pub auto_finish_transactions: bool,
}

impl_default!(ProviderConfig {
    provider: ProviderId::Google,
    auto_finish_transactions: true,
});

impl ExtensionConfig {
    /// 创建默认配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 从TOML文件加载配置
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(ConfigError::FileError)?;
        Self::from_toml_str(&content)
    }

    /// 从TOML字符串解析配置
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// 从JSON文件加载配置
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(ConfigError::FileError)?;
        Self::from_json_str(&content)
    }

    /// 从JSON字符串解析配置
    pub fn from_json_str(content: &str) -> ConfigResult<Self> {
        serde_json::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// 从环境变量覆盖配置
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("IAP_AUTO_FINISH_TRANSACTIONS") {
            self.iap.auto_finish_transactions = match val.as_str() {
                "1" => true,
                "0" => false,
                other => other.parse().unwrap_or(self.iap.auto_finish_transactions),
            };
        }
        if let Ok(val) = env::var("IAP_ANDROID_PROVIDER") {
            if !val.is_empty() {
                self.android.iap_provider = val;
            }
        }
        if let Ok(val) = env::var("IAP_LOG_LEVEL") {
            if let Some(level) = LogLevel::parse(&val) {
                self.logging.level = level;
            }
        }
    }

    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        if self.android.iap_provider.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "android.iap_provider must not be empty".to_string(),
            ));
        }
        if self.logging.log_to_file && self.logging.log_file_path.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "logging.log_file_path is required when log_to_file is enabled".to_string(),
            ));
        }
        Ok(())
    }

    /// 解析出初始化后只读的计费服务配置
    ///
    /// 未知的服务名称会记录警告并回退到 Google Play。
    pub fn provider_config(&self) -> ProviderConfig {
        let name = self.android.iap_provider.as_str();
        let provider = match ProviderId::from_config_name(name) {
            Some(provider) => provider,
            None => {
                tracing::warn!(
                    target: "iap",
                    "Unknown IAP provider name [{}], defaulting to GooglePlay",
                    name
                );
                ProviderId::Google
            }
        };

        ProviderConfig {
            provider,
            auto_finish_transactions: self.iap.auto_finish_transactions,
        }
    }

    /// 自动查找并加载配置文件
    ///
    /// 按以下顺序查找：
    /// 1. ./iap.toml
    /// 2. ./iap.json
    /// 3. ~/.config/game_engine/iap.toml
    /// 4. 使用默认配置
    pub fn load_or_default() -> Self {
        if let Ok(config) = Self::from_toml_file("iap.toml") {
            tracing::info!(target: "iap", "Loaded config from iap.toml");
            return config;
        }

        if let Ok(config) = Self::from_json_file("iap.json") {
            tracing::info!(target: "iap", "Loaded config from iap.json");
            return config;
        }

        if let Some(home) = env::var_os("HOME") {
            let config_path = PathBuf::from(home)
                .join(".config")
                .join("game_engine")
                .join("iap.toml");

            if let Ok(config) = Self::from_toml_file(&config_path) {
                tracing::info!(target: "iap", "Loaded config from {:?}", config_path);
                return config;
            }
        }

        tracing::info!(target: "iap", "Using default IAP configuration");
        Self::default()
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别
    pub level: LogLevel,

    /// 是否输出到文件
    pub log_to_file: bool,

    /// 日志文件路径
    pub log_file_path: String,

    /// 是否输出到控制台
    pub log_to_console: bool,
}

impl_default!(LoggingConfig {
    level: LogLevel::Info,
    log_to_file: false,
    log_file_path: "game_engine_iap.log".to_string(),
    log_to_console: true,
});

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    /// 跟踪
    Trace,
    /// 调试
    Debug,
    /// 信息
    Info,
    /// 警告
    Warn,
    /// 错误
    Error,
}

impl LogLevel {
    /// 不区分大小写地解析级别名称
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ExtensionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.provider_config(), ProviderConfig::default());
    }

    #[test]
    fn test_toml_sections() {
        let config = ExtensionConfig::from_toml_str(
            r#"
[iap]
auto_finish_transactions = false

[android]
iap_provider = "Amazon"
"#,
        )
        .unwrap();

        let provider = config.provider_config();
        assert_eq!(provider.provider, ProviderId::Amazon);
        assert!(!provider.auto_finish_transactions);
        assert_eq!(config.logging.level, LogLevel::Info);
    }

    #[test]
    fn test_partial_logging_section() {
        let config = ExtensionConfig::from_toml_str("[logging]\nlevel = \"Debug\"").unwrap();
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert!(config.logging.log_to_console);
        assert!(config.iap.auto_finish_transactions);
    }

    #[test]
    fn test_unknown_provider_falls_back_to_google() {
        let mut config = ExtensionConfig::default();
        config.android.iap_provider = "SteamWallet".to_string();
        assert_eq!(config.provider_config().provider, ProviderId::Google);
    }

    #[test]
    fn test_json_serialization() {
        let config = ExtensionConfig::default();
        let json_str = serde_json::to_string(&config).unwrap();
        let parsed = ExtensionConfig::from_json_str(&json_str).unwrap();
        assert_eq!(config.android.iap_provider, parsed.android.iap_provider);
        assert_eq!(
            config.iap.auto_finish_transactions,
            parsed.iap.auto_finish_transactions
        );
    }

    #[test]
    fn test_validation_rejects_missing_log_path() {
        let mut config = ExtensionConfig::default();
        config.logging.log_to_file = true;
        config.logging.log_file_path = String::new();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_parse_error() {
        let result = ExtensionConfig::from_toml_str("[iap]\nauto_finish_transactions = \"maybe\"");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_log_level_parse() {
        assert_eq!(LogLevel::parse("WARNING"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("verbose"), None);
    }
}
