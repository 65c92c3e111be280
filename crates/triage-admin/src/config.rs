//! 配置管理
//!
//! 提供统一的配置加载与验证，支持配置文件和环境变量覆盖

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{error, info};

/// 环境变量前缀，例如 `TRIAGE__CLASSIFIER__API_KEY`
pub const ENV_PREFIX: &str = "TRIAGE";

/// 配置管理器
#[derive(Debug)]
pub struct ConfigManager {
    /// 配置数据
    config: Arc<RwLock<TriageConfig>>,
    /// 配置文件路径
    config_path: Option<String>,
    /// 配置验证器
    validator: ConfigValidator,
}

/// 分诊系统完整配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TriageConfig {
    /// 服务器配置
    pub server: ServerConfig,
    /// 分类器配置
    pub classifier: ClassifierConfig,
    /// 日志配置
    pub logging: LoggingConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 服务器名称
    pub name: String,
    /// 监听主机
    pub host: String,
    /// 监听端口
    pub port: u16,
    /// 启用CORS
    pub enable_cors: bool,
    /// 请求体上限（字节），自助机照片和身体图以 base64 随签到提交
    pub max_body_bytes: usize,
}

/// 分类器供应商
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierProvider {
    Gemini,
    Disabled,
}

/// 分类器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// 供应商
    pub provider: ClassifierProvider,
    /// API 端点
    pub endpoint: String,
    /// 模型名称
    pub model: String,
    /// API密钥
    pub api_key: String,
    /// 调用超时（毫秒）
    pub timeout_ms: u64,
    /// 默认语言
    pub default_language: String,
}

impl ClassifierConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// 日志格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Full,
    Compact,
    Pretty,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别或 EnvFilter 指令
    pub level: String,
    /// 日志格式
    pub format: LogFormat,
    /// 输出模块路径
    pub with_target: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "QuickTriage ER".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8080,
            enable_cors: true,
            max_body_bytes: 25 * 1024 * 1024,
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            provider: ClassifierProvider::Gemini,
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-3-flash-preview".to_string(),
            api_key: String::new(),
            timeout_ms: 15_000,
            default_language: "English".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Full,
            with_target: true,
        }
    }
}

impl TriageConfig {
    /// 渲染为 TOML，用于生成示例配置文件
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to render configuration as TOML")
    }
}

impl ConfigManager {
    /// 创建新的配置管理器，配置文件不存在时使用默认值
    ///
    /// 加载后不做验证，调用方覆盖命令行参数后再调用 `update_config` 或 `validate_config`。
    pub fn new(config_path: Option<&str>) -> Result<Self> {
        let config = Self::load_config(config_path)?;
        let validator = ConfigValidator::new();

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            config_path: config_path.map(str::to_string),
            validator,
        })
    }

    /// 从文件和环境变量加载配置
    fn load_config(config_path: Option<&str>) -> Result<TriageConfig> {
        let mut builder = Config::builder();

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(false));
        }

        let settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: TriageConfig = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        match config_path {
            Some(path) => info!("Configuration loaded from: {}", path),
            None => info!("Configuration loaded from defaults and environment"),
        }
        Ok(config)
    }

    /// 获取配置
    pub async fn get_config(&self) -> TriageConfig {
        let config = self.config.read().await;
        config.clone()
    }

    /// 更新配置，验证失败时保持原配置
    pub async fn update_config(&self, new_config: TriageConfig) -> Result<()> {
        self.validator.validate(&new_config)?;

        let mut config = self.config.write().await;
        *config = new_config;

        info!("Configuration updated");
        Ok(())
    }

    /// 重新加载配置
    pub async fn reload_config(&self) -> Result<()> {
        let new_config = Self::load_config(self.config_path.as_deref())?;
        self.update_config(new_config).await
    }

    /// 验证配置
    pub async fn validate_config(&self) -> Result<()> {
        let config = self.config.read().await;
        self.validator.validate(&config)
    }
}

/// 配置验证器
#[derive(Debug)]
pub struct ConfigValidator {
    /// 验证规则
    validation_rules: Vec<ValidationRule>,
}

/// 验证规则
#[derive(Debug)]
struct ValidationRule {
    /// 字段路径
    field_path: String,
    /// 验证函数
    validator: fn(&TriageConfig) -> Result<()>,
    /// 错误消息
    error_message: String,
}

impl ConfigValidator {
    /// 创建新的配置验证器
    pub fn new() -> Self {
        let validation_rules = vec![
            ValidationRule {
                field_path: "server.port".to_string(),
                validator: |config| {
                    if config.server.port == 0 {
                        Err(anyhow::anyhow!("Server port cannot be 0"))
                    } else {
                        Ok(())
                    }
                },
                error_message: "Invalid server port".to_string(),
            },
            ValidationRule {
                field_path: "server.max_body_bytes".to_string(),
                validator: |config| {
                    if config.server.max_body_bytes == 0 {
                        Err(anyhow::anyhow!("Request body limit cannot be 0"))
                    } else {
                        Ok(())
                    }
                },
                error_message: "Invalid request body limit".to_string(),
            },
            ValidationRule {
                field_path: "classifier.timeout_ms".to_string(),
                validator: |config| {
                    if config.classifier.timeout_ms == 0 {
                        Err(anyhow::anyhow!("Classifier timeout cannot be 0"))
                    } else {
                        Ok(())
                    }
                },
                error_message: "Invalid classifier timeout".to_string(),
            },
            ValidationRule {
                field_path: "classifier.api_key".to_string(),
                validator: |config| {
                    if config.classifier.provider == ClassifierProvider::Gemini
                        && config.classifier.api_key.trim().is_empty()
                    {
                        Err(anyhow::anyhow!(
                            "Gemini provider requires an API key (set {}__CLASSIFIER__API_KEY)",
                            ENV_PREFIX
                        ))
                    } else {
                        Ok(())
                    }
                },
                error_message: "Missing classifier API key".to_string(),
            },
            ValidationRule {
                field_path: "classifier.default_language".to_string(),
                validator: |config| {
                    if config.classifier.default_language.trim().is_empty() {
                        Err(anyhow::anyhow!("Default language cannot be empty"))
                    } else {
                        Ok(())
                    }
                },
                error_message: "Invalid default language".to_string(),
            },
        ];

        Self { validation_rules }
    }

    /// 验证配置
    pub fn validate(&self, config: &TriageConfig) -> Result<()> {
        for rule in &self.validation_rules {
            if let Err(e) = (rule.validator)(config) {
                error!("Configuration validation failed for {}: {}", rule.field_path, e);
                return Err(anyhow::anyhow!("{}: {}", rule.error_message, e));
            }
        }

        info!("Configuration validation passed");
        Ok(())
    }
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}
