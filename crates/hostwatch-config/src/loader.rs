use config::{Config, Environment, File, FileFormat};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::HostwatchConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to render configuration: {0}")]
    Render(#[from] toml::ser::Error),
}

/// 默认环境变量前缀，例如 `HOSTWATCH_MAIL__PASSWORD`
pub const ENV_PREFIX: &str = "HOSTWATCH";

/// 配置加载器
///
/// 依次叠加：内置默认值、TOML 文件（可不存在）、环境变量。
pub struct ConfigLoader {
    config_path: PathBuf,
    env_prefix: String,
}

impl ConfigLoader {
    pub fn new<P: AsRef<Path>>(config_path: P) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            env_prefix: ENV_PREFIX.to_string(),
        }
    }

    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// 加载但不校验
    pub fn load_unchecked(&self) -> Result<HostwatchConfig, ConfigError> {
        let path = self
            .config_path
            .to_str()
            .ok_or_else(|| {
                ConfigError::Invalid(format!("Invalid config path: {:?}", self.config_path))
            })?;

        if !self.config_path.exists() {
            info!("Config file {} not found, using defaults and environment", path);
        }

        let config = Config::builder()
            .add_source(File::new(path, FileFormat::Toml).required(false))
            .add_source(
                Environment::with_prefix(&self.env_prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// 加载并校验
    pub fn load(&self) -> Result<HostwatchConfig, ConfigError> {
        let config = self.load_unchecked()?;
        config.validate()?;
        Ok(config)
    }
}
