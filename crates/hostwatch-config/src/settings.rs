use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use hostwatch_logging::LoggingConfig;
use hostwatch_metrics::{cooldown_from_secs, KeyMode, Thresholds, DEFAULT_COOLDOWN_SECS};
use hostwatch_notify::{parse_recipients, MailSettings, RetryPolicy};

use crate::ConfigError;

/// 全局配置
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct HostwatchConfig {
    pub schedule: ScheduleConfig,
    pub thresholds: ThresholdsConfig,
    pub alerts: AlertsConfig,
    pub notify: NotifyConfig,
    pub mail: MailSettings,
    pub logging: LoggingConfig,
}

/// 调度配置
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// 每天执行检查的整点（UTC）
    pub target_hour_utc: u32,
    /// 每次检查后的固定停顿
    pub pause_secs: u64,
    /// CPU 采样预热
    pub cpu_warmup_ms: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            target_hour_utc: 7,
            pause_secs: 5,
            cpu_warmup_ms: 500,
        }
    }
}

impl ScheduleConfig {
    pub fn pause(&self) -> Duration {
        Duration::from_secs(self.pause_secs)
    }

    pub fn cpu_warmup(&self) -> Duration {
        Duration::from_millis(self.cpu_warmup_ms)
    }
}

/// 阈值配置
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ThresholdsConfig {
    pub cpu: f32,
    pub ram: u32,
    pub disk: f64,
    /// 连续超限次数，1 表示单次采样即告警
    pub sustained_samples: usize,
}

impl Default for ThresholdsConfig {
    fn default() -> Self {
        let defaults = Thresholds::default();
        Self {
            cpu: defaults.cpu,
            ram: defaults.ram,
            disk: defaults.disk,
            sustained_samples: 1,
        }
    }
}

impl ThresholdsConfig {
    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            cpu: self.cpu,
            ram: self.ram,
            disk: self.disk,
        }
    }
}

/// 告警配置
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AlertsConfig {
    pub cooldown_secs: i64,
    pub key_mode: KeyMode,
    /// 为 true 时至少一个收件人投递成功才记录发送
    pub require_delivery: bool,
    /// 设置后台账持久化到该文件
    pub ledger_path: Option<PathBuf>,
    pub subject: String,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: DEFAULT_COOLDOWN_SECS,
            key_mode: KeyMode::Global,
            require_delivery: false,
            ledger_path: None,
            subject: "Host resource alert".to_string(),
        }
    }
}

impl AlertsConfig {
    /// 冷却期，超出可表示范围时报错
    pub fn cooldown(&self) -> Result<chrono::Duration, ConfigError> {
        cooldown_from_secs(self.cooldown_secs).ok_or_else(|| {
            ConfigError::Invalid(format!(
                "alerts.cooldown_secs must be between 0 and {}, got {}",
                chrono::Duration::MAX.num_seconds(),
                self.cooldown_secs
            ))
        })
    }
}

/// 通知配置
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// `;` 分隔的收件人
    pub recipients: String,
    pub max_attempts: u32,
    pub backoff_ms: u64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            recipients: String::new(),
            max_attempts: 3,
            backoff_ms: 2000,
        }
    }
}

impl NotifyConfig {
    pub fn recipient_list(&self) -> Vec<String> {
        parse_recipients(&self.recipients)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.backoff_ms))
    }
}

impl HostwatchConfig {
    /// 校验配置
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.schedule.target_hour_utc > 23 {
            return Err(ConfigError::Invalid(format!(
                "schedule.target_hour_utc must be within 0..=23, got {}",
                self.schedule.target_hour_utc
            )));
        }

        check_percent("thresholds.cpu", f64::from(self.thresholds.cpu))?;
        check_percent("thresholds.ram", f64::from(self.thresholds.ram))?;
        check_percent("thresholds.disk", self.thresholds.disk)?;

        if self.thresholds.sustained_samples == 0 {
            return Err(ConfigError::Invalid(
                "thresholds.sustained_samples must be greater than 0".to_string(),
            ));
        }

        self.alerts.cooldown()?;

        if self.notify.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "notify.max_attempts must be greater than 0".to_string(),
            ));
        }

        if self.mail.server.trim().is_empty() {
            return Err(ConfigError::Invalid("mail.server is required".to_string()));
        }

        if self.mail.sender_email.trim().is_empty() {
            return Err(ConfigError::Invalid("mail.sender_email is required".to_string()));
        }

        Ok(())
    }

    /// 密码被遮盖后的 TOML，用于打印生效配置
    pub fn to_redacted_toml(&self) -> Result<String, ConfigError> {
        let mut redacted = self.clone();
        redacted.mail = self.mail.redacted();
        Ok(toml::to_string_pretty(&redacted)?)
    }
}

fn check_percent(name: &str, value: f64) -> Result<(), ConfigError> {
    if !(0.0..=100.0).contains(&value) {
        return Err(ConfigError::Invalid(format!(
            "{} must be a percentage within 0..=100, got {}",
            name, value
        )));
    }
    Ok(())
}
