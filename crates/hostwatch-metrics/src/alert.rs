use serde::{Deserialize, Serialize};
use std::fmt;

use crate::snapshot::DiskUsage;

/// 告警键，划分独立的冷却周期
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlertKey(String);

impl AlertKey {
    /// 全局键：任意资源超限
    pub const GLOBAL: &'static str = "GlobalStatus";

    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn global() -> Self {
        Self::new(Self::GLOBAL)
    }

    pub fn cpu() -> Self {
        Self::new("cpu")
    }

    pub fn ram() -> Self {
        Self::new("ram")
    }

    pub fn disk(name: &str) -> Self {
        Self(format!("disk:{}", name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AlertKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AlertKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

/// 告警键的划分方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyMode {
    /// 所有资源共用一个键
    #[default]
    Global,
    /// 每种资源（每个卷）一个键
    PerResource,
}

/// 一次评估的结论
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AlertFinding {
    pub triggered: bool,
    pub cpu_high: bool,
    pub ram_high: bool,
    pub disk_high: Vec<DiskUsage>,
}

impl AlertFinding {
    pub fn new(cpu_high: bool, ram_high: bool, disk_high: Vec<DiskUsage>) -> Self {
        Self {
            triggered: cpu_high || ram_high || !disk_high.is_empty(),
            cpu_high,
            ram_high,
            disk_high,
        }
    }

    pub fn is_disk_high(&self, name: &str) -> bool {
        self.disk_high.iter().any(|disk| disk.name == name)
    }

    /// 触发的告警键；未触发时为空
    pub fn alert_keys(&self, mode: KeyMode) -> Vec<AlertKey> {
        if !self.triggered {
            return Vec::new();
        }

        match mode {
            KeyMode::Global => vec![AlertKey::global()],
            KeyMode::PerResource => {
                let mut keys = Vec::new();
                if self.cpu_high {
                    keys.push(AlertKey::cpu());
                }
                if self.ram_high {
                    keys.push(AlertKey::ram());
                }
                for disk in &self.disk_high {
                    let key = AlertKey::disk(&disk.name);
                    if !keys.contains(&key) {
                        keys.push(key);
                    }
                }
                keys
            }
        }
    }
}
