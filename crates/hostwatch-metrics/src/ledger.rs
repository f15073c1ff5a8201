use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::alert::AlertKey;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// 检查记录是否允许覆盖，参数为该键上次发送时间
pub type Eligibility<'a> = &'a (dyn Fn(Option<DateTime<Utc>>) -> bool + Send + Sync);

/// 告警发送台账：告警键 -> 最近一次发送时间（UTC）
///
/// 键只有在第一次记录之后才存在，不存在即表示从未发送。
#[async_trait]
pub trait AlertLedger: Send + Sync {
    async fn last_sent(&self, key: &AlertKey) -> Result<Option<DateTime<Utc>>, LedgerError>;

    /// 无条件覆盖
    async fn record(&self, key: &AlertKey, at: DateTime<Utc>) -> Result<(), LedgerError>;

    /// 在同一把写锁内检查并记录，返回是否记录成功
    async fn record_if(
        &self,
        key: &AlertKey,
        at: DateTime<Utc>,
        eligible: Eligibility<'_>,
    ) -> Result<bool, LedgerError>;
}

/// 内存台账，进程重启后清空
#[derive(Default)]
pub struct MemoryLedger {
    entries: RwLock<HashMap<AlertKey, DateTime<Utc>>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl AlertLedger for MemoryLedger {
    async fn last_sent(&self, key: &AlertKey) -> Result<Option<DateTime<Utc>>, LedgerError> {
        Ok(self.entries.read().await.get(key).copied())
    }

    async fn record(&self, key: &AlertKey, at: DateTime<Utc>) -> Result<(), LedgerError> {
        self.entries.write().await.insert(key.clone(), at);
        Ok(())
    }

    async fn record_if(
        &self,
        key: &AlertKey,
        at: DateTime<Utc>,
        eligible: Eligibility<'_>,
    ) -> Result<bool, LedgerError> {
        let mut entries = self.entries.write().await;
        if !eligible(entries.get(key).copied()) {
            return Ok(false);
        }
        entries.insert(key.clone(), at);
        Ok(true)
    }
}

/// 文件台账
///
/// 每次记录都把完整台账写入临时文件再原子重命名，重启后冷却期依然有效。
pub struct FileLedger {
    entries: RwLock<HashMap<AlertKey, DateTime<Utc>>>,
    path: PathBuf,
}

impl FileLedger {
    /// 打开台账文件，不存在时从空台账开始
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref().to_path_buf();

        let entries = if fs::try_exists(&path).await? {
            let json = fs::read_to_string(&path).await?;
            let entries: HashMap<AlertKey, DateTime<Utc>> = serde_json::from_str(&json)?;
            info!("Alert ledger loaded from {:?} ({} keys)", path, entries.len());
            entries
        } else {
            info!("Alert ledger {:?} not found, starting empty", path);
            HashMap::new()
        };

        Ok(Self {
            entries: RwLock::new(entries),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, entries: &HashMap<AlertKey, DateTime<Utc>>) -> Result<(), LedgerError> {
        let json = serde_json::to_string_pretty(entries)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, json).await?;
        fs::rename(&temp_path, &self.path).await?;

        debug!("Alert ledger saved to {:?}", self.path);
        Ok(())
    }
}

#[async_trait]
impl AlertLedger for FileLedger {
    async fn last_sent(&self, key: &AlertKey) -> Result<Option<DateTime<Utc>>, LedgerError> {
        Ok(self.entries.read().await.get(key).copied())
    }

    async fn record(&self, key: &AlertKey, at: DateTime<Utc>) -> Result<(), LedgerError> {
        let mut entries = self.entries.write().await;
        entries.insert(key.clone(), at);
        self.persist(&entries).await
    }

    async fn record_if(
        &self,
        key: &AlertKey,
        at: DateTime<Utc>,
        eligible: Eligibility<'_>,
    ) -> Result<bool, LedgerError> {
        let mut entries = self.entries.write().await;
        if !eligible(entries.get(key).copied()) {
            return Ok(false);
        }
        entries.insert(key.clone(), at);
        self.persist(&entries).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 7, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_memory_ledger_absent_until_recorded() {
        let ledger = MemoryLedger::new();
        let key = AlertKey::global();

        assert_eq!(ledger.last_sent(&key).await.unwrap(), None);
        assert!(ledger.is_empty().await);

        ledger.record(&key, t0()).await.unwrap();
        assert_eq!(ledger.last_sent(&key).await.unwrap(), Some(t0()));
        assert_eq!(ledger.len().await, 1);
    }

    #[tokio::test]
    async fn test_record_overwrites() {
        let ledger = MemoryLedger::new();
        let key = AlertKey::cpu();
        let later = t0() + chrono::Duration::hours(7);

        ledger.record(&key, t0()).await.unwrap();
        ledger.record(&key, later).await.unwrap();

        assert_eq!(ledger.last_sent(&key).await.unwrap(), Some(later));
    }

    #[tokio::test]
    async fn test_record_if_respects_predicate() {
        let ledger = MemoryLedger::new();
        let key = AlertKey::ram();

        assert!(ledger.record_if(&key, t0(), &|last| last.is_none()).await.unwrap());
        assert!(!ledger.record_if(&key, t0(), &|last| last.is_none()).await.unwrap());
    }

    #[tokio::test]
    async fn test_file_ledger_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state").join("ledger.json");

        {
            let ledger = FileLedger::open(&path).await.unwrap();
            ledger.record(&AlertKey::disk("/"), t0()).await.unwrap();
        }

        let reopened = FileLedger::open(&path).await.unwrap();
        assert_eq!(
            reopened.last_sent(&AlertKey::disk("/")).await.unwrap(),
            Some(t0())
        );
        assert_eq!(reopened.last_sent(&AlertKey::global()).await.unwrap(), None);
        assert!(!path.with_extension("tmp").exists());
    }

    #[tokio::test]
    async fn test_file_ledger_rejects_corrupt_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(matches!(
            FileLedger::open(&path).await,
            Err(LedgerError::SerializationError(_))
        ));
    }
}
