use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::debug;

use crate::alert::AlertKey;
use crate::clock::{Clock, SystemClock};
use crate::ledger::{AlertLedger, LedgerError, MemoryLedger};

/// 默认冷却期：6 小时
pub const DEFAULT_COOLDOWN_SECS: i64 = 6 * 60 * 60;

/// 秒数转冷却期；负数或超出 chrono 可表示范围时返回 None
pub fn cooldown_from_secs(secs: i64) -> Option<Duration> {
    if secs < 0 {
        return None;
    }
    Duration::try_seconds(secs)
}

/// 告警去重器
///
/// 以告警键为单位控制冷却期。距离上次发送严格大于冷却期才允许再次发送，
/// 恰好等于冷却期时仍被抑制。
pub struct AlertDeduplicator {
    ledger: Arc<dyn AlertLedger>,
    cooldown: Duration,
    clock: Arc<dyn Clock>,
}

impl AlertDeduplicator {
    pub fn new(ledger: Arc<dyn AlertLedger>, cooldown: Duration) -> Self {
        Self {
            ledger,
            cooldown,
            clock: Arc::new(SystemClock),
        }
    }

    /// 内存台账 + 系统时钟
    pub fn in_memory(cooldown: Duration) -> Self {
        Self::new(Arc::new(MemoryLedger::new()), cooldown)
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// 该键当前是否允许发送
    pub async fn can_send(&self, key: &AlertKey) -> Result<bool, LedgerError> {
        let now = self.clock.now();
        let last = self.ledger.last_sent(key).await?;
        let allowed = is_out_of_cooldown(last, now, self.cooldown);

        if !allowed {
            debug!("Alert {} suppressed, still within cooldown", key);
        }

        Ok(allowed)
    }

    /// 记录发送时间，覆盖旧值
    pub async fn mark_sent(&self, key: &AlertKey) -> Result<(), LedgerError> {
        let now = self.clock.now();
        self.ledger.record(key, now).await?;
        debug!("Alert {} marked sent at {}", key, now);
        Ok(())
    }

    /// 原子的检查加记录，并发调用方只有一个能拿到 true
    pub async fn try_claim(&self, key: &AlertKey) -> Result<bool, LedgerError> {
        let now = self.clock.now();
        let cooldown = self.cooldown;
        self.ledger
            .record_if(key, now, &move |last| is_out_of_cooldown(last, now, cooldown))
            .await
    }
}

fn is_out_of_cooldown(last: Option<DateTime<Utc>>, now: DateTime<Utc>, cooldown: Duration) -> bool {
    match last {
        None => true,
        Some(last) => now - last > cooldown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;

    fn setup() -> (AlertDeduplicator, Arc<ManualClock>, DateTime<Utc>) {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 10, 7, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(t0));
        let dedup = AlertDeduplicator::in_memory(Duration::hours(6)).with_clock(clock.clone());
        (dedup, clock, t0)
    }

    #[tokio::test]
    async fn test_never_sent_is_always_eligible() {
        let (dedup, clock, _) = setup();
        let key = AlertKey::global();

        assert!(dedup.can_send(&key).await.unwrap());
        clock.advance(Duration::days(365));
        assert!(dedup.can_send(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_cooldown_boundary_is_strict() {
        let (dedup, clock, t0) = setup();
        let key = AlertKey::global();

        dedup.mark_sent(&key).await.unwrap();
        assert!(!dedup.can_send(&key).await.unwrap());

        clock.set(t0 + Duration::hours(6));
        assert!(!dedup.can_send(&key).await.unwrap());

        clock.set(t0 + Duration::hours(6) + Duration::milliseconds(1));
        assert!(dedup.can_send(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let (dedup, _, _) = setup();

        dedup.mark_sent(&AlertKey::cpu()).await.unwrap();

        assert!(!dedup.can_send(&AlertKey::cpu()).await.unwrap());
        assert!(dedup.can_send(&AlertKey::disk("/data")).await.unwrap());
    }

    #[tokio::test]
    async fn test_mark_sent_restarts_cooldown() {
        let (dedup, clock, _) = setup();
        let key = AlertKey::ram();

        dedup.mark_sent(&key).await.unwrap();
        clock.advance(Duration::hours(7));
        assert!(dedup.can_send(&key).await.unwrap());

        dedup.mark_sent(&key).await.unwrap();
        clock.advance(Duration::hours(1));
        assert!(!dedup.can_send(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_try_claim_only_once_per_cooldown() {
        let (dedup, clock, _) = setup();
        let key = AlertKey::global();

        assert!(dedup.try_claim(&key).await.unwrap());
        assert!(!dedup.try_claim(&key).await.unwrap());

        clock.advance(Duration::hours(6) + Duration::seconds(1));
        assert!(dedup.try_claim(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_claims_send_once() {
        let (dedup, _, _) = setup();
        let dedup = Arc::new(dedup);
        let key = AlertKey::global();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let dedup = dedup.clone();
            let key = key.clone();
            handles.push(tokio::spawn(async move { dedup.try_claim(&key).await.unwrap() }));
        }

        let mut claimed = 0;
        for handle in handles {
            if handle.await.unwrap() {
                claimed += 1;
            }
        }
        assert_eq!(claimed, 1);
    }

    #[test]
    fn test_cooldown_from_secs_range() {
        assert_eq!(cooldown_from_secs(DEFAULT_COOLDOWN_SECS), Some(Duration::hours(6)));
        assert_eq!(cooldown_from_secs(0), Some(Duration::zero()));
        assert_eq!(cooldown_from_secs(-1), None);
        assert_eq!(cooldown_from_secs(i64::MAX), None);
    }
}
