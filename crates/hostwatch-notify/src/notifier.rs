use crate::message::NotificationRequest;
use async_trait::async_trait;
use std::time::Duration;

/// 重试策略：固定次数 + 固定间隔
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Duration,
}

impl RetryPolicy {
    /// `max_attempts` 至少为 1
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn backoff(&self) -> Duration {
        self.backoff
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(2))
    }
}

/// 单个收件人的投递结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipientOutcome {
    pub recipient: String,
    pub attempts: u32,
    pub delivered: bool,
    pub last_error: Option<String>,
}

impl RecipientOutcome {
    pub fn delivered(recipient: impl Into<String>, attempts: u32) -> Self {
        Self {
            recipient: recipient.into(),
            attempts,
            delivered: true,
            last_error: None,
        }
    }

    pub fn failed(recipient: impl Into<String>, attempts: u32, error: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
            attempts,
            delivered: false,
            last_error: Some(error.into()),
        }
    }
}

/// 一次通知的投递报告，按收件人顺序排列
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub outcomes: Vec<RecipientOutcome>,
}

impl DeliveryReport {
    pub fn any_delivered(&self) -> bool {
        self.outcomes.iter().any(|o| o.delivered)
    }

    pub fn all_delivered(&self) -> bool {
        !self.outcomes.is_empty() && self.outcomes.iter().all(|o| o.delivered)
    }

    pub fn delivered_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.delivered).count()
    }

    pub fn outcome(&self, recipient: &str) -> Option<&RecipientOutcome> {
        self.outcomes.iter().find(|o| o.recipient == recipient)
    }
}

/// 通知器 trait
///
/// 投递失败不会以错误返回，调用方从报告里读取每个收件人的结果。
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, request: &NotificationRequest) -> DeliveryReport;

    /// 通知器名称
    fn name(&self) -> &str;
}
