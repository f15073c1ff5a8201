use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};

use hostwatch_shutdown::{ShutdownListener, WaitOutcome};

use crate::message::NotificationRequest;
use crate::notifier::{DeliveryReport, Notifier, RecipientOutcome, RetryPolicy};
use crate::transport::{MailSettings, MailTransport, OutgoingMail, SmtpMailTransport};

const CANCELLED: &str = "delivery cancelled by shutdown";

/// 邮件通知器
///
/// 收件人按顺序逐个投递、互不影响；每个收件人最多尝试 `max_attempts` 次，
/// 两次尝试之间固定等待 `backoff`，最后一次失败后不再等待。
pub struct EmailNotifier {
    transport: Arc<dyn MailTransport>,
    policy: RetryPolicy,
    shutdown: Option<Mutex<ShutdownListener>>,
}

impl EmailNotifier {
    pub fn new(transport: Arc<dyn MailTransport>, policy: RetryPolicy) -> Self {
        Self {
            transport,
            policy,
            shutdown: None,
        }
    }

    /// 使用 SMTP 传输
    pub fn smtp(settings: MailSettings, policy: RetryPolicy) -> Self {
        Self::new(Arc::new(SmtpMailTransport::new(settings)), policy)
    }

    /// 收到关闭信号时中断退避等待
    pub fn with_shutdown(mut self, shutdown: ShutdownListener) -> Self {
        self.shutdown = Some(Mutex::new(shutdown));
        self
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    async fn deliver_with_retry(
        &self,
        recipient: &str,
        request: &NotificationRequest,
    ) -> RecipientOutcome {
        let max_attempts = self.policy.max_attempts();
        let mut attempt = 0;
        let mut last_error = String::new();

        while attempt < max_attempts {
            attempt += 1;

            let mail = OutgoingMail {
                recipient: recipient.to_string(),
                subject: request.subject().to_string(),
                html_body: request.body().to_string(),
            };

            match self.transport.deliver(&mail).await {
                Ok(()) => {
                    info!("Email sent successfully to {} (attempt {})", recipient, attempt);
                    return RecipientOutcome::delivered(recipient, attempt);
                }
                Err(e) => {
                    error!(
                        "Failed to send email to {}. Attempt {} of {}: {}",
                        recipient, attempt, max_attempts, e
                    );
                    last_error = e.to_string();
                }
            }

            if attempt < max_attempts && self.backoff().await == WaitOutcome::Shutdown {
                info!("Shutdown requested, abandoning delivery to {}", recipient);
                return RecipientOutcome::failed(recipient, attempt, CANCELLED);
            }
        }

        error!(
            critical = true,
            recipient = %recipient,
            attempts = max_attempts,
            "Email delivery permanently failed after {} attempts for recipient {}: {}",
            max_attempts,
            recipient,
            last_error
        );
        RecipientOutcome::failed(recipient, attempt, last_error)
    }

    async fn backoff(&self) -> WaitOutcome {
        match &self.shutdown {
            Some(listener) => listener.lock().await.sleep(self.policy.backoff()).await,
            None => {
                tokio::time::sleep(self.policy.backoff()).await;
                WaitOutcome::Elapsed
            }
        }
    }

    async fn is_shutdown(&self) -> bool {
        match &self.shutdown {
            Some(listener) => listener.lock().await.is_shutdown(),
            None => false,
        }
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn send(&self, request: &NotificationRequest) -> DeliveryReport {
        info!(
            "Sending resource alert to {} recipients.",
            request.recipients().len()
        );

        let mut report = DeliveryReport::default();
        for recipient in request.recipients() {
            if self.is_shutdown().await {
                report
                    .outcomes
                    .push(RecipientOutcome::failed(recipient.as_str(), 0, CANCELLED));
                continue;
            }

            let outcome = self.deliver_with_retry(recipient, request).await;
            report.outcomes.push(outcome);
        }

        report
    }

    fn name(&self) -> &str {
        "email"
    }
}
