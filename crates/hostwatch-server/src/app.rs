use anyhow::Context;
use std::sync::Arc;

use hostwatch_config::HostwatchConfig;
use hostwatch_metrics::{
    evaluator_for, AlertDeduplicator, AlertLedger, FileLedger, MemoryLedger, SystemProbe,
};
use hostwatch_notify::EmailNotifier;
use hostwatch_shutdown::ShutdownListener;

use crate::report::HtmlReportFormatter;
use crate::worker::ResourceMonitor;

/// 按配置组装资源监控
pub async fn build_monitor(
    config: &HostwatchConfig,
    shutdown: ShutdownListener,
) -> anyhow::Result<ResourceMonitor> {
    let ledger: Arc<dyn AlertLedger> = match &config.alerts.ledger_path {
        Some(path) => {
            let ledger = FileLedger::open(path)
                .await
                .with_context(|| format!("Failed to open alert ledger {}", path.display()))?;
            tracing::info!("Alert ledger persisted at {}", ledger.path().display());
            Arc::new(ledger)
        }
        None => Arc::new(MemoryLedger::new()),
    };

    let deduplicator = AlertDeduplicator::new(ledger, config.alerts.cooldown()?);

    let recipients = config.notify.recipient_list();
    if recipients.is_empty() {
        tracing::warn!("No email recipients found in configuration.");
    }

    let notifier = EmailNotifier::smtp(config.mail.clone(), config.notify.retry_policy())
        .with_shutdown(shutdown);
    let policy = notifier.policy();
    tracing::info!(
        max_attempts = policy.max_attempts(),
        backoff_secs = policy.backoff().as_secs(),
        "Email retry policy configured"
    );

    let formatter = HtmlReportFormatter::new(config.alerts.subject.clone())?;

    let monitor = ResourceMonitor::new(
        Box::new(SystemProbe::new(config.schedule.cpu_warmup())),
        evaluator_for(config.thresholds.thresholds(), config.thresholds.sustained_samples),
        deduplicator,
        Arc::new(notifier),
        Box::new(formatter),
    )
    .with_recipients(recipients)
    .with_key_mode(config.alerts.key_mode)
    .with_require_delivery(config.alerts.require_delivery);

    Ok(monitor)
}
