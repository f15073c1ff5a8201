use anyhow::Context;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

use hostwatch_metrics::{
    AlertDeduplicator, AlertKey, Clock, Evaluator, KeyMode, MetricProbe, ResourceSnapshot,
    SystemClock,
};
use hostwatch_notify::{NotificationRequest, Notifier};
use hostwatch_shutdown::ShutdownListener;

use crate::report::{HostMetadata, ReportFormatter};
use crate::scheduler::ScheduledCheck;

/// 共享的探针，CPU 采样在阻塞线程里持有它
pub type SharedProbe = Arc<Mutex<Box<dyn MetricProbe>>>;

/// 主机信息来源
pub type HostSource = Box<dyn Fn() -> HostMetadata + Send + Sync>;

/// 一次检查的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// 没有指标超限
    Healthy,
    /// 超限，但所有告警键都在冷却期内
    Suppressed,
    /// 超限，但没有配置收件人
    NoRecipients { recorded: bool },
    /// 已发送通知
    Notified {
        keys: Vec<AlertKey>,
        delivered: usize,
        recipients: usize,
        recorded: bool,
    },
    /// 采样期间收到关闭信号
    Cancelled,
}

/// 资源监控：采样、判定、去重、通知
pub struct ResourceMonitor {
    probe: SharedProbe,
    evaluator: Box<dyn Evaluator>,
    deduplicator: AlertDeduplicator,
    notifier: Arc<dyn Notifier>,
    formatter: Box<dyn ReportFormatter>,
    host: HostSource,
    clock: Arc<dyn Clock>,
    recipients: Vec<String>,
    key_mode: KeyMode,
    require_delivery: bool,
}

impl ResourceMonitor {
    pub fn new(
        probe: Box<dyn MetricProbe>,
        evaluator: Box<dyn Evaluator>,
        deduplicator: AlertDeduplicator,
        notifier: Arc<dyn Notifier>,
        formatter: Box<dyn ReportFormatter>,
    ) -> Self {
        Self {
            probe: Arc::new(Mutex::new(probe)),
            evaluator,
            deduplicator,
            notifier,
            formatter,
            host: Box::new(HostMetadata::collect),
            clock: Arc::new(SystemClock),
            recipients: Vec::new(),
            key_mode: KeyMode::Global,
            require_delivery: false,
        }
    }

    pub fn with_recipients(mut self, recipients: Vec<String>) -> Self {
        self.recipients = recipients;
        self
    }

    pub fn with_key_mode(mut self, key_mode: KeyMode) -> Self {
        self.key_mode = key_mode;
        self
    }

    pub fn with_require_delivery(mut self, require_delivery: bool) -> Self {
        self.require_delivery = require_delivery;
        self
    }

    /// 快照时间戳使用的时钟
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_host_source<F>(mut self, host: F) -> Self
    where
        F: Fn() -> HostMetadata + Send + Sync + 'static,
    {
        self.host = Box::new(host);
        self
    }

    /// 采集一次快照；关闭信号打断 CPU 采样时返回 None
    async fn capture(
        probe: &SharedProbe,
        clock: &dyn Clock,
        shutdown: &mut ShutdownListener,
    ) -> anyhow::Result<Option<ResourceSnapshot>> {
        let (ram_percent, disks) = {
            let mut probe = probe.lock().await;
            (probe.sample_ram_percent()?, probe.list_ready_disks()?)
        };

        let probe = probe.clone();
        let cpu_task =
            tokio::task::spawn_blocking(move || probe.blocking_lock().sample_cpu_percent());

        let cpu_percent = match shutdown.run_until_shutdown(cpu_task).await {
            Some(joined) => joined.context("CPU sampling task failed")??,
            None => return Ok(None),
        };

        Ok(Some(ResourceSnapshot::new(cpu_percent, ram_percent, disks, clock.now())))
    }

    /// 执行一次完整检查
    pub async fn run_check(
        &mut self,
        shutdown: &mut ShutdownListener,
    ) -> anyhow::Result<CheckOutcome> {
        tracing::info!("Checking system resources...");

        let snapshot = match Self::capture(&self.probe, self.clock.as_ref(), shutdown).await? {
            Some(snapshot) => snapshot,
            None => {
                tracing::info!("Shutdown requested during CPU sampling, check abandoned");
                return Ok(CheckOutcome::Cancelled);
            }
        };

        tracing::info!(
            cpu = snapshot.cpu_percent,
            ram = snapshot.ram_percent,
            disks = snapshot.disks.len(),
            "Resource snapshot captured"
        );

        let finding = self.evaluator.evaluate(&snapshot);
        if !finding.triggered {
            tracing::info!("All resources within thresholds");
            return Ok(CheckOutcome::Healthy);
        }

        let mut eligible = Vec::new();
        for key in finding.alert_keys(self.key_mode) {
            if self.deduplicator.can_send(&key).await? {
                eligible.push(key);
            } else {
                tracing::debug!(key = %key, "Alert key still in cooldown");
            }
        }

        if eligible.is_empty() {
            tracing::info!("Resource alert suppressed: cooldown period active");
            return Ok(CheckOutcome::Suppressed);
        }

        let host = (self.host)();
        let report = self
            .formatter
            .format(&snapshot, &finding, self.evaluator.thresholds(), &host)
            .context("Failed to format resource report")?;

        let recipients = self.recipients.clone();
        let request = match NotificationRequest::new(recipients, report.subject, report.body) {
            Some(request) => request,
            None => {
                tracing::warn!("No email recipients found in configuration.");
                let recorded = !self.require_delivery;
                if recorded {
                    mark_all(&self.deduplicator, &eligible).await?;
                }
                return Ok(CheckOutcome::NoRecipients { recorded });
            }
        };

        tracing::warn!(
            keys = eligible.len(),
            notifier = self.notifier.name(),
            "Resource thresholds exceeded, sending alert"
        );
        let delivery = self.notifier.send(&request).await;

        let recorded = !self.require_delivery || delivery.any_delivered();
        if recorded {
            mark_all(&self.deduplicator, &eligible).await?;
        } else {
            tracing::warn!("No recipient confirmed delivery, cooldown not started");
        }

        Ok(CheckOutcome::Notified {
            keys: eligible,
            delivered: delivery.delivered_count(),
            recipients: request.recipients().len(),
            recorded,
        })
    }
}

async fn mark_all(deduplicator: &AlertDeduplicator, keys: &[AlertKey]) -> anyhow::Result<()> {
    for key in keys {
        deduplicator.mark_sent(key).await?;
    }
    Ok(())
}

#[async_trait]
impl ScheduledCheck for ResourceMonitor {
    async fn check(&mut self, shutdown: &mut ShutdownListener) -> anyhow::Result<()> {
        let outcome = self.run_check(shutdown).await?;
        tracing::debug!(?outcome, "Resource check finished");
        Ok(())
    }
}
