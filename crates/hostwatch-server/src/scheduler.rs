use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;

use hostwatch_metrics::{Clock, SystemClock};
use hostwatch_shutdown::{ShutdownListener, WaitOutcome};

/// 由调度器周期执行的检查
#[async_trait]
pub trait ScheduledCheck: Send {
    async fn check(&mut self, shutdown: &mut ShutdownListener) -> anyhow::Result<()>;
}

/// 距离下一个 `target_hour`:00 UTC 的时长
///
/// 已到达或越过今天的目标时刻时，顺延到明天。
pub fn delay_until_next_run(now: DateTime<Utc>, target_hour: u32) -> Duration {
    let Some(today) = now.date_naive().and_hms_opt(target_hour.min(23), 0, 0) else {
        return Duration::ZERO;
    };

    let mut next = Utc.from_utc_datetime(&today);
    if now >= next {
        next += chrono::Duration::days(1);
    }

    (next - now).to_std().unwrap_or(Duration::ZERO)
}

/// 每日调度器
///
/// 第一次检查立即执行，之后每天在目标整点执行；每次检查后固定停顿一段时间。
pub struct Scheduler {
    target_hour: u32,
    pause: Duration,
    clock: Arc<dyn Clock>,
    shutdown: ShutdownListener,
}

impl Scheduler {
    pub fn new(target_hour: u32, pause: Duration, shutdown: ShutdownListener) -> Self {
        Self {
            target_hour,
            pause,
            clock: Arc::new(SystemClock),
            shutdown,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// 运行直到收到关闭信号，返回执行过的检查次数
    pub async fn run<C>(&mut self, check: &mut C) -> usize
    where
        C: ScheduledCheck + ?Sized,
    {
        tracing::info!("Host resource monitor started.");

        let mut completed = 0usize;
        let mut first_run = true;

        loop {
            if self.shutdown.is_shutdown() {
                break;
            }

            if first_run {
                tracing::info!("Initial run: performing first resource check now...");
                first_run = false;
            } else {
                let delay = delay_until_next_run(self.clock.now(), self.target_hour);
                tracing::info!(
                    "Next resource check at {:02}:00 UTC, waiting {}s",
                    self.target_hour,
                    delay.as_secs()
                );
                if self.shutdown.sleep(delay).await == WaitOutcome::Shutdown {
                    break;
                }
            }

            if let Err(e) = check.check(&mut self.shutdown).await {
                tracing::error!("Resource check failed: {:#}", e);
            }
            completed += 1;

            if self.shutdown.sleep(self.pause).await == WaitOutcome::Shutdown {
                break;
            }
        }

        tracing::info!("Host resource monitor stopped after {} checks", completed);
        completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostwatch_metrics::ManualClock;
    use hostwatch_shutdown::SignalHandler;
    use tokio::time::Instant;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, h, m, 0).unwrap()
    }

    #[test]
    fn test_delay_before_target_hour() {
        assert_eq!(delay_until_next_run(at(6, 0), 7), Duration::from_secs(3600));
        assert_eq!(delay_until_next_run(at(6, 30), 7), Duration::from_secs(1800));
    }

    #[test]
    fn test_delay_rolls_to_next_day() {
        assert_eq!(delay_until_next_run(at(8, 0), 7), Duration::from_secs(23 * 3600));
        assert_eq!(delay_until_next_run(at(7, 0), 7), Duration::from_secs(24 * 3600));
    }

    #[test]
    fn test_delay_across_month_end() {
        let now = Utc.with_ymd_and_hms(2024, 2, 29, 23, 0, 0).unwrap();
        assert_eq!(delay_until_next_run(now, 7), Duration::from_secs(8 * 3600));
    }

    /// 记录每次执行时刻，执行到指定次数后触发关闭
    struct RecordingCheck {
        runs: Vec<Instant>,
        stop_after: usize,
        fail: bool,
        handler: SignalHandler,
    }

    #[async_trait]
    impl ScheduledCheck for RecordingCheck {
        async fn check(&mut self, _shutdown: &mut ShutdownListener) -> anyhow::Result<()> {
            self.runs.push(Instant::now());
            if self.runs.len() >= self.stop_after {
                self.handler.trigger_shutdown();
            }
            if self.fail {
                anyhow::bail!("probe exploded");
            }
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_run_immediate_then_daily() {
        let (handler, listener) = SignalHandler::new();
        let clock = Arc::new(ManualClock::new(at(6, 0)));
        let mut scheduler = Scheduler::new(7, Duration::from_secs(5), listener).with_clock(clock);

        let start = Instant::now();
        let mut check = RecordingCheck {
            runs: Vec::new(),
            stop_after: 3,
            fail: false,
            handler,
        };

        let completed = scheduler.run(&mut check).await;

        assert_eq!(completed, 3);
        assert_eq!(check.runs[0] - start, Duration::ZERO);
        let gap = Duration::from_secs(5) + Duration::from_secs(3600);
        assert_eq!(check.runs[1] - check.runs[0], gap);
        assert_eq!(check.runs[2] - check.runs[1], gap);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_check_does_not_stop_loop() {
        let (handler, listener) = SignalHandler::new();
        let clock = Arc::new(ManualClock::new(at(6, 0)));
        let mut scheduler = Scheduler::new(7, Duration::from_secs(5), listener).with_clock(clock);

        let mut check = RecordingCheck {
            runs: Vec::new(),
            stop_after: 2,
            fail: true,
            handler,
        };

        assert_eq!(scheduler.run(&mut check).await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_during_wait() {
        let (handler, listener) = SignalHandler::new();
        let clock = Arc::new(ManualClock::new(at(8, 0)));
        let mut scheduler = Scheduler::new(7, Duration::from_secs(5), listener).with_clock(clock);

        let mut check = RecordingCheck {
            runs: Vec::new(),
            stop_after: usize::MAX,
            fail: false,
            handler: handler.clone(),
        };

        let trigger = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(60)).await;
            handler.trigger_shutdown();
        });

        let start = Instant::now();
        assert_eq!(scheduler.run(&mut check).await, 1);
        assert_eq!(Instant::now() - start, Duration::from_secs(60));
        trigger.await.unwrap();
    }

    #[tokio::test]
    async fn test_no_check_after_early_shutdown() {
        let (handler, listener) = SignalHandler::new();
        handler.trigger_shutdown();
        let mut scheduler = Scheduler::new(7, Duration::from_secs(5), listener);

        let mut check = RecordingCheck {
            runs: Vec::new(),
            stop_after: 1,
            fail: false,
            handler,
        };

        assert_eq!(scheduler.run(&mut check).await, 0);
        assert!(check.runs.is_empty());
    }
}
