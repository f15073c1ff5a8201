use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::watch;
use tracing::info;

/// 关闭信号类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// SIGTERM - 优雅关闭
    Term,

    /// SIGINT - Ctrl+C
    Interrupt,

    /// 手动触发
    Manual,
}

/// 可取消等待的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// 等待时间走完
    Elapsed,
    /// 等待期间收到关闭信号
    Shutdown,
}

/// 信号处理器
///
/// 第一个到达的信号生效，之后的信号被忽略。
#[derive(Clone)]
pub struct SignalHandler {
    shutdown_tx: Arc<watch::Sender<Option<ShutdownSignal>>>,
}

impl SignalHandler {
    pub fn new() -> (Self, ShutdownListener) {
        let (tx, rx) = watch::channel(None);
        (
            Self {
                shutdown_tx: Arc::new(tx),
            },
            ShutdownListener { rx },
        )
    }

    /// 等待系统信号（Unix 版本）
    #[cfg(unix)]
    pub async fn wait_for_system_signal(&self) -> std::io::Result<ShutdownSignal> {
        use signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        let received = tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
                ShutdownSignal::Term
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
                ShutdownSignal::Interrupt
            }
        };

        self.trigger(received);
        Ok(received)
    }

    /// 等待系统信号（Windows 版本）
    #[cfg(not(unix))]
    pub async fn wait_for_system_signal(&self) -> std::io::Result<ShutdownSignal> {
        signal::ctrl_c().await?;
        info!("Received Ctrl+C");
        self.trigger(ShutdownSignal::Interrupt);
        Ok(ShutdownSignal::Interrupt)
    }

    /// 手动触发关闭
    pub fn trigger_shutdown(&self) {
        info!("Manual shutdown triggered");
        self.trigger(ShutdownSignal::Manual);
    }

    /// 订阅关闭信号
    pub fn subscribe(&self) -> ShutdownListener {
        ShutdownListener {
            rx: self.shutdown_tx.subscribe(),
        }
    }

    fn trigger(&self, received: ShutdownSignal) {
        self.shutdown_tx.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(received);
                true
            } else {
                false
            }
        });
    }
}

impl Default for SignalHandler {
    fn default() -> Self {
        Self::new().0
    }
}

/// 关闭信号监听端
///
/// 所有挂起点（定时等待、退避、预热采样）都通过它感知关闭。
/// 订阅晚于信号发出时同样能观察到关闭状态。
#[derive(Clone)]
pub struct ShutdownListener {
    rx: watch::Receiver<Option<ShutdownSignal>>,
}

impl ShutdownListener {
    /// 是否已经收到关闭信号
    pub fn is_shutdown(&self) -> bool {
        self.rx.borrow().is_some()
    }

    /// 等待关闭信号
    ///
    /// 处理器全部释放后再也不会有人发出信号，此时永远挂起，
    /// 而不是把通道关闭误当成关闭请求。
    pub async fn recv(&mut self) -> ShutdownSignal {
        let received = self
            .rx
            .wait_for(Option::is_some)
            .await
            .map(|current| (*current).unwrap_or(ShutdownSignal::Manual));
        match received {
            Ok(signal) => signal,
            Err(_) => std::future::pending().await,
        }
    }

    /// 可取消的睡眠
    pub async fn sleep(&mut self, duration: Duration) -> WaitOutcome {
        if self.is_shutdown() {
            return WaitOutcome::Shutdown;
        }

        tokio::select! {
            biased;
            _ = self.recv() => WaitOutcome::Shutdown,
            _ = tokio::time::sleep(duration) => WaitOutcome::Elapsed,
        }
    }

    /// 运行 future，收到关闭信号时放弃等待并返回 None
    pub async fn run_until_shutdown<F>(&mut self, fut: F) -> Option<F::Output>
    where
        F: Future,
    {
        if self.is_shutdown() {
            return None;
        }

        tokio::select! {
            biased;
            _ = self.recv() => None,
            output = fut => Some(output),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_signal_handler_creation() {
        let (handler, mut rx) = SignalHandler::new();

        handler.trigger_shutdown();

        assert_eq!(rx.recv().await, ShutdownSignal::Manual);
        assert!(rx.is_shutdown());
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let (handler, _rx1) = SignalHandler::new();
        let mut rx2 = handler.subscribe();
        let mut rx3 = handler.subscribe();

        handler.trigger_shutdown();

        assert_eq!(rx2.recv().await, ShutdownSignal::Manual);
        assert_eq!(rx3.recv().await, ShutdownSignal::Manual);
    }

    #[tokio::test]
    async fn test_late_subscriber_sees_shutdown() {
        let (handler, _rx) = SignalHandler::new();
        handler.trigger_shutdown();

        let late = handler.subscribe();
        assert!(late.is_shutdown());
    }

    #[tokio::test]
    async fn test_first_signal_wins() {
        let (handler, mut rx) = SignalHandler::new();
        handler.trigger(ShutdownSignal::Term);
        handler.trigger(ShutdownSignal::Interrupt);

        assert_eq!(rx.recv().await, ShutdownSignal::Term);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_elapses_without_signal() {
        let (_handler, mut rx) = SignalHandler::new();

        let outcome = rx.sleep(Duration::from_secs(3600)).await;
        assert_eq!(outcome, WaitOutcome::Elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_interrupted_by_shutdown() {
        let (handler, mut rx) = SignalHandler::new();

        let trigger = handler.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.trigger_shutdown();
        });

        let start = tokio::time::Instant::now();
        let outcome = rx.sleep(Duration::from_secs(3600)).await;

        assert_eq!(outcome, WaitOutcome::Shutdown);
        assert!(start.elapsed() < Duration::from_secs(3600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_handler_is_not_a_shutdown() {
        let (handler, mut rx) = SignalHandler::new();
        drop(handler);

        let outcome = rx.sleep(Duration::from_secs(3600)).await;
        assert_eq!(outcome, WaitOutcome::Elapsed);
        assert!(!rx.is_shutdown());
        assert_eq!(rx.run_until_shutdown(async { 7 }).await, Some(7));
    }

    #[tokio::test]
    async fn test_run_until_shutdown() {
        let (handler, mut rx) = SignalHandler::new();

        assert_eq!(rx.run_until_shutdown(async { 42 }).await, Some(42));

        handler.trigger_shutdown();
        assert_eq!(rx.run_until_shutdown(async { 42 }).await, None);
    }
}
