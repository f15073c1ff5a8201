use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;

use hostwatch_config::ConfigLoader;
use hostwatch_logging::init_logging;
use hostwatch_server::{build_monitor, Scheduler};
use hostwatch_shutdown::SignalHandler;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file path
    #[arg(short, long, default_value = "config/hostwatch.toml")]
    config: PathBuf,

    /// Run a single resource check and exit
    #[arg(long)]
    once: bool,

    /// Validate the configuration, print it with secrets hidden and exit
    #[arg(long)]
    check_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let loader = ConfigLoader::new(&args.config);
    let config = loader
        .load()
        .with_context(|| format!("Failed to load config {}", loader.config_path().display()))?;

    if args.check_config {
        println!("{}", config.to_redacted_toml()?);
        return Ok(());
    }

    init_logging(&config.logging)?;
    tracing::info!("Starting hostwatch with config: {}", loader.config_path().display());

    let (signals, shutdown) = SignalHandler::new();
    let mut monitor = build_monitor(&config, shutdown.clone()).await?;

    if args.once {
        let outcome = monitor.run_check(&mut shutdown.clone()).await?;
        tracing::info!(?outcome, "Single check finished");
        return Ok(());
    }

    // 信号任务持有克隆；安装失败时 `signals` 仍存活，调度不会被误判为关闭
    let signal_task = {
        let signals = signals.clone();
        tokio::spawn(async move {
            if let Err(e) = signals.wait_for_system_signal().await {
                tracing::error!("Failed to install signal handlers: {}", e);
            }
        })
    };

    let mut scheduler = Scheduler::new(
        config.schedule.target_hour_utc,
        config.schedule.pause(),
        shutdown,
    );
    scheduler.run(&mut monitor).await;

    signal_task.abort();
    drop(signals);
    tracing::info!("Shutdown complete");
    Ok(())
}
