use std::time::Duration;
use sysinfo::{Disks, System};
use thiserror::Error;
use tracing::debug;

use crate::snapshot::DiskUsage;

/// 两次 CPU 刷新之间 sysinfo 要求的最小间隔
const MIN_CPU_WARMUP: Duration = Duration::from_millis(200);

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("Metric unavailable: {0}")]
    Unavailable(&'static str),
}

/// 指标探针
///
/// `sample_cpu_percent` 会阻塞一个预热间隔，调用方应放到阻塞线程中执行。
pub trait MetricProbe: Send + 'static {
    fn sample_cpu_percent(&mut self) -> Result<f32, ProbeError>;

    fn sample_ram_percent(&mut self) -> Result<u32, ProbeError>;

    fn list_ready_disks(&mut self) -> Result<Vec<DiskUsage>, ProbeError>;
}

/// CPU 采样器
///
/// 持有一个长期存在的 sysinfo 句柄；创建时先读一次作为基线，
/// 之后每次采样等待预热间隔再读取全局使用率。
pub struct CpuSampler {
    system: System,
    warmup: Duration,
}

impl CpuSampler {
    pub fn new(warmup: Duration) -> Self {
        let mut system = System::new();
        system.refresh_cpu_usage();

        Self {
            system,
            warmup: warmup.max(MIN_CPU_WARMUP),
        }
    }

    pub fn warmup(&self) -> Duration {
        self.warmup
    }

    /// 阻塞采样
    pub fn sample(&mut self) -> f32 {
        std::thread::sleep(self.warmup);
        self.system.refresh_cpu_usage();
        self.system.global_cpu_info().cpu_usage()
    }
}

/// 基于 sysinfo 的本机探针
pub struct SystemProbe {
    cpu: CpuSampler,
    memory: System,
    disks: Disks,
}

impl SystemProbe {
    pub fn new(cpu_warmup: Duration) -> Self {
        Self {
            cpu: CpuSampler::new(cpu_warmup),
            memory: System::new(),
            disks: Disks::new_with_refreshed_list(),
        }
    }
}

impl MetricProbe for SystemProbe {
    fn sample_cpu_percent(&mut self) -> Result<f32, ProbeError> {
        let usage = self.cpu.sample();
        if usage.is_finite() {
            Ok(usage)
        } else {
            Err(ProbeError::Unavailable("cpu"))
        }
    }

    fn sample_ram_percent(&mut self) -> Result<u32, ProbeError> {
        self.memory.refresh_memory();

        let total = self.memory.total_memory();
        if total == 0 {
            return Err(ProbeError::Unavailable("memory"));
        }

        let used = self.memory.used_memory().min(total);
        let percent = (used as f64 / total as f64 * 100.0).round() as u32;
        Ok(percent.min(100))
    }

    fn list_ready_disks(&mut self) -> Result<Vec<DiskUsage>, ProbeError> {
        self.disks.refresh_list();

        let disks: Vec<DiskUsage> = self
            .disks
            .list()
            .iter()
            .filter_map(|disk| {
                DiskUsage::from_space(
                    disk.mount_point().display().to_string(),
                    disk.total_space(),
                    disk.available_space(),
                )
            })
            .collect();

        debug!("Listed {} ready disks", disks.len());
        Ok(disks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_sampler_enforces_minimum_warmup() {
        let sampler = CpuSampler::new(Duration::from_millis(10));
        assert_eq!(sampler.warmup(), MIN_CPU_WARMUP);
    }

    #[test]
    fn test_system_probe_reads_host() {
        let mut probe = SystemProbe::new(Duration::from_millis(200));

        let ram = probe.sample_ram_percent().unwrap();
        assert!(ram <= 100);

        let cpu = probe.sample_cpu_percent().unwrap();
        assert!(cpu >= 0.0);

        for disk in probe.list_ready_disks().unwrap() {
            assert!(disk.used_percent >= 0.0 && disk.used_percent <= 100.0);
            assert!(disk.free_gib >= 0.0);
        }
    }
}
