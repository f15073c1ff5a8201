use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const BYTES_PER_GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// 单个卷的使用情况
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskUsage {
    pub name: String,
    pub used_percent: f64,
    pub free_gib: f64,
}

impl DiskUsage {
    pub fn new(name: impl Into<String>, used_percent: f64, free_gib: f64) -> Self {
        Self {
            name: name.into(),
            used_percent,
            free_gib,
        }
    }

    /// 由容量换算使用率，总容量为 0 的卷视为未就绪
    pub fn from_space(
        name: impl Into<String>,
        total_bytes: u64,
        available_bytes: u64,
    ) -> Option<Self> {
        if total_bytes == 0 {
            return None;
        }

        let available = available_bytes.min(total_bytes);
        let used_percent = (total_bytes - available) as f64 / total_bytes as f64 * 100.0;

        Some(Self {
            name: name.into(),
            used_percent,
            free_gib: available as f64 / BYTES_PER_GIB,
        })
    }
}

/// 某一时刻的资源快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    pub cpu_percent: f32,
    pub ram_percent: u32,
    pub disks: Vec<DiskUsage>,
    pub captured_at: DateTime<Utc>,
}

impl ResourceSnapshot {
    /// 采样时刻由调用方的时钟给出
    pub fn new(
        cpu_percent: f32,
        ram_percent: u32,
        disks: Vec<DiskUsage>,
        captured_at: DateTime<Utc>,
    ) -> Self {
        Self {
            cpu_percent,
            ram_percent: ram_percent.min(100),
            disks,
            captured_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disk_usage_from_space() {
        let gib = 1024 * 1024 * 1024;
        let disk = DiskUsage::from_space("/", 100 * gib, 25 * gib).unwrap();

        assert_eq!(disk.name, "/");
        assert!((disk.used_percent - 75.0).abs() < 1e-9);
        assert!((disk.free_gib - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_sized_disk_is_not_ready() {
        assert!(DiskUsage::from_space("/proc", 0, 0).is_none());
    }

    #[test]
    fn test_ram_percent_is_clamped() {
        let snapshot = ResourceSnapshot::new(10.0, 140, Vec::new(), Utc::now());
        assert_eq!(snapshot.ram_percent, 100);
    }
}
