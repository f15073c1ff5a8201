use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::alert::AlertFinding;
use crate::snapshot::{DiskUsage, ResourceSnapshot};

/// 告警阈值（百分比，达到即超限）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub cpu: f32,
    pub ram: u32,
    pub disk: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            cpu: 80.0,
            ram: 90,
            disk: 95.0,
        }
    }
}

/// 单次快照评估，纯函数
pub fn evaluate(snapshot: &ResourceSnapshot, thresholds: &Thresholds) -> AlertFinding {
    let cpu_high = snapshot.cpu_percent >= thresholds.cpu;
    let ram_high = snapshot.ram_percent >= thresholds.ram;
    let disk_high: Vec<DiskUsage> = snapshot
        .disks
        .iter()
        .filter(|disk| disk.used_percent >= thresholds.disk)
        .cloned()
        .collect();

    AlertFinding::new(cpu_high, ram_high, disk_high)
}

/// 阈值评估器
pub trait Evaluator: Send {
    fn evaluate(&mut self, snapshot: &ResourceSnapshot) -> AlertFinding;

    fn thresholds(&self) -> &Thresholds;
}

/// 单样本评估器：一次超限即告警
pub struct SingleSampleEvaluator {
    thresholds: Thresholds,
}

impl SingleSampleEvaluator {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }
}

impl Evaluator for SingleSampleEvaluator {
    fn evaluate(&mut self, snapshot: &ResourceSnapshot) -> AlertFinding {
        evaluate(snapshot, &self.thresholds)
    }

    fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }
}

/// 持续超限评估器
///
/// 保留最近 `samples` 次的单样本结论；某项指标（或某个卷）只有在窗口内
/// 每一次都超限时才算超限。窗口未填满前不会告警。
pub struct SustainedEvaluator {
    thresholds: Thresholds,
    samples: usize,
    recent: VecDeque<AlertFinding>,
}

impl SustainedEvaluator {
    pub fn new(thresholds: Thresholds, samples: usize) -> Self {
        let samples = samples.max(1);
        Self {
            thresholds,
            samples,
            recent: VecDeque::with_capacity(samples),
        }
    }
}

impl Evaluator for SustainedEvaluator {
    fn evaluate(&mut self, snapshot: &ResourceSnapshot) -> AlertFinding {
        let current = evaluate(snapshot, &self.thresholds);

        if self.recent.len() == self.samples {
            self.recent.pop_front();
        }
        self.recent.push_back(current.clone());

        if self.recent.len() < self.samples {
            return AlertFinding::default();
        }

        let cpu_high = self.recent.iter().all(|f| f.cpu_high);
        let ram_high = self.recent.iter().all(|f| f.ram_high);
        let disk_high = current
            .disk_high
            .into_iter()
            .filter(|disk| self.recent.iter().all(|f| f.is_disk_high(&disk.name)))
            .collect();

        AlertFinding::new(cpu_high, ram_high, disk_high)
    }

    fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }
}

/// 按窗口大小选择评估器，1 表示单样本
pub fn evaluator_for(thresholds: Thresholds, sustained_samples: usize) -> Box<dyn Evaluator> {
    if sustained_samples <= 1 {
        Box::new(SingleSampleEvaluator::new(thresholds))
    } else {
        Box::new(SustainedEvaluator::new(thresholds, sustained_samples))
    }
}
