pub mod alert;
pub mod clock;
pub mod dedup;
pub mod evaluator;
pub mod ledger;
pub mod probe;
pub mod snapshot;

pub use alert::{AlertFinding, AlertKey, KeyMode};
pub use clock::{Clock, ManualClock, SystemClock};
pub use dedup::{cooldown_from_secs, AlertDeduplicator, DEFAULT_COOLDOWN_SECS};
pub use evaluator::{
    evaluate, evaluator_for, Evaluator, SingleSampleEvaluator, SustainedEvaluator, Thresholds,
};
pub use ledger::{AlertLedger, FileLedger, LedgerError, MemoryLedger};
pub use probe::{CpuSampler, MetricProbe, ProbeError, SystemProbe};
pub use snapshot::{DiskUsage, ResourceSnapshot};
