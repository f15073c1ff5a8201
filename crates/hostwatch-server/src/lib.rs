pub mod app;
pub mod report;
pub mod scheduler;
pub mod worker;

pub use app::build_monitor;
pub use report::{FormattedReport, HostMetadata, HtmlReportFormatter, ReportFormatter};
pub use scheduler::{delay_until_next_run, ScheduledCheck, Scheduler};
pub use worker::{CheckOutcome, ResourceMonitor};
