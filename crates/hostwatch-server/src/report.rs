use serde::Serialize;
use tera::{Context, Tera};
use thiserror::Error;

use hostwatch_metrics::{AlertFinding, ResourceSnapshot, Thresholds};

const REPORT_TEMPLATE: &str = "report.html";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Report template error: {0}")]
    Template(#[from] tera::Error),
}

/// 主机信息，写在报告抬头
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostMetadata {
    pub host_name: String,
    pub user_name: String,
    pub ip_address: String,
}

impl HostMetadata {
    /// 读取当前主机名、用户和本机 IPv4，取不到的项填 "Unknown"
    pub fn collect() -> Self {
        let host_name = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "Unknown".to_string());

        let user_name = std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "Unknown".to_string());

        let ip_address = local_ip_address::local_ip()
            .map(|ip| ip.to_string())
            .unwrap_or_else(|_| "Unknown".to_string());

        Self {
            host_name,
            user_name,
            ip_address,
        }
    }
}

/// 格式化后的报告
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedReport {
    pub subject: String,
    pub body: String,
}

/// 报告格式化器
pub trait ReportFormatter: Send + Sync {
    fn format(
        &self,
        snapshot: &ResourceSnapshot,
        finding: &AlertFinding,
        thresholds: &Thresholds,
        host: &HostMetadata,
    ) -> Result<FormattedReport, ReportError>;
}

/// 表格中的一行
#[derive(Debug, Serialize)]
struct ReportRow {
    resource: String,
    usage: String,
    high: bool,
    status: &'static str,
}

impl ReportRow {
    fn new(resource: String, usage: String, high: bool, high_label: &'static str) -> Self {
        Self {
            resource,
            usage,
            high,
            status: if high { high_label } else { "OK" },
        }
    }
}

/// HTML 邮件报告，模板见 `templates/report.html`
pub struct HtmlReportFormatter {
    subject: String,
    tera: Tera,
}

impl HtmlReportFormatter {
    pub fn new(subject: impl Into<String>) -> Result<Self, ReportError> {
        let mut tera = Tera::default();
        tera.add_raw_template(REPORT_TEMPLATE, include_str!("../templates/report.html"))?;

        Ok(Self {
            subject: subject.into(),
            tera,
        })
    }

    fn rows(snapshot: &ResourceSnapshot, thresholds: &Thresholds) -> Vec<ReportRow> {
        let mut rows = vec![
            ReportRow::new(
                "CPU".to_string(),
                format!("{:.1}%", snapshot.cpu_percent),
                snapshot.cpu_percent >= thresholds.cpu,
                "HIGH",
            ),
            ReportRow::new(
                "RAM".to_string(),
                format!("{}%", snapshot.ram_percent),
                snapshot.ram_percent >= thresholds.ram,
                "HIGH",
            ),
        ];

        rows.extend(snapshot.disks.iter().map(|disk| {
            ReportRow::new(
                format!("Disk {}", disk.name),
                format!("{:.1}% ({:.2} GB Free)", disk.used_percent, disk.free_gib),
                disk.used_percent >= thresholds.disk,
                "LOW SPACE",
            )
        }));

        rows
    }
}

impl ReportFormatter for HtmlReportFormatter {
    fn format(
        &self,
        snapshot: &ResourceSnapshot,
        _finding: &AlertFinding,
        thresholds: &Thresholds,
        host: &HostMetadata,
    ) -> Result<FormattedReport, ReportError> {
        let mut context = Context::new();
        let timestamp = snapshot.captured_at.format("%Y-%m-%d %H:%M:%S").to_string();
        context.insert("timestamp", &timestamp);
        context.insert("host", host);
        context.insert("rows", &Self::rows(snapshot, thresholds));

        Ok(FormattedReport {
            subject: self.subject.clone(),
            body: self.tera.render(REPORT_TEMPLATE, &context)?,
        })
    }
}
