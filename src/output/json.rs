//! JSON export of crawl reports

use crate::crawler::{CrawlReport, DriverState};
use crate::extract::Record;
use crate::messaging::TargetId;
use crate::output::OutputResult;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use uuid::Uuid;

/// Serializable view of a `CrawlReport`
#[derive(Debug, Serialize)]
pub struct ReportView<'a> {
    pub session_id: Uuid,
    pub target: TargetId,
    pub status: &'static str,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub final_state: DriverState,
    pub pages_scraped: usize,
    pub advances: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: i64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_hash: Option<&'a str>,

    pub records: &'a [Record],
}

impl<'a> From<&'a CrawlReport> for ReportView<'a> {
    fn from(report: &'a CrawlReport) -> Self {
        Self {
            session_id: report.session_id,
            target: report.target,
            status: report.status.as_str(),
            error: report.error().map(|e| e.to_string()),
            final_state: report.final_state,
            pages_scraped: report.pages_scraped,
            advances: report.advances,
            started_at: report.started_at,
            finished_at: report.finished_at,
            duration_ms: report.duration().num_milliseconds(),
            config_hash: report.config_hash.as_deref(),
            records: &report.records,
        }
    }
}

/// Renders a report as pretty-printed JSON
pub fn report_to_json(report: &CrawlReport) -> OutputResult<String> {
    Ok(serde_json::to_string_pretty(&ReportView::from(report))?)
}

/// Writes a report as JSON to `output_path`
pub fn write_report_json(report: &CrawlReport, output_path: &Path) -> OutputResult<()> {
    let mut writer = BufWriter::new(File::create(output_path)?);
    serde_json::to_writer_pretty(&mut writer, &ReportView::from(report))?;
    writer.write_all(b"\n")?;
    writer.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::CrawlStatus;
    use crate::CrawlError;

    fn report(status: CrawlStatus) -> CrawlReport {
        let started_at = Utc::now();
        let mut record = Record::new();
        record.insert("title", Some("A".to_string()));
        record.insert("href", None);

        CrawlReport {
            session_id: Uuid::new_v4(),
            target: TargetId(1),
            status,
            records: vec![record],
            pages_scraped: 1,
            advances: 0,
            final_state: DriverState::Done,
            started_at,
            finished_at: started_at + chrono::Duration::milliseconds(250),
            config_hash: Some("abc123".to_string()),
        }
    }

    #[test]
    fn test_completed_report_json() {
        let json = report_to_json(&report(CrawlStatus::Completed)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["status"], "completed");
        assert_eq!(value["final_state"], "done");
        assert_eq!(value["target"], 1);
        assert_eq!(value["duration_ms"], 250);
        assert_eq!(value["config_hash"], "abc123");
        assert!(value.get("error").is_none());
        assert_eq!(value["records"][0]["title"], "A");
        assert!(value["records"][0]["href"].is_null());
    }

    #[test]
    fn test_failed_report_has_error() {
        let failed = report(CrawlStatus::Failed(CrawlError::AdvanceFailed(
            "target-1 closed".to_string(),
        )));
        let json = report_to_json(&failed).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["status"], "failed");
        assert_eq!(value["error"], "Advance failed: target-1 closed");
        assert_eq!(value["records"].as_array().map(|r| r.len()), Some(1));
    }

    #[test]
    fn test_write_report_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");

        write_report_json(&report(CrawlStatus::Completed), &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.ends_with('\n'));
        assert!(content.contains("\"session_id\""));
    }
}
