//! Human-readable crawl summary

use crate::crawler::CrawlReport;

/// Formats a crawl report for the terminal
pub fn format_summary(report: &CrawlReport) -> String {
    let mut out = String::new();

    out.push_str("=== Crawl Summary ===\n\n");
    out.push_str(&format!("  Session: {}\n", report.session_id));
    out.push_str(&format!("  Target: {}\n", report.target));
    out.push_str(&format!("  Status: {}\n", report.status.as_str()));
    if let Some(error) = report.error() {
        out.push_str(&format!("  Error: {}\n", error));
    }
    out.push_str(&format!("  Final state: {}\n", report.final_state));
    out.push_str(&format!("  Pages scraped: {}\n", report.pages_scraped));
    out.push_str(&format!("  Advances: {}\n", report.advances));
    out.push_str(&format!("  Records: {}\n", report.records.len()));
    out.push_str(&format!(
        "  Duration: {:.2} seconds\n",
        report.duration().num_milliseconds() as f64 / 1000.0
    ));
    if let Some(hash) = &report.config_hash {
        out.push_str(&format!("  Config hash: {}\n", hash));
    }

    if !report.records.is_empty() {
        // Field coverage, in template order
        out.push_str("\nField coverage:\n");
        if let Some(first) = report.records.first() {
            for (name, _) in first.iter() {
                let filled = report
                    .records
                    .iter()
                    .filter(|r| matches!(r.get(name), Some(Some(_))))
                    .count();
                out.push_str(&format!(
                    "  {}: {}/{} ({:.1}%)\n",
                    name,
                    filled,
                    report.records.len(),
                    filled as f64 / report.records.len() as f64 * 100.0
                ));
            }
        }
    }

    out
}

/// Prints a crawl summary to stdout
pub fn print_summary(report: &CrawlReport) {
    print!("{}", format_summary(report));
}
