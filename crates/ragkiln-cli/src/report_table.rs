//! Renders a [`RunReport`] as a table.

use comfy_table::{Cell, Table};
use ragkiln_core::RunReport;

pub fn render(report: &RunReport) -> String {
    let mut summary = Table::new();
    summary.set_header(vec!["metric", "value"]);
    summary.add_row(vec!["pages_crawled", &report.pages_crawled.to_string()]);
    summary.add_row(vec!["topics_extracted", &report.topics_extracted.to_string()]);
    summary.add_row(vec!["documents_created", &report.documents_created.to_string()]);
    summary.add_row(vec!["documents_merged", &report.documents_merged.to_string()]);
    summary.add_row(vec!["decisions.create", &report.decisions.create.to_string()]);
    summary.add_row(vec!["decisions.merge", &report.decisions.merge.to_string()]);
    summary.add_row(vec!["decisions.verify", &report.decisions.verify.to_string()]);
    summary.add_row(vec!["exit_code", &report.exit_code().to_string()]);

    let mut stages = Table::new();
    stages.set_header(vec!["stage", "status"]);
    for (stage, status) in &report.stage_statuses {
        stages.add_row(vec![Cell::new(stage), Cell::new(format!("{status:?}"))]);
    }

    let mut out = format!("{summary}\n\n{stages}");

    if !report.errors.is_empty() {
        let mut errors = Table::new();
        errors.set_header(vec!["stage", "kind", "topic", "message"]);
        for error in &report.errors {
            errors.add_row(vec![
                error.stage.as_str(),
                error.kind.as_str(),
                error.topic.as_deref().unwrap_or("-"),
                error.message.as_str(),
            ]);
        }
        out.push_str("\n\n");
        out.push_str(&errors.to_string());
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragkiln_core::StageStatus;

    #[test]
    fn renders_a_report_with_no_errors() {
        let mut report = RunReport::empty();
        report.pages_crawled = 2;
        report
            .stage_statuses
            .insert("crawl".to_string(), StageStatus::Success);

        let rendered = render(&report);
        assert!(rendered.contains("pages_crawled"));
        assert!(rendered.contains("crawl"));
        assert!(!rendered.to_lowercase().contains("message"));
    }

    #[test]
    fn renders_errors_table_when_present() {
        let mut report = RunReport::empty();
        report
            .errors
            .push(ragkiln_core::RunError::new("persist", "fatal", "boom").with_topic("Alpha"));

        let rendered = render(&report);
        assert!(rendered.contains("boom"));
        assert!(rendered.contains("Alpha"));
    }
}
