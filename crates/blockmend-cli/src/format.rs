//! Run summary output

use anyhow::Result;
use blockmend_storage::{Outcome, RunSummary};

use crate::config::OutputFormat;

pub fn render_summary(summary: &RunSummary, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(summary)?),
        OutputFormat::Text => Ok(render_text(summary)),
    }
}

fn render_text(summary: &RunSummary) -> String {
    let mut lines = vec![summary.to_string()];
    for report in summary.failures() {
        if let Outcome::Failed { error } = &report.outcome {
            lines.push(format!("failed {}: {}", report.block, error));
        }
    }
    if summary.was_interrupted() {
        lines.push(format!(
            "interrupted: {} block(s) not processed",
            summary.counts.cancelled
        ));
    }
    lines.join("\n")
}
