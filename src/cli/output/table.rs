//! Table output formatting for CLI commands
//!
//! Renders run summaries with comfy-table; status words are styled with
//! console, which honours `NO_COLOR` and non-terminal output.

use comfy_table::{presets, Attribute, Cell, CellAlignment, ContentArrangement, Table};
use console::{style, StyledObject};

use super::truncate;
use crate::domain::models::{FinalStatus, UnitRecord};
use crate::services::aggregator::FinalSummary;

/// Table formatter for CLI output
pub struct TableFormatter {
    /// Whether to use colors in output
    use_colors: bool,
    /// Maximum width for tables (None = auto)
    max_width: Option<u16>,
}

impl TableFormatter {
    /// Create a new table formatter
    pub fn new() -> Self {
        Self {
            use_colors: console::colors_enabled(),
            max_width: None,
        }
    }

    /// Create a new table formatter with custom settings
    pub const fn with_config(use_colors: bool, max_width: Option<u16>) -> Self {
        Self {
            use_colors,
            max_width,
        }
    }

    fn header(&self, columns: &[&str]) -> Vec<Cell> {
        columns
            .iter()
            .map(|c| Cell::new(*c).add_attribute(Attribute::Bold))
            .collect()
    }

    fn status(&self, status: FinalStatus) -> String {
        let text = status.to_string();
        if self.use_colors {
            status_style(status, text).force_styling(true).to_string()
        } else {
            text
        }
    }

    /// Per-status counts plus test methods per resolving tier.
    pub fn format_summary(&self, summary: &FinalSummary) -> String {
        let mut table = self.create_base_table();
        table.set_header(self.header(&["Final status", "Units", "Test methods"]));

        for status in FinalStatus::ALL {
            let count = summary.counts.get(&status).copied().unwrap_or_default();
            let methods = match status {
                FinalStatus::Exhausted => "-".to_string(),
                resolved => summary
                    .test_methods
                    .iter()
                    .find(|(tier, _)| FinalStatus::resolved_by(**tier) == resolved)
                    .map_or(0, |(_, n)| *n)
                    .to_string(),
            };
            table.add_row(vec![
                Cell::new(self.status(status)),
                Cell::new(count).set_alignment(CellAlignment::Right),
                Cell::new(methods).set_alignment(CellAlignment::Right),
            ]);
        }
        table.add_row(vec![
            Cell::new("TOTAL").add_attribute(Attribute::Bold),
            Cell::new(summary.total_units)
                .add_attribute(Attribute::Bold)
                .set_alignment(CellAlignment::Right),
            Cell::new(""),
        ]);

        let mut out = table.to_string();
        if !summary.skipped_lines.is_empty() {
            out.push_str(&format!(
                "\n{} input line(s) skipped",
                summary.skipped_lines.len()
            ));
        }
        if summary.cancelled {
            out.push_str(&format!("\n{}", style("Run was cancelled; results are partial").yellow()));
        }
        out
    }

    /// One row per unit with its final status and the deciding diagnostic.
    pub fn format_records(&self, records: &[UnitRecord]) -> String {
        let mut table = self.create_base_table();
        table.set_header(self.header(&["Project", "Commit", "File", "Status", "Attempts", "Detail"]));

        for record in records {
            let detail = record
                .winning_outcome()
                .and_then(|o| o.artifact_reference.clone())
                .or_else(|| record.diagnostic.clone())
                .unwrap_or_default();
            table.add_row(vec![
                Cell::new(&record.unit.project),
                Cell::new(record.unit.short_sha()),
                Cell::new(truncate(&record.unit.file_name, 60)),
                Cell::new(self.status(record.final_status)),
                Cell::new(record.attempts.len()).set_alignment(CellAlignment::Right),
                Cell::new(truncate(&detail, 50)),
            ]);
        }

        table.to_string()
    }

    fn create_base_table(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(presets::UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);
        if let Some(width) = self.max_width {
            table.set_width(width);
        }
        table
    }
}

impl Default for TableFormatter {
    fn default() -> Self {
        Self::new()
    }
}

/// Styling for a terminal status.
fn status_style(status: FinalStatus, text: String) -> StyledObject<String> {
    match status {
        FinalStatus::Extracted | FinalStatus::DoubleChecked => style(text).green().bold(),
        FinalStatus::GeneratedPrimary | FinalStatus::GeneratedFallback => style(text).cyan(),
        FinalStatus::Exhausted => style(text).red(),
    }
}
