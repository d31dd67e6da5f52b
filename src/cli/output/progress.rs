//! Progress bar utilities using indicatif for terminal output
//!
//! A single bar over the units of a run, advanced as units settle. The bar
//! draws to stderr and is hidden in `--json` mode.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::application::RunProgress;
use crate::domain::models::UnitRecord;

/// Style templates for different progress bar types
const PROGRESS_TEMPLATE: &str =
    "[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg} (ETA: {eta})";

/// Progress bar characters for visual effect
const PROGRESS_CHARS: &str = "█▓▒░ ";

/// Create a standard progress bar with ETA calculation
pub fn create_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(PROGRESS_TEMPLATE)
            .expect("Invalid progress bar template")
            .progress_chars(PROGRESS_CHARS),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Extension trait for ProgressBar to add common utility methods
pub trait ProgressBarExt {
    /// Finish with a success message (green checkmark)
    fn finish_success(&self, message: impl Into<String>);

    /// Finish with a warning message (yellow !)
    fn finish_warning(&self, message: impl Into<String>);
}

impl ProgressBarExt for ProgressBar {
    fn finish_success(&self, message: impl Into<String>) {
        self.finish_with_message(format!("✓ {}", message.into()));
    }

    fn finish_warning(&self, message: impl Into<String>) {
        self.finish_with_message(format!("! {}", message.into()));
    }
}

/// Unit progress for `run`.
pub struct UnitProgress {
    bar: ProgressBar,
}

impl UnitProgress {
    /// A visible bar, or a hidden one when `hidden`.
    pub fn new(hidden: bool) -> Self {
        let bar = create_progress_bar(0);
        if hidden {
            bar.set_draw_target(ProgressDrawTarget::hidden());
        }
        Self { bar }
    }

    /// The underlying bar.
    pub const fn bar(&self) -> &ProgressBar {
        &self.bar
    }
}

impl RunProgress for UnitProgress {
    fn started(&self, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.set_message("units");
    }

    fn unit_finished(&self, record: &UnitRecord) {
        self.bar.set_message(format!("{} {}", record.final_status, record.unit));
        self.bar.inc(1);
    }

    fn finished(&self) {
        if self.bar.position() < self.bar.length().unwrap_or_default() {
            self.bar.finish_warning("stopped early");
        } else {
            self.bar.finish_success("all units settled");
        }
    }
}
