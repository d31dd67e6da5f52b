//! Process management infrastructure
//!
//! - `ProcessRunner`: bounded execution of external tools
//! - `Cancellation`: run-level cancellation shared by all workers

pub mod cancel;
pub mod runner;

pub use cancel::{CancelHandle, Cancellation};
pub use runner::{ProcessOutcome, ProcessRunner, ToolCommand};

/// Clip `text` to at most `limit` characters, keeping its head and tail.
///
/// Compiler errors show up at the start of tool output and crash reports
/// at the end, so both ends are kept.
pub fn clip(text: &str, limit: usize) -> String {
    let total = text.chars().count();
    if total <= limit {
        return text.to_string();
    }
    let head = limit / 2;
    let tail = limit - head;
    let omitted = total - head - tail;
    let start: String = text.chars().take(head).collect();
    let end: String = text.chars().skip(total - tail).collect();
    format!("{start}\n[... {omitted} characters omitted ...]\n{end}")
}
