//! Tier 3b: Randoop, feedback-directed random testing.

use crate::domain::models::{GeneratorConfig, Tier};
use crate::infrastructure::process::ToolCommand;

use super::{join_classpath, GenerationRequest, TestGenerator};

/// Drives `randoop.main.Main gentests`.
///
/// Randoop exits non-zero when it finds error-revealing sequences even
/// though the regression suite it wrote is usable, so produced tests are
/// kept regardless of the exit status.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandoopGenerator;

impl TestGenerator for RandoopGenerator {
    fn tier(&self) -> Tier {
        Tier::GeneratedFallback
    }

    fn name(&self) -> &'static str {
        "fallback"
    }

    fn command(&self, settings: &GeneratorConfig, request: &GenerationRequest) -> ToolCommand {
        let classpath = join_classpath(&[
            settings.jar.display().to_string(),
            request.classpath.clone(),
        ]);
        ToolCommand::new(&settings.java)
            .arg("-cp")
            .arg(classpath)
            .args(["randoop.main.Main", "gentests"])
            .arg(format!("--testclass={}", request.class_name))
            .arg(format!("--time-limit={}", request.time_budget_secs))
            .arg(format!("--randomseed={}", request.seed))
            .arg(format!("--junit-output-dir={}", request.output_dir.display()))
    }

    fn is_test_source(&self, file_name: &str) -> bool {
        let stem = file_name.strip_suffix(".java").unwrap_or(file_name);
        ["RegressionTest", "ErrorTest"].iter().any(|prefix| {
            stem.strip_prefix(prefix)
                .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
        })
    }

    fn tolerates_exit_failure(&self) -> bool {
        true
    }
}
