//! Tier 3a: EvoSuite, a search-based whole-suite generator.

use crate::domain::models::{GeneratorConfig, Tier};
use crate::infrastructure::process::ToolCommand;

use super::{GenerationRequest, TestGenerator};

/// Drives `java -jar evosuite.jar`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EvoSuiteGenerator;

impl TestGenerator for EvoSuiteGenerator {
    fn tier(&self) -> Tier {
        Tier::GeneratedPrimary
    }

    fn name(&self) -> &'static str {
        "primary"
    }

    fn command(&self, settings: &GeneratorConfig, request: &GenerationRequest) -> ToolCommand {
        ToolCommand::new(&settings.java)
            .arg("-jar")
            .arg(settings.jar.display().to_string())
            .args(["-class", request.class_name.as_str()])
            .args(["-projectCP", request.classpath.as_str()])
            .arg(format!("-Dsearch_budget={}", request.time_budget_secs))
            .arg(format!("-Drandom_seed={}", request.seed))
            .arg("-Dassertion_strategy=all")
            .arg(format!("-Dtest_dir={}", request.output_dir.display()))
            .arg("-Dtest_comments=false")
    }

    fn crash_marker(&self) -> Option<&'static str> {
        Some("Fatal crash")
    }

    fn is_test_source(&self, file_name: &str) -> bool {
        file_name.ends_with("_ESTest.java")
    }
}
