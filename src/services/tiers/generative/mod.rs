//! Tiers 3a and 3b: black-box test generators.
//!
//! Both tiers share one pipeline, [`GenerativeTier`]:
//!
//! 1. stage the unit's after-source in a private build context,
//! 2. compile it (a compile error short-circuits before the generator runs),
//! 3. invoke the generator with a fixed time budget and seed,
//! 4. validate the produced tests (compile, and for the primary tier execute),
//! 5. copy the tests to the tier's artifact directory.
//!
//! What differs between the tools is captured by [`TestGenerator`].

pub mod build;
pub mod evosuite;
pub mod randoop;

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};
use walkdir::WalkDir;

use super::traits::{TierContext, TierHandler};
use crate::domain::models::{
    Config, FallbackBudget, GeneratorConfig, SeedPolicy, TestEvidence, Tier, TierOutcome,
    TierStatus, ValidationPolicy, WorkUnit,
};
use crate::infrastructure::process::{clip, ProcessOutcome, ProcessRunner, ToolCommand};
use crate::services::java_source::{
    extract_package, extract_test_methods, fully_qualified_name, is_java_file,
};

pub use build::{join_classpath, JavaBuild};
pub use evosuite::EvoSuiteGenerator;
pub use randoop::RandoopGenerator;

const JUNIT_RUNNER: &str = "org.junit.runner.JUnitCore";
/// Stands in for the unit's working directory in diagnostics.
const WORKSPACE_PLACEHOLDER: &str = "<workspace>";

// ---------------------------------------------------------------------------
// TestGenerator
// ---------------------------------------------------------------------------

/// Inputs of one generator invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    /// Fully qualified name of the class under test.
    pub class_name: String,
    /// Classpath containing the compiled unit and its dependencies.
    pub classpath: String,
    /// Directory the generator writes test sources to.
    pub output_dir: PathBuf,
    /// Search/time budget in seconds.
    pub time_budget_secs: u64,
    /// Random seed.
    pub seed: u64,
}

/// Tool-specific parts of a generative tier.
pub trait TestGenerator: Send + Sync {
    /// The tier this generator backs.
    fn tier(&self) -> Tier;

    /// Short name, used for the staging directory.
    fn name(&self) -> &'static str;

    /// The tool invocation (timeout and working directory are set by the caller).
    fn command(&self, settings: &GeneratorConfig, request: &GenerationRequest) -> ToolCommand;

    /// Output fragment that marks a crash even on exit status 0.
    fn crash_marker(&self) -> Option<&'static str> {
        None
    }

    /// Whether a produced file name is a test class (as opposed to scaffolding or suites).
    fn is_test_source(&self, file_name: &str) -> bool;

    /// Whether produced tests are kept when the tool exits non-zero.
    fn tolerates_exit_failure(&self) -> bool {
        false
    }
}

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// The private build context of one attempt.
#[derive(Debug)]
struct Stage {
    root: PathBuf,
    source: PathBuf,
    classes: PathBuf,
    tests: PathBuf,
    test_classes: PathBuf,
    class_name: String,
}

impl Stage {
    async fn prepare(workspace: &Path, name: &str, attempt: u32, unit: &WorkUnit) -> std::io::Result<Self> {
        let root = workspace.join(name).join(format!("attempt-{attempt}"));
        remove_dir_if_present(&root).await?;

        let type_name = unit.type_name();
        let package = extract_package(&unit.change.after_source);
        let mut source_dir = root.join("src");
        if let Some(package) = &package {
            source_dir.extend(package.split('.'));
        }
        tokio::fs::create_dir_all(&source_dir).await?;
        let source = source_dir.join(format!("{type_name}.java"));
        tokio::fs::write(&source, &unit.change.after_source).await?;

        let tests = root.join("tests");
        tokio::fs::create_dir_all(&tests).await?;

        let class_name = match package {
            Some(package) => format!("{package}.{type_name}"),
            None => type_name.to_string(),
        };
        Ok(Self {
            classes: root.join("classes"),
            test_classes: root.join("test-classes"),
            tests,
            source,
            class_name,
            root,
        })
    }
}

async fn remove_dir_if_present(dir: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_dir_all(dir).await {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Java files under `dir`, sorted. The walk runs on the blocking pool.
async fn java_sources(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let dir = dir.to_path_buf();
    tokio::task::spawn_blocking(move || walk_java_sources(&dir))
        .await
        .map_err(std::io::Error::other)
}

fn walk_java_sources(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|path| is_java_file(&path.to_string_lossy()))
        .collect();
    files.sort();
    files
}

async fn copy_sources(files: &[PathBuf], from: &Path, to: &Path) -> std::io::Result<()> {
    remove_dir_if_present(to).await?;
    tokio::fs::create_dir_all(to).await?;
    for file in files {
        let relative = file.strip_prefix(from).unwrap_or(file);
        let target = to.join(relative);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(file, &target).await?;
    }
    Ok(())
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn scale(value: u64, factor: f64) -> u64 {
    ((value as f64) * factor).ceil().max(1.0) as u64
}

/// External steps whose failures are classified differently.
#[derive(Debug, Clone, Copy)]
enum Step {
    CompileUnit,
    CompileTests,
    RunTests,
}

impl Step {
    const fn label(self) -> &'static str {
        match self {
            Self::CompileUnit => "compilation",
            Self::CompileTests => "compilation of generated tests",
            Self::RunTests => "execution of generated tests",
        }
    }
}

// ---------------------------------------------------------------------------
// GenerativeTier
// ---------------------------------------------------------------------------

/// A [`TierHandler`] driving one [`TestGenerator`].
pub struct GenerativeTier<G> {
    generator: G,
    settings: GeneratorConfig,
    build: JavaBuild,
    runner: ProcessRunner,
    seed: SeedPolicy,
    budget: FallbackBudget,
    artifacts_root: PathBuf,
    diagnostic_limit: usize,
}

impl<G: TestGenerator> GenerativeTier<G> {
    /// Wire `generator` with the settings of its tier from `config`.
    pub fn from_config(generator: G, config: &Config, runner: ProcessRunner) -> Self {
        let tier = generator.tier();
        let settings = if tier == Tier::GeneratedFallback {
            config.fallback.clone()
        } else {
            config.primary.clone()
        };
        Self {
            settings,
            build: JavaBuild::new(&config.build, runner.clone()),
            runner,
            seed: config.seed,
            budget: config.fallback_budget,
            artifacts_root: config
                .output_dir
                .join(tier.report_name())
                .join("artifacts"),
            diagnostic_limit: config.diagnostic_limit,
            generator,
        }
    }

    /// Time budget and hard timeout for this attempt.
    ///
    /// After a timed-out primary generation the fallback budget policy
    /// applies to the fallback tier.
    pub fn budget_for(&self, ctx: &TierContext<'_>) -> (u64, Duration) {
        let mut budget = self.settings.time_budget_secs;
        let mut timeout = self.settings.timeout_secs;
        if self.generator.tier() == Tier::GeneratedFallback
            && ctx.settled_status(Tier::GeneratedPrimary) == Some(TierStatus::Timeout)
            && let FallbackBudget::Scaled { factor } = self.budget
        {
            budget = scale(budget, factor);
            timeout = scale(timeout, factor);
        }
        (budget, Duration::from_secs(timeout))
    }

    /// Clip tool output for a diagnostic, with the workspace path replaced.
    ///
    /// Workspace directories carry a random suffix; diagnostics must not.
    fn clip(&self, text: &str, workspace: &Path) -> String {
        let workspace = workspace.display().to_string();
        if workspace.is_empty() {
            return clip(text, self.diagnostic_limit);
        }
        clip(
            &text.replace(&workspace, WORKSPACE_PLACEHOLDER),
            self.diagnostic_limit,
        )
    }

    /// Turn a step's process outcome into its output or a classified failure.
    fn expect_success(
        &self,
        outcome: ProcessOutcome,
        step: Step,
        workspace: &Path,
    ) -> Result<String, TierOutcome> {
        let tier = self.generator.tier();
        match outcome {
            ProcessOutcome::Exited { code: Some(0), .. } => Ok(outcome.combined_output()),
            ProcessOutcome::Exited { code, .. } => {
                let output = outcome.combined_output();
                Err(match step {
                    Step::CompileUnit => {
                        let (count, _) = JavaBuild::parse_errors(&output);
                        TierOutcome::compile_failure(
                            tier,
                            format!("{count} compile error(s): {}", self.clip(&output, workspace)),
                        )
                    }
                    Step::CompileTests | Step::RunTests => TierOutcome::tool_failure(
                        tier,
                        format!(
                            "{} failed (exit {}): {}",
                            step.label(),
                            code.map_or_else(|| "signal".to_string(), |c| c.to_string()),
                            self.clip(&output, workspace)
                        ),
                    ),
                })
            }
            ProcessOutcome::TimedOut { limit } => Err(TierOutcome::timeout(
                tier,
                format!("{} exceeded {}s", step.label(), limit.as_secs()),
            )),
            ProcessOutcome::Cancelled => Err(TierOutcome::tool_failure(
                tier,
                format!("{} cancelled", step.label()),
            )),
            ProcessOutcome::SpawnFailed(message) => Err(TierOutcome::tool_failure(
                tier,
                format!("{}: {}", step.label(), self.clip(&message, workspace)),
            )),
        }
    }

    async fn generate(&self, ctx: &TierContext<'_>, seed: u64) -> Result<TierOutcome, TierOutcome> {
        let tier = self.generator.tier();
        let unit = ctx.unit;
        if let Some(reason) = unit.malformed_reason() {
            return Err(TierOutcome::no_candidate(tier, format!("malformed source: {reason}")));
        }
        if !is_java_file(&unit.id.file_name) {
            return Err(TierOutcome::no_candidate(tier, "not a Java source file"));
        }

        let workspace = ctx.workspace;
        let stage = Stage::prepare(workspace, self.generator.name(), ctx.attempt, unit)
            .await
            .map_err(|e| TierOutcome::tool_failure(tier, format!("cannot stage sources: {e}")))?;

        // 1. The unit itself must compile.
        let deps = self.build.classpath().to_vec();
        let compiled = self
            .build
            .compile(std::slice::from_ref(&stage.source), &stage.classes, &deps)
            .await;
        self.expect_success(compiled, Step::CompileUnit, workspace)?;

        // 2. Generation.
        let (budget, timeout) = self.budget_for(ctx);
        let mut unit_classpath = vec![stage.classes.display().to_string()];
        unit_classpath.extend(deps.iter().cloned());
        let request = GenerationRequest {
            class_name: stage.class_name.clone(),
            classpath: join_classpath(&unit_classpath),
            output_dir: stage.tests.clone(),
            time_budget_secs: budget,
            seed,
        };
        let command = self
            .generator
            .command(&self.settings, &request)
            .current_dir(&stage.root)
            .timeout(timeout);
        info!(
            unit = %unit.id,
            tier = %tier,
            class = %request.class_name,
            seed,
            budget_secs = budget,
            "Invoking generator"
        );

        let outcome = self.runner.run(&command).await;
        let produced = java_sources(&stage.tests).await.map_err(|e| {
            TierOutcome::tool_failure(tier, format!("cannot list generated tests: {e}"))
        })?;
        let tests: Vec<PathBuf> = produced
            .iter()
            .filter(|path| {
                path.file_name()
                    .is_some_and(|name| self.generator.is_test_source(&name.to_string_lossy()))
            })
            .cloned()
            .collect();

        match &outcome {
            ProcessOutcome::Exited { code, .. } => {
                let output = outcome.combined_output();
                if let Some(marker) = self.generator.crash_marker()
                    && output.contains(marker)
                {
                    return Err(TierOutcome::tool_failure(
                        tier,
                        format!("generator crashed: {}", self.clip(&output, workspace)),
                    ));
                }
                let tolerated = self.generator.tolerates_exit_failure() && !tests.is_empty();
                if *code != Some(0) && !tolerated {
                    return Err(TierOutcome::tool_failure(
                        tier,
                        format!(
                            "generator exited with {}: {}",
                            code.map_or_else(|| "signal".to_string(), |c| c.to_string()),
                            self.clip(&output, workspace)
                        ),
                    ));
                }
            }
            ProcessOutcome::TimedOut { limit } => {
                return Err(TierOutcome::timeout(
                    tier,
                    format!(
                        "generator exceeded {}s; partial output discarded",
                        limit.as_secs()
                    ),
                ));
            }
            ProcessOutcome::Cancelled => {
                return Err(TierOutcome::tool_failure(tier, "generation cancelled"));
            }
            ProcessOutcome::SpawnFailed(message) => {
                return Err(TierOutcome::tool_failure(tier, self.clip(message, workspace)));
            }
        }

        if tests.is_empty() {
            return Err(TierOutcome::tool_failure(tier, "generator produced no tests"));
        }

        // 3. Validation.
        let mut test_classpath = vec![stage.classes.display().to_string()];
        test_classpath.extend(self.build.test_classpath().iter().cloned());
        test_classpath.extend(deps.iter().cloned());
        let compiled = self
            .build
            .compile(&produced, &stage.test_classes, &test_classpath)
            .await;
        self.expect_success(compiled, Step::CompileTests, workspace)?;

        let mut evidence = Vec::with_capacity(tests.len());
        let mut test_classes = Vec::with_capacity(tests.len());
        for path in &tests {
            let content = tokio::fs::read_to_string(path).await.map_err(|e| {
                let message = format!("cannot read generated test {}: {e}", path.display());
                TierOutcome::tool_failure(tier, self.clip(&message, workspace))
            })?;
            test_classes.push(fully_qualified_name(&content, &path.to_string_lossy()));
            evidence.push(TestEvidence {
                commit_sha: String::new(),
                path: path
                    .strip_prefix(&stage.tests)
                    .unwrap_or(path)
                    .display()
                    .to_string(),
                test_methods: extract_test_methods(&content),
            });
        }

        if self.settings.validation == ValidationPolicy::CompileAndExecute {
            let mut run_classpath = vec![stage.test_classes.display().to_string()];
            run_classpath.extend(test_classpath);
            let command = ToolCommand::new(&self.settings.java)
                .arg("-cp")
                .arg(join_classpath(&run_classpath))
                .arg(JUNIT_RUNNER)
                .args(test_classes)
                .current_dir(&stage.root)
                .timeout(Duration::from_secs(self.settings.timeout_secs));
            let executed = self.runner.run(&command).await;
            self.expect_success(executed, Step::RunTests, workspace)?;
        }

        // 4. Persist before the workspace goes away.
        let destination = self.artifacts_root.join(unit.id.digest());
        copy_sources(&produced, &stage.tests, &destination).await.map_err(|e| {
            TierOutcome::tool_failure(
                tier,
                format!("cannot persist artifacts to {}: {e}", destination.display()),
            )
        })?;
        debug!(unit = %unit.id, tier = %tier, tests = tests.len(), "Generated tests validated");

        Ok(TierOutcome::success(tier, destination.display().to_string()).with_evidence(evidence))
    }
}

#[async_trait]
impl<G: TestGenerator> TierHandler for GenerativeTier<G> {
    fn tier(&self) -> Tier {
        self.generator.tier()
    }

    fn retries(&self) -> u32 {
        self.settings.retries
    }

    async fn attempt(&self, ctx: &TierContext<'_>) -> TierOutcome {
        let seed = self.seed.seed_for(&ctx.unit.id);
        self.generate(ctx, seed)
            .await
            .unwrap_or_else(|failure| failure)
            .with_seed(seed)
    }
}
