use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::unit::UnitId;

/// Main configuration structure for the pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Size of the worker pool (1-256)
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Root directory for reports, artifacts and working directories
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Directory holding one bare clone per project
    #[serde(default = "default_repos_dir")]
    pub repos_dir: PathBuf,

    /// Clone URL template; `{project}` is replaced by the project name
    #[serde(default = "default_repository_url_template")]
    pub repository_url_template: String,

    /// Skip units already resolved in a previous run's summary
    #[serde(default = "default_true")]
    pub skip_resolved: bool,

    /// Maximum characters of tool output kept in a diagnostic
    #[serde(default = "default_diagnostic_limit")]
    pub diagnostic_limit: usize,

    /// Version-control tool settings
    #[serde(default)]
    pub git: GitConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Tier 2 matching thresholds
    #[serde(default)]
    pub double_check: DoubleCheckConfig,

    /// Compilation settings shared by both generative tiers
    #[serde(default)]
    pub build: BuildConfig,

    /// Tier 3a generator
    #[serde(default = "GeneratorConfig::primary")]
    pub primary: GeneratorConfig,

    /// Tier 3b generator
    #[serde(default = "GeneratorConfig::fallback")]
    pub fallback: GeneratorConfig,

    /// Random seed policy for generators
    #[serde(default)]
    pub seed: SeedPolicy,

    /// Time budget of Tier 3b after Tier 3a timed out
    #[serde(default)]
    pub fallback_budget: FallbackBudget,

    /// Backoff between retries of the same tier
    #[serde(default)]
    pub retry: RetryConfig,
}

const fn default_workers() -> usize {
    4
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("pipeline_results")
}

fn default_repos_dir() -> PathBuf {
    PathBuf::from("pipeline_results/repos")
}

fn default_repository_url_template() -> String {
    "https://github.com/apache/{project}.git".to_string()
}

const fn default_true() -> bool {
    true
}

const fn default_diagnostic_limit() -> usize {
    4000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            output_dir: default_output_dir(),
            repos_dir: default_repos_dir(),
            repository_url_template: default_repository_url_template(),
            skip_resolved: true,
            diagnostic_limit: default_diagnostic_limit(),
            git: GitConfig::default(),
            logging: LoggingConfig::default(),
            double_check: DoubleCheckConfig::default(),
            build: BuildConfig::default(),
            primary: GeneratorConfig::primary(),
            fallback: GeneratorConfig::fallback(),
            seed: SeedPolicy::default(),
            fallback_budget: FallbackBudget::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl Config {
    /// Clone URL for a project.
    pub fn repository_url(&self, project: &str) -> String {
        self.repository_url_template.replace("{project}", project)
    }

    /// Directory of per-tier and per-unit reports.
    pub fn reports_dir(&self) -> PathBuf {
        self.output_dir.join("reports")
    }

    /// Parent of all unit-scoped working directories.
    pub fn work_dir(&self) -> PathBuf {
        self.output_dir.join("work")
    }
}

/// Version-control tool settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GitConfig {
    /// Executable name or path
    #[serde(default = "default_git_program")]
    pub program: String,

    /// Timeout for cloning a project, in seconds
    #[serde(default = "default_clone_timeout_secs")]
    pub clone_timeout_secs: u64,

    /// Timeout for `show` / `ls-tree` / `rev-list`, in seconds
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,
}

fn default_git_program() -> String {
    "git".to_string()
}

const fn default_clone_timeout_secs() -> u64 {
    600
}

const fn default_query_timeout_secs() -> u64 {
    60
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            program: default_git_program(),
            clone_timeout_secs: default_clone_timeout_secs(),
            query_timeout_secs: default_query_timeout_secs(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for log files (stdout only when unset)
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// File rotation: daily, hourly or never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_rotation() -> String {
    "never".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}

/// Tier 2 matching thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DoubleCheckConfig {
    /// Ancestor and descendant commits searched on each side of the unit's commit
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    /// Parent directories above the mirrored test package to include
    #[serde(default)]
    pub directory_depth: usize,

    /// Minimum shared stem length between test and production names (0 disables)
    #[serde(default)]
    pub min_name_overlap: usize,

    /// Require the test source to mention the production type
    #[serde(default = "default_true")]
    pub require_type_reference: bool,
}

const fn default_history_window() -> usize {
    5
}

impl Default for DoubleCheckConfig {
    fn default() -> Self {
        Self {
            history_window: default_history_window(),
            directory_depth: 0,
            min_name_overlap: 0,
            require_type_reference: true,
        }
    }
}

/// Compilation settings
///
/// `args` may contain the placeholders `{classes}`, `{classpath}` and
/// `{source}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BuildConfig {
    /// Compiler executable
    #[serde(default = "default_compiler")]
    pub program: String,

    /// Compiler argument template
    #[serde(default = "default_compiler_args")]
    pub args: Vec<String>,

    /// Dependency classpath entries available to the unit
    #[serde(default)]
    pub classpath: Vec<String>,

    /// Extra classpath entries for compiling and running generated tests (JUnit etc.)
    #[serde(default)]
    pub test_classpath: Vec<String>,

    /// Compilation timeout in seconds
    #[serde(default = "default_compile_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_compiler() -> String {
    "javac".to_string()
}

fn default_compiler_args() -> Vec<String> {
    ["-nowarn", "-d", "{classes}", "-cp", "{classpath}", "{source}"]
        .into_iter()
        .map(String::from)
        .collect()
}

const fn default_compile_timeout_secs() -> u64 {
    60
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            program: default_compiler(),
            args: default_compiler_args(),
            classpath: Vec::new(),
            test_classpath: Vec::new(),
            timeout_secs: default_compile_timeout_secs(),
        }
    }
}

/// How generated tests are checked before a generative tier reports success
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ValidationPolicy {
    /// Generated tests must compile
    Compile,
    /// Generated tests must compile and pass when executed
    CompileAndExecute,
}

/// A black-box test generator invoked through `java`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GeneratorConfig {
    /// Java launcher
    #[serde(default = "default_java")]
    pub java: String,

    /// Path to the generator's jar
    pub jar: PathBuf,

    /// Search/time budget handed to the generator, in seconds
    pub time_budget_secs: u64,

    /// Hard subprocess timeout, in seconds
    pub timeout_secs: u64,

    /// Extra attempts after a tool failure or timeout
    #[serde(default)]
    pub retries: u32,

    /// Validation required before success
    pub validation: ValidationPolicy,
}

fn default_java() -> String {
    "java".to_string()
}

impl GeneratorConfig {
    /// Defaults for the search-based primary generator.
    pub fn primary() -> Self {
        Self {
            java: default_java(),
            jar: PathBuf::from("tools/evosuite-1.2.0.jar"),
            time_budget_secs: 60,
            timeout_secs: 120,
            retries: 0,
            validation: ValidationPolicy::CompileAndExecute,
        }
    }

    /// Defaults for the random-testing fallback generator.
    pub fn fallback() -> Self {
        Self {
            java: default_java(),
            jar: PathBuf::from("tools/randoop-all-4.3.2.jar"),
            time_budget_secs: 60,
            timeout_secs: 120,
            retries: 0,
            validation: ValidationPolicy::Compile,
        }
    }
}

/// Random seed handed to generators
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SeedPolicy {
    /// The same seed for every unit
    Fixed {
        /// Seed value
        value: u64,
    },
    /// A seed derived from `base` and the unit's identity digest
    PerUnit {
        /// Base mixed into every derived seed
        base: u64,
    },
}

impl SeedPolicy {
    /// The seed handed to generators for `unit`.
    pub fn seed_for(self, unit: &UnitId) -> u64 {
        match self {
            Self::Fixed { value } => value,
            Self::PerUnit { base } => {
                let mixed = u64::from_str_radix(&unit.short_digest(), 16).unwrap_or_default();
                base ^ mixed
            }
        }
    }
}

impl Default for SeedPolicy {
    fn default() -> Self {
        Self::Fixed { value: 42 }
    }
}

/// Tier 3b time budget after a Tier 3a timeout
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum FallbackBudget {
    /// Use the fallback generator's configured budget unchanged
    Full,
    /// Multiply budget and timeout by `factor` (0 < factor <= 1)
    Scaled {
        /// Scale factor
        factor: f64,
    },
}

impl Default for FallbackBudget {
    fn default() -> Self {
        Self::Full
    }
}

/// Backoff between attempts of the same tier
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetryConfig {
    /// Initial backoff delay in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff delay in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

const fn default_initial_backoff_ms() -> u64 {
    500
}

const fn default_max_backoff_ms() -> u64 {
    10_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_seed_ignores_unit() {
        let policy = SeedPolicy::Fixed { value: 9 };
        assert_eq!(policy.seed_for(&UnitId::new("a", "b", "c")), 9);
        assert_eq!(policy.seed_for(&UnitId::new("x", "y", "z")), 9);
    }

    #[test]
    fn per_unit_seed_is_stable_and_distinct() {
        let policy = SeedPolicy::PerUnit { base: 1 };
        let a = UnitId::new("a", "b", "c");
        let b = UnitId::new("a", "b", "d");
        assert_eq!(policy.seed_for(&a), policy.seed_for(&a.clone()));
        assert_ne!(policy.seed_for(&a), policy.seed_for(&b));
    }

    #[test]
    fn repository_url_substitutes_project() {
        let config = Config::default();
        assert_eq!(
            config.repository_url("commons-lang"),
            "https://github.com/apache/commons-lang.git"
        );
        assert_eq!(config.reports_dir(), PathBuf::from("pipeline_results/reports"));
    }
}
