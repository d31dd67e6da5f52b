use std::path::Path;

use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use thiserror::Error;

use crate::domain::models::config::{Config, FallbackBudget, GeneratorConfig};

/// Project configuration file, looked up in the working directory.
pub const CONFIG_FILE: &str = "oracle-cascade.yaml";

/// Optional local overrides, merged after [`CONFIG_FILE`].
pub const LOCAL_CONFIG_FILE: &str = "oracle-cascade.local.yaml";

/// Prefix of environment overrides; `__` separates nested keys.
pub const ENV_PREFIX: &str = "ORACLE_CASCADE_";

const MAX_WORKERS: usize = 256;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid workers: {0}. Must be between 1 and {MAX_WORKERS}")]
    InvalidWorkers(usize),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidRotation(String),

    #[error("{0} cannot be empty")]
    EmptyProgram(&'static str),

    #[error("{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error(
        "Compile timeout ({compile}s) must be less than the {generator} generation timeout ({generation}s)"
    )]
    CompileTimeoutTooLong {
        compile: u64,
        generator: &'static str,
        generation: u64,
    },

    #[error("Invalid fallback budget factor: {0}. Must be in (0, 1]")]
    InvalidBudgetFactor(f64),

    #[error(
        "Invalid backoff configuration: initial_backoff_ms ({0}) must be less than max_backoff_ms ({1})"
    )]
    InvalidBackoff(u64, u64),

    #[error("Configuration file not found: {0}")]
    MissingFile(String),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. `explicit` file, or `oracle-cascade.yaml` in the working directory
    /// 3. `oracle-cascade.local.yaml` (optional)
    /// 4. Environment variables (`ORACLE_CASCADE_*`)
    ///
    /// Command-line flags are applied by the caller on top of the result,
    /// followed by another [`validate`](Self::validate).
    pub fn load(explicit: Option<&Path>) -> Result<Config> {
        if let Some(path) = explicit
            && !path.is_file()
        {
            return Err(ConfigError::MissingFile(path.display().to_string()).into());
        }

        let config: Config = Self::figment(explicit)
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// The provider chain used by [`load`](Self::load).
    pub fn figment(explicit: Option<&Path>) -> Figment {
        let base = explicit.unwrap_or_else(|| Path::new(CONFIG_FILE));
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(base))
            .merge(Yaml::file(LOCAL_CONFIG_FILE))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.workers == 0 || config.workers > MAX_WORKERS {
            return Err(ConfigError::InvalidWorkers(config.workers));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidRotation(config.logging.rotation.clone()));
        }

        if config.git.program.trim().is_empty() {
            return Err(ConfigError::EmptyProgram("git.program"));
        }
        if config.build.program.trim().is_empty() {
            return Err(ConfigError::EmptyProgram("build.program"));
        }
        if config.git.clone_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout("git.clone_timeout_secs"));
        }
        if config.git.query_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout("git.query_timeout_secs"));
        }
        if config.build.timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout("build.timeout_secs"));
        }

        Self::validate_generator("primary", &config.primary, config.build.timeout_secs)?;
        Self::validate_generator("fallback", &config.fallback, config.build.timeout_secs)?;

        if let FallbackBudget::Scaled { factor } = config.fallback_budget
            && !(factor > 0.0 && factor <= 1.0)
        {
            return Err(ConfigError::InvalidBudgetFactor(factor));
        }

        if config.retry.initial_backoff_ms >= config.retry.max_backoff_ms {
            return Err(ConfigError::InvalidBackoff(
                config.retry.initial_backoff_ms,
                config.retry.max_backoff_ms,
            ));
        }

        if config.diagnostic_limit == 0 {
            return Err(ConfigError::ValidationFailed(
                "diagnostic_limit must be greater than zero".to_string(),
            ));
        }

        if !config.repository_url_template.contains("{project}") {
            return Err(ConfigError::ValidationFailed(format!(
                "repository_url_template '{}' must contain {{project}}",
                config.repository_url_template
            )));
        }

        Ok(())
    }

    fn validate_generator(
        name: &'static str,
        generator: &GeneratorConfig,
        compile_timeout: u64,
    ) -> Result<(), ConfigError> {
        let (java, timeout, budget) = match name {
            "primary" => (
                "primary.java",
                "primary.timeout_secs",
                "primary.time_budget_secs",
            ),
            _ => (
                "fallback.java",
                "fallback.timeout_secs",
                "fallback.time_budget_secs",
            ),
        };
        if generator.java.trim().is_empty() {
            return Err(ConfigError::EmptyProgram(java));
        }
        if generator.timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout(timeout));
        }
        if generator.time_budget_secs == 0 {
            return Err(ConfigError::ZeroTimeout(budget));
        }
        if compile_timeout >= generator.timeout_secs {
            return Err(ConfigError::CompileTimeoutTooLong {
                compile: compile_timeout,
                generator: name,
                generation: generator.timeout_secs,
            });
        }
        if generator.time_budget_secs > generator.timeout_secs {
            return Err(ConfigError::ValidationFailed(format!(
                "{name}.time_budget_secs ({}) exceeds {name}.timeout_secs ({})",
                generator.time_budget_secs, generator.timeout_secs
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::config::{SeedPolicy, ValidationPolicy};
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.workers, 4);
        assert_eq!(config.diagnostic_limit, 4000);
        assert_eq!(config.double_check.history_window, 5);
        assert_eq!(config.primary.validation, ValidationPolicy::CompileAndExecute);
        assert_eq!(config.fallback.validation, ValidationPolicy::Compile);
        assert_eq!(config.fallback_budget, FallbackBudget::Full);
        assert_eq!(config.seed, SeedPolicy::Fixed { value: 42 });
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r"
workers: 8
output_dir: /tmp/results
logging:
  level: debug
  format: json
double_check:
  history_window: 10
  min_name_overlap: 4
seed:
  mode: per_unit
  base: 7
fallback_budget:
  policy: scaled
  factor: 0.5
primary:
  jar: /opt/evosuite.jar
  time_budget_secs: 30
  timeout_secs: 90
  retries: 2
  validation: compile
";

        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");

        assert_eq!(config.workers, 8);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.double_check.history_window, 10);
        assert_eq!(config.double_check.min_name_overlap, 4);
        assert!(config.double_check.require_type_reference);
        assert_eq!(config.seed, SeedPolicy::PerUnit { base: 7 });
        assert_eq!(config.fallback_budget, FallbackBudget::Scaled { factor: 0.5 });
        assert_eq!(config.primary.retries, 2);
        assert_eq!(config.primary.java, "java");
        assert_eq!(config.primary.validation, ValidationPolicy::Compile);

        ConfigLoader::validate(&config).expect("Parsed config should be valid");
    }

    #[test]
    fn test_validate_workers_bounds() {
        for workers in [0, 257] {
            let config = Config {
                workers,
                ..Default::default()
            };
            assert!(matches!(
                ConfigLoader::validate(&config),
                Err(ConfigError::InvalidWorkers(w)) if w == workers
            ));
        }
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "loud".to_string();

        match ConfigLoader::validate(&config).unwrap_err() {
            ConfigError::InvalidLogLevel(level) => assert_eq!(level, "loud"),
            other => panic!("Expected InvalidLogLevel error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_invalid_log_format() {
        let mut config = Config::default();
        config.logging.format = "xml".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidLogFormat(_))
        ));
    }

    #[test]
    fn test_validate_empty_programs() {
        let mut config = Config::default();
        config.build.program = "  ".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::EmptyProgram("build.program"))
        ));

        let mut config = Config::default();
        config.fallback.java = String::new();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::EmptyProgram("fallback.java"))
        ));
    }

    #[test]
    fn test_validate_zero_timeouts() {
        let mut config = Config::default();
        config.build.timeout_secs = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::ZeroTimeout("build.timeout_secs"))
        ));

        let mut config = Config::default();
        config.primary.timeout_secs = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::ZeroTimeout("primary.timeout_secs"))
        ));
    }

    #[test]
    fn test_validate_compile_timeout_must_be_shorter() {
        let mut config = Config::default();
        config.build.timeout_secs = 120;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::CompileTimeoutTooLong {
                generator: "primary",
                ..
            })
        ));
    }

    #[test]
    fn test_validate_budget_factor() {
        for factor in [0.0, -0.5, 1.5] {
            let mut config = Config::default();
            config.fallback_budget = FallbackBudget::Scaled { factor };
            assert!(matches!(
                ConfigLoader::validate(&config),
                Err(ConfigError::InvalidBudgetFactor(_))
            ));
        }
        let mut config = Config::default();
        config.fallback_budget = FallbackBudget::Scaled { factor: 1.0 };
        assert!(ConfigLoader::validate(&config).is_ok());
    }

    #[test]
    fn test_validate_invalid_backoff() {
        let mut config = Config::default();
        config.retry.initial_backoff_ms = 30000;
        config.retry.max_backoff_ms = 10000;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidBackoff(30000, 10000))
        ));
    }

    #[test]
    fn test_validate_url_template_needs_placeholder() {
        let mut config = Config::default();
        config.repository_url_template = "https://example.org/repo.git".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::ValidationFailed(_))
        ));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let err = ConfigLoader::load(Some(Path::new("/definitely/not/here.yaml"))).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_env_override() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "workers: 2\nlogging:\n  level: info").unwrap();
        file.flush().unwrap();

        temp_env::with_vars(
            [
                ("ORACLE_CASCADE_WORKERS", Some("12")),
                ("ORACLE_CASCADE_LOGGING__LEVEL", Some("debug")),
                ("ORACLE_CASCADE_DOUBLE_CHECK__HISTORY_WINDOW", Some("3")),
            ],
            || {
                let config: Config = ConfigLoader::figment(Some(file.path()))
                    .extract()
                    .unwrap();
                assert_eq!(config.workers, 12, "Environment should win over file");
                assert_eq!(config.logging.level, "debug");
                assert_eq!(config.double_check.history_window, 3);
            },
        );
    }

    #[test]
    fn test_hierarchical_merging() {
        let mut base_file = NamedTempFile::new().unwrap();
        writeln!(
            base_file,
            "workers: 5\nlogging:\n  level: info\n  format: json"
        )
        .unwrap();
        base_file.flush().unwrap();

        let mut override_file = NamedTempFile::new().unwrap();
        writeln!(override_file, "workers: 15\nlogging:\n  level: debug").unwrap();
        override_file.flush().unwrap();

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(base_file.path()))
            .merge(Yaml::file(override_file.path()))
            .extract()
            .unwrap();

        assert_eq!(config.workers, 15, "Override should win");
        assert_eq!(
            config.logging.level, "debug",
            "Override should win for nested fields"
        );
        assert_eq!(
            config.logging.format, "json",
            "Base value should persist when not overridden"
        );
        assert_eq!(config.git.program, "git", "Defaults fill untouched sections");
    }
}
