//! Java compilation through the configured compiler command.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::models::BuildConfig;
use crate::infrastructure::process::{ProcessOutcome, ProcessRunner, ToolCommand};

// ---------------------------------------------------------------------------
// JavaBuild
// ---------------------------------------------------------------------------

/// Compiles sources into a classes directory.
///
/// The argument template may contain `{classes}`, `{classpath}` and
/// `{source}`; `{source}` expands to one argument per source file.
#[derive(Debug, Clone)]
pub struct JavaBuild {
    program: String,
    args: Vec<String>,
    classpath: Vec<String>,
    test_classpath: Vec<String>,
    timeout: Duration,
    runner: ProcessRunner,
}

impl JavaBuild {
    /// A compiler driven by `config`, run through `runner`.
    pub fn new(config: &BuildConfig, runner: ProcessRunner) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
            classpath: config.classpath.clone(),
            test_classpath: config.test_classpath.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            runner,
        }
    }

    /// Dependency classpath entries of the unit.
    pub fn classpath(&self) -> &[String] {
        &self.classpath
    }

    /// Classpath entries for compiling and running generated tests.
    pub fn test_classpath(&self) -> &[String] {
        &self.test_classpath
    }

    /// The compiler invocation for `sources`.
    pub fn command(&self, sources: &[PathBuf], classes: &Path, classpath: &[String]) -> ToolCommand {
        let classes_arg = classes.display().to_string();
        let classpath_arg = if classpath.is_empty() {
            classes_arg.clone()
        } else {
            join_classpath(classpath)
        };

        let mut args = Vec::with_capacity(self.args.len() + sources.len());
        for arg in &self.args {
            if arg == "{source}" {
                args.extend(sources.iter().map(|s| s.display().to_string()));
            } else {
                args.push(
                    arg.replace("{classes}", &classes_arg)
                        .replace("{classpath}", &classpath_arg),
                );
            }
        }
        ToolCommand::new(&self.program).args(args).timeout(self.timeout)
    }

    /// Compile `sources` into `classes` against `classpath`.
    pub async fn compile(
        &self,
        sources: &[PathBuf],
        classes: &Path,
        classpath: &[String],
    ) -> ProcessOutcome {
        if let Err(e) = tokio::fs::create_dir_all(classes).await {
            return ProcessOutcome::SpawnFailed(format!(
                "cannot create {}: {e}",
                classes.display()
            ));
        }
        tracing::debug!(
            sources = sources.len(),
            classes = %classes.display(),
            "Compiling"
        );
        self.runner
            .run(&self.command(sources, classes, classpath))
            .await
    }

    /// Extract the error count and error lines from compiler output.
    ///
    /// The trailing `N errors` summary wins over the counted lines.
    pub fn parse_errors(output: &str) -> (u32, Vec<String>) {
        let mut errors = Vec::new();
        let mut error_count: u32 = 0;

        for line in output.lines() {
            let trimmed = line.trim();
            if trimmed.contains(": error:") || trimmed.starts_with("error:") {
                errors.push(trimmed.to_string());
                error_count += 1;
            }
        }

        for line in output.lines().rev() {
            let trimmed = line.trim();
            if let Some(count) = trimmed
                .strip_suffix(" errors")
                .or_else(|| trimmed.strip_suffix(" error"))
                && let Ok(count) = count.parse::<u32>()
            {
                error_count = count;
                break;
            }
        }

        (error_count, errors)
    }
}

/// Join classpath entries with the platform separator.
pub fn join_classpath<S: AsRef<str>>(entries: &[S]) -> String {
    std::env::join_paths(entries.iter().map(AsRef::as_ref)).map_or_else(
        |_| {
            entries
                .iter()
                .map(AsRef::as_ref)
                .collect::<Vec<_>>()
                .join(":")
        },
        |joined| joined.to_string_lossy().into_owned(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::process::Cancellation;

    fn build() -> JavaBuild {
        JavaBuild::new(
            &BuildConfig::default(),
            ProcessRunner::new(Cancellation::never()),
        )
    }

    #[test]
    fn template_expands_placeholders() {
        let cmd = build().command(
            &[PathBuf::from("/w/src/A.java"), PathBuf::from("/w/src/B.java")],
            Path::new("/w/classes"),
            &["lib/a.jar".to_string(), "lib/b.jar".to_string()],
        );
        let cp = join_classpath(&["lib/a.jar", "lib/b.jar"]);
        assert_eq!(cmd.program, "javac");
        assert_eq!(
            cmd.args,
            vec![
                "-nowarn",
                "-d",
                "/w/classes",
                "-cp",
                cp.as_str(),
                "/w/src/A.java",
                "/w/src/B.java",
            ]
        );
        assert_eq!(cmd.timeout, Duration::from_secs(60));
    }

    #[test]
    fn empty_classpath_falls_back_to_classes_dir() {
        let cmd = build().command(&[PathBuf::from("A.java")], Path::new("out"), &[]);
        assert_eq!(cmd.args[4], "out");
    }

    #[test]
    fn parse_errors_prefers_summary_count() {
        let output = "A.java:3: error: cannot find symbol\n  Foo x;\nA.java:9: error: ';' expected\n2 errors\n";
        let (count, errors) = JavaBuild::parse_errors(output);
        assert_eq!(count, 2);
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("cannot find symbol"));

        let (count, _) = JavaBuild::parse_errors("A.java:1: error: x\n1 error");
        assert_eq!(count, 1);
    }

    #[cfg(unix)]
    #[test]
    fn classpath_uses_colon_on_unix() {
        assert_eq!(join_classpath(&["a.jar", "b"]), "a.jar:b");
    }
}
