//! Bounded subprocess execution.
//!
//! Every external step of the pipeline (git queries, compilation, generator
//! runs, generated-test validation) goes through [`ProcessRunner::run`]. The
//! child is spawned in its own process group so that a timeout or a
//! cancellation kills the tool together with anything it forked.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, warn};

use super::cancel::Cancellation;

/// Grace period for draining pipes after the child exited.
const PIPE_DRAIN_GRACE: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// ToolCommand
// ---------------------------------------------------------------------------

/// A fully specified external invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    /// Executable name or path.
    pub program: String,
    /// Arguments.
    pub args: Vec<String>,
    /// Working directory.
    pub cwd: Option<PathBuf>,
    /// Extra environment variables.
    pub env: Vec<(String, String)>,
    /// Hard wall-clock limit.
    pub timeout: Duration,
}

impl ToolCommand {
    /// A command with no arguments and a 60 second timeout.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
            timeout: Duration::from_secs(60),
        }
    }

    /// Append one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the working directory.
    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Add an environment variable.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Set the timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Shell-like rendering for logs and diagnostics.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

// ---------------------------------------------------------------------------
// ProcessOutcome
// ---------------------------------------------------------------------------

/// Classified result of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// The process exited within its limit.
    Exited {
        /// Exit code (`None` when killed by a signal).
        code: Option<i32>,
        /// Captured standard output.
        stdout: String,
        /// Captured standard error.
        stderr: String,
        /// Wall-clock duration.
        elapsed: Duration,
    },
    /// The process exceeded its limit and was killed; output is discarded.
    TimedOut {
        /// The limit that was exceeded.
        limit: Duration,
    },
    /// The run was cancelled and the process was killed.
    Cancelled,
    /// The process could not be started.
    SpawnFailed(String),
}

impl ProcessOutcome {
    /// Exited with status 0.
    pub const fn succeeded(&self) -> bool {
        matches!(self, Self::Exited { code: Some(0), .. })
    }

    /// Standard output followed by standard error, for diagnostics.
    pub fn combined_output(&self) -> String {
        match self {
            Self::Exited { stdout, stderr, .. } => {
                let mut combined = String::new();
                if !stdout.trim().is_empty() {
                    combined.push_str(stdout.trim());
                }
                if !stderr.trim().is_empty() {
                    if !combined.is_empty() {
                        combined.push('\n');
                    }
                    combined.push_str(stderr.trim());
                }
                combined
            }
            Self::TimedOut { limit } => format!("timed out after {}s", limit.as_secs()),
            Self::Cancelled => "cancelled".to_string(),
            Self::SpawnFailed(message) => message.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// ProcessRunner
// ---------------------------------------------------------------------------

/// Executes [`ToolCommand`]s with timeout and cancellation.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    cancel: Cancellation,
}

impl ProcessRunner {
    /// A runner observing `cancel`.
    pub const fn new(cancel: Cancellation) -> Self {
        Self { cancel }
    }

    /// The cancellation signal this runner observes.
    pub const fn cancellation(&self) -> &Cancellation {
        &self.cancel
    }

    /// Run `command` to completion, timeout or cancellation.
    pub async fn run(&self, command: &ToolCommand) -> ProcessOutcome {
        if self.cancel.is_cancelled() {
            return ProcessOutcome::Cancelled;
        }

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &command.cwd {
            cmd.current_dir(dir);
        }
        for (key, value) in &command.env {
            cmd.env(key, value);
        }
        #[cfg(unix)]
        cmd.process_group(0);

        debug!(command = %command.display(), timeout_secs = command.timeout.as_secs(), "Spawning tool");

        let started = Instant::now();
        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                return ProcessOutcome::SpawnFailed(format!(
                    "failed to spawn '{}': {e}",
                    command.program
                ));
            }
        };
        let _group = ProcessGroupGuard::new(child.id());

        let stdout_task = tokio::spawn(read_pipe(child.stdout.take()));
        let stderr_task = tokio::spawn(read_pipe(child.stderr.take()));

        let race = tokio::select! {
            biased;
            () = self.cancel.cancelled() => Race::Cancelled,
            status = child.wait() => Race::Exited(status),
            () = tokio::time::sleep(command.timeout) => Race::TimedOut,
        };

        let elapsed = started.elapsed();
        match race {
            Race::Exited(Ok(status)) if elapsed <= command.timeout => {
                let (stdout, stderr) = drain(stdout_task, stderr_task).await;
                ProcessOutcome::Exited {
                    code: exit_code(status),
                    stdout,
                    stderr,
                    elapsed,
                }
            }
            Race::Exited(Ok(_)) | Race::TimedOut => {
                warn!(command = %command.display(), limit_secs = command.timeout.as_secs(), "Tool exceeded its time budget; killing process group");
                terminate(&mut child, stdout_task, stderr_task).await;
                ProcessOutcome::TimedOut {
                    limit: command.timeout,
                }
            }
            Race::Cancelled => {
                debug!(command = %command.display(), "Run cancelled; killing process group");
                terminate(&mut child, stdout_task, stderr_task).await;
                ProcessOutcome::Cancelled
            }
            Race::Exited(Err(e)) => {
                terminate(&mut child, stdout_task, stderr_task).await;
                ProcessOutcome::SpawnFailed(format!(
                    "failed waiting for '{}': {e}",
                    command.program
                ))
            }
        }
    }
}

enum Race {
    Exited(std::io::Result<ExitStatus>),
    TimedOut,
    Cancelled,
}

type PipeTask = tokio::task::JoinHandle<String>;

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>) -> String {
    let Some(mut pipe) = pipe else {
        return String::new();
    };
    let mut buf = Vec::new();
    let _ = pipe.read_to_end(&mut buf).await;
    String::from_utf8_lossy(&buf).into_owned()
}

async fn drain(stdout: PipeTask, stderr: PipeTask) -> (String, String) {
    let joined = tokio::time::timeout(PIPE_DRAIN_GRACE, futures::future::join(stdout, stderr)).await;
    match joined {
        Ok((out, err)) => (out.unwrap_or_default(), err.unwrap_or_default()),
        Err(_) => (String::new(), String::new()),
    }
}

async fn terminate(child: &mut tokio::process::Child, stdout: PipeTask, stderr: PipeTask) {
    #[cfg(unix)]
    kill_group(child.id());
    let _ = child.kill().await;
    stdout.abort();
    stderr.abort();
}

fn exit_code(status: ExitStatus) -> Option<i32> {
    status.code()
}

/// Kills the child's whole process group when dropped.
struct ProcessGroupGuard {
    #[cfg_attr(not(unix), allow(dead_code))]
    pgid: Option<u32>,
}

impl ProcessGroupGuard {
    const fn new(pgid: Option<u32>) -> Self {
        Self { pgid }
    }
}

impl Drop for ProcessGroupGuard {
    fn drop(&mut self) {
        #[cfg(unix)]
        kill_group(self.pgid);
    }
}

#[cfg(unix)]
fn kill_group(pgid: Option<u32>) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    if let Some(raw) = pgid.and_then(|id| i32::try_from(id).ok()) {
        // ESRCH just means the group is already gone.
        let _ = killpg(Pid::from_raw(raw), Signal::SIGKILL);
    }
}
