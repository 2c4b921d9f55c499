//! Session builder for configuration

use crate::buffer::Buffer;
use crate::config;
use crate::result::ExpectError;
use crate::session::Session;
use std::collections::BTreeMap;
use std::io;
use std::os::fd::OwnedFd;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Default timeout for expectations (100 ms)
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(100);

/// Default, and recommended maximum, interval between process status polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Line terminator appended by [`Session::sendln`] unless configured otherwise
const DEFAULT_LINE_ENDING: &str = "\n";

/// How the child's environment is assembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnvMode {
    /// Start from the current process's environment and apply the
    /// configured variables on top.
    #[default]
    Inherit,
    /// Start from an empty environment; the child only sees the configured
    /// variables.
    Empty,
}

/// Builder for configuring and spawning sessions.
///
/// # Defaults
///
/// - Timeout: 100 milliseconds
/// - Exit status poll interval: 100 milliseconds
/// - Working directory: the current directory
/// - Environment: inherited
/// - Line ending for `sendln`: `"\n"`
///
/// # Examples
///
/// ```no_run
/// use expecto::{EnvMode, Session};
/// use std::time::Duration;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let session = Session::builder()
///     .timeout(Duration::from_secs(1))
///     .current_dir("/tmp")
///     .env("SHELL_INTERACTIVE", "true")
///     .env_mode(EnvMode::Inherit)
///     .spawn("./bin/console interview")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SessionBuilder {
    timeout: Duration,
    poll_interval: Duration,
    current_dir: Option<PathBuf>,
    env: BTreeMap<String, String>,
    env_mode: EnvMode,
    line_ending: String,
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionBuilder {
    /// Create a new session builder with default configuration.
    ///
    /// See the [`SessionBuilder`] documentation for default values.
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            current_dir: None,
            env: BTreeMap::new(),
            env_mode: EnvMode::default(),
            line_ending: DEFAULT_LINE_ENDING.to_string(),
        }
    }

    /// Create a builder whose defaults may be overridden from the
    /// environment.
    ///
    /// Reads `EXPECTO_TIMEOUT_MS` and `EXPECTO_POLL_INTERVAL_MS` (whole
    /// milliseconds). Missing, zero or unparsable values keep the built-in
    /// defaults. Explicit builder calls made afterwards still win.
    pub fn from_env() -> Self {
        let mut builder = Self::new();
        if let Some(timeout) = config::duration_ms(config::TIMEOUT_MS) {
            builder.timeout = timeout;
        }
        if let Some(interval) = config::duration_ms(config::POLL_INTERVAL_MS) {
            builder.poll_interval = interval;
        }
        builder
    }

    /// Set the timeout for expectations and exit-code assertions.
    ///
    /// Can be changed later on the session with
    /// [`Session::timeout_after`]. Must be greater than zero; this is
    /// checked by [`spawn`](Self::spawn).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set how often the process status is re-polled while waiting for it
    /// to exit and no output arrives.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Run the command in `dir` instead of the current directory.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Set one environment variable for the child.
    pub fn env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(name.into(), value.into());
        self
    }

    /// Set several environment variables for the child.
    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Choose whether the child inherits the current environment.
    pub fn env_mode(mut self, mode: EnvMode) -> Self {
        self.env_mode = mode;
        self
    }

    /// Set the terminator [`Session::sendln`] appends.
    pub fn line_ending(mut self, ending: impl Into<String>) -> Self {
        self.line_ending = ending.into();
        self
    }

    /// Spawn `command` through `sh -c` and return a session attached to it.
    ///
    /// stdout and stderr are connected to separate pipes whose read ends are
    /// non-blocking. Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`ExpectError::InvalidArgument`] for a blank command, a zero
    ///   timeout or poll interval, an empty working directory, or a
    ///   malformed environment variable
    /// - [`ExpectError::Spawn`] if the pipes or the process cannot be
    ///   created
    pub fn spawn(self, command: &str) -> Result<Session, ExpectError> {
        self.validate(command)?;

        let (stdout_reader, stdout_writer) = io::pipe().map_err(ExpectError::Spawn)?;
        let (stderr_reader, stderr_writer) = io::pipe().map_err(ExpectError::Spawn)?;

        let mut cmd = Command::new("/bin/sh");
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::piped())
            .stdout(stdout_writer)
            .stderr(stderr_writer)
            .kill_on_drop(true);

        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }
        if self.env_mode == EnvMode::Empty {
            cmd.env_clear();
        }
        cmd.envs(&self.env);

        let spawned = cmd.spawn();
        // The command still holds the write ends; EOF is only seen once the
        // child alone owns them.
        drop(cmd);
        let mut child = spawned.map_err(ExpectError::Spawn)?;

        debug!(command, pid = ?child.id(), "spawned process");

        let stdin = child.stdin.take();
        let buffers = [
            Buffer::new(OwnedFd::from(stdout_reader)).map_err(ExpectError::Spawn)?,
            Buffer::new(OwnedFd::from(stderr_reader)).map_err(ExpectError::Spawn)?,
        ];

        Ok(Session {
            child,
            stdin,
            buffers,
            timeout: self.timeout,
            poll_interval: self.poll_interval,
            line_ending: self.line_ending.into_bytes(),
            terminated: false,
        })
    }

    fn validate(&self, command: &str) -> Result<(), ExpectError> {
        if command.trim().is_empty() {
            return Err(invalid("Command ought to be a non-empty string"));
        }
        if self.timeout.is_zero() {
            return Err(invalid("Expected time-out to be greater than zero"));
        }
        if self.poll_interval.is_zero() {
            return Err(invalid("Expected poll interval to be greater than zero"));
        }
        if let Some(dir) = &self.current_dir {
            if dir.as_os_str().is_empty() {
                return Err(invalid("Working directory ought to be a non-empty path"));
            }
        }
        for (name, value) in &self.env {
            if name.is_empty() || name.contains('=') || name.contains('\0') {
                return Err(ExpectError::InvalidArgument(format!(
                    "Environment variable ought to be a non-empty string without '=' or NUL, got \"{name}\""
                )));
            }
            if value.contains('\0') {
                return Err(ExpectError::InvalidArgument(format!(
                    "Environment variable value of \"{name}\" ought not to contain NUL"
                )));
            }
        }
        Ok(())
    }
}

fn invalid(message: &str) -> ExpectError {
    ExpectError::InvalidArgument(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_invalid(result: Result<Session, ExpectError>) {
        match result {
            Err(ExpectError::InvalidArgument(_)) => {}
            Err(e) => panic!("expected invalid argument, got {e}"),
            Ok(_) => panic!("expected invalid argument, got a session"),
        }
    }

    #[test]
    fn test_defaults() {
        let builder = SessionBuilder::new();
        assert_eq!(builder.timeout, DEFAULT_TIMEOUT);
        assert_eq!(builder.poll_interval, DEFAULT_POLL_INTERVAL);
        assert_eq!(builder.env_mode, EnvMode::Inherit);
        assert!(builder.current_dir.is_none());
        assert!(builder.env.is_empty());
        assert_eq!(builder.line_ending, "\n");
    }

    #[test]
    fn test_envs_extend() {
        let builder = SessionBuilder::new()
            .env("A", "1")
            .envs([("B", "2"), ("A", "3")]);
        assert_eq!(builder.env.get("A").map(String::as_str), Some("3"));
        assert_eq!(builder.env.get("B").map(String::as_str), Some("2"));
    }

    // Validation happens before any pipe or process is created, so these
    // do not need a runtime.
    #[test]
    fn test_blank_command_rejected() {
        assert_invalid(SessionBuilder::new().spawn("   "));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        assert_invalid(SessionBuilder::new().timeout(Duration::ZERO).spawn("true"));
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        assert_invalid(
            SessionBuilder::new()
                .poll_interval(Duration::ZERO)
                .spawn("true"),
        );
    }

    #[test]
    fn test_empty_working_directory_rejected() {
        assert_invalid(SessionBuilder::new().current_dir("").spawn("true"));
    }

    #[test]
    fn test_malformed_env_rejected() {
        assert_invalid(SessionBuilder::new().env("", "x").spawn("true"));
        assert_invalid(SessionBuilder::new().env("A=B", "x").spawn("true"));
        assert_invalid(SessionBuilder::new().env("A", "x\0y").spawn("true"));
    }

    #[tokio::test]
    async fn test_spawn_missing_directory() {
        let result = SessionBuilder::new()
            .current_dir("/nonexistent/expecto/dir")
            .spawn("true");
        assert!(matches!(result, Err(ExpectError::Spawn(_))));
    }
}
