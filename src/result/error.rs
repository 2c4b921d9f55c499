//! Error types for expecto

use std::io;
use thiserror::Error;

/// Errors that can occur while driving a session.
///
/// Timed-out and unexpected-exit errors carry whatever was left unconsumed
/// in the stdout and stderr buffers at the moment of failure, which is
/// usually all that is needed to see why an expectation was not met.
///
/// # Examples
///
/// ```no_run
/// use expecto::{ExpectError, Session};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut session = Session::spawn("echo -n NAY")?;
///
/// match session.expect("YAY").await {
///     Ok(_) => println!("matched"),
///     Err(e @ ExpectError::TimedOut { .. }) => {
///         eprintln!("{e}");
///         eprintln!("--- STDOUT ---\n{}", e.remaining_in_stdout().unwrap_or_default());
///         eprintln!("--- STDERR ---\n{}", e.remaining_in_stderr().unwrap_or_default());
///     }
///     Err(e) => return Err(e.into()),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Error, Debug)]
pub enum ExpectError {
    /// Malformed input to a public call.
    ///
    /// Always detected before any I/O takes place.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The deadline passed before the expectation was met.
    ///
    /// Returned by expectations that did not see their text in time and by
    /// exit-code assertions on a process that did not terminate in time.
    #[error("{reason}")]
    TimedOut {
        /// What was being waited for
        reason: String,
        /// Unconsumed stdout contents at the time of failure
        stdout: String,
        /// Unconsumed stderr contents at the time of failure
        stderr: String,
    },

    /// The process exited with a different code than asserted.
    #[error("{}", unexpected_exit_message(.expected, .actual))]
    UnexpectedExitCode {
        /// The asserted code; `None` when any non-zero code was acceptable
        expected: Option<i32>,
        /// The code the process actually exited with
        actual: i32,
        /// Unconsumed stdout contents after the process exited
        stdout: String,
        /// Unconsumed stderr contents after the process exited
        stderr: String,
    },

    /// The readiness wait itself failed.
    ///
    /// This is an OS-level failure of the multiplexing primitive or of the
    /// child status query, not a deadline expiry.
    #[error("Stream select error: {0}")]
    Wait(#[source] io::Error),

    /// I/O error reading from or writing to one of the child's streams.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The command could not be started.
    #[error("Failed to spawn process: {0}")]
    Spawn(#[source] io::Error),

    /// A matcher reported more matched bytes than the buffer holds.
    ///
    /// This signals a defect in the [`Matcher`](crate::Matcher)
    /// implementation.
    #[error(
        "Matcher {matcher} could not have matched a string longer ({matched}) than the length of the buffer's contents ({available})"
    )]
    InvariantViolation {
        /// Description of the offending matcher
        matcher: String,
        /// Length the matcher reported
        matched: usize,
        /// Length of the buffer's contents
        available: usize,
    },
}

impl ExpectError {
    /// What remained in the stdout buffer when the error occurred.
    ///
    /// Only set for [`TimedOut`](Self::TimedOut) and
    /// [`UnexpectedExitCode`](Self::UnexpectedExitCode).
    pub fn remaining_in_stdout(&self) -> Option<&str> {
        match self {
            Self::TimedOut { stdout, .. } | Self::UnexpectedExitCode { stdout, .. } => {
                Some(stdout)
            }
            _ => None,
        }
    }

    /// What remained in the stderr buffer when the error occurred.
    ///
    /// Only set for [`TimedOut`](Self::TimedOut) and
    /// [`UnexpectedExitCode`](Self::UnexpectedExitCode).
    pub fn remaining_in_stderr(&self) -> Option<&str> {
        match self {
            Self::TimedOut { stderr, .. } | Self::UnexpectedExitCode { stderr, .. } => {
                Some(stderr)
            }
            _ => None,
        }
    }

    /// Whether this error is a deadline expiry.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::TimedOut { .. })
    }
}

fn unexpected_exit_message(expected: &Option<i32>, actual: &i32) -> String {
    match expected {
        Some(code) => format!(
            "Expected program to exit with exit code {code}, got exit code {actual}"
        ),
        None => format!(
            "Expected program to exit with a non-zero exit code, got exit code {actual}"
        ),
    }
}
