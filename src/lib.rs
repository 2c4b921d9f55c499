//! expecto: scripted interaction with command-line programs
//!
//! expecto drives a child process the way a person at a terminal would: it
//! starts a command, waits until expected text shows up on stdout or stderr,
//! answers prompts by writing to stdin and finally asserts the exit code. It
//! is meant for automated tests of interactive programs.
//!
//! # Features
//!
//! - **Separate streams**: stdout and stderr are buffered and matched
//!   independently
//! - **Deadlines**: every wait is bounded by the session timeout (100 ms by
//!   default) and fails with the leftover output of both streams
//! - **Non-blocking**: output is read from non-blocking pipes and waits are
//!   multiplexed on the tokio reactor; no helper threads
//! - **Pluggable matching**: expectations take any [`Matcher`]; exact
//!   substring matching ships with the crate
//! - **Guaranteed teardown**: dropping a session kills the child and closes
//!   every handle
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use expecto::spawn;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), expecto::ExpectError> {
//!     spawn(r#"echo -n "First name: "; read fname; echo "Hello, $fname!""#)?
//!         .timeout_after_secs(1.0)?
//!         .expect("First name:")
//!         .await?
//!         .sendln("Bob")
//!         .await?
//!         .expect("Hello, Bob!")
//!         .await?
//!         .expect_exit_code(0)
//!         .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Matching semantics
//!
//! A successful expectation consumes the matched text **and everything before
//! it** on that stream. Output that was already buffered satisfies an
//! expectation immediately:
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), expecto::ExpectError> {
//! // both succeed from the same line of output
//! expecto::spawn("echo AZ")?.expect("A").await?.expect("Z").await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! Use [`SessionBuilder`] to choose the working directory, the environment and
//! the defaults:
//!
//! ```rust,no_run
//! use expecto::{EnvMode, Session};
//! use std::time::Duration;
//!
//! # fn example() -> Result<(), expecto::ExpectError> {
//! let session = Session::builder()
//!     .timeout(Duration::from_secs(1))
//!     .env("LANG", "C")
//!     .env_mode(EnvMode::Empty)
//!     .spawn("./bin/prompt")?;
//! # Ok(())
//! # }
//! ```
//!
//! `SessionBuilder::from_env()` additionally honours `EXPECTO_TIMEOUT_MS` and
//! `EXPECTO_POLL_INTERVAL_MS`.
//!
//! # Logging
//!
//! Spawning, expectations, exits and teardown are reported through
//! [`tracing`] at debug level, stream traffic at trace level. No subscriber is
//! installed by this crate.

#![warn(missing_docs)]

#[cfg(not(unix))]
compile_error!("expecto only supports Unix platforms");

mod buffer;
mod config;
mod pattern;
mod result;
mod session;

pub use buffer::{Buffer, Stream};
pub use config::ENV_PREFIX;
pub use pattern::{ExactMatcher, Matcher};
pub use result::ExpectError;
pub use session::{EnvMode, Session, SessionBuilder, DEFAULT_POLL_INTERVAL, DEFAULT_TIMEOUT};

/// Spawn `command` with the default configuration.
///
/// Shorthand for [`Session::spawn`].
pub fn spawn(command: &str) -> Result<Session, ExpectError> {
    Session::spawn(command)
}
