//! Session management for pipe-based process automation

mod builder;

pub use builder::{EnvMode, SessionBuilder, DEFAULT_POLL_INTERVAL, DEFAULT_TIMEOUT};

use crate::buffer::{Buffer, Stream};
use crate::pattern::{ExactMatcher, Matcher};
use crate::result::ExpectError;
use std::io;
use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin};
use tokio::time::{self, Instant};
use tracing::{debug, trace};

/// How long [`Session::terminate`] waits for a killed process to be reaped.
const REAP_TIMEOUT: Duration = Duration::from_secs(1);

/// A running child process under scripted control.
///
/// A session owns the child, one [`Buffer`] per output stream and the
/// child's stdin. Expectations block until their text shows up on the chosen
/// stream or the session timeout expires; input is sent in between to answer
/// prompts; finally the exit code is asserted.
///
/// Ordering is per stream: an `expect` on stdout and an `expect_error` on
/// stderr can be satisfied in either order regardless of the order the child
/// wrote them in.
///
/// Dropping the session closes stdin, releases both output streams and kills
/// the child if it is still running. Use [`terminate`](Self::terminate) to do
/// the same and also reap the process.
///
/// # Examples
///
/// ```no_run
/// use expecto::Session;
///
/// # async fn example() -> Result<(), expecto::ExpectError> {
/// let mut session = Session::spawn(r#"echo -n " > "; read name; echo "Hello, $name!""#)?;
///
/// session
///     .expect(" > ")
///     .await?
///     .sendln("Bob")
///     .await?
///     .expect("Hello, Bob!")
///     .await?
///     .expect_exit_code(0)
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct Session {
    child: Child,
    stdin: Option<ChildStdin>,
    buffers: [Buffer; 2],
    timeout: Duration,
    poll_interval: Duration,
    line_ending: Vec<u8>,
    terminated: bool,
}

impl Session {
    /// Create a new session builder.
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    /// Spawn a command with the default configuration.
    ///
    /// This is a shorthand for `Session::builder().spawn(command)`.
    pub fn spawn(command: &str) -> Result<Self, ExpectError> {
        SessionBuilder::new().spawn(command)
    }

    /// The timeout applied to subsequent waits.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Change the timeout for all subsequent waits.
    ///
    /// # Errors
    ///
    /// [`ExpectError::InvalidArgument`] if `timeout` is zero.
    pub fn timeout_after(&mut self, timeout: Duration) -> Result<&mut Self, ExpectError> {
        if timeout.is_zero() {
            return Err(ExpectError::InvalidArgument(
                "Expected time-out to be greater than zero, got 0 seconds".to_string(),
            ));
        }
        self.timeout = timeout;
        Ok(self)
    }

    /// Change the timeout for all subsequent waits, in seconds.
    ///
    /// # Errors
    ///
    /// [`ExpectError::InvalidArgument`] unless `seconds` is finite and
    /// greater than zero.
    pub fn timeout_after_secs(&mut self, seconds: f64) -> Result<&mut Self, ExpectError> {
        let timeout = Duration::try_from_secs_f64(seconds)
            .ok()
            .filter(|timeout| !timeout.is_zero())
            .ok_or_else(|| {
                ExpectError::InvalidArgument(format!(
                    "Expected time-out to be greater than zero, got {seconds} seconds"
                ))
            })?;
        self.timeout_after(timeout)
    }

    /// Wait until `text` appears on stdout.
    ///
    /// Everything up to and including the first occurrence is consumed, so
    /// later expectations only see what followed it.
    ///
    /// # Errors
    ///
    /// - [`ExpectError::InvalidArgument`] if `text` is empty
    /// - [`ExpectError::TimedOut`] if the timeout expires first
    pub async fn expect(&mut self, text: &str) -> Result<&mut Self, ExpectError> {
        let matcher = ExactMatcher::new(text)?;
        self.expect_on(Stream::Stdout, &matcher).await
    }

    /// Wait until `text` appears on stderr.
    ///
    /// See [`expect`](Self::expect).
    pub async fn expect_error(&mut self, text: &str) -> Result<&mut Self, ExpectError> {
        let matcher = ExactMatcher::new(text)?;
        self.expect_on(Stream::Stderr, &matcher).await
    }

    /// Wait until `matcher` matches the output of `stream`.
    pub async fn expect_on(
        &mut self,
        stream: Stream,
        matcher: &dyn Matcher,
    ) -> Result<&mut Self, ExpectError> {
        let timeout = self.timeout;
        self.await_match(stream, matcher, timeout).await?;
        Ok(self)
    }

    /// Like [`expect_on`](Self::expect_on), with a timeout for this call
    /// only.
    ///
    /// # Errors
    ///
    /// [`ExpectError::InvalidArgument`] if `timeout` is zero, otherwise as
    /// [`expect`](Self::expect).
    pub async fn expect_within(
        &mut self,
        stream: Stream,
        matcher: &dyn Matcher,
        timeout: Duration,
    ) -> Result<&mut Self, ExpectError> {
        if timeout.is_zero() {
            return Err(ExpectError::InvalidArgument(
                "Expected time-out to be greater than zero, got 0 seconds".to_string(),
            ));
        }
        self.await_match(stream, matcher, timeout).await?;
        Ok(self)
    }

    async fn await_match(
        &mut self,
        stream: Stream,
        matcher: &dyn Matcher,
        timeout: Duration,
    ) -> Result<(), ExpectError> {
        let deadline = Instant::now() + timeout;

        loop {
            self.drain()?;

            // Output buffered by an earlier call satisfies this one without
            // waiting.
            if self.buffers[stream.index()].match_and_drop(matcher)? {
                debug!(%stream, %matcher, "expectation met");
                return Ok(());
            }

            if Instant::now() >= deadline {
                debug!(%stream, %matcher, ?timeout, "expectation timed out");
                return Err(self.timed_out(format!(
                    "Stream \"{stream}\" did not output expected {matcher} within {:.3} seconds",
                    timeout.as_secs_f64()
                )));
            }

            self.wait_readable(deadline).await?;
        }
    }

    /// Write `data` to the child's stdin.
    ///
    /// # Errors
    ///
    /// [`ExpectError::Io`] if stdin is closed or the write fails.
    pub async fn send(&mut self, data: impl AsRef<[u8]>) -> Result<&mut Self, ExpectError> {
        let data = data.as_ref();
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "stdin is closed"))?;

        stdin.write_all(data).await?;
        stdin.flush().await?;
        trace!(bytes = data.len(), "sent input");

        Ok(self)
    }

    /// Write `line` followed by the line terminator to the child's stdin.
    pub async fn sendln(&mut self, line: &str) -> Result<&mut Self, ExpectError> {
        let mut data = Vec::with_capacity(line.len() + self.line_ending.len());
        data.extend_from_slice(line.as_bytes());
        data.extend_from_slice(&self.line_ending);
        self.send(data).await
    }

    /// Wait for the process to exit and assert its exit code.
    ///
    /// Both output streams keep being drained while waiting, so a child
    /// blocked on a full stderr pipe still gets to exit. A process killed by
    /// a signal reports `128 + signal`.
    ///
    /// # Errors
    ///
    /// - [`ExpectError::UnexpectedExitCode`] if it exits with another code
    /// - [`ExpectError::TimedOut`] if it is still running when the timeout
    ///   expires; the process is then considered hung and is killed
    pub async fn expect_exit_code(&mut self, code: i32) -> Result<&mut Self, ExpectError> {
        let actual = self.await_exit().await?;
        if actual != code {
            return Err(self.unexpected_exit(Some(code), actual));
        }
        Ok(self)
    }

    /// Wait for the process to exit with code 0.
    pub async fn expect_success(&mut self) -> Result<&mut Self, ExpectError> {
        self.expect_exit_code(0).await
    }

    /// Wait for the process to exit with any non-zero code.
    pub async fn expect_failure(&mut self) -> Result<&mut Self, ExpectError> {
        let actual = self.await_exit().await?;
        if actual == 0 {
            return Err(self.unexpected_exit(None, actual));
        }
        Ok(self)
    }

    // Exit is observed through the child's exit notification, but the loop
    // still re-polls at most every `poll_interval`: termination is not always
    // visible as stream readiness.
    async fn await_exit(&mut self) -> Result<i32, ExpectError> {
        let timeout = self.timeout;
        let deadline = Instant::now() + timeout;

        loop {
            self.drain()?;

            if let Some(status) = self.child.try_wait().map_err(ExpectError::Wait)? {
                self.drain()?;
                let code = exit_code(status);
                debug!(code, "process exited");
                return Ok(code);
            }

            let now = Instant::now();
            if now >= deadline {
                debug!(?timeout, "process did not terminate in time");
                self.shutdown();
                return Err(self.timed_out(format!(
                    "Program did not terminate within {:.3} seconds",
                    timeout.as_secs_f64()
                )));
            }

            let poll = (deadline - now).min(self.poll_interval);
            let [stdout, stderr] = &self.buffers;
            tokio::select! {
                status = self.child.wait() => {
                    status.map_err(ExpectError::Wait)?;
                }
                ready = stdout.readable() => ready.map_err(ExpectError::Wait)?,
                ready = stderr.readable() => ready.map_err(ExpectError::Wait)?,
                () = time::sleep(poll) => {}
            }
        }
    }

    /// What is left unconsumed in the buffer of `stream`.
    pub fn remaining(&self, stream: Stream) -> &[u8] {
        self.buffers[stream.index()].contents()
    }

    /// OS process id, or `None` once the process has been reaped.
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Whether the process is still running.
    ///
    /// A failed status query counts as not running.
    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Whether stdin and both output streams have been released.
    pub fn is_closed(&self) -> bool {
        self.stdin.is_none() && self.buffers.iter().all(Buffer::is_closed)
    }

    /// Close every handle, kill the process if it is still running and reap
    /// it.
    ///
    /// Safe to call more than once; never fails. The same teardown, minus the
    /// reaping, runs when the session is dropped.
    pub async fn terminate(&mut self) {
        self.shutdown();
        match time::timeout(REAP_TIMEOUT, self.child.wait()).await {
            Ok(Ok(status)) => debug!(code = exit_code(status), "process reaped"),
            Ok(Err(e)) => debug!(error = %e, "failed to reap process"),
            Err(_) => debug!("process not reaped after kill"),
        }
    }

    fn drain(&mut self) -> Result<(), ExpectError> {
        for stream in Stream::ALL {
            let read = self.buffers[stream.index()].read()?;
            if read > 0 {
                trace!(%stream, bytes = read, "drained output");
            }
        }
        Ok(())
    }

    async fn wait_readable(&self, deadline: Instant) -> Result<(), ExpectError> {
        let [stdout, stderr] = &self.buffers;
        tokio::select! {
            ready = stdout.readable() => ready.map_err(ExpectError::Wait),
            ready = stderr.readable() => ready.map_err(ExpectError::Wait),
            () = time::sleep_until(deadline) => Ok(()),
        }
    }

    fn timed_out(&self, reason: String) -> ExpectError {
        ExpectError::TimedOut {
            reason,
            stdout: self.buffers[Stream::Stdout.index()].contents_lossy(),
            stderr: self.buffers[Stream::Stderr.index()].contents_lossy(),
        }
    }

    fn unexpected_exit(&self, expected: Option<i32>, actual: i32) -> ExpectError {
        ExpectError::UnexpectedExitCode {
            expected,
            actual,
            stdout: self.buffers[Stream::Stdout.index()].contents_lossy(),
            stderr: self.buffers[Stream::Stderr.index()].contents_lossy(),
        }
    }

    // Closes stdin first so the child sees EOF rather than racing a write
    // error, then always attempts the kill.
    fn shutdown(&mut self) {
        if self.terminated {
            return;
        }
        self.terminated = true;

        drop(self.stdin.take());
        for buffer in &mut self.buffers {
            buffer.close();
        }

        if !matches!(self.child.try_wait(), Ok(Some(_))) {
            if let Err(e) = self.child.start_kill() {
                debug!(error = %e, "failed to kill process");
            }
        }
        debug!(pid = ?self.child.id(), "session terminated");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("pid", &self.child.id())
            .field("stdout", &self.buffers[Stream::Stdout.index()])
            .field("stderr", &self.buffers[Stream::Stderr.index()])
            .field("timeout", &self.timeout)
            .field("terminated", &self.terminated)
            .finish()
    }
}

fn exit_code(status: ExitStatus) -> i32 {
    status
        .code()
        .or_else(|| status.signal().map(|signal| 128 + signal))
        .unwrap_or(-1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_from_signal() {
        let status = ExitStatus::from_raw(9);
        assert_eq!(exit_code(status), 137);
    }

    #[test]
    fn test_exit_code_from_code() {
        let status = ExitStatus::from_raw(2 << 8);
        assert_eq!(exit_code(status), 2);
    }

    #[tokio::test]
    async fn test_timeout_after_rejects_non_positive() {
        let mut session = Session::spawn("true").unwrap();
        assert!(matches!(
            session.timeout_after(Duration::ZERO),
            Err(ExpectError::InvalidArgument(_))
        ));
        for seconds in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                session.timeout_after_secs(seconds),
                Err(ExpectError::InvalidArgument(_))
            ));
        }
        assert_eq!(session.timeout(), DEFAULT_TIMEOUT);

        session.timeout_after_secs(0.25).unwrap();
        assert_eq!(session.timeout(), Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent() {
        let mut session = Session::spawn("sleep 5").unwrap();
        session.shutdown();
        session.shutdown();
        assert!(session.is_closed());
        session.terminate().await;
        assert!(!session.is_running());
    }

    #[tokio::test]
    async fn test_send_after_shutdown_is_broken_pipe() {
        let mut session = Session::spawn("cat").unwrap();
        session.shutdown();
        match session.send("late").await {
            Err(ExpectError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::BrokenPipe),
            Err(e) => panic!("unexpected error: {e}"),
            Ok(_) => panic!("send should fail after shutdown"),
        }
    }

    #[tokio::test]
    async fn test_debug_shows_buffers() {
        let mut session = Session::spawn("echo -n hi").unwrap();
        session.expect_exit_code(0).await.unwrap();
        let debug = format!("{session:?}");
        assert!(debug.contains("hi"));
    }
}
