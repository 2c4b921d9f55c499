//! Buffer management for process output

use crate::pattern::Matcher;
use crate::result::ExpectError;
use bytes::{Buf, BytesMut};
use rustix::fs::{fcntl_setfl, OFlags};
use rustix::io::Errno;
use std::fmt;
use std::io;
use std::os::fd::OwnedFd;
use tokio::io::unix::AsyncFd;

/// Size of a single non-blocking read.
const READ_CHUNK_SIZE: usize = 4096;

/// One of the two output streams of a child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    /// The child's standard output
    Stdout,
    /// The child's standard error
    Stderr,
}

impl Stream {
    pub(crate) const ALL: [Stream; 2] = [Stream::Stdout, Stream::Stderr];

    pub(crate) fn index(self) -> usize {
        match self {
            Stream::Stdout => 0,
            Stream::Stderr => 1,
        }
    }
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stream::Stdout => f.write_str("stdout"),
            Stream::Stderr => f.write_str("stderr"),
        }
    }
}

/// Accumulates the output of one stream until an expectation consumes it.
///
/// The buffer exclusively owns the read end of the stream. Reads never
/// block: [`read`](Self::read) drains whatever is immediately available and
/// returns. Waiting for more data is done separately through
/// [`readable`](Self::readable), so the session can bound every wait by its
/// deadline.
pub struct Buffer {
    stream: Option<AsyncFd<OwnedFd>>,
    contents: BytesMut,
    eof: bool,
}

impl Buffer {
    /// Take ownership of `fd`, switch it to non-blocking mode and register
    /// it with the tokio reactor.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(fd: OwnedFd) -> io::Result<Self> {
        fcntl_setfl(&fd, OFlags::NONBLOCK).map_err(io::Error::from)?;
        let stream = AsyncFd::new(fd)?;

        Ok(Self {
            stream: Some(stream),
            contents: BytesMut::with_capacity(READ_CHUNK_SIZE),
            eof: false,
        })
    }

    /// Drain every byte that is currently available without blocking.
    ///
    /// Returns the number of bytes appended. Stops when the stream reports
    /// that nothing is ready, or at end of file. A closed buffer reads
    /// nothing.
    pub fn read(&mut self) -> io::Result<usize> {
        let Some(stream) = &self.stream else {
            return Ok(0);
        };
        if self.eof {
            return Ok(0);
        }

        let mut chunk = [0u8; READ_CHUNK_SIZE];
        let mut total = 0;
        loop {
            match rustix::io::read(stream.get_ref(), &mut chunk[..]) {
                Ok(0) => {
                    self.eof = true;
                    break;
                }
                Ok(n) => {
                    self.contents.extend_from_slice(&chunk[..n]);
                    total += n;
                }
                Err(Errno::AGAIN) => break,
                Err(Errno::INTR) => continue,
                Err(e) => return Err(io::Error::from(e)),
            }
        }

        Ok(total)
    }

    /// Apply `matcher` to the contents and drop everything it consumed.
    ///
    /// On a match the buffer keeps only the suffix after the matched
    /// length; that includes dropping any unrelated output that preceded
    /// the matched text. Returns `false` and leaves the contents untouched
    /// when nothing matched.
    ///
    /// # Errors
    ///
    /// [`ExpectError::InvariantViolation`] if the matcher claims more bytes
    /// than the buffer holds. The contents are left untouched.
    pub fn match_and_drop(&mut self, matcher: &dyn Matcher) -> Result<bool, ExpectError> {
        let matched = matcher.match_len(&self.contents);
        let available = self.contents.len();

        if matched > available {
            return Err(ExpectError::InvariantViolation {
                matcher: matcher.to_string(),
                matched,
                available,
            });
        }

        self.contents.advance(matched);
        Ok(matched > 0)
    }

    /// Release the stream handle. Accumulated contents stay available.
    pub fn close(&mut self) {
        self.stream = None;
    }

    /// Whether the handle has been released.
    pub fn is_closed(&self) -> bool {
        self.stream.is_none()
    }

    /// Whether the writing side has been closed and everything was read.
    pub fn is_eof(&self) -> bool {
        self.eof
    }

    /// The bytes accumulated and not yet consumed by a match.
    pub fn contents(&self) -> &[u8] {
        &self.contents
    }

    /// The contents as text, with invalid UTF-8 replaced.
    pub fn contents_lossy(&self) -> String {
        String::from_utf8_lossy(&self.contents).into_owned()
    }

    /// Wait until the stream may have data to read.
    ///
    /// Never resolves once the stream is at end of file or closed: no more
    /// bytes can arrive, so callers bound this wait with their own deadline.
    pub async fn readable(&self) -> io::Result<()> {
        match &self.stream {
            Some(stream) if !self.eof => {
                let mut guard = stream.readable().await?;
                // the next read() drains
                guard.clear_ready();
                Ok(())
            }
            _ => std::future::pending().await,
        }
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("contents", &String::from_utf8_lossy(&self.contents))
            .field("eof", &self.eof)
            .field("closed", &self.is_closed())
            .finish()
    }
}
