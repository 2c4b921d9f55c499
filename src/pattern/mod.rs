//! Pattern matching for expect operations

mod exact;

pub use exact::ExactMatcher;

use std::fmt;

/// Strategy deciding how much of a buffer an expectation consumes.
///
/// A matcher scans the accumulated, not-yet-consumed output of a stream and
/// reports how many leading bytes should be discarded because a match
/// occurred within them. Zero means "no match"; the buffer is then left
/// untouched and the session keeps waiting for more output.
///
/// Implementations must be pure: the same input always yields the same
/// answer, because the session calls `match_len` again every time new bytes
/// arrive. The reported length must never exceed `content.len()`; a matcher
/// that does so is reported as [`ExpectError::InvariantViolation`].
///
/// The [`Display`](fmt::Display) output is used in diagnostics.
///
/// # Examples
///
/// A matcher that consumes everything up to and including the first
/// newline:
///
/// ```
/// use expecto::Matcher;
/// use std::fmt;
///
/// struct Line;
///
/// impl fmt::Display for Line {
///     fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
///         f.write_str("Line")
///     }
/// }
///
/// impl Matcher for Line {
///     fn match_len(&self, content: &[u8]) -> usize {
///         content.iter().position(|&b| b == b'\n').map_or(0, |pos| pos + 1)
///     }
/// }
///
/// assert_eq!(Line.match_len(b"one\ntwo"), 4);
/// assert_eq!(Line.match_len(b"partial"), 0);
/// ```
///
/// [`ExpectError::InvariantViolation`]: crate::ExpectError::InvariantViolation
pub trait Matcher: fmt::Display + Send + Sync {
    /// Number of leading bytes of `content` consumed by a match, or 0.
    fn match_len(&self, content: &[u8]) -> usize;
}
