//! Exact substring matcher

use super::Matcher;
use crate::result::ExpectError;
use std::fmt;

/// Exact substring matcher using the Boyer-Moore-Horspool algorithm.
///
/// Reports the offset of the first occurrence of the target plus the
/// target's length, so a successful match consumes the target and all
/// output that preceded it.
///
/// ```
/// use expecto::{ExactMatcher, Matcher};
///
/// let matcher = ExactMatcher::new("YAY").unwrap();
/// // "noise-YAY-" is consumed, "-rest" remains
/// assert_eq!(matcher.match_len(b"noise-YAY-rest"), 9);
/// assert_eq!(matcher.match_len(b"nothing here"), 0);
/// ```
#[derive(Clone)]
pub struct ExactMatcher {
    pattern: Vec<u8>,
    bad_char_table: [usize; 256],
}

impl ExactMatcher {
    /// Create a new exact matcher.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectError::InvalidArgument`] if `pattern` is empty.
    pub fn new(pattern: impl Into<Vec<u8>>) -> Result<Self, ExpectError> {
        let pattern = pattern.into();

        if pattern.is_empty() {
            return Err(ExpectError::InvalidArgument(
                "String to match ought to be a non-empty string".to_string(),
            ));
        }

        let mut bad_char_table = [pattern.len(); 256];
        for (i, &byte) in pattern.iter().enumerate().take(pattern.len() - 1) {
            bad_char_table[byte as usize] = pattern.len() - 1 - i;
        }

        Ok(Self {
            pattern,
            bad_char_table,
        })
    }

    /// The bytes this matcher looks for.
    pub fn target(&self) -> &[u8] {
        &self.pattern
    }

    fn find(&self, haystack: &[u8]) -> Option<usize> {
        let len = self.pattern.len();
        let mut pos = 0;
        while pos + len <= haystack.len() {
            if haystack[pos..pos + len] == self.pattern[..] {
                return Some(pos);
            }

            let shift_char = haystack[pos + len - 1];
            pos += self.bad_char_table[shift_char as usize];
        }

        None
    }
}

impl Matcher for ExactMatcher {
    fn match_len(&self, content: &[u8]) -> usize {
        self.find(content).map_or(0, |pos| pos + self.pattern.len())
    }
}

impl fmt::Display for ExactMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExactMatcher<{}>", String::from_utf8_lossy(&self.pattern))
    }
}

impl fmt::Debug for ExactMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExactMatcher")
            .field("pattern", &String::from_utf8_lossy(&self.pattern))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_match_consumes_prefix_and_target() {
        let matcher = ExactMatcher::new("YAY").unwrap();
        assert_eq!(matcher.match_len(b"noise-YAY-rest"), 9);
    }

    #[test]
    fn test_match_at_start() {
        let matcher = ExactMatcher::new("start").unwrap();
        assert_eq!(matcher.match_len(b"start of the line"), 5);
    }

    #[test]
    fn test_match_at_end() {
        let matcher = ExactMatcher::new("end").unwrap();
        assert_eq!(matcher.match_len(b"this is the end"), 15);
    }

    #[test]
    fn test_match_whole_buffer() {
        let matcher = ExactMatcher::new("exact").unwrap();
        assert_eq!(matcher.match_len(b"exact"), 5);
    }

    #[test]
    fn test_not_found() {
        let matcher = ExactMatcher::new("missing").unwrap();
        assert_eq!(matcher.match_len(b"this text does not contain it"), 0);
    }

    #[test]
    fn test_shorter_than_pattern() {
        let matcher = ExactMatcher::new("password:").unwrap();
        assert_eq!(matcher.match_len(b"pass"), 0);
        assert_eq!(matcher.match_len(b""), 0);
    }

    #[test]
    fn test_first_occurrence_wins() {
        let matcher = ExactMatcher::new("test").unwrap();
        assert_eq!(matcher.match_len(b"test and test again"), 4);
    }

    #[test]
    fn test_empty_pattern_rejected() {
        let result = ExactMatcher::new("");
        assert!(matches!(result, Err(ExpectError::InvalidArgument(_))));
    }

    #[test]
    fn test_utf8() {
        let matcher = ExactMatcher::new("hello 世界").unwrap();
        let content = "this is hello 世界 test".as_bytes();
        assert_eq!(matcher.match_len(content), 8 + "hello 世界".len());
    }

    #[test]
    fn test_binary_data() {
        let matcher = ExactMatcher::new([0xFF, 0xFE, 0xFD]).unwrap();
        assert_eq!(matcher.match_len(b"prefix\xFF\xFE\xFDsuffix"), 9);
    }

    #[test]
    fn test_display() {
        let matcher = ExactMatcher::new(" > ").unwrap();
        assert_eq!(matcher.to_string(), "ExactMatcher< > >");
    }

    proptest! {
        #[test]
        fn prop_agrees_with_naive_search(
            haystack in proptest::collection::vec(0u8..4, 0..64),
            needle in proptest::collection::vec(0u8..4, 1..5),
        ) {
            let matcher = ExactMatcher::new(needle.clone()).unwrap();
            let expected = haystack
                .windows(needle.len())
                .position(|w| w == &needle[..])
                .map_or(0, |pos| pos + needle.len());
            prop_assert_eq!(matcher.match_len(&haystack), expected);
        }

        #[test]
        fn prop_never_exceeds_content(
            haystack in proptest::collection::vec(any::<u8>(), 0..128),
            needle in proptest::collection::vec(any::<u8>(), 1..8),
        ) {
            let matcher = ExactMatcher::new(needle).unwrap();
            prop_assert!(matcher.match_len(&haystack) <= haystack.len());
        }
    }
}
