//! Turns a ring buffer snapshot into a character-capped tail excerpt.

use crate::runtime::pump::CapturedStream;

/// Tail of a captured stream, at most `limit` characters
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Excerpt {
    pub text: String,
    /// Lines were evicted or leading characters were cut
    pub truncated: bool,
}

impl Excerpt {
    /// Concatenate `lines` and keep the last `limit` characters.
    ///
    /// `lines_evicted` carries the ring buffer's own truncation so the flag
    /// covers both bounds.
    pub fn tail<'a, I>(lines: I, limit: usize, lines_evicted: bool) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let text: String = lines.into_iter().collect();
        let total = text.chars().count();
        if total <= limit {
            return Self {
                text,
                truncated: lines_evicted,
            };
        }

        let skip = total - limit;
        let start = text
            .char_indices()
            .nth(skip)
            .map_or(text.len(), |(idx, _)| idx);
        Self {
            text: text[start..].to_string(),
            truncated: true,
        }
    }

    /// Excerpt of a finished stream; empty if capture was disabled
    pub fn from_stream(stream: &CapturedStream, limit: usize) -> Self {
        match &stream.buffer {
            Some(buffer) => Self::tail(buffer.snapshot(), limit, buffer.evicted() > 0),
            None => Self::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StreamName;
    use crate::runtime::ring_buffer::RingBuffer;
    use proptest::prelude::*;

    #[test]
    fn test_short_content_is_untouched() {
        let excerpt = Excerpt::tail(["hello\n"], 15_000, false);
        assert_eq!(excerpt.text, "hello\n");
        assert!(!excerpt.truncated);
    }

    #[test]
    fn test_long_content_keeps_the_tail() {
        let excerpt = Excerpt::tail(["abc\n", "def\n", "ghi\n"], 6, false);
        assert_eq!(excerpt.text, "f\nghi\n");
        assert!(excerpt.truncated);
    }

    #[test]
    fn test_eviction_alone_marks_truncated() {
        let excerpt = Excerpt::tail(["x\n"], 100, true);
        assert_eq!(excerpt.text, "x\n");
        assert!(excerpt.truncated);
    }

    #[test]
    fn test_multibyte_characters_are_counted_not_bytes() {
        let excerpt = Excerpt::tail(["ééééé"], 3, false);
        assert_eq!(excerpt.text, "ééé");
        assert!(excerpt.truncated);
    }

    #[test]
    fn test_zero_limit_yields_empty_text() {
        let excerpt = Excerpt::tail(["abc"], 0, false);
        assert_eq!(excerpt.text, "");
        assert!(excerpt.truncated);
    }

    #[test]
    fn test_from_stream_without_buffer_is_empty() {
        let stream = CapturedStream {
            name: StreamName::Stdout,
            buffer: None,
            bytes: 42,
            lines: 3,
            partial: false,
        };
        assert_eq!(Excerpt::from_stream(&stream, 10), Excerpt::default());
    }

    #[test]
    fn test_from_stream_reads_buffer() {
        let mut buffer = RingBuffer::new(2);
        buffer.push("one\n");
        buffer.push("two\n");
        buffer.push("three\n");
        let stream = CapturedStream {
            name: StreamName::Stderr,
            buffer: Some(buffer),
            bytes: 14,
            lines: 3,
            partial: false,
        };
        let excerpt = Excerpt::from_stream(&stream, 100);
        assert_eq!(excerpt.text, "two\nthree\n");
        assert!(excerpt.truncated);
    }

    proptest! {
        #[test]
        fn prop_excerpt_is_exact_tail(
            lines in prop::collection::vec("[a-zé ]{0,10}\n", 0..40),
            limit in 0usize..120,
        ) {
            let joined: String = lines.concat();
            let chars: Vec<char> = joined.chars().collect();
            let excerpt = Excerpt::tail(lines.iter().map(String::as_str), limit, false);

            let expected: String = chars[chars.len().saturating_sub(limit)..].iter().collect();
            prop_assert_eq!(&excerpt.text, &expected);
            prop_assert_eq!(excerpt.truncated, chars.len() > limit);

            // Idempotent: excerpting the excerpt changes nothing
            let again = Excerpt::tail([excerpt.text.as_str()], limit, false);
            prop_assert_eq!(again.text, excerpt.text);
        }
    }
}
