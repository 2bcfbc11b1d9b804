//! Text chunking for indexing.
//!
//! Long documents are split into contiguous, non-overlapping slices of at
//! most `max_len` characters. Concatenating the chunks gives back the
//! trimmed input exactly.

/// Default maximum chunk length (characters, not bytes)
pub const DEFAULT_CHUNK_LEN: usize = 900;

/// Split `text` into chunks of at most `max_len` characters.
///
/// Leading and trailing whitespace is trimmed first; empty input yields no
/// chunks. A `max_len` of zero is treated as one.
pub fn chunk(text: &str, max_len: usize) -> Vec<String> {
    chunk_spans(text.trim(), max_len)
        .map(str::to_string)
        .collect()
}

/// Borrowing variant of [`chunk`] that does not trim.
///
/// Splits on character boundaries so multi-byte text is never cut inside a
/// code point.
pub fn chunk_spans(text: &str, max_len: usize) -> impl Iterator<Item = &str> {
    let max_len = max_len.max(1);
    let mut rest = text;

    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }

        let end = rest
            .char_indices()
            .nth(max_len)
            .map(|(idx, _)| idx)
            .unwrap_or(rest.len());
        let (head, tail) = rest.split_at(end);
        rest = tail;
        Some(head)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_returns_no_chunks() {
        assert!(chunk("", 900).is_empty());
        assert!(chunk("   \n\t ", 900).is_empty());
    }

    #[test]
    fn test_short_text_single_chunk() {
        assert_eq!(
            chunk("  Foot exam normal.  ", 900),
            vec!["Foot exam normal."]
        );
    }

    #[test]
    fn test_exact_boundaries() {
        let text = "abcdefghij";
        assert_eq!(chunk(text, 5), vec!["abcde", "fghij"]);
        assert_eq!(chunk(text, 3), vec!["abc", "def", "ghi", "j"]);
        assert_eq!(chunk(text, 10), vec!["abcdefghij"]);
    }

    #[test]
    fn test_round_trip() {
        let text = "Documented allergy: Penicillin (urticaria + wheeze). \
                    Avoid beta-lactams if possible; consider macrolide alternatives.";
        for max_len in [1, 2, 7, 50, 900] {
            let chunks = chunk(text, max_len);
            assert_eq!(chunks.concat(), text);
            assert!(chunks.iter().all(|c| c.chars().count() <= max_len));
        }
    }

    #[test]
    fn test_counts_characters_not_bytes() {
        let text = "fièvre été 38°C";
        let chunks = chunk(text, 4);

        assert_eq!(chunks.concat(), text);
        assert_eq!(chunks[0], "fièv");
        assert!(chunks.iter().all(|c| c.chars().count() <= 4));
    }

    #[test]
    fn test_zero_max_len_is_clamped() {
        assert_eq!(chunk("abc", 0), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_default_len_splits_long_note() {
        let text = "x".repeat(DEFAULT_CHUNK_LEN * 2 + 1);
        let chunks = chunk(&text, DEFAULT_CHUNK_LEN);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].len(), 1);
    }
}
