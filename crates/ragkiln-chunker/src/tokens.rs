//! Token count estimation used for the chunker's size budget and for
//! `Chunk.token_count`.

/// Whitespace-word count times 1.3, rounded up — a cheap stand-in for a
/// real tokenizer, adequate for budgeting chunk sizes.
pub fn estimate_tokens(text: &str) -> usize {
    let words = text.split_whitespace().count();
    ((words as f64) * 1.3).ceil() as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_is_zero_tokens() {
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn scales_with_word_count() {
        assert!(estimate_tokens("one two three") > estimate_tokens("one"));
    }
}
