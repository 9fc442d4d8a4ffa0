/// Measures text for chunk budgeting.
pub trait LengthFunction: Send + Sync {
    fn measure(&self, text: &str) -> usize;

    /// Byte offset of the end of the longest prefix of `text` measuring at most `limit`.
    /// Always lands on a char boundary.
    fn prefix_end(&self, text: &str, limit: usize) -> usize;

    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CharLength;

impl LengthFunction for CharLength {
    fn measure(&self, text: &str) -> usize {
        text.chars().count()
    }

    fn prefix_end(&self, text: &str, limit: usize) -> usize {
        text.char_indices().nth(limit).map_or(text.len(), |(i, _)| i)
    }

    fn name(&self) -> &'static str {
        "chars"
    }
}

/// Token estimate of four characters per token, rounded up.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenEstimate;

const CHARS_PER_TOKEN: usize = 4;

impl LengthFunction for TokenEstimate {
    fn measure(&self, text: &str) -> usize {
        text.chars().count().div_ceil(CHARS_PER_TOKEN)
    }

    fn prefix_end(&self, text: &str, limit: usize) -> usize {
        CharLength.prefix_end(text, limit.saturating_mul(CHARS_PER_TOKEN))
    }

    fn name(&self) -> &'static str {
        "tokens"
    }
}
