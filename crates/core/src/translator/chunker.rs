//! Splits text into chunks that fit a per-call token budget.

/// A contiguous run of whitespace-delimited tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Position of the chunk in the source text.
    pub index: usize,
    /// Tokens joined by single spaces.
    pub text: String,
    /// Estimated token cost of the chunk.
    pub cost: usize,
}

/// Estimated token cost of one whitespace-delimited token: a quarter of its
/// character count, rounded up, and never zero.
pub fn estimate_tokens(token: &str) -> usize {
    token.chars().count().div_ceil(4).max(1)
}

/// Greedily packs the tokens of `text` into chunks of at most `budget`.
///
/// Tokens are never split: a single token costlier than the budget becomes a
/// chunk of its own. Whitespace-only input yields no chunks.
pub fn chunk_text(text: &str, budget: usize) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut cost = 0;

    for token in text.split_whitespace() {
        let token_cost = estimate_tokens(token);
        if !current.is_empty() && cost + token_cost > budget {
            chunks.push(Chunk {
                index: chunks.len(),
                text: current.join(" "),
                cost,
            });
            current.clear();
            cost = 0;
        }
        current.push(token);
        cost += token_cost;
    }

    if !current.is_empty() {
        chunks.push(Chunk {
            index: chunks.len(),
            text: current.join(" "),
            cost,
        });
    }

    chunks
}
