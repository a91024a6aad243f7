//! Grouping of documents into embedding requests that fit the provider's input budget.

use std::sync::Arc;
use thiserror::Error;
use tiktoken_rs::cl100k_base;

/// Default token budget of a single embedding request.
pub const DEFAULT_MAX_INPUT_TOKENS: usize = 8191;
/// Share of the budget held back for tokenizer mismatches between client and provider.
pub const DEFAULT_RESERVE_PERCENTAGE: f64 = 0.1;

type TokenCounter = Arc<dyn Fn(&str) -> usize + Send + Sync>;

/// Errors produced while batching documents.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BatchingError {
    /// A single document exceeds the per-request budget on its own.
    #[error("Document at position {index} has {tokens} tokens, exceeding the batch limit of {limit}")]
    DocumentTooLarge {
        /// Position of the document in the input.
        index: usize,
        /// Tokens counted for the document.
        tokens: usize,
        /// Usable token budget.
        limit: usize,
    },
}

/// Decides how texts are grouped into embedding provider calls.
///
/// The texts are exactly what the provider receives: document content only. Metadata is
/// stored alongside the vector but never embedded, so it does not count against the budget.
pub trait BatchingStrategy: Send + Sync {
    /// Split `texts` into batches of input positions, preserving order.
    fn batch(&self, texts: &[&str]) -> Result<Vec<Vec<usize>>, BatchingError>;
}

/// Greedy batching bounded by a token budget.
pub struct TokenCountBatchingStrategy {
    counter: TokenCounter,
    limit: usize,
}

impl TokenCountBatchingStrategy {
    /// Budget of `max_input_tokens` minus `reserve_percentage`, counted with `cl100k_base`.
    ///
    /// Falls back to whitespace counting when the encoding cannot be loaded.
    pub fn new(max_input_tokens: usize, reserve_percentage: f64) -> Self {
        let counter: TokenCounter = match cl100k_base() {
            Ok(encoding) => {
                let encoding = Arc::new(encoding);
                Arc::new(move |text: &str| encoding.encode_ordinary(text).len())
            }
            Err(error) => {
                tracing::warn!(
                    error = %error,
                    "Tokenizer unavailable; falling back to whitespace counter"
                );
                Arc::new(|text: &str| text.split_whitespace().count())
            }
        };
        Self::with_counter(max_input_tokens, reserve_percentage, counter)
    }

    /// Use a custom token counter.
    pub fn with_counter(
        max_input_tokens: usize,
        reserve_percentage: f64,
        counter: Arc<dyn Fn(&str) -> usize + Send + Sync>,
    ) -> Self {
        let reserve = reserve_percentage.clamp(0.0, 1.0);
        let limit = ((max_input_tokens as f64) * (1.0 - reserve)).floor() as usize;
        Self {
            counter,
            limit: limit.max(1),
        }
    }

    /// Usable tokens per batch after the reserve.
    pub fn limit(&self) -> usize {
        self.limit
    }
}

impl Default for TokenCountBatchingStrategy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_INPUT_TOKENS, DEFAULT_RESERVE_PERCENTAGE)
    }
}

impl BatchingStrategy for TokenCountBatchingStrategy {
    fn batch(&self, texts: &[&str]) -> Result<Vec<Vec<usize>>, BatchingError> {
        let mut batches = Vec::new();
        let mut current = Vec::new();
        let mut current_tokens = 0;

        for (index, text) in texts.iter().enumerate() {
            let tokens = (self.counter)(text);
            if tokens > self.limit {
                return Err(BatchingError::DocumentTooLarge {
                    index,
                    tokens,
                    limit: self.limit,
                });
            }
            if current_tokens + tokens > self.limit && !current.is_empty() {
                batches.push(std::mem::take(&mut current));
                current_tokens = 0;
            }
            current.push(index);
            current_tokens += tokens;
        }

        if !current.is_empty() {
            batches.push(current);
        }
        Ok(batches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word_counter() -> TokenCounter {
        Arc::new(|text: &str| text.split_whitespace().count())
    }

    #[test]
    fn default_budget_reserves_ten_percent() {
        let strategy = TokenCountBatchingStrategy::with_counter(
            DEFAULT_MAX_INPUT_TOKENS,
            DEFAULT_RESERVE_PERCENTAGE,
            word_counter(),
        );
        assert_eq!(strategy.limit(), 7371);
    }

    #[test]
    fn groups_in_order_within_budget() {
        let strategy = TokenCountBatchingStrategy::with_counter(10, 0.0, word_counter());
        let texts = ["one two three four", "five six seven", "eight nine ten eleven", "twelve"];

        let batches = strategy.batch(&texts).unwrap();
        assert_eq!(batches, vec![vec![0, 1], vec![2, 3]]);
    }

    #[test]
    fn rejects_oversized_document() {
        let strategy = TokenCountBatchingStrategy::with_counter(4, 0.0, word_counter());
        let error = strategy.batch(&["ok", "a b c d e"]).unwrap_err();
        assert_eq!(
            error,
            BatchingError::DocumentTooLarge {
                index: 1,
                tokens: 5,
                limit: 4
            }
        );
    }

    #[test]
    fn empty_input_yields_no_batches() {
        let strategy = TokenCountBatchingStrategy::with_counter(4, 0.0, word_counter());
        assert!(strategy.batch(&[]).unwrap().is_empty());
    }

    #[test]
    fn tiktoken_counter_keeps_small_inputs_together() {
        let strategy = TokenCountBatchingStrategy::default();
        let batches = strategy.batch(&["hello world", "goodbye world"]).unwrap();
        assert_eq!(batches, vec![vec![0, 1]]);
    }
}
