//! Inference engine boundary
//!
//! The harness never touches model weights, tokenizers or attention directly.
//! Everything it needs from the engine is expressed by the two traits here:
//! [`Engine`] loads models and opens contexts, [`InferenceContext`] tokenizes,
//! decodes batches and answers vocabulary queries.

use std::fmt;
use std::path::Path;

use thiserror::Error;

use crate::storage::settings::EngineConfig;

/// Errors reported by the inference engine
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    #[error("Failed to initialize backend: {0}")]
    BackendInit(String),

    #[error("Failed to load model: {0}")]
    ModelLoad(String),

    #[error("Model load aborted by host")]
    LoadAborted,

    #[error("Failed to create context: {0}")]
    ContextCreate(String),

    #[error("Tokenization failed: {0}")]
    Tokenization(String),

    #[error("Decode failed: {0}")]
    Decode(String),
}

/// A vocabulary token id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Token(pub i32);

impl Token {
    /// Index into a logits row, if the id is a valid vocabulary position.
    pub fn index(self, n_vocab: i32) -> Option<usize> {
        (self.0 >= 0 && self.0 < n_vocab).then_some(self.0 as usize)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One decode submission: parallel arrays of token ids, positions,
/// sequence ids and output flags.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    tokens: Vec<Token>,
    positions: Vec<i32>,
    seq_ids: Vec<Vec<i32>>,
    outputs: Vec<bool>,
}

impl Batch {
    pub fn with_capacity(n_tokens: usize) -> Self {
        Self {
            tokens: Vec::with_capacity(n_tokens),
            positions: Vec::with_capacity(n_tokens),
            seq_ids: Vec::with_capacity(n_tokens),
            outputs: Vec::with_capacity(n_tokens),
        }
    }

    /// Builds the prefill batch for a prompt: positions `0..n`, sequence 0,
    /// logits requested only for the last position.
    pub fn prompt(tokens: &[Token]) -> Self {
        let mut batch = Self::with_capacity(tokens.len());
        for (i, token) in tokens.iter().enumerate() {
            let is_last = i + 1 == tokens.len();
            batch.add(*token, i as i32, &[0], is_last);
        }
        batch
    }

    /// Builds a single-token batch at `position` with logits requested.
    pub fn single(token: Token, position: i32) -> Self {
        let mut batch = Self::with_capacity(1);
        batch.add(token, position, &[0], true);
        batch
    }

    pub fn add(&mut self, token: Token, position: i32, seq_ids: &[i32], output: bool) {
        self.tokens.push(token);
        self.positions.push(position);
        self.seq_ids.push(seq_ids.to_vec());
        self.outputs.push(output);
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn positions(&self) -> &[i32] {
        &self.positions
    }

    pub fn seq_ids(&self) -> &[Vec<i32>] {
        &self.seq_ids
    }

    pub fn outputs(&self) -> &[bool] {
        &self.outputs
    }

    /// Largest number of sequence ids attached to any single position.
    pub fn max_seq_ids(&self) -> usize {
        self.seq_ids.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Batch index of the last position that requested logits.
    pub fn last_output_index(&self) -> Option<i32> {
        self.outputs.iter().rposition(|&out| out).map(|i| i as i32)
    }
}

/// Loads models and opens inference contexts on them.
///
/// A context borrows the model it was created from, so the model must
/// outlive every context opened on it.
pub trait Engine {
    type Model;
    type Context<'m>: InferenceContext
    where
        Self: 'm;

    /// Loads the model at `path`.
    ///
    /// `progress` receives a non-decreasing fraction in `[0, 1]` and returns
    /// whether the host is still alive; `false` aborts the load.
    fn load_model(
        &self,
        path: &Path,
        config: &EngineConfig,
        progress: &mut dyn FnMut(f32) -> bool,
    ) -> Result<Self::Model, EngineError>;

    fn new_context<'m>(
        &'m self,
        model: &'m Self::Model,
        config: &EngineConfig,
    ) -> Result<Self::Context<'m>, EngineError>;
}

/// Decode-time operations on one inference context.
pub trait InferenceContext {
    fn tokenize(&self, text: &str, add_bos: bool) -> Result<Vec<Token>, EngineError>;

    fn decode(&mut self, batch: &Batch) -> Result<(), EngineError>;

    /// Logits row for the given index of the most recently decoded batch.
    fn logits(&self, batch_index: i32) -> Option<&[f32]>;

    /// Picks the next token greedily from the logits at `batch_index` of the
    /// last decode. `suppress` is pushed to the bottom of the row first.
    /// `None` when that index produced no logits.
    fn sample(&mut self, batch_index: i32, suppress: Option<Token>) -> Option<Token>;

    fn n_vocab(&self) -> i32;

    fn token_eos(&self) -> Token;

    /// Whether the engine classifies `token` as end-of-generation.
    fn is_eog(&self, token: Token) -> bool;

    /// Display bytes for `token`; empty when the token has no text.
    fn token_piece(&self, token: Token) -> Vec<u8>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_batch_requests_only_last_logits() {
        let batch = Batch::prompt(&[Token(1), Token(15), Token(42)]);

        assert_eq!(batch.len(), 3);
        assert_eq!(batch.positions(), &[0, 1, 2]);
        assert_eq!(batch.outputs(), &[false, false, true]);
        assert!(batch.seq_ids().iter().all(|ids| ids == &[0]));
        assert_eq!(batch.last_output_index(), Some(2));
    }

    #[test]
    fn test_single_batch() {
        let batch = Batch::single(Token(7), 12);
        assert_eq!(batch.tokens(), &[Token(7)]);
        assert_eq!(batch.positions(), &[12]);
        assert_eq!(batch.last_output_index(), Some(0));
        assert_eq!(batch.max_seq_ids(), 1);
    }

    #[test]
    fn test_empty_batch_has_no_output() {
        let batch = Batch::default();
        assert!(batch.is_empty());
        assert_eq!(batch.last_output_index(), None);
    }

    #[test]
    fn test_token_index_bounds() {
        assert_eq!(Token(0).index(4), Some(0));
        assert_eq!(Token(3).index(4), Some(3));
        assert_eq!(Token(4).index(4), None);
        assert_eq!(Token(-1).index(4), None);
    }
}
