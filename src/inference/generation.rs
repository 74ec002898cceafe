//! Bounded greedy generation
//!
//! Prefills the prompt in one batch, then samples and decodes one token at
//! a time until the engine signals end-of-generation or `n_predict` tokens
//! have been produced. Until `min_gen` tokens exist the EOS logit is pushed
//! down before sampling, and an EOS that still wins is replaced by the best
//! non-EOS token.

use std::fmt;

use thiserror::Error;

use crate::diagnostics::Diagnostics;
use crate::inference::backend::{Batch, InferenceContext, Token};
use crate::inference::sampling::pick_top_non_eos;
use crate::inference::text::tokens_to_text;
use crate::storage::settings::HarnessConfig;

/// Requests that ended without a usable result
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GenerateError {
    #[error("No model loaded.")]
    NoModelLoaded,

    #[error("Failed to create context")]
    ContextCreateFailed(String),

    #[error("Tokenization failed.")]
    TokenizationFailed,

    #[error("Decode failed.")]
    DecodeFailed(String),
}

/// How a finished request ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationStatus {
    Done,
    /// The model stopped right away; not an error
    EmptyResponse,
    /// An incremental decode failed; the tokens so far are kept
    DecodeFailedMidGeneration,
}

impl fmt::Display for GenerationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self {
            GenerationStatus::Done => "Done.",
            GenerationStatus::EmptyResponse => "Generated empty response (EOS?)",
            GenerationStatus::DecodeFailedMidGeneration => "Decode failed mid-gen",
        };
        f.write_str(status)
    }
}

/// Limits for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationParams {
    /// Maximum number of generated tokens
    pub n_predict: usize,
    /// Tokens that must exist before EOS may end the run
    pub min_gen: usize,
    /// Prompts tokenizing to more than this are rejected
    pub max_prompt_tokens: usize,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            n_predict: 32,
            min_gen: 1,
            max_prompt_tokens: 256,
        }
    }
}

impl From<&HarnessConfig> for GenerationParams {
    fn from(config: &HarnessConfig) -> Self {
        Self {
            n_predict: config.n_predict,
            min_gen: config.min_gen,
            max_prompt_tokens: config.max_prompt_tokens,
        }
    }
}

/// Result of one finished request
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub text: String,
    pub tokens: Vec<Token>,
    pub status: GenerationStatus,
}

impl Generation {
    pub fn tokens_generated(&self) -> usize {
        self.tokens.len()
    }
}

/// Runs one prompt through `ctx`.
///
/// Tokenization and prefill failures are errors. A failure while decoding a
/// generated token ends the loop early and is reported through
/// [`GenerationStatus::DecodeFailedMidGeneration`].
pub fn generate<C>(
    ctx: &mut C,
    prompt: &str,
    params: &GenerationParams,
    diag: &mut Diagnostics,
) -> Result<Generation, GenerateError>
where
    C: InferenceContext + ?Sized,
{
    let prompt_tokens = match ctx.tokenize(prompt, true) {
        Ok(tokens) => tokens,
        Err(e) => {
            diag.line(format!("Tokenize error: {e}"));
            return Err(GenerateError::TokenizationFailed);
        }
    };
    if prompt_tokens.is_empty() || prompt_tokens.len() > params.max_prompt_tokens {
        diag.line(format!(
            "Prompt tokenized to {} tokens (limit {})",
            prompt_tokens.len(),
            params.max_prompt_tokens
        ));
        return Err(GenerateError::TokenizationFailed);
    }

    diag.line(format!("Prompt tokens ({}):", prompt_tokens.len()));
    for &token in &prompt_tokens {
        let piece = ctx.token_piece(token);
        if piece.is_empty() {
            diag.line(format!("  {token}: <null>"));
            diag.push_debug("<tok>");
        } else {
            let text = String::from_utf8_lossy(&piece);
            diag.line(format!("  {token}: {text}"));
            diag.push_debug(text);
        }
    }

    let batch = Batch::prompt(&prompt_tokens);
    if let Err(e) = ctx.decode(&batch) {
        diag.line(format!("Prefill failed: {e}"));
        return Err(GenerateError::DecodeFailed(e.to_string()));
    }
    let mut logits_index = batch.last_output_index().unwrap_or(0);

    let eos = ctx.token_eos();
    let eos_in_vocab = eos.index(ctx.n_vocab()).is_some();
    let n_prompt = prompt_tokens.len();
    let mut generated: Vec<Token> = Vec::with_capacity(params.n_predict);
    let mut failed_mid_generation = false;

    for step in 0..params.n_predict {
        let below_min = generated.len() < params.min_gen;
        let suppress = (below_min && eos_in_vocab).then_some(eos);

        let Some(sampled) = ctx.sample(logits_index, suppress) else {
            diag.line(format!("No logits at batch index {logits_index}"));
            failed_mid_generation = true;
            break;
        };

        let mut chosen = sampled;
        if sampled == eos && below_min {
            let replacement = ctx
                .logits(logits_index)
                .and_then(|row| pick_top_non_eos(row, eos));
            if let Some(replacement) = replacement {
                chosen = replacement;
            }
            diag.line(format!("EOS sampled early; forcing token {chosen}"));
            diag.push_debug("force non-EOS");
        }

        if ctx.is_eog(chosen) {
            diag.line(format!("Hit EOG token {chosen}, stopping."));
            diag.push_debug("stop: EOG");
            break;
        }
        generated.push(chosen);

        let piece = ctx.token_piece(chosen);
        if piece.is_empty() {
            diag.line(format!("Gen {step}: id={chosen}"));
            diag.push_debug(format!("id {chosen}"));
        } else {
            let text = String::from_utf8_lossy(&piece);
            diag.line(format!("Gen {step}: id={chosen} text={text}"));
            diag.push_debug(text);
        }

        let next = Batch::single(chosen, (n_prompt + step) as i32);
        if let Err(e) = ctx.decode(&next) {
            diag.line(format!("Decode failed mid-gen: {e}"));
            failed_mid_generation = true;
            break;
        }
        logits_index = next.last_output_index().unwrap_or(0);
    }

    let text = tokens_to_text(ctx, &generated);
    let status = if failed_mid_generation {
        GenerationStatus::DecodeFailedMidGeneration
    } else if text.is_empty() {
        GenerationStatus::EmptyResponse
    } else {
        GenerationStatus::Done
    };

    tracing::info!(
        tokens = generated.len(),
        prompt_tokens = n_prompt,
        "Generation finished: {}",
        status
    );

    Ok(Generation {
        text,
        tokens: generated,
        status,
    })
}
