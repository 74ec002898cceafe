//! Early-EOS guard
//!
//! The engine's sampler picks tokens. When it still lands on EOS before the
//! minimum length, [`pick_top_non_eos`] picks the replacement from the raw
//! logits row.

use crate::inference::backend::Token;

/// Logit written over a token that must not be picked
pub const SUPPRESSED_LOGIT: f32 = -1e9;

/// Highest-logit token other than `eos`, first maximum wins.
///
/// A NaN row still yields the first non-EOS id. `None` only when the row
/// holds nothing but `eos`.
pub fn pick_top_non_eos(logits: &[f32], eos: Token) -> Option<Token> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &logit) in logits.iter().enumerate() {
        if i as i32 == eos.0 {
            continue;
        }
        match best {
            Some((_, best_logit)) if logit <= best_logit || logit.is_nan() => {}
            _ => best = Some((i, logit)),
        }
    }
    best.map(|(i, _)| Token(i as i32))
}
