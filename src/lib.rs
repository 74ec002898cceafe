//! llama-console Library
//!
//! Console harness for running a small language model through llama.cpp:
//! model discovery, a lazily loaded session, a bounded greedy generation
//! pass and on-screen diagnostics.

pub mod app;
pub mod diagnostics;
pub mod inference;
pub mod platform;
pub mod storage;
pub mod system;

#[cfg(test)]
mod testing;

/// Safely truncate a string at a char boundary, never panics.
pub fn truncate_str(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    // Walk backwards from max_bytes to find a valid char boundary
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
