//! Host resource queries
//!
//! Sizes the engine's worker pool to the machine it runs on.

/// Cores assumed when the host cannot report its own count (the console's
/// three PowerPC cores).
pub const FALLBACK_CORES: u32 = 3;

/// Number of cores available to this process
pub fn core_count() -> u32 {
    match std::thread::available_parallelism() {
        Ok(n) => u32::try_from(n.get()).unwrap_or(FALLBACK_CORES),
        Err(e) => {
            tracing::debug!("Core count unavailable ({}), assuming {}", e, FALLBACK_CORES);
            FALLBACK_CORES
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_count_is_positive() {
        assert!(core_count() >= 1);
    }
}
