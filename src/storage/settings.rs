//! Harness configuration
//!
//! Every tunable is fixed at build time in [`HarnessConfig::default`]. The
//! only runtime input is the storage root, which desktop hosts may point
//! elsewhere through `LLAMA_CONSOLE_ROOT`.

use crate::storage::default_storage_root;
use crate::system::resources::core_count;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable overriding the storage root
pub const STORAGE_ROOT_ENV: &str = "LLAMA_CONSOLE_ROOT";

/// Engine parameters for a memory-limited target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Context window in tokens (also caps the KV cache)
    pub n_ctx: u32,
    /// Logical batch size
    pub n_batch: u32,
    /// Physical micro-batch size
    pub n_ubatch: u32,
    /// Worker threads for both single-token and batch decode
    pub n_threads: u32,
    /// Layers offloaded to an accelerator (0 = CPU only)
    pub gpu_layers: u32,
    pub use_mmap: bool,
    pub use_mlock: bool,
    /// Skip host shadow buffers
    pub no_host: bool,
    /// Extra repack buffers
    pub use_extra_bufts: bool,
    pub offload_kqv: bool,
    pub op_offload: bool,
    pub flash_attn: bool,
    /// Full-size sliding-window cache
    pub swa_full: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            n_ctx: 64,
            n_batch: 64,
            n_ubatch: 64,
            n_threads: core_count(),
            gpu_layers: 0,
            use_mmap: false,
            use_mlock: false,
            no_host: true,
            use_extra_bufts: false,
            offload_kqv: false,
            op_offload: false,
            flash_attn: false,
            swa_full: false,
        }
    }
}

/// Harness settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Root of external storage
    pub storage_root: PathBuf,
    /// Model directory, relative to the storage root
    pub model_dir: PathBuf,
    /// Accepted model file extensions (case-insensitive)
    pub model_extensions: Vec<String>,
    /// Append-only log file, relative to the storage root
    pub log_file: PathBuf,
    /// Maximum number of generated tokens
    pub n_predict: usize,
    /// Tokens that must be generated before EOS may end the run
    pub min_gen: usize,
    /// Largest prompt accepted after tokenization
    pub max_prompt_tokens: usize,
    /// Prompt used when the keyboard is off or returns nothing
    pub prompt: String,
    /// Capture the prompt from the on-screen keyboard
    pub use_keyboard: bool,
    /// Console columns per response line
    pub wrap_width: usize,
    /// Sleep between polls while idling without a model
    pub idle_sleep_ms: u64,
    pub engine: EngineConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            storage_root: default_storage_root(),
            model_dir: PathBuf::from("model"),
            model_extensions: vec!["gguf".to_string(), "bin".to_string()],
            log_file: PathBuf::from("llama").join("llama-console.log"),
            n_predict: 32,
            min_gen: 1,
            max_prompt_tokens: 256,
            prompt: "Hi!".to_string(),
            use_keyboard: false,
            wrap_width: 68,
            idle_sleep_ms: 50,
            engine: EngineConfig::default(),
        }
    }
}

impl HarnessConfig {
    /// Build-time configuration with the storage root taken from the
    /// environment when set.
    pub fn load() -> Self {
        let mut config = Self::default();
        if let Some(root) = std::env::var_os(STORAGE_ROOT_ENV) {
            config.storage_root = PathBuf::from(root);
            tracing::info!("Storage root overridden: {}", config.storage_root.display());
        }
        config.validate();
        config
    }

    /// Validate settings values
    ///
    /// Clamps every parameter into a range the harness can run with
    pub fn validate(&mut self) {
        if self.n_predict == 0 {
            self.n_predict = 32;
        }

        // Forcing more tokens than can be generated makes no sense
        self.min_gen = self.min_gen.min(self.n_predict);

        if self.max_prompt_tokens == 0 {
            self.max_prompt_tokens = 256;
        }

        if self.wrap_width < 8 {
            self.wrap_width = 68;
        }

        if self.model_extensions.is_empty() {
            self.model_extensions = vec!["gguf".to_string(), "bin".to_string()];
        }
        for ext in &mut self.model_extensions {
            *ext = ext.trim_start_matches('.').to_lowercase();
        }

        let engine = &mut self.engine;
        if engine.n_ctx == 0 {
            engine.n_ctx = 64;
        }
        engine.n_batch = engine.n_batch.clamp(1, engine.n_ctx);
        engine.n_ubatch = engine.n_ubatch.clamp(1, engine.n_batch);
        if engine.n_threads == 0 {
            engine.n_threads = core_count();
        }

        // The whole prompt is decoded as one batch
        self.max_prompt_tokens = self.max_prompt_tokens.min(self.engine.n_batch as usize);
    }

    pub fn model_dir(&self) -> PathBuf {
        self.storage_root.join(&self.model_dir)
    }

    pub fn log_path(&self) -> PathBuf {
        self.storage_root.join(&self.log_file)
    }

    pub fn idle_sleep(&self) -> Duration {
        Duration::from_millis(self.idle_sleep_ms)
    }
}
