//! LLM inference
//!
//! The engine boundary, its llama.cpp implementation, the session that owns
//! the loaded model, and the bounded generation loop.

pub mod backend;
pub mod generation;
pub mod llama;
pub mod model;
pub mod sampling;
pub mod session;
pub mod text;

// Re-export main types for convenience
pub use backend::{Batch, Engine, EngineError, InferenceContext, Token};
pub use generation::{GenerateError, Generation, GenerationParams, GenerationStatus};
pub use llama::LlamaCppEngine;
pub use model::{read_gguf_header, GgufHeader, ModelError, GGUF_MAGIC};
pub use session::{ProgressState, Session, SessionError};
pub use text::tokens_to_text;
