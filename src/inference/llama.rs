//! llama.cpp engine
//!
//! Maps [`Engine`] and [`InferenceContext`] onto `llama-cpp-2`. A
//! [`LlamaCppContext`] borrows the model it was opened on, so contexts are
//! short-lived and the model stays with the session.

use std::num::NonZeroU32;
use std::path::Path;

use llama_cpp_2::context::params::LlamaContextParams;
use llama_cpp_2::context::LlamaContext;
use llama_cpp_2::llama_backend::LlamaBackend;
use llama_cpp_2::llama_batch::LlamaBatch;
use llama_cpp_2::model::params::LlamaModelParams;
use llama_cpp_2::model::{AddBos, LlamaModel, Special};
use llama_cpp_2::sampling::LlamaSampler;
use llama_cpp_2::token::data_array::LlamaTokenDataArray;
use llama_cpp_2::token::LlamaToken;

use crate::inference::backend::{Batch, Engine, EngineError, InferenceContext, Token};
use crate::inference::sampling::SUPPRESSED_LOGIT;
use crate::storage::settings::EngineConfig;

/// Owns the process-wide llama.cpp backend.
pub struct LlamaCppEngine {
    backend: LlamaBackend,
}

impl LlamaCppEngine {
    /// Initializes the backend and routes llama.cpp logging into `tracing`.
    /// Call once per process.
    pub fn init() -> Result<Self, EngineError> {
        llama_cpp_2::send_logs_to_tracing(llama_cpp_2::LogOptions::default());
        let backend = LlamaBackend::init().map_err(|e| EngineError::BackendInit(e.to_string()))?;
        tracing::info!("LlamaBackend initialized");
        Ok(Self { backend })
    }
}

impl Engine for LlamaCppEngine {
    type Model = LlamaModel;
    type Context<'m> = LlamaCppContext<'m> where Self: 'm;

    fn load_model(
        &self,
        path: &Path,
        config: &EngineConfig,
        progress: &mut dyn FnMut(f32) -> bool,
    ) -> Result<LlamaModel, EngineError> {
        // The binding exposes no load callback; report the endpoints only.
        if !progress(0.0) {
            return Err(EngineError::LoadAborted);
        }

        let model_params = LlamaModelParams::default()
            .with_n_gpu_layers(config.gpu_layers)
            .with_use_mlock(config.use_mlock);
        tracing::debug!(
            gpu_layers = config.gpu_layers,
            use_mlock = config.use_mlock,
            "Loading {}",
            path.display()
        );

        let model = LlamaModel::load_from_file(&self.backend, path, &model_params)
            .map_err(|e| EngineError::ModelLoad(e.to_string()))?;

        if !progress(1.0) {
            return Err(EngineError::LoadAborted);
        }

        tracing::info!(
            "Model loaded: {} ({} vocab, {} ctx train)",
            path.display(),
            model.n_vocab(),
            model.n_ctx_train()
        );
        Ok(model)
    }

    fn new_context<'m>(
        &'m self,
        model: &'m LlamaModel,
        config: &EngineConfig,
    ) -> Result<LlamaCppContext<'m>, EngineError> {
        let n_ctx = NonZeroU32::new(config.n_ctx)
            .ok_or_else(|| EngineError::ContextCreate("n_ctx must be non-zero".to_string()))?;
        let threads = config.n_threads.max(1) as i32;

        let ctx_params = LlamaContextParams::default()
            .with_n_ctx(Some(n_ctx))
            .with_n_batch(config.n_batch)
            .with_n_ubatch(config.n_ubatch)
            .with_n_threads(threads)
            .with_n_threads_batch(threads)
            .with_offload_kqv(config.offload_kqv)
            // llama_flash_attn_type: 0 = disabled, 1 = enabled
            .with_flash_attention_policy(if config.flash_attn { 1 } else { 0 });

        let ctx = model
            .new_context(&self.backend, ctx_params)
            .map_err(|e| EngineError::ContextCreate(e.to_string()))?;

        Ok(LlamaCppContext {
            model,
            ctx,
            sampler: LlamaSampler::greedy(),
            outputs: Vec::new(),
        })
    }
}

/// One llama.cpp context, its greedy sampler and the output rows of its
/// last decode.
pub struct LlamaCppContext<'m> {
    model: &'m LlamaModel,
    ctx: LlamaContext<'m>,
    sampler: LlamaSampler,
    /// Batch indices that produced logits in the last successful decode
    outputs: Vec<i32>,
}

impl InferenceContext for LlamaCppContext<'_> {
    fn tokenize(&self, text: &str, add_bos: bool) -> Result<Vec<Token>, EngineError> {
        let add_bos = if add_bos { AddBos::Always } else { AddBos::Never };
        let tokens = self
            .model
            .str_to_token(text, add_bos)
            .map_err(|e| EngineError::Tokenization(e.to_string()))?;
        Ok(tokens.into_iter().map(|t| Token(t.0)).collect())
    }

    fn decode(&mut self, batch: &Batch) -> Result<(), EngineError> {
        self.outputs.clear();

        let mut llama_batch = LlamaBatch::new(batch.len().max(1), batch.max_seq_ids().max(1) as i32);
        for (i, &token) in batch.tokens().iter().enumerate() {
            llama_batch
                .add(
                    LlamaToken(token.0),
                    batch.positions()[i],
                    &batch.seq_ids()[i],
                    batch.outputs()[i],
                )
                .map_err(|e| EngineError::Decode(e.to_string()))?;
        }

        self.ctx
            .decode(&mut llama_batch)
            .map_err(|e| EngineError::Decode(e.to_string()))?;

        self.outputs = batch
            .outputs()
            .iter()
            .enumerate()
            .filter(|(_, &out)| out)
            .map(|(i, _)| i as i32)
            .collect();
        Ok(())
    }

    fn logits(&self, batch_index: i32) -> Option<&[f32]> {
        // get_logits_ith panics on rows that were not requested
        if !self.outputs.contains(&batch_index) {
            return None;
        }
        Some(self.ctx.get_logits_ith(batch_index))
    }

    fn sample(&mut self, batch_index: i32, suppress: Option<Token>) -> Option<Token> {
        if !self.outputs.contains(&batch_index) {
            return None;
        }

        let mut candidates =
            LlamaTokenDataArray::from_iter(self.ctx.candidates_ith(batch_index), false);
        if let Some(token) = suppress {
            if let Some(data) = candidates.data.iter_mut().find(|d| d.id().0 == token.0) {
                data.set_logit(SUPPRESSED_LOGIT);
            }
        }

        candidates.apply_sampler(&self.sampler);
        let token = candidates.selected_token()?;
        self.sampler.accept(token);
        Some(Token(token.0))
    }

    fn n_vocab(&self) -> i32 {
        self.model.n_vocab()
    }

    fn token_eos(&self) -> Token {
        Token(self.model.token_eos().0)
    }

    fn is_eog(&self, token: Token) -> bool {
        self.model.is_eog_token(LlamaToken(token.0))
    }

    fn token_piece(&self, token: Token) -> Vec<u8> {
        match self.model.token_to_bytes(LlamaToken(token.0), Special::Tokenize) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::debug!("No piece for token {}: {}", token, e);
                Vec::new()
            }
        }
    }
}
