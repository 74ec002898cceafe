//! Session manager
//!
//! Holds at most one loaded model together with the path it came from.
//! [`Session::ensure`] loads lazily: asking for the model that is already
//! loaded is free, asking for a different one retires the current model
//! first.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::diagnostics::Diagnostics;
use crate::inference::backend::{Engine, EngineError};
use crate::inference::generation::{self, GenerateError, Generation, GenerationParams};
use crate::inference::model::{is_gguf_path, read_gguf_header};
use crate::platform::Host;
use crate::storage::models::format_size;
use crate::storage::settings::EngineConfig;

/// Reasons `ensure` can leave the session without a model
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SessionError {
    #[error("Model not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to load model (see log)")]
    LoadFailed(String),

    #[error("Failed to create context")]
    ContextCreateFailed(String),

    #[error("No model loaded.")]
    NoModelLoaded,
}

/// Percent tracking for one load. The first report always prints, 0%
/// included.
#[derive(Debug, Default)]
pub struct ProgressState {
    last_pct: Option<u32>,
}

impl ProgressState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports `fraction` if it moves the integer percent. Returns whether
    /// the host is still running; `false` aborts the load.
    pub fn report(&mut self, fraction: f32, diag: &mut Diagnostics, host: &mut dyn Host) -> bool {
        let pct = (fraction.clamp(0.0, 1.0) * 100.0) as u32;
        if self.last_pct != Some(pct) {
            self.last_pct = Some(pct);
            let line = format!("Loading model... {pct}%");
            diag.line(&line);
            diag.push_debug(format!("Load {pct}%"));
            host.print(&line);
            host.draw();
            diag.flush();
        }
        host.is_running()
    }
}

struct LoadedModel<M> {
    model: M,
    path: PathBuf,
}

/// One engine plus the model currently loaded on it.
pub struct Session<E: Engine> {
    // Declared before `engine`: models must drop before the backend.
    loaded: Option<LoadedModel<E::Model>>,
    engine: E,
    config: EngineConfig,
}

impl<E: Engine> Session<E> {
    pub fn new(engine: E, config: EngineConfig) -> Self {
        Self {
            loaded: None,
            engine,
            config,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    /// Path of the loaded model.
    pub fn path(&self) -> Option<&Path> {
        self.loaded.as_ref().map(|l| l.path.as_path())
    }

    pub fn model(&self) -> Option<&E::Model> {
        self.loaded.as_ref().map(|l| &l.model)
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Drops the loaded model, if any.
    pub fn release(&mut self) {
        if let Some(loaded) = self.loaded.take() {
            tracing::info!("Releasing model {}", loaded.path.display());
        }
    }

    /// Makes `path` the loaded model.
    ///
    /// On any error the session is left empty.
    pub fn ensure(
        &mut self,
        path: &Path,
        diag: &mut Diagnostics,
        host: &mut dyn Host,
    ) -> Result<(), SessionError> {
        if self.path() == Some(path) {
            tracing::debug!("Model already loaded: {}", path.display());
            return Ok(());
        }

        let size = match std::fs::metadata(path) {
            Ok(meta) if meta.is_file() && meta.len() > 0 => meta.len(),
            _ => {
                let err = SessionError::NotFound(path.to_path_buf());
                diag.line(err.to_string());
                return Err(err);
            }
        };

        if is_gguf_path(path) {
            match read_gguf_header(path) {
                Ok(header) => diag.line(format!(
                    "GGUF v{}: {} tensors, {} metadata entries",
                    header.version, header.tensor_count, header.metadata_kv_count
                )),
                Err(e) => {
                    diag.line(format!("Rejected {}: {}", path.display(), e));
                    self.release();
                    return Err(SessionError::LoadFailed(e.to_string()));
                }
            }
        }

        self.release();

        let line = format!("Loading model: {} ({})", path.display(), format_size(size));
        diag.line(&line);
        host.print(&line);
        host.draw();

        let mut progress = ProgressState::new();
        let model = {
            let mut report = |fraction: f32| progress.report(fraction, diag, host);
            self.engine.load_model(path, &self.config, &mut report)
        };
        let model = match model {
            Ok(model) => model,
            Err(e) => {
                diag.line(format!("Model load failed: {e}"));
                diag.flush();
                return Err(SessionError::LoadFailed(e.to_string()));
            }
        };

        if let Err(e) = self.engine.new_context(&model, &self.config).map(drop) {
            diag.line(format!("Context creation failed: {e}"));
            diag.flush();
            return Err(SessionError::ContextCreateFailed(e.to_string()));
        }

        self.loaded = Some(LoadedModel {
            model,
            path: path.to_path_buf(),
        });
        diag.line("Model loaded.");
        diag.flush();
        tracing::info!("Session ready: {}", path.display());
        Ok(())
    }

    /// Runs one greedy generation on a fresh context.
    pub fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
        diag: &mut Diagnostics,
    ) -> Result<Generation, GenerateError> {
        let loaded = self.loaded.as_ref().ok_or(GenerateError::NoModelLoaded)?;
        let mut ctx = self
            .engine
            .new_context(&loaded.model, &self.config)
            .map_err(|e: EngineError| {
                diag.line(format!("Context creation failed: {e}"));
                GenerateError::ContextCreateFailed(e.to_string())
            })?;
        generation::generate(&mut ctx, prompt, params, diag)
    }
}

impl<E: Engine> Drop for Session<E> {
    fn drop(&mut self) {
        self.release();
    }
}
