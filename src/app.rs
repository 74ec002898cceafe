//! Harness driver
//!
//! One pass of the console harness: find a model, load it, run a single
//! prompt, show the response, then keep the screen alive until the host
//! asks the title to exit.

use std::time::{Duration, Instant};

use crate::diagnostics::Diagnostics;
use crate::inference::backend::Engine;
use crate::inference::generation::{GenerateError, Generation, GenerationParams};
use crate::inference::session::{Session, SessionError};
use crate::platform::{Buttons, Host};
use crate::storage::models::scan_models_directory;
use crate::storage::settings::HarnessConfig;
use crate::truncate_str;

const SYSTEM_INSTRUCTION: &str = "You are a helpful assistant. Reply conversationally and directly.";

/// How a run ended
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// The model directory held nothing usable
    NoModel,
    LoadFailed(SessionError),
    GenerateFailed(GenerateError),
    Generated {
        generation: Generation,
        elapsed: Duration,
    },
}

/// Wraps the user's text in the instruction template the models were
/// tuned on.
pub fn build_prompt(user_text: &str) -> String {
    format!(
        "### Instruction:\n{SYSTEM_INSTRUCTION}\n\n### Input:\n{user_text}\n\n### Response:\n"
    )
}

/// Splits `text` into console lines of at most `width` bytes, each indented
/// two spaces. Splits never fall inside a character.
pub fn wrap_response(text: &str, width: usize) -> Vec<String> {
    if text.is_empty() {
        return vec!["  <empty>".to_string()];
    }

    let mut lines = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        let mut chunk = truncate_str(rest, width);
        if chunk.is_empty() {
            // width narrower than the next character
            let end = rest.chars().next().map_or(rest.len(), char::len_utf8);
            chunk = &rest[..end];
        }
        lines.push(format!("  {chunk}"));
        rest = &rest[chunk.len()..];
    }
    lines
}

/// Tokens per second over `elapsed`, zero when no time was measured.
pub fn tokens_per_second(tokens: usize, elapsed: Duration) -> f64 {
    let ms = elapsed.as_millis();
    if ms == 0 {
        return 0.0;
    }
    tokens as f64 / (ms as f64 / 1000.0)
}

/// Runs the harness once and waits for the host to exit.
pub fn run<E: Engine, H: Host>(
    session: &mut Session<E>,
    host: &mut H,
    config: &HarnessConfig,
    diag: &mut Diagnostics,
) -> RunOutcome {
    let model_dir = config.model_dir();
    let models = match scan_models_directory(&model_dir, &config.model_extensions) {
        Ok(models) => models,
        Err(e) => {
            diag.line(format!("Model scan failed: {e}"));
            Vec::new()
        }
    };

    host.clear();

    let Some(model) = models.first() else {
        let line = format!("Response: No model found in {}", model_dir.display());
        diag.line(&line);
        diag.flush();
        host.print(&line);
        host.draw();
        while host.is_running() {
            host.idle(config.idle_sleep());
        }
        return RunOutcome::NoModel;
    };
    diag.line(format!(
        "Selected model: {} ({})",
        model.filename,
        model.size_string()
    ));

    host.print("Loading Model...");
    host.draw();

    let outcome = match session.ensure(&model.path, diag, host) {
        Ok(()) => generate_and_show(session, host, config, diag),
        Err(e) => {
            host.clear();
            show_failure(host, diag, &e.to_string());
            RunOutcome::LoadFailed(e)
        }
    };
    host.draw();
    diag.flush();

    wait_for_exit(host);
    outcome
}

fn generate_and_show<E: Engine, H: Host>(
    session: &mut Session<E>,
    host: &mut H,
    config: &HarnessConfig,
    diag: &mut Diagnostics,
) -> RunOutcome {
    host.clear();
    host.print("Generating...");
    host.draw();

    let mut user_text = String::new();
    if config.use_keyboard {
        user_text = host.keyboard_input("Enter your prompt");
        host.clear();
        host.draw();
    }
    if user_text.trim().is_empty() {
        user_text = config.prompt.clone();
    }
    diag.line(format!("Prompt: {user_text}"));

    let prompt = build_prompt(&user_text);
    let params = GenerationParams::from(config);

    let started = Instant::now();
    let result = session.generate(&prompt, &params, diag);
    let elapsed = started.elapsed();

    host.clear();
    match result {
        Ok(generation) => {
            diag.line(format!("Status: {}", generation.status));
            host.print("Response:");
            for line in wrap_response(&generation.text, config.wrap_width) {
                host.print(&line);
            }
            host.print("");
            host.print(&format!(
                "Tokens/sec: {:.2} ({} in {} ms)",
                tokens_per_second(generation.tokens_generated(), elapsed),
                generation.tokens_generated(),
                elapsed.as_millis()
            ));
            RunOutcome::Generated {
                generation,
                elapsed,
            }
        }
        Err(e) => {
            show_failure(host, diag, &e.to_string());
            RunOutcome::GenerateFailed(e)
        }
    }
}

fn show_failure<H: Host>(host: &mut H, diag: &mut Diagnostics, status: &str) {
    let line = format!("Response: {status}");
    diag.line(&line);
    host.print(&line);
    if !diag.debug_lines().is_empty() {
        host.print("");
        for debug in diag.debug_lines() {
            host.print(&format!("  {debug}"));
        }
    }
}

/// Polls the pad until the host stops. PLUS asks for the system menu.
pub fn wait_for_exit<H: Host>(host: &mut H) {
    while host.is_running() {
        let pad = host.poll_pad();
        if pad.trigger.contains(Buttons::PLUS) {
            host.launch_menu();
        }
        host.draw();
    }
}
