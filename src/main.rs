//! llama-console - console harness for llama.cpp
//!
//! Loads the first model found on external storage, runs one short prompt
//! and shows the response until the user returns to the menu.

use tracing::{error, info};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use llama_console::app;
use llama_console::diagnostics::Diagnostics;
use llama_console::inference::{LlamaCppEngine, Session};
use llama_console::platform::terminal::TerminalHost;
use llama_console::platform::Console;
use llama_console::storage::settings::HarnessConfig;

fn main() {
    // Logs go to stderr so they do not mix with the console screen
    let filter = EnvFilter::from_default_env().add_directive(
        "llama_console=info"
            .parse()
            .unwrap_or_else(|_| LevelFilter::INFO.into()),
    );
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    info!("Starting llama-console v{}", env!("CARGO_PKG_VERSION"));

    let config = HarnessConfig::load();
    let mut diag = Diagnostics::open(&config.log_path());
    diag.line(format!("llama-console v{}", env!("CARGO_PKG_VERSION")));
    match serde_json::to_string(&config) {
        Ok(json) => diag.line(format!("Config: {json}")),
        Err(e) => diag.line(format!("Config not serializable: {e}")),
    }
    diag.flush();

    let mut host = match TerminalHost::new() {
        Ok(host) => host,
        Err(e) => {
            error!("Failed to set up terminal: {}", e);
            diag.line(format!("Terminal setup failed: {e}"));
            diag.close();
            std::process::exit(1);
        }
    };

    match LlamaCppEngine::init() {
        Ok(engine) => {
            let mut session = Session::new(engine, config.engine.clone());
            let outcome = app::run(&mut session, &mut host, &config, &mut diag);
            info!("Run finished: {:?}", outcome);
            session.release();
        }
        Err(e) => {
            error!("{}", e);
            diag.line(e.to_string());
            host.clear();
            host.print(&format!("Response: {e}"));
            host.draw();
        }
    }

    if let Err(e) = host.restore() {
        error!("Failed to restore terminal: {}", e);
    }
    diag.close();
}
