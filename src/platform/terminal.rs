//! Terminal host
//!
//! Runs the harness in a desktop terminal. The screen stands in for the
//! console, keys stand in for the gamepad:
//!
//! | key            | button |
//! |----------------|--------|
//! | `+` / Home     | PLUS   |
//! | Enter          | A      |
//! | Esc / Backspace| B      |
//!
//! Ctrl-C stops the process the way the system menu would.

use std::io::{self, BufRead, Stdout, Write};
use std::time::Duration;

use crossterm::cursor::MoveTo;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::style::Print;
use crossterm::terminal::{self, Clear, ClearType};
use crossterm::{execute, queue};

use crate::platform::{Buttons, Console, Host, PadState};

/// How long one pad poll waits for a key, roughly one frame
const FRAME: Duration = Duration::from_millis(16);

pub struct TerminalHost {
    out: Stdout,
    running: bool,
    raw_mode: bool,
    pending: Buttons,
    held: Buttons,
}

impl TerminalHost {
    /// Switches the terminal to raw mode and clears it.
    pub fn new() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        let mut out = io::stdout();
        execute!(out, Clear(ClearType::All), MoveTo(0, 0))?;
        Ok(Self {
            out,
            running: true,
            raw_mode: true,
            pending: Buttons::NONE,
            held: Buttons::NONE,
        })
    }

    /// Leaves raw mode. Safe to call more than once.
    pub fn restore(&mut self) -> io::Result<()> {
        if self.raw_mode {
            terminal::disable_raw_mode()?;
            self.raw_mode = false;
            execute!(self.out, Print("\r\n"))?;
        }
        Ok(())
    }

    /// Drains key events into the pending button set, waiting at most
    /// `timeout` for the first one.
    fn pump_events(&mut self, timeout: Duration) -> io::Result<()> {
        let mut wait = timeout;
        self.held = Buttons::NONE;
        while event::poll(wait)? {
            wait = Duration::ZERO;
            let Event::Key(key) = event::read()? else {
                continue;
            };
            if key.kind == KeyEventKind::Release {
                continue;
            }
            let button = match key.code {
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    self.running = false;
                    continue;
                }
                KeyCode::Char('+') | KeyCode::Home => Buttons::PLUS,
                KeyCode::Enter => Buttons::A,
                KeyCode::Esc | KeyCode::Backspace => Buttons::B,
                _ => continue,
            };
            self.pending = self.pending | button;
            self.held = self.held | button;
        }
        Ok(())
    }

    fn report(result: io::Result<()>) {
        if let Err(e) = result {
            tracing::warn!("Terminal I/O failed: {}", e);
        }
    }
}

impl Console for TerminalHost {
    fn clear(&mut self) {
        Self::report(queue!(self.out, Clear(ClearType::All), MoveTo(0, 0)));
    }

    fn print(&mut self, line: &str) {
        Self::report(queue!(self.out, Print(line), Print("\r\n")));
    }

    fn draw(&mut self) {
        Self::report(self.out.flush());
    }
}

impl Host for TerminalHost {
    fn is_running(&mut self) -> bool {
        if self.running {
            Self::report(self.pump_events(Duration::ZERO));
        }
        self.running
    }

    fn poll_pad(&mut self) -> PadState {
        Self::report(self.pump_events(FRAME));
        let trigger = std::mem::take(&mut self.pending);
        PadState {
            trigger,
            hold: self.held,
        }
    }

    fn keyboard_input(&mut self, hint: &str) -> String {
        let was_raw = self.raw_mode;
        if was_raw {
            Self::report(terminal::disable_raw_mode());
        }
        Self::report(execute!(self.out, Print(format!("{hint}: "))));

        let mut line = String::new();
        let typed = match io::stdin().lock().read_line(&mut line) {
            Ok(0) => String::new(),
            Ok(_) => line.trim_end_matches(['\r', '\n']).to_string(),
            Err(e) => {
                tracing::warn!("Keyboard input failed: {}", e);
                String::new()
            }
        };

        if was_raw {
            Self::report(terminal::enable_raw_mode());
        }
        typed
    }

    fn launch_menu(&mut self) {
        tracing::info!("Return to menu requested");
        self.running = false;
    }

    fn idle(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

impl Drop for TerminalHost {
    fn drop(&mut self) {
        Self::report(self.restore());
    }
}
