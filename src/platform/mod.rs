//! Console, input and process-lifecycle boundary
//!
//! The harness draws through [`Console`] and asks the [`Host`] about input
//! and whether it should keep running. [`terminal::TerminalHost`] implements
//! both for desktop terminals.

pub mod terminal;

use std::time::Duration;

/// Line-oriented on-screen console.
pub trait Console {
    /// Drops all printed lines.
    fn clear(&mut self);

    fn print(&mut self, line: &str);

    /// Presents what has been printed so far.
    fn draw(&mut self);
}

/// Gamepad buttons, laid out as a bit set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Buttons(pub u32);

impl Buttons {
    pub const NONE: Buttons = Buttons(0);
    pub const A: Buttons = Buttons(0x8000);
    pub const B: Buttons = Buttons(0x4000);
    pub const PLUS: Buttons = Buttons(0x0008);

    pub fn contains(self, other: Buttons) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for Buttons {
    type Output = Buttons;

    fn bitor(self, rhs: Buttons) -> Buttons {
        Buttons(self.0 | rhs.0)
    }
}

/// One gamepad poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PadState {
    /// Buttons pressed since the previous poll
    pub trigger: Buttons,
    /// Buttons currently held
    pub hold: Buttons,
}

/// Everything the harness needs from the platform besides the console.
pub trait Host: Console {
    /// Whether the process should keep running. Turns false once the system
    /// asks the title to exit.
    fn is_running(&mut self) -> bool;

    fn poll_pad(&mut self) -> PadState;

    /// Shows a full-screen text entry and returns what was typed, or an
    /// empty string when cancelled.
    fn keyboard_input(&mut self, hint: &str) -> String;

    /// Asks the system to return to its home menu.
    fn launch_menu(&mut self);

    /// Sleeps between polls.
    fn idle(&mut self, duration: Duration);
}
