//! Handles the command line interface.
//!
//! Includes the clap command definitions and `App` state (`commands`), interactive
//! dialoguer prompts for the menu loop (`prompts`), and comfy-table rendering
//! (`display`).

mod commands;
mod display;
mod prompts;

pub use commands::*;
pub use display::*;
pub use prompts::*;
