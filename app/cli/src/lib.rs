//! Netops CLI: interactive chat and one-shot queries against the assistant
//! backend.

pub use cmd::{Cli, Command};

pub mod cmd;
pub mod config;
pub mod repl;
pub mod terminal;
