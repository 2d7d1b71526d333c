//! Command-line interface for callbrief
//!
//! ## Module Structure
//!
//! - `args`: CLI argument definitions (clap)
//! - `run`: entry point, configuration discovery and dispatch
//! - `commands`: command implementations and report formatting
//! - `tests`: test module (cfg(test) only)

pub mod args;
mod commands;
mod run;


pub use args::{Cli, Commands};
pub use run::run;
