#![deny(warnings)]
#![allow(missing_docs)]
//! Command-line front end for the Formulary engine.
//!
//! The binary in `main.rs` is a thin wrapper: it parses the command line,
//! loads `formulary.toml`, installs logging and hands over to [`Runner`].

pub mod cli;
pub mod commands;
pub mod config;
pub mod logging;

pub use cli::{Cli, Command, VariableArgs};
pub use commands::{Runner, load_rules};
pub use config::{FormularyConfig, OutputFormat};
pub use logging::init_logging;
