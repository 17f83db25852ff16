//! CLI command handlers
//!
//! Each subcommand of `betabuild` lives in its own module; `main.rs` only
//! parses arguments and routes to these handlers.

pub mod build;
pub mod doctor;
pub mod run;
pub mod status;
pub mod targets;
