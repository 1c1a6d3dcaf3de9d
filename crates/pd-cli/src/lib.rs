//! Pump dose CLI library.
//!
//! This crate provides the CLI interface for importing pump history.

mod cli;
pub mod commands;
mod config;
pub mod history;

pub use cli::{Cli, Commands};
pub use config::{Config, CorrelationConfig};
