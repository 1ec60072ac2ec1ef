//! CLI command handlers
//!
//! Each subcommand is implemented in its own module.

pub mod config;
pub mod evaluate;
pub mod helpers;
pub mod init;
pub mod jobs;
pub mod prompt;
pub mod recommend;
pub mod rules;
