//! Expose a directory of annotated Ansible playbooks as a command line tool.
//!
//! Every playbook becomes a subcommand whose flags come from its metadata
//! file. Parsed values are passed to `ansible-playbook` as extra variables.

pub mod app;
pub mod args;
pub mod cli;
pub mod command;
pub mod config;
pub mod error;
pub mod inventory;
pub mod playbook;
pub mod runner;
pub mod spec;
pub mod vars;

#[cfg(test)]
mod testing;

pub use app::{main_with, run, Completion};
pub use config::AppConfig;
pub use error::Error;
