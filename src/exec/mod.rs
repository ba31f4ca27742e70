// src/exec/mod.rs

//! Process execution layer.
//!
//! Runs the shell command configured for the `globwatch` binary, using
//! `tokio::process::Command`, and turns its exit status into a run result
//! the engine's gate understands.

pub mod command;

pub use command::ShellCommand;
