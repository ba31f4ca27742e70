// src/exec/command.rs

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::process::Command;
use tracing::{debug, info};

use crate::engine::{Completion, Done};

/// A shell command run once per triggered run.
#[derive(Debug, Clone)]
pub struct ShellCommand {
    command: String,
    cwd: PathBuf,
}

impl ShellCommand {
    pub fn new(command: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            cwd: cwd.into(),
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Build a shell command appropriate for the platform.
    fn build(&self) -> Command {
        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&self.command);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&self.command);
            c
        };

        // Output goes straight to the terminal; the process is killed if the
        // run is abandoned (session closed).
        cmd.current_dir(&self.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        cmd
    }

    /// Run to completion. A non-zero exit status is an error.
    pub async fn run(&self) -> Result<()> {
        info!(cmd = %self.command, "starting command");

        let mut child = self
            .build()
            .spawn()
            .with_context(|| format!("spawning `{}`", self.command))?;

        let status = child
            .wait()
            .await
            .with_context(|| format!("waiting for `{}`", self.command))?;

        let code = status.code().unwrap_or(-1);
        debug!(cmd = %self.command, exit_code = code, success = status.success(), "command exited");

        if !status.success() {
            bail!("`{}` exited with code {code}", self.command);
        }
        Ok(())
    }

    /// Callback running this command on every run.
    pub fn into_callback(self) -> impl FnMut(Done) -> Completion + Send + 'static {
        let command = Arc::new(self);
        move |_done: Done| {
            let command = Arc::clone(&command);
            Completion::deferred(async move { command.run().await })
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn successful_command_is_ok() {
        let cmd = ShellCommand::new("true", std::env::temp_dir());
        assert!(cmd.run().await.is_ok());
    }

    #[tokio::test]
    async fn non_zero_exit_is_an_error() {
        let cmd = ShellCommand::new("exit 3", std::env::temp_dir());
        let err = cmd.run().await.unwrap_err();
        assert!(err.to_string().contains("exited with code 3"), "{err}");
    }

    #[tokio::test]
    async fn runs_in_the_given_directory() {
        let dir = tempfile::tempdir().unwrap();
        let cmd = ShellCommand::new("touch marker", dir.path());
        cmd.run().await.unwrap();
        assert!(dir.path().join("marker").exists());
    }
}
