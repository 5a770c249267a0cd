//! Execute a compiled program with the Python interpreter.
//!
//! The program is written to a private temporary file (removed when the run
//! finishes) and the interpreter inherits stdin, stdout and stderr.

use std::path::Path;
use std::process::ExitStatus;

use anyhow::{Context, Result};
use tracing::debug;

use crate::config::Config;

/// Environment variable telling the runtime which shell to invoke.
pub const SHELL_ENV: &str = "CALLIGRAPHY_SHELL";

#[derive(Debug, Clone)]
pub struct Runner {
    python: String,
    shell: String,
}

impl Runner {
    pub fn new(python: impl Into<String>, shell: impl Into<String>) -> Self {
        Self {
            python: python.into(),
            shell: shell.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.python, &config.shell)
    }

    /// Run `program` and return the exit code to forward.
    pub async fn run(&self, program: &str) -> Result<i32> {
        let tmp = tempfile::Builder::new()
            .prefix("calligraphy-")
            .suffix(".py")
            .tempfile()
            .context("creating temporary program file")?;
        tokio::fs::write(tmp.path(), program)
            .await
            .with_context(|| format!("writing {}", tmp.path().display()))?;

        let status = self.run_file(tmp.path()).await?;
        Ok(exit_code(status))
    }

    async fn run_file(&self, path: &Path) -> Result<ExitStatus> {
        debug!(python = %self.python, program = %path.display(), "running");
        tokio::process::Command::new(&self.python)
            .arg(path)
            .env(SHELL_ENV, &self.shell)
            .status()
            .await
            .with_context(|| format!("failed to start `{}`", self.python))
    }
}

/// Shell-style exit code: the child's own code, or 128 + signal number.
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}
