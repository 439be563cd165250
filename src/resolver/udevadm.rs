//! OS attribute query through `udevadm info -a -n <path>`.

use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::AttributeQuery;
use crate::config::ATTRIBUTE_QUERY_PROGRAM;
use crate::error::{PadsleepError, Result};

/// Runs an external utility and captures its standard output.
#[derive(Debug, Clone)]
pub struct UdevadmQuery {
    program: String,
    args: Vec<String>,
}

impl Default for UdevadmQuery {
    fn default() -> Self {
        Self::new()
    }
}

impl UdevadmQuery {
    /// Query attributes with `udevadm info -a -n`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_program(ATTRIBUTE_QUERY_PROGRAM, &["info", "-a", "-n"])
    }

    /// Query attributes with another program; the device path is appended after `args`.
    #[must_use]
    pub fn with_program(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|arg| arg.to_string()).collect(),
        }
    }

    async fn run(&self, path: &Path) -> Result<String> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                PadsleepError::AttributeQuery(format!("{} could not be started: {}", self.program, e))
            })?;

        if !output.status.success() {
            return Err(PadsleepError::AttributeQuery(format!(
                "{} exited with {} for {}",
                self.program,
                output.status,
                path.display()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        if stdout.trim().is_empty() {
            return Err(PadsleepError::AttributeQuery(format!(
                "{} produced no output for {}",
                self.program,
                path.display()
            )));
        }

        Ok(stdout)
    }
}

#[async_trait]
impl AttributeQuery for UdevadmQuery {
    async fn query(&self, path: &Path) -> Option<String> {
        match self.run(path).await {
            Ok(output) => Some(output),
            Err(e) => {
                debug!("{}", e);
                None
            }
        }
    }
}
