//! Hand the aggregated document to the local print spooler.

use std::path::Path;
use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{DriveError, Result};

/// Pipes document bytes into a print submission command such as `lpr`.
#[derive(Debug, Clone)]
pub struct PrintDispatcher {
    command: String,
}

impl PrintDispatcher {
    /// `command` is a program followed by whitespace-separated arguments.
    pub fn new<S: Into<String>>(command: S) -> Self {
        Self {
            command: command.into(),
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Read `path` and print it.
    pub async fn print_file(&self, path: &Path) -> Result<()> {
        let data = tokio::fs::read(path).await?;
        info!(path = %path.display(), command = %self.command, "Sending to printer");
        self.print(data).await
    }

    /// Stream `data` to the print command's stdin and wait for it to exit.
    ///
    /// The bytes are written from a separate task while the child is awaited;
    /// both must finish before this returns.
    pub async fn print(&self, data: Vec<u8>) -> Result<()> {
        let mut parts = self.command.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| DriveError::PrintError("print command is empty".to_string()))?;

        let mut child = Command::new(program)
            .args(parts)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| DriveError::PrintError(format!("failed to start {}: {}", program, e)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| DriveError::PrintError("child stdin unavailable".to_string()))?;

        let size = data.len();
        let feeder = tokio::spawn(async move {
            let result = stdin.write_all(&data).await;
            drop(stdin);
            result
        });

        let status = child
            .wait()
            .await
            .map_err(|e| DriveError::PrintError(format!("waiting for {}: {}", program, e)))?;
        let fed = feeder
            .await
            .map_err(|e| DriveError::PrintError(format!("stdin writer failed: {}", e)))?;

        if !status.success() {
            return Err(DriveError::PrintError(format!(
                "{} exited with {}",
                program, status
            )));
        }
        fed.map_err(|e| DriveError::PrintError(format!("writing to {}: {}", program, e)))?;

        debug!(bytes = size, "Print job submitted");
        Ok(())
    }
}
