//! Text-to-speech engines.

use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

use crate::config::SpeechConfig;

#[derive(Error, Debug)]
pub enum SpeechError {
    #[error("Speech playback is disabled")]
    Disabled,

    #[error("Nothing to speak")]
    EmptyUtterance,

    #[error("Failed to start speech command: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Speech command exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
}

/// A platform speech synthesizer.
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    /// Speak `text`, resolving once playback has finished.
    ///
    /// Dropping the returned future must stop playback.
    async fn speak(&self, text: &str) -> Result<(), SpeechError>;
}

/// Speaks by running an external TTS program (`espeak-ng`, `say`, ...).
#[derive(Debug, Clone)]
pub struct CommandEngine {
    command: String,
    args: Vec<String>,
}

impl CommandEngine {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }

    pub fn from_config(config: &SpeechConfig) -> Self {
        Self::new(config.command.clone(), config.args.clone())
    }
}

#[async_trait]
impl SpeechEngine for CommandEngine {
    async fn speak(&self, text: &str) -> Result<(), SpeechError> {
        debug!(command = %self.command, chars = text.len(), "Starting speech command");
        let output = Command::new(&self.command)
            .args(&self.args)
            .arg(text)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        if output.status.success() {
            Ok(())
        } else {
            Err(SpeechError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}
