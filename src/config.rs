use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

use crate::session::DEFAULT_WORKSPACE_TIMEOUT;

/// Greeting shown in a fresh or cleared workspace.
pub const DEFAULT_GREETING: &str = "Hello! Upload a PDF to start. I can answer in any language!";

/// Greeting shown after a local reset.
pub const DEFAULT_RESET_GREETING: &str = "Ready for a new document! Upload one to begin.";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Port to listen on
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Base URL of the RAG backend
    #[arg(long, env = "BACKEND_URL")]
    pub backend_url: Option<String>,

    /// Disable text-to-speech playback
    #[arg(long, env = "SPEECH_DISABLED")]
    pub speech_disabled: Option<bool>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub backend: BackendConfig,
    pub assistant: AssistantConfig,
    pub speech: SpeechConfig,
    pub upload: UploadConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    /// Idle time after which a workspace is dropped.
    pub workspace_ttl_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// How the summary action talks to the backend.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SummaryMode {
    /// Send a fixed summary prompt through `/query`.
    #[default]
    Query,
    /// Call the dedicated `/summarize` endpoint.
    Endpoint,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AssistantConfig {
    pub greeting: String,
    pub reset_greeting: String,
    pub summary_mode: SummaryMode,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            greeting: DEFAULT_GREETING.to_string(),
            reset_greeting: DEFAULT_RESET_GREETING.to_string(),
            summary_mode: SummaryMode::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SpeechConfig {
    pub enabled: bool,
    /// TTS program; the utterance is passed as its last argument.
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UploadConfig {
    pub max_bytes: usize,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from_args(std::env::args())
    }

    pub fn load_from_args<I, T>(args: I) -> Result<Self, config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;

        // Priority: CLI flag / CLI env var > PDFCHAT_ env > config file > defaults.
        let mut builder = Config::builder()
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default(
                "server.workspace_ttl_secs",
                DEFAULT_WORKSPACE_TIMEOUT.as_secs(),
            )?
            .set_default("backend.base_url", "http://127.0.0.1:8000")?
            .set_default("backend.timeout_secs", 120)?
            .set_default("assistant.greeting", DEFAULT_GREETING)?
            .set_default("assistant.reset_greeting", DEFAULT_RESET_GREETING)?
            .set_default("assistant.summary_mode", "query")?
            .set_default("speech.enabled", true)?
            .set_default("speech.command", "espeak-ng")?
            .set_default("speech.args", Vec::<String>::new())?
            .set_default("upload.max_bytes", 50 * 1024 * 1024)?;

        builder = match &cli.config {
            Some(path) => builder.add_source(File::from(path.as_path()).format(FileFormat::Yaml)),
            None => builder.add_source(File::new("config.yaml", FileFormat::Yaml).required(false)),
        };

        // E.g. PDFCHAT_SERVER__PORT=8000
        builder = builder.add_source(
            Environment::with_prefix("PDFCHAT")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        if let Some(port) = cli.port {
            builder = builder.set_override("server.port", i64::from(port))?;
        }
        if let Some(url) = cli.backend_url {
            builder = builder.set_override("backend.base_url", url)?;
        }
        if let Some(disabled) = cli.speech_disabled {
            builder = builder.set_override("speech.enabled", !disabled)?;
        }

        builder.build()?.try_deserialize()
    }
}
