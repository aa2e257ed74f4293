//! Command-line flags and the JSON preferences file.


use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::session::{self, Mode};

pub const APP_NAME: &str = "talkterm";

/// CLI options for the talkterm TUI. Settings that persist between runs live
/// in the preferences file instead.
#[derive(Debug, Parser, Clone)]
#[command(about = "Terminal voice chat with streaming TTS", author, version)]
pub struct AppConfig {
    /// Path to the preferences file
    #[arg(long, env = "TALKTERM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable file logging (debug)
    #[arg(long = "logs", env = "TALKTERM_LOGS", default_value_t = false)]
    pub logs: bool,

    /// Disable all file logging (overrides --logs and log env vars)
    #[arg(long = "no-logs", env = "TALKTERM_NO_LOGS", default_value_t = false)]
    pub no_logs: bool,

    /// Allow logging prompt/content snippets (debug log only)
    #[arg(
        long = "log-content",
        env = "TALKTERM_LOG_CONTENT",
        default_value_t = false
    )]
    pub log_content: bool,

    /// Enable verbose timing logs
    #[arg(long)]
    pub log_timings: bool,
}

impl AppConfig {
    pub fn prefs_path(&self) -> PathBuf {
        match &self.config {
            Some(path) => path.clone(),
            None => default_prefs_path(),
        }
    }
}

pub fn default_prefs_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(env::temp_dir)
        .join(APP_NAME)
        .join("config.json")
}

/// Network settings for one completions-style endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub url: String,
    #[serde(default)]
    pub api_key: String,
    /// When set, the key is read from this environment variable instead.
    #[serde(default)]
    pub api_key_environment_variable: String,
    /// Merged into the request body as-is (model, temperature, ...).
    #[serde(default)]
    pub request: serde_json::Map<String, serde_json::Value>,
}

impl EndpointConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: String::new(),
            api_key_environment_variable: String::new(),
            request: serde_json::Map::new(),
        }
    }

    /// The environment variable takes precedence over the inline key.
    pub fn api_key(&self) -> Option<String> {
        if !self.api_key_environment_variable.is_empty() {
            if let Ok(value) = env::var(&self.api_key_environment_variable) {
                if !value.is_empty() {
                    return Some(value);
                }
            }
        }
        if self.api_key.is_empty() {
            None
        } else {
            Some(self.api_key.clone())
        }
    }

    pub fn request_overrides(&self) -> serde_json::Map<String, serde_json::Value> {
        self.request.clone()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PrefsError {
    #[error("Couldn't read \"{path}\": {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("Couldn't parse \"{path}\": {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
    #[error("\"{path}\": a speech endpoint URL is required")]
    MissingSpeechUrl { path: String },
    #[error("Created \"{path}\". Fill in the speech endpoint URL and restart.")]
    CreatedDefault { path: String },
    #[error("Couldn't write default preferences to \"{path}\": {source}")]
    WriteDefault {
        path: String,
        source: std::io::Error,
    },
}

/// Persisted user preferences.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prefs {
    /// Absent (or empty URL) leaves chat mode disabled.
    #[serde(default)]
    pub chat: Option<EndpointConfig>,
    pub speech: EndpointConfig,
    #[serde(default = "default_voice")]
    pub voice: String,
    #[serde(default = "default_mode")]
    pub mode: Mode,
    #[serde(default = "default_true")]
    pub sync_text_to_audio: bool,
    #[serde(default)]
    pub save_audio_to_disk: bool,
    #[serde(default)]
    pub audio_save_dir: Option<PathBuf>,
}

fn default_voice() -> String {
    session::DEFAULT_VOICE.to_string()
}

fn default_mode() -> Mode {
    Mode::Chat
}

fn default_true() -> bool {
    true
}

impl Prefs {
    /// Loads preferences. On first run a template file is written and the
    /// error tells the user to fill it in. Returns an optional user-facing
    /// warning alongside the prefs.
    pub fn load(path: &Path) -> Result<(Prefs, Option<String>), PrefsError> {
        let display = path.display().to_string();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|source| PrefsError::WriteDefault {
                    path: display.clone(),
                    source,
                })?;
            }
            fs::write(path, Self::default_file_contents()).map_err(|source| {
                PrefsError::WriteDefault {
                    path: display.clone(),
                    source,
                }
            })?;
            return Err(PrefsError::CreatedDefault { path: display });
        }

        let text = fs::read_to_string(path).map_err(|source| PrefsError::Read {
            path: display.clone(),
            source,
        })?;
        let prefs: Prefs = serde_json::from_str(&text).map_err(|source| PrefsError::Parse {
            path: display.clone(),
            source,
        })?;
        if prefs.speech.url.is_empty() {
            return Err(PrefsError::MissingSpeechUrl { path: display });
        }

        let warning = if prefs.chat_configured() {
            None
        } else {
            Some(format!(
                "Chat mode is disabled until a chat endpoint is set in \"{display}\"."
            ))
        };
        Ok((prefs, warning))
    }

    fn default_file_contents() -> String {
        let template = Prefs {
            chat: Some(EndpointConfig::new("")),
            speech: EndpointConfig::new(""),
            voice: default_voice(),
            mode: default_mode(),
            sync_text_to_audio: true,
            save_audio_to_disk: false,
            audio_save_dir: None,
        };
        serde_json::to_string_pretty(&template).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn chat_configured(&self) -> bool {
        matches!(&self.chat, Some(endpoint) if !endpoint.url.is_empty())
    }

    pub fn chat_endpoint(&self) -> Option<EndpointConfig> {
        self.chat.clone().filter(|endpoint| !endpoint.url.is_empty())
    }

    /// Falls back to direct mode when the preferred chat mode isn't usable.
    pub fn initial_mode(&self) -> Mode {
        if self.mode == Mode::Chat && self.chat_configured() {
            Mode::Chat
        } else {
            Mode::Direct
        }
    }

    pub fn initial_voice(&self) -> String {
        if session::is_voice_code(&self.voice) {
            self.voice.clone()
        } else {
            session::DEFAULT_VOICE.to_string()
        }
    }

    pub fn save_dir(&self) -> PathBuf {
        self.audio_save_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(env::temp_dir)
                .join(APP_NAME)
        })
    }
}
