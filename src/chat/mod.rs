//! Chat-completions streaming against an OpenAI-style endpoint.
//!
//! `ChatManager` owns the conversation history and runs each request on a
//! fire-and-forget thread; `streamer` does the blocking SSE consumption and
//! feeds the UI and TTS queues as deltas arrive.

mod streamer;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;

use crossbeam_channel::Sender;

use crate::config::EndpointConfig;
use crate::log_debug;
use crate::messages::{send_ui_message, LogLine, TtsItem, UiMessage};

/// Default system prompt steering the model toward speakable plain text with
/// emote tags instead of emoji or markup.
pub const SYSTEM_PROMPT: &str = "\
You are a conversational AI designed to sound engaging and human when read aloud. \
Do not use emojis under any circumstances. Instead, sparingly weave in these text tags \
to convey emotion where a person would naturally react: <giggle>, <laugh>, <chuckle>, \
<sigh>, <cough>, <sniffle>, <groan>, <yawn>, <gasp>.\n\
Generate plain text suitable for being read aloud directly: no markdown formatting \
markers (asterisks, underscores, headings, code fences), no hyperlink or image syntax, \
and no symbols used purely for visual separation.\n\
Use periods at the end of sentences and make liberal use of commas to mark pauses in \
the speech delivery. Prefer phrasing list items within sentences.";

/// Lets the cancellation path abort whichever stream is currently running.
#[derive(Clone, Default)]
pub struct AbortHandle {
    current: Arc<Mutex<Option<Arc<AtomicBool>>>>,
}

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        if let Some(flag) = self.lock().as_ref() {
            flag.store(true, Ordering::Relaxed);
        }
    }

    /// Installs a fresh flag for a new stream and returns it.
    fn arm(&self) -> Arc<AtomicBool> {
        let flag = Arc::new(AtomicBool::new(false));
        *self.lock() = Some(flag.clone());
        flag
    }

    fn lock(&self) -> MutexGuard<'_, Option<Arc<AtomicBool>>> {
        self.current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Wraps the streaming client and maintains chat history across turns.
pub struct ChatManager {
    config: Option<EndpointConfig>,
    system_prompt: String,
    history: Arc<Mutex<Vec<(String, String)>>>,
    abort: AbortHandle,
    ui_tx: Sender<UiMessage>,
    tts_tx: Sender<TtsItem>,
}

impl ChatManager {
    pub fn new(
        config: Option<EndpointConfig>,
        system_prompt: &str,
        ui_tx: Sender<UiMessage>,
        tts_tx: Sender<TtsItem>,
    ) -> Self {
        let manager = Self {
            config,
            system_prompt: system_prompt.to_string(),
            history: Arc::new(Mutex::new(Vec::new())),
            abort: AbortHandle::new(),
            ui_tx,
            tts_tx,
        };
        manager.init_history();
        manager
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_some()
    }

    pub fn endpoint_url(&self) -> Option<&str> {
        self.config.as_ref().map(|config| config.url.as_str())
    }

    /// Resets the conversation to just the system prompt.
    pub fn init_history(&self) {
        let mut history = lock(&self.history);
        history.clear();
        if !self.system_prompt.is_empty() {
            history.push(("system".to_string(), self.system_prompt.clone()));
        }
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Aborts streaming the current response, if any.
    pub fn abort(&self) {
        self.abort.abort();
    }

    /// Fire-and-forget streaming request; all output arrives asynchronously
    /// through the UI and TTS queues.
    pub fn make_request(&self, user_prompt: &str, voice: &str) {
        let Some(config) = self.config.clone() else {
            return;
        };
        // Replace any stream still running before arming a new flag.
        self.abort.abort();
        let abort_flag = self.abort.arm();

        let history = self.history.clone();
        let ui_tx = self.ui_tx.clone();
        let tts_tx = self.tts_tx.clone();
        let user_prompt = user_prompt.to_string();
        let voice = voice.to_string();

        thread::spawn(move || {
            let snapshot = lock(&history).clone();
            let result = streamer::stream_completion(
                &config,
                &snapshot,
                &user_prompt,
                &voice,
                &abort_flag,
                &ui_tx,
                &tts_tx,
            );
            match result {
                Ok(Some(content)) if !content.is_empty() => {
                    let mut history = lock(&history);
                    history.push(("user".to_string(), user_prompt));
                    history.push(("assistant".to_string(), content));
                }
                Ok(_) => {
                    log_debug("chat stream ended without content (aborted or empty)");
                }
                Err(err) => {
                    send_ui_message(&ui_tx, UiMessage::Log(LogLine::error(format!("{err:#}"))));
                }
            }
        });
    }

    #[cfg(test)]
    pub(crate) fn history_snapshot(&self) -> Vec<(String, String)> {
        lock(&self.history).clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
