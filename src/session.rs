//! Session-scoped interaction state: mode, voice, and the display flags.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Voices the speech model was tuned with.
pub const VOICE_CODES: &[&str] = &["tara", "leah", "jess", "leo", "dan", "mia", "zac", "zoe"];

/// Sentinel that picks a concrete voice per generated segment.
pub const RANDOM_VOICE: &str = "random";

pub const DEFAULT_VOICE: &str = "tara";

pub fn is_voice_code(token: &str) -> bool {
    token == RANDOM_VOICE || VOICE_CODES.contains(&token)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Chat,
    Direct,
}

impl Mode {
    pub fn label(self) -> &'static str {
        match self {
            Mode::Chat => "chat mode",
            Mode::Direct => "direct input mode",
        }
    }
}

/// Toggles the worker threads read at their own pace. Written only by the
/// command path.
#[derive(Debug, Default)]
pub struct RuntimeFlags {
    sync_to_audio: AtomicBool,
    save_to_disk: AtomicBool,
}

impl RuntimeFlags {
    pub fn new(sync_to_audio: bool, save_to_disk: bool) -> Self {
        Self {
            sync_to_audio: AtomicBool::new(sync_to_audio),
            save_to_disk: AtomicBool::new(save_to_disk),
        }
    }

    pub fn sync_to_audio(&self) -> bool {
        self.sync_to_audio.load(Ordering::Relaxed)
    }

    pub fn set_sync_to_audio(&self, value: bool) {
        self.sync_to_audio.store(value, Ordering::Relaxed);
    }

    pub fn save_to_disk(&self) -> bool {
        self.save_to_disk.load(Ordering::Relaxed)
    }

    pub fn set_save_to_disk(&self, value: bool) {
        self.save_to_disk.store(value, Ordering::Relaxed);
    }
}

/// Mutable interaction state owned by the UI loop.
pub struct SessionState {
    pub mode: Mode,
    pub voice_code: String,
    pub flags: Arc<RuntimeFlags>,
    /// A provisional "generating" block is on screen awaiting replacement.
    /// Set by the turn starters, cleared exactly once by the print path or
    /// the first streamed/synced chunk.
    pub placeholder_pending: bool,
    /// A separator block must precede the next content print.
    pub stroke_pending: bool,
}

impl SessionState {
    pub fn new(mode: Mode, voice_code: String, flags: Arc<RuntimeFlags>) -> Self {
        Self {
            mode,
            voice_code,
            flags,
            placeholder_pending: false,
            stroke_pending: false,
        }
    }
}
