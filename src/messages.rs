//! Message types flowing between the workers and the UI loop.
//!
//! Two FIFO queues connect everything: `UiMessage`s drain into the UI loop,
//! `TtsItem`s drain into the audio worker. Both preserve strict enqueue order
//! to their single consumer.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use crossbeam_channel::{Receiver, Sender};
use rand::Rng;

use crate::session;

/// Rendering class for a transcript block. The UI picks a style per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    User,
    Assistant,
    Feedback,
    Pending,
    Stroke,
    Info,
    Warning,
    Error,
}

/// One content block destined for a transcript area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyledBlock {
    pub text: String,
    pub kind: BlockKind,
}

impl StyledBlock {
    pub fn new(text: impl Into<String>, kind: BlockKind) -> Self {
        Self {
            text: text.into(),
            kind,
        }
    }
}

/// Log-area severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub text: String,
    pub level: LogLevel,
}

impl LogLine {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            level: LogLevel::Info,
        }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            level: LogLevel::Warning,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            level: LogLevel::Error,
        }
    }
}

/// Generation progress readout for the status panel. An empty `elapsed`
/// clears the readout.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GenStatus {
    pub text: String,
    pub audio_seconds: f64,
    pub elapsed: f64,
}

/// Text chunk revealed once playback reaches `target_samples` played.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncedTextItem {
    pub display_text: String,
    pub target_samples: u64,
}

/// Everything the UI loop knows how to render, consumed strictly in enqueue
/// order by the single dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub enum UiMessage {
    Print(StyledBlock),
    StreamedPrint(String),
    SyncedPrint(SyncedTextItem),
    Log(LogLine),
    GenStatus(GenStatus),
    AudioBuffer(f32),
}

/// One unit of work for the audio worker, consumed in playback order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TtsItem {
    Content(TtsContentItem),
    /// Marks the end of a message so save-to-disk can finalize.
    End,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TtsContentItem {
    pub raw_text: String,
    pub voice: String,
    /// Assistant text gets stripped of markup before synthesis.
    pub needs_massage: bool,
    pub is_message_start: bool,
}

/// Sends without panicking when the consumer is gone; producers can outlive
/// the loop during shutdown.
pub fn send_ui_message(tx: &Sender<UiMessage>, message: UiMessage) {
    let _ = tx.send(message);
}

/// Drains every queued-but-undelivered item, returning how many were dropped.
pub fn purge<T>(rx: &Receiver<T>) -> usize {
    let mut count = 0;
    while rx.try_recv().is_ok() {
        count += 1;
    }
    count
}

/// Queues text segments for speech in the given order, resolving the
/// `random` sentinel to a concrete voice per segment.
pub fn enqueue_tts_segments(
    tts_tx: &Sender<TtsItem>,
    segments: &[String],
    voice_code: &str,
    needs_massage: bool,
    has_message_start: bool,
) {
    for (i, text) in segments.iter().enumerate() {
        let item = TtsContentItem {
            raw_text: text.clone(),
            voice: resolve_voice(voice_code),
            needs_massage,
            is_message_start: has_message_start && i == 0,
        };
        let _ = tts_tx.send(TtsItem::Content(item));
    }
}

pub fn enqueue_tts_end(tts_tx: &Sender<TtsItem>) {
    let _ = tts_tx.send(TtsItem::End);
}

fn resolve_voice(voice_code: &str) -> String {
    if voice_code == session::RANDOM_VOICE {
        let i = rand::thread_rng().gen_range(0..session::VOICE_CODES.len());
        session::VOICE_CODES[i].to_string()
    } else {
        voice_code.to_string()
    }
}

/// Deque of text chunks scheduled for display in sync with audio playback.
/// Shared between the audio worker (producer and scheduler) and the
/// cancellation path (purge).
#[derive(Clone, Default)]
pub struct SyncedTextQueue {
    inner: Arc<Mutex<VecDeque<SyncedTextItem>>>,
}

impl SyncedTextQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, item: SyncedTextItem) {
        self.lock().push_back(item);
    }

    /// Pops the front item once playback has advanced past its target.
    pub fn pop_ready(&self, played_samples: u64) -> Option<SyncedTextItem> {
        let mut queue = self.lock();
        match queue.front() {
            Some(item) if played_samples >= item.target_samples => queue.pop_front(),
            _ => None,
        }
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<SyncedTextItem>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    #[test]
    fn purge_drains_everything() {
        let (tx, rx) = unbounded();
        for i in 0..5 {
            tx.send(i).unwrap();
        }
        assert_eq!(purge(&rx), 5);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn synced_queue_releases_in_order_at_target() {
        let queue = SyncedTextQueue::new();
        queue.push(SyncedTextItem {
            display_text: "a".into(),
            target_samples: 100,
        });
        queue.push(SyncedTextItem {
            display_text: "b".into(),
            target_samples: 200,
        });

        assert_eq!(queue.pop_ready(50), None);
        assert_eq!(queue.pop_ready(150).map(|i| i.display_text), Some("a".into()));
        assert_eq!(queue.pop_ready(150), None);
        assert_eq!(queue.pop_ready(250).map(|i| i.display_text), Some("b".into()));
        assert!(queue.is_empty());
    }

    #[test]
    fn enqueue_flags_only_first_segment_as_message_start() {
        let (tx, rx) = unbounded();
        let segments = vec!["one".to_string(), "two".to_string()];
        enqueue_tts_segments(&tx, &segments, "leo", false, true);
        enqueue_tts_end(&tx);

        match rx.try_recv().unwrap() {
            TtsItem::Content(item) => {
                assert!(item.is_message_start);
                assert_eq!(item.voice, "leo");
                assert_eq!(item.raw_text, "one");
            }
            other => panic!("expected content item, got {other:?}"),
        }
        match rx.try_recv().unwrap() {
            TtsItem::Content(item) => assert!(!item.is_message_start),
            other => panic!("expected content item, got {other:?}"),
        }
        assert_eq!(rx.try_recv().unwrap(), TtsItem::End);
    }

    #[test]
    fn random_voice_resolves_to_concrete_voice() {
        let (tx, rx) = unbounded();
        enqueue_tts_segments(&tx, &["hey".to_string()], crate::session::RANDOM_VOICE, false, true);
        match rx.try_recv().unwrap() {
            TtsItem::Content(item) => {
                assert!(crate::session::VOICE_CODES.contains(&item.voice.as_str()));
            }
            other => panic!("expected content item, got {other:?}"),
        }
    }
}
