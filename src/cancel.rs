//! Best-effort, idempotent cancellation of everything in flight.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::Receiver;

use crate::audio::AudioHandle;
use crate::chat::AbortHandle;
use crate::messages::{purge, SyncedTextQueue, UiMessage};

/// Cooperative stop request shared with the audio worker. Raising it is a
/// request, not a guarantee of immediate halt; the worker acknowledges and
/// clears it at item boundaries.
#[derive(Clone, Debug, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Acknowledge and clear. Called by the audio worker only.
    pub fn clear(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

/// Halts in-flight producers and purges the queues. Callers invoke `stop_all`
/// before starting a new turn or printing command feedback so stale output
/// never interleaves with fresh output.
pub struct CancellationCoordinator {
    stop: StopSignal,
    chat_abort: AbortHandle,
    audio: AudioHandle,
    ui_rx: Receiver<UiMessage>,
    synced: SyncedTextQueue,
}

impl CancellationCoordinator {
    pub fn new(
        stop: StopSignal,
        chat_abort: AbortHandle,
        audio: AudioHandle,
        ui_rx: Receiver<UiMessage>,
        synced: SyncedTextQueue,
    ) -> Self {
        Self {
            stop,
            chat_abort,
            audio,
            ui_rx,
            synced,
        }
    }

    /// Raise the stop signal, abort any chat stream, and purge every queue.
    /// Safe to call repeatedly; queues end up empty either way. Never fails;
    /// all sub-actions are best-effort.
    pub fn stop_all(&self) {
        self.stop.set();
        self.chat_abort.abort();
        self.audio.clear_queues();
        purge(&self.ui_rx);
        self.synced.clear();
    }

    pub fn stop_signal(&self) -> &StopSignal {
        &self.stop
    }
}
