//! End-to-end exercise of the turn / queue / dispatch pipeline with the
//! audio device and network collaborators stubbed out by driving the queues
//! directly.

use std::path::PathBuf;
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};

use talkterm::audio::AudioHandle;
use talkterm::cancel::{CancellationCoordinator, StopSignal};
use talkterm::chat::{ChatManager, SYSTEM_PROMPT};
use talkterm::dispatch::{apply_ui_message, DispatchTargets};
use talkterm::messages::{
    BlockKind, GenStatus, StyledBlock, SyncedTextItem, SyncedTextQueue, TtsItem, UiMessage,
};
use talkterm::orchestrator::{begin_chat_turn, begin_direct_turn, TurnContext};
use talkterm::session::{Mode, RuntimeFlags, SessionState};
use talkterm::ui::Transcript;

struct Harness {
    session: SessionState,
    content: Transcript,
    log: Transcript,
    gen_status: GenStatus,
    audio_buffer_seconds: f32,
    chat: ChatManager,
    coordinator: CancellationCoordinator,
    ui_tx: Sender<UiMessage>,
    ui_rx: Receiver<UiMessage>,
    tts_tx: Sender<TtsItem>,
    tts_rx: Receiver<TtsItem>,
    synced: SyncedTextQueue,
    config_path: PathBuf,
}

impl Harness {
    fn new(sync_to_audio: bool) -> Self {
        let (ui_tx, ui_rx) = unbounded::<UiMessage>();
        let (tts_tx, tts_rx) = unbounded::<TtsItem>();
        let (_block_tx, block_rx) = unbounded::<Vec<i16>>();
        let synced = SyncedTextQueue::new();
        let chat = ChatManager::new(None, SYSTEM_PROMPT, ui_tx.clone(), tts_tx.clone());
        let coordinator = CancellationCoordinator::new(
            StopSignal::new(),
            chat.abort_handle(),
            AudioHandle::new(tts_rx.clone(), block_rx),
            ui_rx.clone(),
            synced.clone(),
        );
        Self {
            session: SessionState::new(
                Mode::Direct,
                "tara".to_string(),
                Arc::new(RuntimeFlags::new(sync_to_audio, false)),
            ),
            content: Transcript::new(),
            log: Transcript::new(),
            gen_status: GenStatus::default(),
            audio_buffer_seconds: 0.0,
            chat,
            coordinator,
            ui_tx,
            ui_rx,
            tts_tx,
            tts_rx,
            synced,
            config_path: PathBuf::from("/tmp/talkterm-test/config.json"),
        }
    }

    fn begin_direct(&mut self, input: &str) {
        let mut ctx = TurnContext {
            session: &mut self.session,
            transcript: &mut self.content,
            chat: &self.chat,
            coordinator: &self.coordinator,
            ui_tx: &self.ui_tx,
            tts_tx: &self.tts_tx,
            config_path: &self.config_path,
        };
        begin_direct_turn(input, &mut ctx);
    }

    fn drain_ui_into_dispatch(&mut self) {
        while let Ok(message) = self.ui_rx.try_recv() {
            let mut targets = DispatchTargets {
                session: &mut self.session,
                content: &mut self.content,
                log: &mut self.log,
                gen_status: &mut self.gen_status,
                audio_buffer_seconds: &mut self.audio_buffer_seconds,
            };
            apply_ui_message(&mut targets, message);
        }
    }

    fn content_texts(&self) -> Vec<String> {
        self.content.blocks().map(|b| b.text.clone()).collect()
    }
}

/// Stands in for the audio worker: takes TTS items off the queue in order
/// and emits the synced-text messages playback would produce.
fn run_fake_audio_worker(harness: &Harness) -> Vec<String> {
    let mut spoken = Vec::new();
    while let Ok(item) = harness.tts_rx.try_recv() {
        match item {
            TtsItem::Content(content) => {
                harness.synced.push(SyncedTextItem {
                    display_text: content.raw_text.clone(),
                    target_samples: 0,
                });
                spoken.push(content.raw_text);
            }
            TtsItem::End => break,
        }
    }
    // Playback has "reached" every target; release in order.
    while let Some(item) = harness.synced.pop_ready(u64::MAX) {
        let _ = harness.ui_tx.send(UiMessage::SyncedPrint(item));
    }
    spoken
}

#[test]
fn direct_turn_plays_segments_in_order_and_reveals_synced_text() {
    let mut harness = Harness::new(true);
    harness.begin_direct("One here. Two here. Three here.");

    // Placeholder is up while the turn is pending.
    assert!(harness.session.placeholder_pending);
    assert_eq!(
        harness.content.last_block().unwrap().kind,
        BlockKind::Pending
    );

    let spoken = run_fake_audio_worker(&harness);
    assert_eq!(spoken, vec!["One here.", "Two here.", "Three here."]);

    harness.drain_ui_into_dispatch();

    // The placeholder was replaced (not appended after) by the first synced
    // chunk, and the rest accumulated into the same block.
    assert!(!harness.session.placeholder_pending);
    assert_eq!(
        harness.content_texts(),
        vec!["One here. Two here. Three here."]
    );
}

#[test]
fn direct_turn_without_sync_prints_once_and_ignores_synced_echo() {
    let mut harness = Harness::new(false);
    harness.begin_direct("Hello world.");

    assert!(!harness.session.placeholder_pending);
    assert_eq!(harness.content_texts(), vec!["Hello world."]);

    run_fake_audio_worker(&harness);
    harness.drain_ui_into_dispatch();

    // Synced prints are inert when sync-to-audio is off.
    assert_eq!(harness.content_texts(), vec!["Hello world."]);
}

#[test]
fn stop_between_turns_discards_stale_output() {
    let mut harness = Harness::new(true);
    harness.begin_direct("Old turn sentence.");

    // Stale turn cancelled before its audio ever ran.
    harness.coordinator.stop_all();
    assert!(harness.tts_rx.try_recv().is_err());
    assert!(harness.synced.is_empty());

    harness.begin_direct("New turn sentence.");
    let spoken = run_fake_audio_worker(&harness);
    assert_eq!(spoken, vec!["New turn sentence."]);

    harness.drain_ui_into_dispatch();
    let texts = harness.content_texts();
    assert!(
        texts.last().unwrap().contains("New turn sentence."),
        "stale text must not interleave: {texts:?}"
    );
}

#[test]
fn unconfigured_chat_turn_only_logs() {
    let mut harness = Harness::new(false);
    let mut ctx = TurnContext {
        session: &mut harness.session,
        transcript: &mut harness.content,
        chat: &harness.chat,
        coordinator: &harness.coordinator,
        ui_tx: &harness.ui_tx,
        tts_tx: &harness.tts_tx,
        config_path: &harness.config_path,
    };
    begin_chat_turn("hi", &mut ctx);

    harness.drain_ui_into_dispatch();
    assert!(harness.content.is_empty());
    assert_eq!(harness.log.len(), 1);
    assert_eq!(
        harness.log.blocks().next().unwrap().kind,
        BlockKind::Error
    );
}

#[test]
fn feedback_print_lands_after_stroke_separator() {
    let mut harness = Harness::new(false);
    harness.session.stroke_pending = true;
    let mut targets = DispatchTargets {
        session: &mut harness.session,
        content: &mut harness.content,
        log: &mut harness.log,
        gen_status: &mut harness.gen_status,
        audio_buffer_seconds: &mut harness.audio_buffer_seconds,
    };
    apply_ui_message(
        &mut targets,
        UiMessage::Print(StyledBlock::new("Switched modes", BlockKind::Feedback)),
    );

    let kinds: Vec<BlockKind> = harness.content.blocks().map(|b| b.kind).collect();
    assert_eq!(kinds, vec![BlockKind::Stroke, BlockKind::Feedback]);
}
