//! Turn starters: one chat or direct turn at a time, always preceded by a
//! full cancellation of whatever was in flight.

use std::path::Path;

use crossbeam_channel::Sender;

use crate::cancel::CancellationCoordinator;
use crate::chat::ChatManager;
use crate::dispatch::print_to_content;
use crate::messages::{
    enqueue_tts_end, enqueue_tts_segments, send_ui_message, BlockKind, LogLine, StyledBlock,
    TtsItem, UiMessage,
};
use crate::session::SessionState;
use crate::text::{massage, segment};
use crate::ui::Transcript;

pub struct TurnContext<'a> {
    pub session: &'a mut SessionState,
    pub transcript: &'a mut Transcript,
    pub chat: &'a ChatManager,
    pub coordinator: &'a CancellationCoordinator,
    pub ui_tx: &'a Sender<UiMessage>,
    pub tts_tx: &'a Sender<TtsItem>,
    pub config_path: &'a Path,
}

/// Starts an LLM streaming turn. Everything after the placeholder arrives
/// asynchronously through the queues.
pub fn begin_chat_turn(input: &str, ctx: &mut TurnContext<'_>) {
    if !ctx.chat.is_configured() {
        send_ui_message(
            ctx.ui_tx,
            UiMessage::Log(LogLine::error(format!(
                "Chat config missing! Edit \"{}\" and fix.",
                ctx.config_path.display()
            ))),
        );
        return;
    }

    ctx.coordinator.stop_all();

    let echo = massage::massage_user_input_for_print(input);
    print_to_content(
        ctx.transcript,
        ctx.session,
        StyledBlock::new(echo, BlockKind::User),
    );

    // Initial block for the assistant's response, replaced by the first chunk.
    print_to_content(
        ctx.transcript,
        ctx.session,
        StyledBlock::new("Sending request...", BlockKind::Pending),
    );
    ctx.session.placeholder_pending = true;

    ctx.chat.make_request(input, &ctx.session.voice_code);
}

/// Speaks direct-mode input: segment, enqueue in exact order, then the end
/// marker. Enqueue order is the playback order contract.
pub fn begin_direct_turn(input: &str, ctx: &mut TurnContext<'_>) {
    let input = massage::transform_direct_mode_input(input);

    if ctx.session.flags.sync_to_audio() {
        print_to_content(
            ctx.transcript,
            ctx.session,
            StyledBlock::new("Starting...", BlockKind::Pending),
        );
        ctx.session.placeholder_pending = true;
    } else {
        print_to_content(
            ctx.transcript,
            ctx.session,
            StyledBlock::new(input.clone(), BlockKind::User),
        );
    }

    ctx.coordinator.stop_all();

    let segments = segment::segment_full_message(&input);
    enqueue_tts_segments(ctx.tts_tx, &segments, &ctx.session.voice_code, false, true);
    enqueue_tts_end(ctx.tts_tx);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioHandle;
    use crate::cancel::StopSignal;
    use crate::chat::SYSTEM_PROMPT;
    use crate::config::EndpointConfig;
    use crate::messages::{SyncedTextQueue, TtsContentItem};
    use crate::session::{Mode, RuntimeFlags};
    use crossbeam_channel::{unbounded, Receiver};
    use std::path::PathBuf;
    use std::sync::Arc;

    struct Fixture {
        session: SessionState,
        transcript: Transcript,
        chat: ChatManager,
        coordinator: CancellationCoordinator,
        ui_tx: Sender<UiMessage>,
        ui_rx: Receiver<UiMessage>,
        tts_tx: Sender<TtsItem>,
        tts_rx: Receiver<TtsItem>,
        config_path: PathBuf,
    }

    impl Fixture {
        fn new(sync_to_audio: bool, chat_endpoint: Option<EndpointConfig>) -> Self {
            let (ui_tx, ui_rx) = unbounded::<UiMessage>();
            let (tts_tx, tts_rx) = unbounded::<TtsItem>();
            let (_block_tx, block_rx) = unbounded::<Vec<i16>>();
            let chat =
                ChatManager::new(chat_endpoint, SYSTEM_PROMPT, ui_tx.clone(), tts_tx.clone());
            let coordinator = CancellationCoordinator::new(
                StopSignal::new(),
                chat.abort_handle(),
                AudioHandle::new(tts_rx.clone(), block_rx),
                ui_rx.clone(),
                SyncedTextQueue::new(),
            );
            Self {
                session: SessionState::new(
                    Mode::Direct,
                    "tara".to_string(),
                    Arc::new(RuntimeFlags::new(sync_to_audio, false)),
                ),
                transcript: Transcript::new(),
                chat,
                coordinator,
                ui_tx,
                ui_rx,
                tts_tx,
                tts_rx,
                config_path: PathBuf::from("/tmp/talkterm-test/config.json"),
            }
        }

        fn ctx(&mut self) -> TurnContext<'_> {
            TurnContext {
                session: &mut self.session,
                transcript: &mut self.transcript,
                chat: &self.chat,
                coordinator: &self.coordinator,
                ui_tx: &self.ui_tx,
                tts_tx: &self.tts_tx,
                config_path: &self.config_path,
            }
        }

        fn drain_tts(&self) -> Vec<TtsItem> {
            let mut items = Vec::new();
            while let Ok(item) = self.tts_rx.try_recv() {
                items.push(item);
            }
            items
        }
    }

    fn content_item(item: &TtsItem) -> &TtsContentItem {
        match item {
            TtsItem::Content(content) => content,
            other => panic!("expected content item, got {other:?}"),
        }
    }

    #[test]
    fn direct_turn_without_sync_prints_immediately_and_keeps_order() {
        let mut fx = Fixture::new(false, None);
        begin_direct_turn("First one. Second one. Third one.", &mut fx.ctx());

        // Content block added, no placeholder.
        assert_eq!(fx.transcript.len(), 1);
        assert_eq!(fx.transcript.last_block().unwrap().kind, BlockKind::User);
        assert!(!fx.session.placeholder_pending);

        let items = fx.drain_tts();
        assert_eq!(items.len(), 4, "three segments plus end marker: {items:?}");
        let texts: Vec<&str> = items[..3]
            .iter()
            .map(|item| content_item(item).raw_text.as_str())
            .collect();
        assert_eq!(texts, vec!["First one.", "Second one.", "Third one."]);
        assert!(content_item(&items[0]).is_message_start);
        assert!(!content_item(&items[1]).is_message_start);
        assert_eq!(items[3], TtsItem::End);
    }

    #[test]
    fn direct_turn_with_sync_shows_placeholder() {
        let mut fx = Fixture::new(true, None);
        begin_direct_turn("Hello world.", &mut fx.ctx());

        assert!(fx.session.placeholder_pending);
        assert_eq!(fx.transcript.last_block().unwrap().kind, BlockKind::Pending);
        assert_eq!(fx.transcript.last_block().unwrap().text, "Starting...");
    }

    #[test]
    fn chat_turn_unconfigured_fails_locally() {
        let mut fx = Fixture::new(false, None);
        begin_chat_turn("hi", &mut fx.ctx());

        assert!(fx.transcript.is_empty(), "no turn output should print");
        assert!(!fx.session.placeholder_pending);
        assert!(fx.drain_tts().is_empty());
        match fx.ui_rx.try_recv() {
            Ok(UiMessage::Log(line)) => {
                assert!(line.text.contains("Chat config missing"), "got: {}", line.text);
            }
            other => panic!("expected log message, got {other:?}"),
        }
        assert!(
            !fx.coordinator.stop_signal().is_set(),
            "failed start must not cancel anything"
        );
    }

    #[test]
    fn chat_turn_prints_echo_then_placeholder() {
        let mut fx = Fixture::new(false, Some(EndpointConfig::new("http://127.0.0.1:8080")));
        begin_chat_turn("hello there", &mut fx.ctx());

        let blocks: Vec<(String, BlockKind)> = fx
            .transcript
            .blocks()
            .map(|b| (b.text.clone(), b.kind))
            .collect();
        assert_eq!(
            blocks,
            vec![
                ("hello there".to_string(), BlockKind::User),
                ("Sending request...".to_string(), BlockKind::Pending),
            ]
        );
        assert!(fx.session.placeholder_pending, "exactly one placeholder pending");
        assert!(fx.coordinator.stop_signal().is_set());
    }

    #[test]
    fn new_turn_purges_stale_queue_items() {
        let mut fx = Fixture::new(false, None);
        fx.tts_tx.send(TtsItem::End).unwrap();
        fx.ui_tx
            .send(UiMessage::StreamedPrint("stale".to_string()))
            .unwrap();

        begin_direct_turn("Fresh input.", &mut fx.ctx());

        let items = fx.drain_tts();
        // Only the fresh segment and end marker survive.
        assert_eq!(items.len(), 2);
        assert_eq!(content_item(&items[0]).raw_text, "Fresh input.");
    }
}
