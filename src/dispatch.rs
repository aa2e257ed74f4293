//! Single-consumer rendering rules for the UI message queue.
//!
//! The UI loop drains the queue one message at a time and applies exactly one
//! rule per message kind, in strict receipt order. Nothing here may fail: a
//! malformed message is a programming defect, not a runtime condition.

use crate::messages::{BlockKind, GenStatus, LogLevel, StyledBlock, UiMessage};
use crate::session::SessionState;
use crate::ui::Transcript;

/// Where dispatched messages land; all owned by the UI loop.
pub struct DispatchTargets<'a> {
    pub session: &'a mut SessionState,
    pub content: &'a mut Transcript,
    pub log: &'a mut Transcript,
    pub gen_status: &'a mut GenStatus,
    pub audio_buffer_seconds: &'a mut f32,
}

/// Appends a block to the content area, honoring the one-shot display flags:
/// a pending placeholder is erased first, and a pending stroke separator is
/// inserted before the new block.
pub fn print_to_content(
    transcript: &mut Transcript,
    session: &mut SessionState,
    block: StyledBlock,
) {
    if session.placeholder_pending {
        session.placeholder_pending = false;
        transcript.erase_last_block();
    }
    if session.stroke_pending {
        session.stroke_pending = false;
        transcript.add_block(StyledBlock::new("", BlockKind::Stroke));
    }
    transcript.add_block(block);
}

/// Applies one message. Never reorders, never batches.
pub fn apply_ui_message(targets: &mut DispatchTargets<'_>, message: UiMessage) {
    match message {
        UiMessage::Print(block) => {
            print_to_content(targets.content, targets.session, block);
        }

        UiMessage::StreamedPrint(text) => {
            // Active only while text tracks generation speed.
            if !targets.session.flags.sync_to_audio() {
                if targets.session.placeholder_pending {
                    targets
                        .content
                        .replace_last_block(StyledBlock::new(text, BlockKind::Assistant));
                } else {
                    targets.content.append_to_last_block(&text);
                }
                targets.session.placeholder_pending = false;
            }
        }

        UiMessage::SyncedPrint(item) => {
            // Active only while text tracks audio playback.
            if targets.session.flags.sync_to_audio() {
                if targets.session.placeholder_pending {
                    targets
                        .content
                        .replace_last_block(StyledBlock::new(item.display_text, BlockKind::Assistant));
                } else {
                    let needs_space = targets
                        .content
                        .last_block()
                        .map(|block| !block.text.is_empty() && !block.text.ends_with(char::is_whitespace))
                        .unwrap_or(false);
                    if needs_space {
                        targets.content.append_to_last_block(" ");
                    }
                    targets.content.append_to_last_block(&item.display_text);
                }
                targets.session.placeholder_pending = false;
            }
        }

        UiMessage::Log(line) => {
            let kind = match line.level {
                LogLevel::Info => BlockKind::Info,
                LogLevel::Warning => BlockKind::Warning,
                LogLevel::Error => BlockKind::Error,
            };
            targets.log.add_block(StyledBlock::new(line.text, kind));
        }

        UiMessage::GenStatus(status) => {
            *targets.gen_status = status;
        }

        UiMessage::AudioBuffer(seconds) => {
            *targets.audio_buffer_seconds = seconds;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{LogLine, SyncedTextItem};
    use crate::session::{Mode, RuntimeFlags};
    use std::sync::Arc;

    struct Fixture {
        session: SessionState,
        content: Transcript,
        log: Transcript,
        gen_status: GenStatus,
        audio_buffer_seconds: f32,
    }

    impl Fixture {
        fn new(sync_to_audio: bool) -> Self {
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
            }
        }

        fn apply(&mut self, message: UiMessage) {
            let mut targets = DispatchTargets {
                session: &mut self.session,
                content: &mut self.content,
                log: &mut self.log,
                gen_status: &mut self.gen_status,
                audio_buffer_seconds: &mut self.audio_buffer_seconds,
            };
            apply_ui_message(&mut targets, message);
        }

        fn content_texts(&self) -> Vec<String> {
            self.content.blocks().map(|b| b.text.clone()).collect()
        }
    }

    fn assistant(text: &str) -> StyledBlock {
        StyledBlock::new(text, BlockKind::Assistant)
    }

    #[test]
    fn print_always_appends_a_block() {
        let mut fx = Fixture::new(false);
        fx.apply(UiMessage::Print(assistant("one")));
        fx.apply(UiMessage::Print(assistant("two")));
        assert_eq!(fx.content_texts(), vec!["one", "two"]);
    }

    #[test]
    fn streamed_print_replaces_placeholder_then_appends() {
        let mut fx = Fixture::new(false);
        fx.apply(UiMessage::Print(StyledBlock::new(
            "Sending request...",
            BlockKind::Pending,
        )));
        fx.session.placeholder_pending = true;

        fx.apply(UiMessage::StreamedPrint("Hello".to_string()));
        assert_eq!(fx.content_texts(), vec!["Hello"]);
        assert!(!fx.session.placeholder_pending);

        fx.apply(UiMessage::StreamedPrint(", world".to_string()));
        assert_eq!(fx.content_texts(), vec!["Hello, world"]);
    }

    #[test]
    fn streamed_print_is_inert_when_sync_is_on() {
        let mut fx = Fixture::new(true);
        fx.session.placeholder_pending = true;
        fx.apply(UiMessage::StreamedPrint("Hello".to_string()));
        assert!(fx.content_texts().is_empty());
        assert!(
            fx.session.placeholder_pending,
            "placeholder stays until a synced chunk lands"
        );
    }

    #[test]
    fn synced_print_replaces_placeholder_when_sync_is_on() {
        let mut fx = Fixture::new(true);
        fx.apply(UiMessage::Print(StyledBlock::new(
            "Starting...",
            BlockKind::Pending,
        )));
        fx.session.placeholder_pending = true;

        fx.apply(UiMessage::SyncedPrint(SyncedTextItem {
            display_text: "First segment.".to_string(),
            target_samples: 0,
        }));
        assert_eq!(fx.content_texts(), vec!["First segment."]);

        fx.apply(UiMessage::SyncedPrint(SyncedTextItem {
            display_text: "Second segment.".to_string(),
            target_samples: 0,
        }));
        assert_eq!(fx.content_texts(), vec!["First segment. Second segment."]);
    }

    #[test]
    fn synced_print_is_inert_when_sync_is_off() {
        let mut fx = Fixture::new(false);
        fx.apply(UiMessage::SyncedPrint(SyncedTextItem {
            display_text: "ghost".to_string(),
            target_samples: 0,
        }));
        assert!(fx.content_texts().is_empty());
    }

    #[test]
    fn stroke_prints_once_before_next_content() {
        let mut fx = Fixture::new(false);
        fx.session.stroke_pending = true;
        fx.apply(UiMessage::Print(assistant("after stroke")));
        let blocks: Vec<BlockKind> = fx.content.blocks().map(|b| b.kind).collect();
        assert_eq!(blocks, vec![BlockKind::Stroke, BlockKind::Assistant]);
        assert!(!fx.session.stroke_pending);

        fx.apply(UiMessage::Print(assistant("no stroke now")));
        assert_eq!(fx.content.len(), 3);
    }

    #[test]
    fn log_messages_go_to_the_log_area_only() {
        let mut fx = Fixture::new(false);
        fx.session.placeholder_pending = true;
        fx.apply(UiMessage::Log(LogLine::warning("careful")));
        assert_eq!(fx.log.len(), 1);
        assert!(fx.content.is_empty());
        assert!(
            fx.session.placeholder_pending,
            "log output must not touch the placeholder"
        );
    }

    #[test]
    fn status_readouts_update_in_place() {
        let mut fx = Fixture::new(false);
        fx.apply(UiMessage::GenStatus(GenStatus {
            text: "speaking".to_string(),
            audio_seconds: 1.5,
            elapsed: 0.5,
        }));
        assert_eq!(fx.gen_status.text, "speaking");
        fx.apply(UiMessage::AudioBuffer(2.5));
        assert_eq!(fx.audio_buffer_seconds, 2.5);
    }

    #[test]
    fn placeholder_erase_happens_once() {
        let mut fx = Fixture::new(false);
        fx.apply(UiMessage::Print(StyledBlock::new(
            "Sending request...",
            BlockKind::Pending,
        )));
        fx.session.placeholder_pending = true;

        fx.apply(UiMessage::Print(assistant("feedback")));
        assert_eq!(fx.content_texts(), vec!["feedback"]);

        fx.apply(UiMessage::Print(assistant("more")));
        assert_eq!(fx.content_texts(), vec!["feedback", "more"]);
    }
}
