//! `!`-prefixed command handling.


use std::fs;
use std::path::Path;

use crate::cancel::CancellationCoordinator;
use crate::chat::ChatManager;
use crate::session::{self, Mode, SessionState};

/// What the caller should do after a command is processed.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CommandOutcome {
    pub feedback: Option<String>,
    pub show_menu: bool,
    /// Mode or voice changed versus the pre-command snapshot.
    pub title_dirty: bool,
    pub quit: bool,
}

/// Everything a command may touch. The command path runs on the UI loop, so
/// all of this is borrowed for the duration of one cooperative step.
pub struct CommandContext<'a> {
    pub session: &'a mut SessionState,
    pub chat: &'a ChatManager,
    pub coordinator: &'a CancellationCoordinator,
    pub config_path: &'a Path,
    pub audio_save_dir: &'a Path,
}

/// Returns the command token when raw input addresses the command processor
/// rather than a turn: a `!` followed by letters only.
pub fn parse(input: &str) -> Option<&str> {
    let rest = input.strip_prefix('!')?;
    if !rest.is_empty() && rest.chars().all(|c| c.is_ascii_alphabetic()) {
        Some(rest)
    } else {
        None
    }
}

/// Processes one command token. Whenever feedback or the menu will be shown,
/// the coordinator is invoked first so stale turn output can't interleave
/// with the command's own output.
pub fn process(command: &str, ctx: &mut CommandContext<'_>) -> CommandOutcome {
    let was_mode = ctx.session.mode;
    let was_voice = ctx.session.voice_code.clone();
    let mut feedback = None;
    let mut show_menu = false;
    let mut quit = false;

    match command {
        voice if session::is_voice_code(voice) => {
            ctx.session.voice_code = voice.to_string();
            feedback = Some(if voice == session::RANDOM_VOICE {
                "Changed voice to: Random voice per generated audio segment".to_string()
            } else {
                format!("Changed voice to: {voice}")
            });
        }

        "clear" => {
            if ctx.session.mode == Mode::Chat {
                ctx.chat.init_history();
                ctx.session.stroke_pending = true;
                ctx.coordinator.stop_all();
                feedback = Some("Cleared chat history".to_string());
            } else {
                feedback = Some("Not in \"chat mode\"".to_string());
            }
        }

        "stop" | "s" => {
            ctx.coordinator.stop_all();
            feedback = Some("Stopped audio".to_string());
        }

        "direct" | "d" => {
            if ctx.session.mode != Mode::Direct {
                ctx.coordinator.stop_all();
                ctx.session.mode = Mode::Direct;
                ctx.session.stroke_pending = true;
                feedback = Some("Switched to \"direct input mode\"".to_string());
            } else {
                feedback = Some("Already in \"direct input mode\"".to_string());
            }
        }

        "chat" | "c" => {
            if ctx.session.mode != Mode::Chat {
                if !ctx.chat.is_configured() {
                    feedback = Some(format!(
                        "Can't. Chat mode is disabled (Edit \"{}\").",
                        ctx.config_path.display()
                    ));
                } else {
                    ctx.session.mode = Mode::Chat;
                    ctx.session.stroke_pending = true;
                    let url = ctx.chat.endpoint_url().unwrap_or_default();
                    feedback = Some(format!("Switched to \"chat mode\" ({url})"));
                }
            } else {
                feedback = Some("Already in chat mode".to_string());
            }
        }

        "sync" => {
            let next = !ctx.session.flags.sync_to_audio();
            ctx.session.flags.set_sync_to_audio(next);
            feedback = Some(format!(
                "\"Sync text to audio playback\" set to: {}",
                if next { "On" } else { "Off" }
            ));
        }

        "save" => {
            if ctx.session.flags.save_to_disk() {
                ctx.session.flags.set_save_to_disk(false);
                feedback = Some("\"Save audio output to disk\" set to: Off".to_string());
            } else {
                match fs::create_dir_all(ctx.audio_save_dir) {
                    Ok(()) => {
                        ctx.session.flags.set_save_to_disk(true);
                        feedback = Some(format!(
                            "\"Save audio output to disk\" set to: On\n{}",
                            ctx.audio_save_dir.display()
                        ));
                    }
                    Err(err) => {
                        // Flag stays off; the directory is unusable.
                        feedback = Some(format!(
                            "Problem with output directory {}: {err}",
                            ctx.audio_save_dir.display()
                        ));
                    }
                }
            }
        }

        "help" | "h" | "menu" => show_menu = true,

        "q" | "quit" => quit = true,

        _ => feedback = Some(format!("No such command: !{command}")),
    }

    if feedback.is_some() || show_menu {
        // Must stop everything to prevent awkward async text. Can't be helped.
        ctx.coordinator.stop_all();
    }

    let title_dirty = ctx.session.mode != was_mode || ctx.session.voice_code != was_voice;
    CommandOutcome {
        feedback,
        show_menu,
        title_dirty,
        quit,
    }
}
