//! Application wiring and the cooperative UI loop.
//!
//! One loop owns all UI-state mutation. Producers (chat streamer, audio
//! worker) reach it only through the message queue; key events arrive from
//! the input thread; commands and turn starts run synchronously between loop
//! iterations.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam_channel::{select, unbounded, Receiver, Sender};
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;

use crate::audio::{self, AudioPlayerDeps, HttpSpeechGenerator, SpeechGenerator};
use crate::cancel::{CancellationCoordinator, StopSignal};
use crate::chat::{ChatManager, SYSTEM_PROMPT};
use crate::command::{self, CommandContext};
use crate::config::{AppConfig, Prefs, APP_NAME};
use crate::dispatch::{self, DispatchTargets};
use crate::input::{spawn_input_thread, InputEvent};
use crate::log_debug;
use crate::messages::{
    send_ui_message, BlockKind, GenStatus, LogLine, StyledBlock, SyncedTextQueue, TtsItem,
    UiMessage,
};
use crate::orchestrator::{self, TurnContext};
use crate::session::{Mode, RuntimeFlags, SessionState};
use crate::ui::{self, Transcript, UiState};

/// Upper bound on UI-update latency when the queues are idle.
const IDLE_TICK: Duration = Duration::from_millis(33);
/// Lets the UI come up before the first network round-trip.
const STARTUP_PING_DELAY: Duration = Duration::from_millis(500);

pub struct App {
    session: SessionState,
    content: Transcript,
    log: Transcript,
    gen_status: GenStatus,
    audio_buffer_seconds: f32,
    input_buffer: String,
    title: String,
    chat: ChatManager,
    coordinator: CancellationCoordinator,
    ui_tx: Sender<UiMessage>,
    ui_rx: Receiver<UiMessage>,
    input_rx: Receiver<InputEvent>,
    tts_tx: Sender<TtsItem>,
    config_path: PathBuf,
    audio_save_dir: PathBuf,
    should_quit: bool,
    dirty: bool,
}

impl App {
    pub fn new(prefs: Prefs, config_path: PathBuf, warning: Option<String>) -> Result<Self> {
        let (ui_tx, ui_rx) = unbounded::<UiMessage>();
        let (tts_tx, tts_rx) = unbounded::<TtsItem>();
        let (input_tx, input_rx) = unbounded::<InputEvent>();

        let stop = StopSignal::new();
        let synced = SyncedTextQueue::new();
        let flags = Arc::new(RuntimeFlags::new(
            prefs.sync_text_to_audio,
            prefs.save_audio_to_disk,
        ));

        let synth: Arc<dyn SpeechGenerator> =
            Arc::new(HttpSpeechGenerator::new(prefs.speech.clone())?);
        let audio = audio::spawn_player(AudioPlayerDeps {
            stop: stop.clone(),
            tts_rx,
            ui_tx: ui_tx.clone(),
            synced: synced.clone(),
            flags: flags.clone(),
            synth: synth.clone(),
            save_dir: prefs.save_dir(),
        });

        let chat = ChatManager::new(
            prefs.chat_endpoint(),
            SYSTEM_PROMPT,
            ui_tx.clone(),
            tts_tx.clone(),
        );
        let coordinator = CancellationCoordinator::new(
            stop,
            chat.abort_handle(),
            audio,
            ui_rx.clone(),
            synced,
        );

        spawn_input_thread(input_tx);
        spawn_startup_ping(
            synth,
            prefs.speech.url.clone(),
            config_path.clone(),
            ui_tx.clone(),
        );

        let mut app = Self {
            session: SessionState::new(prefs.initial_mode(), prefs.initial_voice(), flags),
            content: Transcript::new(),
            log: Transcript::new(),
            gen_status: GenStatus::default(),
            audio_buffer_seconds: 0.0,
            input_buffer: String::new(),
            title: String::new(),
            chat,
            coordinator,
            ui_tx,
            ui_rx,
            input_rx,
            tts_tx,
            config_path,
            audio_save_dir: prefs.save_dir(),
            should_quit: false,
            dirty: true,
        };

        app.update_title();
        app.print_menu();
        app.session.stroke_pending = true;
        if let Some(warning) = warning {
            send_ui_message(&app.ui_tx, UiMessage::Log(LogLine::warning(warning)));
        }
        Ok(app)
    }

    /// Runs the cooperative loop until quit, restoring the terminal on the
    /// way out even when an iteration fails.
    pub fn run(&mut self) -> Result<()> {
        let mut terminal = setup_terminal()?;
        let result = self.event_loop(&mut terminal);
        restore_terminal(&mut terminal);
        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
        while !self.should_quit {
            if self.dirty {
                let state = UiState {
                    title: &self.title,
                    audio_buffer_seconds: self.audio_buffer_seconds,
                    content: &self.content,
                    log: &self.log,
                    gen_status: &self.gen_status,
                    input: &self.input_buffer,
                };
                terminal
                    .draw(|frame| ui::draw(frame, &state))
                    .context("terminal draw failed")?;
                self.dirty = false;
            }

            if let Err(err) = self.tick() {
                // Unhandled runtime errors surface in the log area; the app
                // keeps running.
                log_debug(&format!("tick error: {err:#}"));
                self.log.add_block(StyledBlock::new(
                    format!("Unexpected error. Could be bad. Consider restart.\n{err:#}"),
                    BlockKind::Error,
                ));
                self.dirty = true;
            }
        }
        Ok(())
    }

    /// One cooperative step: exactly one message or input event, or a
    /// bounded idle suspension.
    fn tick(&mut self) -> Result<()> {
        let ui_rx = self.ui_rx.clone();
        let input_rx = self.input_rx.clone();
        select! {
            recv(ui_rx) -> message => match message {
                Ok(message) => {
                    self.apply_ui_message(message);
                    self.dirty = true;
                }
                Err(_) => self.should_quit = true,
            },
            recv(input_rx) -> event => match event {
                Ok(event) => self.handle_input(event),
                Err(_) => self.should_quit = true,
            },
            default(IDLE_TICK) => {}
        }
        Ok(())
    }

    fn apply_ui_message(&mut self, message: UiMessage) {
        let mut targets = DispatchTargets {
            session: &mut self.session,
            content: &mut self.content,
            log: &mut self.log,
            gen_status: &mut self.gen_status,
            audio_buffer_seconds: &mut self.audio_buffer_seconds,
        };
        dispatch::apply_ui_message(&mut targets, message);
    }

    fn handle_input(&mut self, event: InputEvent) {
        match event {
            InputEvent::Char(c) => self.input_buffer.push(c),
            InputEvent::Backspace => {
                self.input_buffer.pop();
            }
            InputEvent::Submit => {
                let input = std::mem::take(&mut self.input_buffer);
                self.process_user_input(&input);
            }
            InputEvent::Quit => self.should_quit = true,
            InputEvent::Resize => {}
        }
        self.dirty = true;
    }

    fn process_user_input(&mut self, raw: &str) {
        let input = raw.trim();
        if input.is_empty() {
            return;
        }
        if let Some(token) = command::parse(input) {
            let token = token.to_string();
            self.process_command(&token);
            return;
        }
        let mut ctx = TurnContext {
            session: &mut self.session,
            transcript: &mut self.content,
            chat: &self.chat,
            coordinator: &self.coordinator,
            ui_tx: &self.ui_tx,
            tts_tx: &self.tts_tx,
            config_path: &self.config_path,
        };
        match ctx.session.mode {
            Mode::Chat => orchestrator::begin_chat_turn(input, &mut ctx),
            Mode::Direct => orchestrator::begin_direct_turn(input, &mut ctx),
        }
    }

    fn process_command(&mut self, token: &str) {
        let outcome = command::process(
            token,
            &mut CommandContext {
                session: &mut self.session,
                chat: &self.chat,
                coordinator: &self.coordinator,
                config_path: &self.config_path,
                audio_save_dir: &self.audio_save_dir,
            },
        );

        if let Some(feedback) = outcome.feedback {
            dispatch::print_to_content(
                &mut self.content,
                &mut self.session,
                StyledBlock::new(feedback, BlockKind::Feedback),
            );
        }
        if outcome.show_menu {
            self.session.stroke_pending = true;
            self.print_menu();
            self.session.stroke_pending = true;
        }
        if outcome.title_dirty {
            self.update_title();
        }
        if outcome.quit {
            self.should_quit = true;
        }
    }

    fn update_title(&mut self) {
        self.title = format!(
            "{APP_NAME} v{} ({}) (voice: {})",
            env!("CARGO_PKG_VERSION"),
            self.session.mode.label(),
            self.session.voice_code
        );
    }

    fn print_menu(&mut self) {
        let menu = self.menu_text();
        dispatch::print_to_content(
            &mut self.content,
            &mut self.session,
            StyledBlock::new(menu, BlockKind::Feedback),
        );
    }

    fn menu_text(&self) -> String {
        let on_off = |value: bool| if value { "on" } else { "off" };
        let mut text = format!(
            "Enter some text. That's it.\n\n\
             Special commands:\n\n\
             !chat or !c - switch to \"chat mode\"\n\
             !direct or !d - switch to \"direct input mode\"\n\n\
             voices:\n\
             \x20   !tara, !leah, !jess, !leo, !dan, !mia, !zac, !zoe,\n\
             \x20   !random\n\n\
             !stop or !s - stop audio output\n\
             !clear - clear chat history\n\n\
             !sync - sync text to audio playback (toggle) (currently: {})\n\
             !save - save audio output to disk (toggle) (currently: {})\n\n\
             !help - this help text\n\n",
            on_off(self.session.flags.sync_to_audio()),
            on_off(self.session.flags.save_to_disk()),
        );
        match self.session.mode {
            Mode::Chat => {
                text.push_str("You are in \"chat mode.\" The LLM will talk to you.");
                if let Some(url) = self.chat.endpoint_url() {
                    text.push_str(&format!("\n({url})"));
                }
            }
            Mode::Direct => {
                text.push_str(
                    "You are in \"direct input mode.\"\nSpeech will be generated from your input.",
                );
            }
        }
        text
    }
}

fn spawn_startup_ping(
    synth: Arc<dyn SpeechGenerator>,
    speech_url: String,
    config_path: PathBuf,
    ui_tx: Sender<UiMessage>,
) {
    thread::spawn(move || {
        thread::sleep(STARTUP_PING_DELAY);
        match synth.ping() {
            Ok(()) => {
                send_ui_message(
                    &ui_tx,
                    UiMessage::Log(LogLine::info(format!(
                        "Speech service is online\n{speech_url}"
                    ))),
                );
            }
            Err(err) => {
                send_ui_message(&ui_tx, UiMessage::Log(LogLine::error(format!("{err:#}"))));
                send_ui_message(
                    &ui_tx,
                    UiMessage::Print(StyledBlock::new(
                        format!(
                            "Speech service at {speech_url} may not be online.\nCheck \"{}\".",
                            config_path.display()
                        ),
                        BlockKind::Error,
                    )),
                );
            }
        }
    });
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    terminal::enable_raw_mode().context("couldn't enable raw mode")?;
    let mut stdout = io::stdout();
    crossterm::execute!(stdout, EnterAlternateScreen)
        .context("couldn't enter alternate screen")?;
    Terminal::new(CrosstermBackend::new(stdout)).context("couldn't create terminal")
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) {
    let _ = terminal::disable_raw_mode();
    let _ = crossterm::execute!(terminal.backend_mut(), LeaveAlternateScreen);
    let _ = terminal.show_cursor();
}
