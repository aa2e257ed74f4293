//! Speech synthesis and audio playback worker.
//!
//! Consumes `TtsItem`s strictly in queue order, streams PCM from the speech
//! endpoint, and feeds fixed-size blocks to the output device. Status flows
//! back to the UI through the shared message queue. The worker acknowledges
//! the cooperative stop signal at item boundaries.

mod sink;
pub mod synth;
mod wav;


pub use synth::{HttpSpeechGenerator, SpeechGenerator};

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, SendTimeoutError, Sender};

use crate::cancel::StopSignal;
use crate::log_debug;
use crate::messages::{
    purge, send_ui_message, GenStatus, LogLine, SyncedTextItem, SyncedTextQueue, TtsContentItem,
    TtsItem, UiMessage,
};
use crate::session::RuntimeFlags;
use crate::text::massage;

/// The speech model generates 24 kHz mono.
pub const SAMPLE_RATE: u32 = 24_000;
/// Frames per playback block.
pub const BLOCK_SIZE: usize = 1024;
/// Seconds of audio the block queue may buffer ahead.
const BUFFER_DURATION_SECS: usize = 60;
const MAX_QUEUED_BLOCKS: usize = BUFFER_DURATION_SECS * SAMPLE_RATE as usize / BLOCK_SIZE;
/// Throttle for buffer-level and generation status updates.
const STATUS_INTERVAL: Duration = Duration::from_millis(150);

pub struct AudioPlayerDeps {
    pub stop: StopSignal,
    pub tts_rx: Receiver<TtsItem>,
    pub ui_tx: Sender<UiMessage>,
    pub synced: SyncedTextQueue,
    pub flags: Arc<RuntimeFlags>,
    pub synth: Arc<dyn SpeechGenerator>,
    pub save_dir: PathBuf,
}

/// The cancellation path's view of the audio worker.
pub struct AudioHandle {
    tts_rx: Receiver<TtsItem>,
    block_rx: Receiver<Vec<i16>>,
}

impl AudioHandle {
    pub fn new(tts_rx: Receiver<TtsItem>, block_rx: Receiver<Vec<i16>>) -> Self {
        Self { tts_rx, block_rx }
    }

    /// Drops queued speech tasks and buffered playback blocks. Call with the
    /// stop signal already raised.
    pub fn clear_queues(&self) {
        purge(&self.tts_rx);
        purge(&self.block_rx);
    }
}

/// Starts the playback worker and returns the handle used for cancellation.
pub fn spawn_player(deps: AudioPlayerDeps) -> AudioHandle {
    let (block_tx, block_rx) = bounded::<Vec<i16>>(MAX_QUEUED_BLOCKS);
    let handle = AudioHandle::new(deps.tts_rx.clone(), block_rx.clone());

    let result = thread::Builder::new()
        .name("audio-player".to_string())
        .spawn(move || worker_loop(deps, block_tx, block_rx));
    if let Err(err) = result {
        log_debug(&format!("couldn't spawn audio worker: {err}"));
    }

    handle
}

fn worker_loop(deps: AudioPlayerDeps, block_tx: Sender<Vec<i16>>, block_rx: Receiver<Vec<i16>>) {
    let played_samples = Arc::new(AtomicU64::new(0));

    // The stream lives as long as the worker; playback pulls from block_rx.
    let _stream = match sink::start_output_stream(sink::PlaybackShared {
        block_rx: block_rx.clone(),
        played_samples: played_samples.clone(),
        synced: deps.synced.clone(),
        ui_tx: deps.ui_tx.clone(),
    }) {
        Ok(stream) => stream,
        Err(err) => {
            send_ui_message(
                &deps.ui_tx,
                UiMessage::Log(LogLine::error(format!(
                    "Critical audio device error. Please restart. {err:#}"
                ))),
            );
            return;
        }
    };

    let mut player = Player {
        deps,
        block_tx,
        block_rx,
        played_samples,
        save_buffer: Vec::new(),
        message_label: None,
    };

    loop {
        if player.deps.stop.is_set() {
            player.deps.stop.clear();
            player.flush_save(true);
            // Give the purge a moment to finish before picking up new work.
            thread::sleep(Duration::from_millis(100));
            continue;
        }

        let item = match player.deps.tts_rx.recv_timeout(Duration::from_millis(100)) {
            Ok(item) => item,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        match item {
            TtsItem::Content(content) => player.process_content(content),
            TtsItem::End => player.flush_save(false),
        }
    }
}

struct MessageLabel {
    voice: String,
    text: String,
}

struct Player {
    deps: AudioPlayerDeps,
    block_tx: Sender<Vec<i16>>,
    block_rx: Receiver<Vec<i16>>,
    played_samples: Arc<AtomicU64>,
    save_buffer: Vec<i16>,
    message_label: Option<MessageLabel>,
}

impl Player {
    fn process_content(&mut self, item: TtsContentItem) {
        if item.is_message_start {
            self.save_buffer.clear();
            self.message_label = Some(MessageLabel {
                voice: item.voice.clone(),
                text: item.raw_text.clone(),
            });
        }

        // Schedule the display text to appear when playback reaches the
        // point where this segment's audio will start.
        let backlog = self.block_rx.len() as u64 * BLOCK_SIZE as u64;
        self.deps.synced.push(SyncedTextItem {
            display_text: item.raw_text.clone(),
            target_samples: self.played_samples.load(Ordering::Relaxed) + backlog,
        });

        let text = if item.needs_massage {
            massage::massage_assistant_text_for_tts(&item.raw_text)
        } else {
            item.raw_text.clone()
        };
        if text.is_empty() {
            return;
        }

        send_ui_message(
            &self.deps.ui_tx,
            UiMessage::GenStatus(GenStatus {
                text: text.clone(),
                audio_seconds: 0.0,
                elapsed: 0.0,
            }),
        );

        let started = Instant::now();
        let save_enabled = self.deps.flags.save_to_disk();
        let mut pump = SegmentPump {
            stop: &self.deps.stop,
            block_tx: &self.block_tx,
            ui_tx: &self.deps.ui_tx,
            status_text: &text,
            pending: Vec::with_capacity(BLOCK_SIZE),
            save_buffer: &mut self.save_buffer,
            save_enabled,
            started,
            last_status: started,
            samples_emitted: 0,
        };

        let result = self
            .deps
            .synth
            .generate(&text, &item.voice, &mut |chunk| pump.accept(chunk));

        let completed = match result {
            // A cancelled generation also returns Ok; the raised stop signal
            // tells the two apart.
            Ok(()) => pump.finish() && !self.deps.stop.is_set(),
            Err(err) => {
                send_ui_message(
                    &self.deps.ui_tx,
                    UiMessage::Log(LogLine::error(format!("Speech generation failed: {err:#}"))),
                );
                false
            }
        };
        let samples_emitted = pump.samples_emitted;

        // Clear the generation readout either way.
        send_ui_message(&self.deps.ui_tx, UiMessage::GenStatus(GenStatus::default()));

        if completed && samples_emitted > 0 {
            let audio_seconds = samples_emitted as f64 / f64::from(SAMPLE_RATE);
            let elapsed = started.elapsed().as_secs_f64();
            let multiplier = if elapsed > 0.0 { audio_seconds / elapsed } else { 0.0 };
            tracing::info!(
                target: "timing",
                phase = "tts_segment",
                audio_s = audio_seconds,
                elapsed_s = elapsed
            );
            send_ui_message(
                &self.deps.ui_tx,
                UiMessage::Log(LogLine::info(format!(
                    "{text}\nlength: {audio_seconds:.2}s elapsed: {elapsed:.2}s ({multiplier:.1}x)"
                ))),
            );
        }
    }

    /// Writes the accumulated message audio to disk when saving is on.
    fn flush_save(&mut self, truncated: bool) {
        let label = self.message_label.take();
        let samples = std::mem::take(&mut self.save_buffer);
        if !self.deps.flags.save_to_disk() || samples.is_empty() {
            return;
        }
        let Some(label) = label else { return };

        let file_name = wav::make_file_name(&label.voice, &label.text, truncated);
        let path = self.deps.save_dir.join(file_name);
        let ui_tx = self.deps.ui_tx.clone();
        // Fire-and-forget; success or failure lands in the log area.
        thread::spawn(move || match wav::write_wav(&path, SAMPLE_RATE, &samples) {
            Ok(()) => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| path.display().to_string());
                send_ui_message(&ui_tx, UiMessage::Log(LogLine::info(format!("Saved: {name}"))));
            }
            Err(err) => {
                send_ui_message(
                    &ui_tx,
                    UiMessage::Log(LogLine::error(format!(
                        "Couldn't save {}: {err}",
                        path.display()
                    ))),
                );
            }
        });
    }
}

/// Accumulates generated PCM into fixed-size blocks and forwards them to the
/// playback queue, emitting throttled generation status along the way.
struct SegmentPump<'a> {
    stop: &'a StopSignal,
    block_tx: &'a Sender<Vec<i16>>,
    ui_tx: &'a Sender<UiMessage>,
    status_text: &'a str,
    pending: Vec<i16>,
    save_buffer: &'a mut Vec<i16>,
    save_enabled: bool,
    started: Instant,
    last_status: Instant,
    samples_emitted: u64,
}

impl SegmentPump<'_> {
    /// Returns false to tell the generator to stop early.
    fn accept(&mut self, chunk: &[i16]) -> bool {
        if self.stop.is_set() {
            return false;
        }
        self.samples_emitted += chunk.len() as u64;
        if self.save_enabled {
            self.save_buffer.extend_from_slice(chunk);
        }
        self.pending.extend_from_slice(chunk);

        while self.pending.len() >= BLOCK_SIZE {
            let block: Vec<i16> = self.pending.drain(..BLOCK_SIZE).collect();
            if !self.send_block(block) {
                return false;
            }
        }

        if self.last_status.elapsed() >= STATUS_INTERVAL {
            self.last_status = Instant::now();
            send_ui_message(
                self.ui_tx,
                UiMessage::GenStatus(GenStatus {
                    text: self.status_text.to_string(),
                    audio_seconds: self.samples_emitted as f64 / f64::from(SAMPLE_RATE),
                    elapsed: self.started.elapsed().as_secs_f64(),
                }),
            );
        }
        true
    }

    /// Pads the trailing partial block so the device always sees full blocks.
    fn finish(&mut self) -> bool {
        if self.pending.is_empty() {
            return true;
        }
        let mut block = std::mem::take(&mut self.pending);
        block.resize(BLOCK_SIZE, 0);
        self.send_block(block)
    }

    fn send_block(&self, block: Vec<i16>) -> bool {
        let mut block = block;
        loop {
            if self.stop.is_set() {
                return false;
            }
            match self
                .block_tx
                .send_timeout(block, Duration::from_millis(100))
            {
                Ok(()) => return true,
                Err(SendTimeoutError::Timeout(returned)) => block = returned,
                Err(SendTimeoutError::Disconnected(_)) => return false,
            }
        }
    }
}
