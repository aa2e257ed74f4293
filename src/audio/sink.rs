//! Output-device plumbing: pulls queued blocks into the cpal callback.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate, StreamConfig};
use crossbeam_channel::Receiver;

use super::{BLOCK_SIZE, SAMPLE_RATE, STATUS_INTERVAL};
use crate::log_debug;
use crate::messages::{send_ui_message, SyncedTextQueue, UiMessage};

pub(super) struct PlaybackShared {
    pub block_rx: Receiver<Vec<i16>>,
    pub played_samples: Arc<AtomicU64>,
    pub synced: SyncedTextQueue,
    pub ui_tx: crossbeam_channel::Sender<UiMessage>,
}

/// Opens the default output device at the speech model's rate and starts
/// pulling blocks. The returned stream must stay alive for playback.
pub(super) fn start_output_stream(shared: PlaybackShared) -> Result<cpal::Stream> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .context("no default audio output device")?;
    let default_config = device
        .default_output_config()
        .context("no default output config")?;
    let config = StreamConfig {
        channels: 1,
        sample_rate: SampleRate(SAMPLE_RATE),
        buffer_size: cpal::BufferSize::Default,
    };
    let feeder = BlockFeeder::new(shared);

    match default_config.sample_format() {
        SampleFormat::I16 => build_output(&device, &config, feeder, |s| s),
        SampleFormat::F32 => build_output(&device, &config, feeder, |s| {
            f32::from(s) / f32::from(i16::MAX)
        }),
        other => bail!("unsupported output sample format {other:?}"),
    }
}

fn build_output<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    mut feeder: BlockFeeder,
    convert: fn(i16) -> T,
) -> Result<cpal::Stream>
where
    T: cpal::SizedSample + Send + 'static,
{
    let stream = device
        .build_output_stream(
            config,
            move |data: &mut [T], _| feeder.fill(data, convert),
            |err| log_debug(&format!("audio output stream error: {err}")),
            None,
        )
        .context("couldn't build audio output stream")?;
    stream.play().context("couldn't start audio output stream")?;
    Ok(stream)
}

/// Callback-side state: the partially consumed current block plus the
/// counters that drive synced-text release and the buffer readout.
pub(super) struct BlockFeeder {
    shared: PlaybackShared,
    current: Vec<i16>,
    pos: usize,
    last_buffer_status: Instant,
}

impl BlockFeeder {
    pub(super) fn new(shared: PlaybackShared) -> Self {
        Self {
            shared,
            current: Vec::new(),
            pos: 0,
            last_buffer_status: Instant::now() - Duration::from_secs(1),
        }
    }

    /// Fills the device buffer, zero-filling on underrun.
    pub(super) fn fill<T>(&mut self, out: &mut [T], convert: fn(i16) -> T) {
        let mut written = 0;
        while written < out.len() {
            if self.pos >= self.current.len() {
                match self.shared.block_rx.try_recv() {
                    Ok(block) => {
                        self.current = block;
                        self.pos = 0;
                    }
                    Err(_) => break,
                }
                continue;
            }
            out[written] = convert(self.current[self.pos]);
            written += 1;
            self.pos += 1;
        }
        for slot in &mut out[written..] {
            *slot = convert(0);
        }

        self.shared
            .played_samples
            .fetch_add(written as u64, Ordering::Relaxed);
        self.release_synced_text();
        self.report_buffer_level();
    }

    fn release_synced_text(&self) {
        let played = self.shared.played_samples.load(Ordering::Relaxed);
        while let Some(item) = self.shared.synced.pop_ready(played) {
            send_ui_message(&self.shared.ui_tx, UiMessage::SyncedPrint(item));
        }
    }

    fn report_buffer_level(&mut self) {
        if self.last_buffer_status.elapsed() < STATUS_INTERVAL {
            return;
        }
        self.last_buffer_status = Instant::now();
        let buffered =
            self.shared.block_rx.len() * BLOCK_SIZE + self.current.len().saturating_sub(self.pos);
        let seconds = buffered as f32 / SAMPLE_RATE as f32;
        send_ui_message(&self.shared.ui_tx, UiMessage::AudioBuffer(seconds));
    }
}
