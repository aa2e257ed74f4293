//! Minimal mono 16-bit WAV writing for save-to-disk.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use chrono::Local;

use crate::text::massage;

const FILENAME_TEXT_CHARS: usize = 25;

/// Writes a mono 16-bit PCM WAV file.
pub(super) fn write_wav(path: &Path, sample_rate: u32, samples: &[i16]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = io::BufWriter::new(fs::File::create(path)?);

    let data_len = (samples.len() * 2) as u32;
    let byte_rate = sample_rate * 2;

    file.write_all(b"RIFF")?;
    file.write_all(&(36 + data_len).to_le_bytes())?;
    file.write_all(b"WAVE")?;

    file.write_all(b"fmt ")?;
    file.write_all(&16u32.to_le_bytes())?;
    file.write_all(&1u16.to_le_bytes())?; // PCM
    file.write_all(&1u16.to_le_bytes())?; // mono
    file.write_all(&sample_rate.to_le_bytes())?;
    file.write_all(&byte_rate.to_le_bytes())?;
    file.write_all(&2u16.to_le_bytes())?; // block align
    file.write_all(&16u16.to_le_bytes())?; // bits per sample

    file.write_all(b"data")?;
    file.write_all(&data_len.to_le_bytes())?;
    for sample in samples {
        file.write_all(&sample.to_le_bytes())?;
    }
    file.flush()
}

/// `250805_142233 [tara] Hello_there.wav`, with a truncation marker when the
/// message was cut off mid-playback.
pub(super) fn make_file_name(voice: &str, text: &str, truncated: bool) -> String {
    let mut name = Local::now().format("%y%m%d_%H%M%S").to_string();
    if !voice.is_empty() {
        name.push_str(&format!(" [{voice}]"));
    }
    if truncated {
        name.push_str(" [truncated]");
    }
    let slug = massage::massage_text_for_filename(text, FILENAME_TEXT_CHARS);
    if !slug.is_empty() {
        name.push(' ');
        name.push_str(&slug);
    }
    name.push_str(".wav");
    name
}
