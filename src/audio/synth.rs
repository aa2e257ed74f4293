//! Speech synthesis client.
//!
//! The endpoint contract is a streaming POST that answers with raw 16-bit
//! little-endian PCM at 24 kHz mono, the shape local speech servers expose
//! for low-latency playback.

use std::io::Read;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::json;

use crate::config::EndpointConfig;
use crate::session::DEFAULT_VOICE;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(180);
const READ_CHUNK_BYTES: usize = 4096;

/// Streams PCM for one speech segment. `emit` may be called any number of
/// times with non-empty sample slices; returning false stops generation
/// early (cooperative cancellation).
pub trait SpeechGenerator: Send + Sync {
    fn generate(
        &self,
        text: &str,
        voice: &str,
        emit: &mut dyn FnMut(&[i16]) -> bool,
    ) -> Result<()>;

    /// Cheap liveness probe used for startup feedback.
    fn ping(&self) -> Result<()>;
}

pub struct HttpSpeechGenerator {
    config: EndpointConfig,
    client: reqwest::blocking::Client,
}

impl HttpSpeechGenerator {
    pub fn new(config: EndpointConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("couldn't build HTTP client for speech service")?;
        Ok(Self { config, client })
    }

    fn request_body(&self, text: &str, voice: &str) -> serde_json::Value {
        let mut body = self.config.request_overrides();
        body.insert("input".to_string(), json!(text));
        body.insert("voice".to_string(), json!(voice));
        body.insert("response_format".to_string(), json!("pcm"));
        serde_json::Value::Object(body)
    }
}

impl SpeechGenerator for HttpSpeechGenerator {
    fn generate(
        &self,
        text: &str,
        voice: &str,
        emit: &mut dyn FnMut(&[i16]) -> bool,
    ) -> Result<()> {
        let mut request = self
            .client
            .post(&self.config.url)
            .json(&self.request_body(text, voice));
        if let Some(key) = self.config.api_key() {
            request = request.bearer_auth(key);
        }
        let mut response = request
            .send()
            .with_context(|| format!("Speech request to {} failed", self.config.url))?
            .error_for_status()
            .context("Speech service returned an error status")?;

        let mut buf = [0u8; READ_CHUNK_BYTES];
        let mut carry: Option<u8> = None;
        let mut samples: Vec<i16> = Vec::with_capacity(READ_CHUNK_BYTES / 2);
        loop {
            let n = response
                .read(&mut buf)
                .context("speech stream read failed")?;
            if n == 0 {
                break;
            }
            samples.clear();
            decode_pcm_bytes(&mut carry, &buf[..n], &mut samples);
            if !samples.is_empty() && !emit(&samples) {
                return Ok(());
            }
        }
        Ok(())
    }

    fn ping(&self) -> Result<()> {
        let mut request = self
            .client
            .post(&self.config.url)
            .json(&self.request_body("hi", DEFAULT_VOICE));
        if let Some(key) = self.config.api_key() {
            request = request.bearer_auth(key);
        }
        request
            .send()
            .with_context(|| format!("Speech service request to {} failed", self.config.url))?
            .error_for_status()
            .context("Speech service returned an error status")?;
        Ok(())
    }
}

/// Decodes little-endian 16-bit PCM, carrying a trailing odd byte between
/// network reads.
pub(crate) fn decode_pcm_bytes(carry: &mut Option<u8>, bytes: &[u8], out: &mut Vec<i16>) {
    let mut bytes = bytes;
    if let Some(low) = carry.take() {
        if let Some((&high, rest)) = bytes.split_first() {
            out.push(i16::from_le_bytes([low, high]));
            bytes = rest;
        } else {
            *carry = Some(low);
            return;
        }
    }
    let mut chunks = bytes.chunks_exact(2);
    for pair in &mut chunks {
        out.push(i16::from_le_bytes([pair[0], pair[1]]));
    }
    if let [odd] = chunks.remainder() {
        *carry = Some(*odd);
    }
}
