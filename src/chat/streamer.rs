//! Blocking SSE consumption of one chat-completions stream.

use std::io::{BufRead, BufReader};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::Sender;
use serde::Deserialize;
use serde_json::json;

use crate::config::EndpointConfig;
use crate::log_debug;
use crate::messages::{
    enqueue_tts_end, enqueue_tts_segments, send_ui_message, LogLine, TtsItem, UiMessage,
};
use crate::text::StreamSegmenter;
use crate::util::elapsed_string;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(180);

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    error: Option<StreamError>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Debug, Deserialize, Default)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamError {
    #[serde(default)]
    message: Option<String>,
}

/// Parsed form of one SSE line.
#[derive(Debug, PartialEq)]
enum SseEvent {
    Chunk(String),
    Done,
    Skip,
    ServiceError(String),
}

fn parse_sse_line(line: &str) -> SseEvent {
    let Some(data) = line.strip_prefix("data: ") else {
        return SseEvent::Skip;
    };
    let data = data.trim();
    if data == "[DONE]" {
        return SseEvent::Done;
    }
    match serde_json::from_str::<StreamChunk>(data) {
        Ok(chunk) => {
            if let Some(error) = chunk.error {
                return SseEvent::ServiceError(
                    error
                        .message
                        .unwrap_or_else(|| "Unspecified error in response".to_string()),
                );
            }
            match chunk.choices.into_iter().next().and_then(|c| c.delta.content) {
                Some(content) if !content.is_empty() => SseEvent::Chunk(content),
                _ => SseEvent::Skip,
            }
        }
        Err(err) => {
            log_debug(&format!("unparseable stream line: {err}"));
            SseEvent::Skip
        }
    }
}

/// Streams one completion, printing deltas and queueing speech segments as
/// sentences complete. Returns the full response text, or `None` when the
/// stream was aborted or ended without a `[DONE]` marker.
pub(super) fn stream_completion(
    config: &EndpointConfig,
    history: &[(String, String)],
    user_prompt: &str,
    voice: &str,
    abort: &AtomicBool,
    ui_tx: &Sender<UiMessage>,
    tts_tx: &Sender<TtsItem>,
) -> Result<Option<String>> {
    let mut messages: Vec<serde_json::Value> = history
        .iter()
        .map(|(role, content)| json!({ "role": role, "content": content }))
        .collect();
    messages.push(json!({ "role": "user", "content": user_prompt }));

    let mut body = config.request_overrides();
    body.insert("messages".to_string(), serde_json::Value::Array(messages));
    body.insert("stream".to_string(), json!(true));

    let client = reqwest::blocking::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .context("couldn't build HTTP client")?;
    let mut request = client
        .post(&config.url)
        .header("Accept", "text/event-stream")
        .json(&serde_json::Value::Object(body));
    if let Some(key) = config.api_key() {
        request = request.bearer_auth(key);
    }
    let response = request
        .send()
        .with_context(|| format!("Chat request to {} failed", config.url))?
        .error_for_status()
        .context("Chat service returned an error status")?;

    let start = Instant::now();
    let mut segmenter = StreamSegmenter::new();
    let mut full_content = String::new();
    let mut sent_message_start = false;
    let mut done = false;

    let reader = BufReader::new(response);
    for line in reader.lines() {
        if abort.load(Ordering::Relaxed) {
            return Ok(None);
        }
        let line = line.context("chat stream read failed")?;
        if line.is_empty() {
            continue;
        }
        match parse_sse_line(&line) {
            SseEvent::Skip => {}
            SseEvent::Done => {
                done = true;
                break;
            }
            SseEvent::ServiceError(message) => {
                return Err(anyhow!("Service returned error: {message}"));
            }
            SseEvent::Chunk(chunk) => {
                full_content.push_str(&chunk);
                send_ui_message(ui_tx, UiMessage::StreamedPrint(chunk.clone()));

                let segments = segmenter.add_text(&chunk);
                if !segments.is_empty() {
                    enqueue_tts_segments(tts_tx, &segments, voice, true, !sent_message_start);
                    sent_message_start = true;
                }
            }
        }
    }

    if abort.load(Ordering::Relaxed) {
        return Ok(None);
    }
    if !done {
        log_debug("chat stream completed without DONE marker");
        return Ok(None);
    }

    if let Some(remainder) = segmenter.take_remainder() {
        enqueue_tts_segments(tts_tx, &[remainder], voice, true, !sent_message_start);
    }
    enqueue_tts_end(tts_tx);

    let elapsed = start.elapsed().as_secs_f64();
    tracing::info!(target: "timing", phase = "chat_stream", elapsed_s = elapsed);
    send_ui_message(
        ui_tx,
        UiMessage::Log(LogLine::info(format!(
            "Chat response stream processed ({})",
            elapsed_string(elapsed)
        ))),
    );

    Ok(Some(full_content))
}
