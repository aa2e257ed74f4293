//! Pure transforms between raw input, display text, and speech text.

use std::env;
use std::sync::OnceLock;

use regex::Regex;

/// Shapes raw user input for echoing into the content area.
pub fn massage_user_input_for_print(input: &str) -> String {
    static BLANK_RUNS_RE: OnceLock<Regex> = OnceLock::new();
    let re = BLANK_RUNS_RE
        .get_or_init(|| Regex::new(r"\n{3,}").expect("blank-run regex should compile"));
    re.replace_all(input.trim(), "\n\n").to_string()
}

/// Expands dev shortcuts and trims direct-mode input.
pub fn transform_direct_mode_input(input: &str) -> String {
    let trimmed = input.trim();
    if is_dev() {
        if let Some(expanded) = dev_shortcut(trimmed) {
            return expanded.to_string();
        }
    }
    trimmed.to_string()
}

/// Strips markup the speech model would otherwise read aloud. Emote tags
/// like `<giggle>` pass through; the model consumes them.
pub fn massage_assistant_text_for_tts(text: &str) -> String {
    static MARKUP_RE: OnceLock<Regex> = OnceLock::new();
    let re = MARKUP_RE
        .get_or_init(|| Regex::new("[*_~`#]+").expect("markup regex should compile"));
    let stripped = re.replace_all(text, "");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Reduces text to a short, filesystem-safe filename fragment.
pub fn massage_text_for_filename(text: &str, max_chars: usize) -> String {
    let mut out = String::new();
    let mut count = 0;
    for c in text.chars() {
        if count >= max_chars {
            break;
        }
        if c.is_ascii_alphanumeric() {
            out.push(c);
            count += 1;
        } else if c.is_whitespace() && !out.is_empty() && !out.ends_with('_') {
            out.push('_');
            count += 1;
        }
    }
    out.trim_matches('_').to_string()
}

fn is_dev() -> bool {
    env::var_os("TALKTERM_DEV").is_some()
}

fn dev_shortcut(token: &str) -> Option<&'static str> {
    match token {
        "0" => Some(DEV_TEXT_BENCHMARK),
        "1" => Some(DEV_TEXT_PUNCTUATION),
        "2" => Some(DEV_TEXT_ABBREVIATIONS),
        _ => None,
    }
}

const DEV_TEXT_BENCHMARK: &str = "Two years ago, a friend of mine asked me to say some MC rhymes, so I said this rhyme I'm about to say, the rhyme was deffer when it went this way.";

const DEV_TEXT_PUNCTUATION: &str = "This is the first sentence. This is a second sentence, which is a bit longer and might need splitting based on word count. Here is a third sentence; it uses a semicolon. A fourth: with a colon. What about questions? This should work!";

const DEV_TEXT_ABBREVIATIONS: &str = "Mr. Smith went to Washington D.C. for a meeting.";
