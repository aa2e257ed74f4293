//! Sentence and phrase segmentation for speech.
//!
//! Splits text into chunks that each fit a roughly 15 second spoken window.
//! Sentence boundaries avoid abbreviations ("Mr.") and dotted initials
//! ("D.C."); over-long sentences split again at phrase punctuation, then by
//! word count as a last resort.

/// Indirectly dictates the length of each generated audio segment. The
/// speech model performs well up to ~15 seconds; tune with care.
const MAX_WORDS_PER_CHUNK: usize = 25;

/// Splits text into sentences, never splitting after dotted initials or
/// title-style abbreviations.
pub fn split_into_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    for part in text.split('\n') {
        if part.trim().is_empty() {
            continue;
        }
        split_line_into_sentences(part, &mut sentences);
    }
    sentences
}

fn split_line_into_sentences(line: &str, out: &mut Vec<String>) {
    let chars: Vec<char> = line.chars().collect();
    let mut start = 0;
    let mut i = 0;
    while i < chars.len() {
        if chars[i].is_whitespace() && i > start && is_sentence_boundary(&chars, i) {
            push_trimmed(&chars[start..i], out);
            while i < chars.len() && chars[i].is_whitespace() {
                i += 1;
            }
            start = i;
            continue;
        }
        i += 1;
    }
    push_trimmed(&chars[start..], out);
}

/// A whitespace run at `i` ends a sentence when the preceding character is a
/// terminator and the tail doesn't look like an abbreviation or initials.
fn is_sentence_boundary(chars: &[char], i: usize) -> bool {
    if !matches!(chars[i - 1], '.' | '?' | '!') {
        return false;
    }
    // Dotted initials or acronym tail: "D.C. ", "U.S.A. "
    if i >= 4 && is_word_char(chars[i - 4]) && chars[i - 3] == '.' && is_word_char(chars[i - 2]) {
        return false;
    }
    // Title-style abbreviation: "Mr. ", "Dr. "
    if i >= 3 && chars[i - 3].is_uppercase() && chars[i - 2].is_lowercase() && chars[i - 1] == '.' {
        return false;
    }
    true
}

/// True when trimmed text ends at a point the sentence splitter would accept
/// as a boundary. Used by the streaming segmenter to decide whether the
/// buffer tail is a complete sentence.
fn ends_at_sentence_boundary(text: &str) -> bool {
    let trimmed = text.trim_end();
    if trimmed.is_empty() {
        return false;
    }
    let mut chars: Vec<char> = trimmed.chars().collect();
    // Probe with a virtual trailing space at the end of the text.
    chars.push(' ');
    is_sentence_boundary(&chars, chars.len() - 1)
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn push_trimmed(chars: &[char], out: &mut Vec<String>) {
    let s: String = chars.iter().collect();
    let s = s.trim();
    if !s.is_empty() {
        out.push(s.to_string());
    }
}

/// Word count as spoken: digit runs read roughly one word per digit.
fn spoken_word_count(text: &str) -> usize {
    let mut count = 0;
    for word in text.split_whitespace() {
        count += 1;
        if word.chars().all(|c| c.is_ascii_digit()) {
            count += word.len().saturating_sub(1);
        }
    }
    count
}

/// Splits one sentence into phrases no longer than `max_words`, preferring
/// phrase punctuation as split points and hard-splitting as a last resort.
pub fn segment_sentence(sentence: &str, max_words: usize) -> Vec<String> {
    if sentence.trim().is_empty() {
        return Vec::new();
    }
    if max_words == 0 || spoken_word_count(sentence) <= max_words {
        return vec![sentence.trim().to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_words = 0;
    for part in split_on_phrase_separators(sentence) {
        let part_words = part.split_whitespace().count();
        if part_words == 0 {
            continue;
        }
        if part_words > max_words {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_words = 0;
            }
            hard_split(&part, max_words, &mut chunks);
        } else if current_words + part_words <= max_words {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(&part);
            current_words += part_words;
        } else {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            current = part;
            current_words = part_words;
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Splits on `, ; :` keeping each separator attached to the preceding part.
fn split_on_phrase_separators(sentence: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    for c in sentence.chars() {
        current.push(c);
        if matches!(c, ',' | ';' | ':') {
            let part = current.trim();
            if !part.is_empty() {
                parts.push(part.to_string());
            }
            current.clear();
        }
    }
    let part = current.trim();
    if !part.is_empty() {
        parts.push(part.to_string());
    }
    if parts.is_empty() {
        parts.push(sentence.trim().to_string());
    }
    parts
}

fn hard_split(part: &str, max_words: usize, chunks: &mut Vec<String>) {
    let words: Vec<&str> = part.split_whitespace().collect();
    let mut start = 0;
    while start < words.len() {
        let end = (start + max_words).min(words.len());
        chunks.push(words[start..end].join(" "));
        start = end;
    }
}

/// Segments a full message for the synchronous (direct input) case.
/// Deterministic: the same text always yields the same ordered sequence.
pub fn segment_full_message(text: &str) -> Vec<String> {
    split_into_sentences(text)
        .iter()
        .flat_map(|sentence| segment_sentence(sentence, MAX_WORDS_PER_CHUNK))
        .collect()
}

/// Identifies complete sentences from a text stream as it arrives. Buffers
/// arbitrary chunks and emits only sentences whose ending is certain,
/// holding back a trailing fragment.
#[derive(Debug, Default)]
pub struct StreamSegmenter {
    buffer: String,
}

impl StreamSegmenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a chunk and returns any speech segments completed by it.
    pub fn add_text(&mut self, chunk: &str) -> Vec<String> {
        self.buffer.push_str(chunk);
        if self.buffer.trim().is_empty() {
            return Vec::new();
        }

        let mut sentences = split_into_sentences(&self.buffer);
        if sentences.is_empty() {
            return Vec::new();
        }

        let complete: Vec<String> = if ends_at_sentence_boundary(&self.buffer) {
            self.buffer.clear();
            sentences
        } else if sentences.len() > 1 {
            let tail = sentences.pop().unwrap_or_default();
            self.buffer = tail;
            sentences
        } else {
            return Vec::new();
        };

        complete
            .iter()
            .flat_map(|sentence| segment_sentence(sentence, MAX_WORDS_PER_CHUNK))
            .collect()
    }

    /// Drains whatever hasn't been emitted as a complete sentence yet.
    pub fn take_remainder(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        let rest = rest.trim();
        if rest.is_empty() {
            None
        } else {
            Some(rest.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abbreviations_and_initials_do_not_split() {
        let sentences = split_into_sentences("Mr. Smith went to Washington D.C. for a meeting. What about questions? This should work!");
        assert_eq!(
            sentences,
            vec![
                "Mr. Smith went to Washington D.C. for a meeting.",
                "What about questions?",
                "This should work!",
            ]
        );
    }

    #[test]
    fn newlines_separate_sentences() {
        let sentences = split_into_sentences("First line\n\nSecond line.");
        assert_eq!(sentences, vec!["First line", "Second line."]);
    }

    #[test]
    fn short_sentence_is_one_segment() {
        let segments = segment_sentence("A tidy little sentence.", 25);
        assert_eq!(segments, vec!["A tidy little sentence."]);
    }

    #[test]
    fn long_sentence_splits_at_phrase_punctuation() {
        let sentence = "This fifth sentence is deliberately made very long to ensure that the splitting mechanism, based on word count and phrase separators like commas, is triggered effectively for this single sentence";
        let segments = segment_sentence(sentence, 10);
        assert!(segments.len() > 1, "expected a split, got {segments:?}");
        for segment in &segments {
            assert!(
                segment.split_whitespace().count() <= 20,
                "segment too long: {segment}"
            );
        }
        // Nothing lost: every word survives in order.
        let rejoined: Vec<&str> = segments
            .iter()
            .flat_map(|s| s.split_whitespace())
            .collect();
        let original: Vec<&str> = sentence.split_whitespace().collect();
        assert_eq!(rejoined, original);
    }

    #[test]
    fn oversized_phrase_gets_hard_split() {
        let words: Vec<String> = (0..30).map(|i| format!("w{i}")).collect();
        let sentence = words.join(" ");
        let segments = segment_sentence(&sentence, 10);
        assert_eq!(segments.len(), 3);
        assert!(segments.iter().all(|s| s.split_whitespace().count() <= 10));
    }

    #[test]
    fn digit_words_count_at_spoken_length() {
        // "1234" reads as four words, tipping this over a max of 4.
        let segments = segment_sentence("read 1234 now", 4);
        assert_eq!(segments.len(), 1);
        let segments = segment_sentence("read 1234 now please", 4);
        assert!(segments.len() > 1 || segments[0].split_whitespace().count() <= 4);
    }

    #[test]
    fn full_message_segments_in_order() {
        let segments = segment_full_message("First sentence. Second one here. Third!");
        assert_eq!(
            segments,
            vec!["First sentence.", "Second one here.", "Third!"]
        );
    }

    #[test]
    fn stream_segmenter_holds_back_incomplete_tail() {
        let mut segmenter = StreamSegmenter::new();
        assert!(segmenter.add_text("This is the start. ").len() == 1);
        let found = segmenter.add_text("This bit is not finished");
        assert!(found.is_empty(), "unexpected segments: {found:?}");
        assert_eq!(
            segmenter.take_remainder(),
            Some("This bit is not finished".to_string())
        );
    }

    #[test]
    fn stream_segmenter_waits_through_dotted_initials() {
        let mut segmenter = StreamSegmenter::new();
        let mut found = Vec::new();
        for chunk in [
            "Mr. Smith went ",
            "to Washington D.C.",
            " for a visit.",
            " It was great",
            "!",
        ] {
            found.extend(segmenter.add_text(chunk));
        }
        assert_eq!(
            found,
            vec!["Mr. Smith went to Washington D.C. for a visit.", "It was great!"]
        );
        assert_eq!(segmenter.take_remainder(), None);
    }

    #[test]
    fn stream_segmenter_emits_nothing_for_whitespace() {
        let mut segmenter = StreamSegmenter::new();
        assert!(segmenter.add_text("   ").is_empty());
        assert_eq!(segmenter.take_remainder(), None);
    }
}
