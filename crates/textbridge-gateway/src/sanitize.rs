//! Cleanup of raw completion text before it reaches a client

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::tokens;

// -- Regex patterns compiled once via LazyLock --

static REASONING_BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think>.*?</think>").expect("must be valid regex"));

static TRAILING_BRACKETS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[`)\]}>]{3,}\s*$").expect("must be valid regex"));

/// Below this many words the repetition detector never fires
const MIN_WORDS: usize = 12;

/// Phrase lengths tried, smallest first
const WINDOW_SIZES: [usize; 3] = [3, 4, 5];

/// Occurrences of one phrase that count as degenerate
const REPEAT_THRESHOLD: usize = 3;

/// Clean a full completion
///
/// Removes leaked turn markers, reasoning blocks and a trailing bracket run,
/// truncates degenerate repetition, then trims. Clean input comes back
/// unchanged.
pub fn sanitize(raw: &str) -> String {
    let text = tokens::strip_all(raw, &tokens::TURN_MARKERS);
    let text = REASONING_BLOCK_RE.replace_all(&text, "");
    let text = TRAILING_BRACKETS_RE.replace(&text, "");

    truncate_repetition(&text).trim().to_owned()
}

/// Cut `text` where a short phrase starts looping
///
/// Window sizes are tried in order; the first phrase seen three times within
/// a window size decides the cut, which lands on the start of the phrase's
/// second textual occurrence. At most one cut is made.
pub fn truncate_repetition(text: &str) -> &str {
    let words: Vec<&str> = text.split_whitespace().collect();

    if words.len() < MIN_WORDS {
        return text;
    }

    for window in WINDOW_SIZES {
        let mut seen: HashMap<&[&str], usize> = HashMap::new();

        for gram in words.windows(window) {
            let count = seen.entry(gram).or_insert(0);
            *count += 1;

            if *count < REPEAT_THRESHOLD {
                continue;
            }

            // Words may be separated by newlines in the text, in which case
            // the phrase has no exact match and scanning goes on.
            if let Some(cut) = second_occurrence(text, &gram.join(" ")) {
                tracing::debug!(window, cut, "truncating degenerate repetition");
                return text[..cut].trim_end();
            }
        }
    }

    text
}

/// Byte offset of the second non-overlapping occurrence of `phrase`
fn second_occurrence(text: &str, phrase: &str) -> Option<usize> {
    let first = text.find(phrase)?;
    let after_first = first + phrase.len();

    text[after_first..].find(phrase).map(|offset| after_first + offset)
}
