//! Backend-reserved token literals
//!
//! The backend misreads these when they appear as plain text, so prompts never
//! carry them and responses have them scrubbed before reaching a client.

/// Chat-template turn opener
pub const TURN_START: &str = "<|im_start|>";

/// Chat-template turn closer
pub const TURN_END: &str = "<|im_end|>";

/// Reasoning block opener
pub const THINK_OPEN: &str = "<think>";

/// Reasoning block closer
pub const THINK_CLOSE: &str = "</think>";

pub const TURN_MARKERS: [&str; 2] = [TURN_START, TURN_END];

pub const RESERVED: [&str; 4] = [TURN_START, TURN_END, THINK_OPEN, THINK_CLOSE];

/// Remove every occurrence of `literals`, repeating until none remain
///
/// A single pass is not enough: removing `<think>` from `<thi<think>nk>`
/// leaves a fresh `<think>` behind.
pub fn strip_all(text: &str, literals: &[&str]) -> String {
    let mut out = text.to_owned();

    while literals.iter().any(|literal| out.contains(literal)) {
        for literal in literals {
            out = out.replace(literal, "");
        }
    }

    out
}

/// Whether `text` is exactly one of the turn markers
pub fn is_turn_marker(text: &str) -> bool {
    TURN_MARKERS.contains(&text)
}
