use serde::Deserialize;

/// Sampling defaults tuned for plain text continuation
///
/// Any field the chat request sets explicitly wins over these.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SamplingConfig {
    pub temperature: f64,
    pub top_p: f64,
    pub top_k: i32,
    pub min_p: f64,
    pub repeat_penalty: f64,
    pub presence_penalty: f64,
    /// Generation limit when the request carries no token limit
    pub max_tokens: u32,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            temperature: 0.6,
            top_p: 0.95,
            top_k: 20,
            min_p: 0.0,
            repeat_penalty: 1.2,
            presence_penalty: 0.6,
            max_tokens: 2048,
        }
    }
}

impl SamplingConfig {
    pub(crate) fn float_fields(&self) -> [(&'static str, f64); 5] {
        [
            ("temperature", self.temperature),
            ("top_p", self.top_p),
            ("min_p", self.min_p),
            ("repeat_penalty", self.repeat_penalty),
            ("presence_penalty", self.presence_penalty),
        ]
    }
}
