use std::time::Duration;

use serde::{Deserialize, Deserializer};
use url::Url;

/// Connection settings for the text-continuation backend
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackendConfig {
    /// Base URL of the backend (e.g. a llama.cpp server)
    #[serde(default = "default_url")]
    pub url: Url,
    /// Upper bound on a whole backend call, streaming included
    #[serde(default = "default_request_timeout", deserialize_with = "deserialize_duration")]
    pub request_timeout: Duration,
    /// Timeout for the health probe issued by `GET /health`
    #[serde(default = "default_health_timeout", deserialize_with = "deserialize_duration")]
    pub health_timeout: Duration,
    /// Model name reported when the chat request omits one
    #[serde(default = "default_model")]
    pub default_model: String,
    /// Capacity of the channel between the backend reader and the client stream
    #[serde(default = "default_stream_buffer")]
    pub stream_buffer: usize,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            request_timeout: default_request_timeout(),
            health_timeout: default_health_timeout(),
            default_model: default_model(),
            stream_buffer: default_stream_buffer(),
        }
    }
}

fn default_url() -> Url {
    Url::parse("http://localhost:8080").expect("must be a valid URL")
}

const fn default_request_timeout() -> Duration {
    Duration::from_secs(900)
}

const fn default_health_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_model() -> String {
    "Qwen3.5-397B-A17B".to_owned()
}

const fn default_stream_buffer() -> usize {
    32
}

/// Accept human-readable durations such as `"900s"` or `"15m"`
pub(crate) fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    duration_str::parse(&raw).map_err(|e| serde::de::Error::custom(format!("invalid duration '{raw}': {e}")))
}
