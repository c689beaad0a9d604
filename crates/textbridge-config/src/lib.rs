#![allow(clippy::must_use_candidate)]

pub mod backend;
mod env;
mod loader;
mod overrides;
pub mod sampling;
pub mod server;
pub mod telemetry;

use serde::Deserialize;

pub use backend::*;
pub use overrides::Overrides;
pub use sampling::*;
pub use server::*;
pub use telemetry::TelemetryConfig;

/// Top-level textbridge configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Listener configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Text-continuation backend the gateway forwards to
    #[serde(default)]
    pub backend: BackendConfig,
    /// Sampling defaults merged under caller-supplied values
    #[serde(default)]
    pub sampling: SamplingConfig,
    /// Telemetry configuration
    #[serde(default)]
    pub telemetry: Option<TelemetryConfig>,
}
