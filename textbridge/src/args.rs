use std::path::PathBuf;

use clap::Parser;
use textbridge_config::Overrides;
use url::Url;

/// Chat-completion gateway for text-continuation backends
#[derive(Debug, Parser)]
#[command(name = "textbridge", about = "Serve chat completions from a text-continuation backend")]
pub struct Args {
    /// Path to an optional configuration file
    #[arg(short, long, env = "TEXTBRIDGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Base URL of the continuation backend
    #[arg(long, env = "BACKEND_URL")]
    pub backend_url: Option<Url>,

    /// Port to listen on
    #[arg(long, env = "PROXY_PORT")]
    pub port: Option<u16>,

    /// Per-call backend timeout in seconds
    #[arg(long, env = "REQUEST_TIMEOUT")]
    pub request_timeout: Option<f64>,
}

impl Args {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            backend_url: self.backend_url.clone(),
            port: self.port,
            request_timeout_secs: self.request_timeout,
        }
    }
}
