//! Programmatic configuration builder for integration tests

use std::net::SocketAddr;
use std::time::Duration;

use textbridge_config::{Config, ServerConfig};

/// Builder for constructing test configurations
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with minimal defaults
    pub fn new() -> Self {
        Self {
            config: Config {
                server: ServerConfig {
                    listen_address: Some(SocketAddr::from(([127, 0, 0, 1], 0))),
                },
                ..Config::default()
            },
        }
    }

    /// Point the gateway at a backend
    pub fn with_backend(mut self, base_url: &str) -> Self {
        self.config.backend.url = base_url.parse().expect("valid URL");
        self
    }

    /// Bound every backend call
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.config.backend.request_timeout = timeout;
        self
    }

    /// Model reported when requests name none
    pub fn with_default_model(mut self, model: &str) -> Self {
        model.clone_into(&mut self.config.backend.default_model);
        self
    }

    /// Build the final config
    pub fn build(self) -> Config {
        self.config
    }
}
