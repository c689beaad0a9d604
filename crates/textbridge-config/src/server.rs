use std::net::{Ipv4Addr, SocketAddr};

use serde::Deserialize;

/// Port used when neither the config file nor `PROXY_PORT` sets one
pub const DEFAULT_PORT: u16 = 8180;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    pub listen_address: Option<SocketAddr>,
}

impl ServerConfig {
    /// Effective listen address, `0.0.0.0:8180` unless configured
    pub fn listen_address(&self) -> SocketAddr {
        self.listen_address
            .unwrap_or_else(|| SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)))
    }
}
