use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use url::Url;

use crate::Config;

/// Values taken from the environment or command line
///
/// These win over whatever the config file says.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// `BACKEND_URL`
    pub backend_url: Option<Url>,
    /// `PROXY_PORT`
    pub port: Option<u16>,
    /// `REQUEST_TIMEOUT`, in seconds
    pub request_timeout_secs: Option<f64>,
}

impl Config {
    /// Layer overrides on top of the loaded configuration and re-validate
    ///
    /// # Errors
    ///
    /// Returns an error if the timeout is not a positive finite number of
    /// seconds or the resulting configuration fails validation
    pub fn apply_overrides(&mut self, overrides: &Overrides) -> anyhow::Result<()> {
        if let Some(url) = &overrides.backend_url {
            self.backend.url = url.clone();
        }

        if let Some(port) = overrides.port {
            let ip = self
                .server
                .listen_address
                .map_or(Ipv4Addr::UNSPECIFIED.into(), |addr| addr.ip());
            self.server.listen_address = Some(SocketAddr::new(ip, port));
        }

        if let Some(secs) = overrides.request_timeout_secs {
            self.backend.request_timeout = Duration::try_from_secs_f64(secs)
                .map_err(|e| anyhow::anyhow!("invalid REQUEST_TIMEOUT {secs}: {e}"))?;
        }

        self.validate()
    }
}
