use std::path::Path;

use crate::Config;

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Reads the file, expands `{{ env.VAR }}` placeholders, then
    /// deserializes and validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, environment variable
    /// expansion fails, TOML parsing fails, or validation fails
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

        Self::from_toml(&raw)
    }

    /// Parse configuration from TOML text, expanding placeholders first
    ///
    /// # Errors
    ///
    /// Returns an error if expansion, parsing, or validation fails
    pub fn from_toml(raw: &str) -> anyhow::Result<Self> {
        let expanded =
            crate::env::expand_env(raw).map_err(|e| anyhow::anyhow!("config variable expansion failed: {e}"))?;

        let config: Self = toml::from_str(&expanded).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate that the configuration is internally consistent
    ///
    /// # Errors
    ///
    /// Returns an error if the backend URL, timeouts, buffer size, or
    /// sampling defaults are unusable
    pub fn validate(&self) -> anyhow::Result<()> {
        self.validate_backend()?;
        self.validate_sampling()?;
        Ok(())
    }

    fn validate_backend(&self) -> anyhow::Result<()> {
        let backend = &self.backend;

        if !matches!(backend.url.scheme(), "http" | "https") {
            anyhow::bail!("backend.url must use http or https, got '{}'", backend.url.scheme());
        }

        if backend.request_timeout.is_zero() {
            anyhow::bail!("backend.request_timeout must be greater than 0");
        }

        if backend.health_timeout.is_zero() {
            anyhow::bail!("backend.health_timeout must be greater than 0");
        }

        if backend.stream_buffer == 0 {
            anyhow::bail!("backend.stream_buffer must be greater than 0");
        }

        Ok(())
    }

    fn validate_sampling(&self) -> anyhow::Result<()> {
        for (name, value) in self.sampling.float_fields() {
            if !value.is_finite() {
                anyhow::bail!("sampling.{name} must be a finite number");
            }
        }

        Ok(())
    }
}
