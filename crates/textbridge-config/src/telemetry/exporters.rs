use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::backend::deserialize_duration;

/// OTLP collector that finished spans are shipped to
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExporterConfig {
    pub endpoint: Url,
    #[serde(default)]
    pub protocol: ExportProtocol,
    /// Deadline for a single batch export
    #[serde(default = "default_export_timeout", deserialize_with = "deserialize_duration")]
    pub timeout: Duration,
}

/// Wire protocol spoken to the collector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportProtocol {
    #[default]
    Grpc,
    /// Protobuf over HTTP, usually on port 4318
    #[serde(alias = "http")]
    HttpProto,
}

impl ExportProtocol {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Grpc => "grpc",
            Self::HttpProto => "http_proto",
        }
    }
}

const fn default_export_timeout() -> Duration {
    Duration::from_secs(10)
}
