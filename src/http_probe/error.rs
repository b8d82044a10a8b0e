use thiserror::Error;

use super::result::RawMetrics;
use crate::clock::now_micros;

/// Lifecycle stage at which a transport failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportStage {
    Dns,
    Connect,
    Tls,
    Request,
    Body,
}

impl std::fmt::Display for TransportStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            TransportStage::Dns => "dns resolution",
            TransportStage::Connect => "tcp connect",
            TransportStage::Tls => "tls handshake",
            TransportStage::Request => "http request",
            TransportStage::Body => "response body",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Error)]
pub enum ProbeError {
    /// The URL did not parse as an absolute URL. Raised before any network
    /// activity.
    #[error("invalid url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Parsed fine, but the scheme is something we do not probe.
    #[error("unsupported scheme '{scheme}': only http and https are probed")]
    UnsupportedScheme { scheme: String },

    #[error("url '{url}' has no host")]
    MissingHost { url: String },

    /// The single attempt failed somewhere between DNS resolution and the end
    /// of the response stream. Carries the partially populated record for
    /// diagnostics; `end_time` and the error payload are already stamped.
    #[error("{stage} failed: {message}")]
    Transport {
        stage: TransportStage,
        message: String,
        partial: Box<RawMetrics>,
    },
}

impl ProbeError {
    /// Settles the record into its failed state and wraps it together with
    /// the underlying cause.
    pub(super) fn transport(
        stage: TransportStage,
        message: String,
        mut metrics: RawMetrics,
    ) -> Self {
        metrics.end_time = now_micros();
        metrics.result_payload = serde_json::json!({ "error": message }).to_string();
        ProbeError::Transport {
            stage,
            message,
            partial: Box::new(metrics),
        }
    }
}
