use serde::Deserialize;

/// Probe configuration as read from the YAML file pointed to by
/// `CONFIG_FILE`. Everything except the target URL has a sensible default;
/// individual fields can still be overridden through the environment.
#[derive(Debug, Clone, Deserialize)]
pub struct ProbeConfig {
    /// Absolute URL of the target to probe. http or https only.
    pub url: String,

    /// HTTP verb for the request.
    #[serde(default = "default_method")]
    pub method: String,

    /// Optional request body sent verbatim.
    #[serde(default)]
    pub body: Option<String>,

    /// Logical iteration this probe belongs to. Carried through for future
    /// aggregation, not interpreted here.
    #[serde(default)]
    pub iteration_number: u64,

    /// Concurrency slot identifier, carried through like `iteration_number`.
    #[serde(default)]
    pub thread_number: u64,

    /// Status code that counts as success. Exact match.
    #[serde(default = "default_expected_status")]
    pub expected_status: u16,

    /// SLA threshold in milliseconds for the confidence classification.
    #[serde(default = "default_sla_threshold_ms")]
    pub sla_threshold_ms: f64,
}

fn default_method() -> String {
    "GET".to_owned()
}

fn default_expected_status() -> u16 {
    200
}

fn default_sla_threshold_ms() -> f64 {
    1000.0
}
