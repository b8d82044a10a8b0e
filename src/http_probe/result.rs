use serde::Serialize;

use crate::clock::now_micros;

/// Raw telemetry for one probe. Created when the probe starts, filled in as
/// lifecycle events fire, read-only once the probe settles.
///
/// All timestamps are microseconds since the Unix epoch; a value of 0 means
/// the corresponding event never happened (e.g. both `domain_lookup_*` fields
/// stay 0 when the target host is an IP literal and no DNS lookup runs).
#[derive(Debug, Clone, Serialize)]
pub struct RawMetrics {
    pub iteration_number: u64,
    pub thread_number: u64,

    pub start_time: u64,
    pub end_time: u64,

    pub domain_lookup_start: u64,
    pub domain_lookup_end: u64,
    pub request_start: u64,
    pub response_start: u64,
    pub response_end: u64,

    pub http_status: u16,
    /// Response headers serialized as a JSON object string. Empty until
    /// headers arrive.
    pub http_headers: String,
    /// Response body as text, or a JSON `{"error": ...}` object on failure.
    pub result_payload: String,
    /// Value of the `x-pod-id` response header, when the backend sends one.
    pub pod_instance: Option<String>,
    /// Value of the `server-timing` response header, when present.
    pub profiling: Option<String>,

    pub request_size: u64,
    pub response_size: u64,
    pub transfer_size: u64,
}

impl RawMetrics {
    /// Starts a fresh record: stamps `start_time` and the caller-supplied
    /// identifiers, everything else at its "not yet happened" value.
    pub fn start(iteration_number: u64, thread_number: u64, request_size: u64) -> Self {
        Self {
            iteration_number,
            thread_number,
            start_time: now_micros(),
            end_time: 0,
            domain_lookup_start: 0,
            domain_lookup_end: 0,
            request_start: 0,
            response_start: 0,
            response_end: 0,
            http_status: 0,
            http_headers: String::new(),
            result_payload: String::new(),
            pod_instance: None,
            profiling: None,
            request_size,
            response_size: 0,
            transfer_size: 0,
        }
    }
}
