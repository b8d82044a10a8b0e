use serde::Serialize;

use crate::http_probe::result::RawMetrics;

/// Header names whose presence in a response marks it as served by a backend
/// or intermediary cache. Membership test only, no value parsing.
const BACKEND_CACHE_HEADERS: [&str; 3] = ["x-cache", "age", "cf-cache-status"];

/// Latency breakdowns in milliseconds, derived from one settled record.
/// Recomputable any number of times; never stored back.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CalculatedMetrics {
    pub duration: f64,
    pub total_response_time: f64,
    pub dns_lookup_time: f64,
    /// Connect-to-first-byte minus DNS time. This is an approximation kept
    /// for compatibility: it does not isolate server work from network RTT,
    /// and it can go negative or lose meaning when the DNS phase was skipped
    /// (both `domain_lookup_*` fields 0). Not clamped.
    pub server_processing_time: f64,
    pub time_to_first_byte: f64,
    pub download_time: f64,
    pub total_transfer_size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusFlags {
    pub is_success: bool,
    pub is_local_cached: bool,
    pub is_backend_cached: bool,
}

/// Three-way classification of observed duration against an SLA threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConfidenceRange {
    #[serde(rename = "UNDER_SLA")]
    UnderSla,
    #[serde(rename = "WITHIN_SLA")]
    WithinSla,
    #[serde(rename = "OVER_SLA")]
    OverSla,
}

impl std::fmt::Display for ConfidenceRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ConfidenceRange::UnderSla => "UNDER_SLA",
            ConfidenceRange::WithinSla => "WITHIN_SLA",
            ConfidenceRange::OverSla => "OVER_SLA",
        };
        f.write_str(label)
    }
}

/// Microsecond difference as signed milliseconds. Signed so that records with
/// unset (zero) fields derive to zero or negative values instead of wrapping.
fn millis_between(start_micros: u64, end_micros: u64) -> f64 {
    (end_micros as i64 - start_micros as i64) as f64 / 1000.0
}

/// Derives the timing breakdown from a settled record. Total over any
/// well-formed record, including the all-zero "never completed" case.
pub fn derive_timings(raw: &RawMetrics) -> CalculatedMetrics {
    let dns_lookup_time = millis_between(raw.domain_lookup_start, raw.domain_lookup_end);
    let time_to_first_byte = millis_between(raw.request_start, raw.response_start);
    CalculatedMetrics {
        duration: millis_between(raw.start_time, raw.end_time),
        total_response_time: millis_between(raw.request_start, raw.response_end),
        dns_lookup_time,
        server_processing_time: time_to_first_byte - dns_lookup_time,
        time_to_first_byte,
        download_time: millis_between(raw.response_start, raw.response_end),
        total_transfer_size: if raw.transfer_size != 0 {
            raw.transfer_size
        } else {
            raw.request_size + raw.response_size
        },
    }
}

/// Derives the boolean status flags. `expected_status` is an exact match,
/// not a range check.
pub fn derive_status_flags(raw: &RawMetrics, expected_status: u16) -> StatusFlags {
    StatusFlags {
        is_success: raw.http_status == expected_status,
        is_local_cached: raw.transfer_size == 0,
        is_backend_cached: has_backend_cache_header(&raw.http_headers),
    }
}

/// Classifies the probe duration against an SLA threshold. Both boundaries
/// are inclusive on the faster side: exactly 0.8x the threshold is still
/// UNDER_SLA, exactly the threshold is still WITHIN_SLA.
pub fn classify_confidence(calculated: &CalculatedMetrics, sla_threshold_ms: f64) -> ConfidenceRange {
    if calculated.duration <= sla_threshold_ms * 0.8 {
        ConfidenceRange::UnderSla
    } else if calculated.duration <= sla_threshold_ms {
        ConfidenceRange::WithinSla
    } else {
        ConfidenceRange::OverSla
    }
}

/// True when the serialized headers blob contains any recognized cache
/// indicator. A blob that does not parse as a JSON object yields false,
/// never an error.
fn has_backend_cache_header(headers_json: &str) -> bool {
    let Ok(serde_json::Value::Object(headers)) = serde_json::from_str(headers_json) else {
        return false;
    };
    headers.keys().any(|name| {
        BACKEND_CACHE_HEADERS
            .iter()
            .any(|indicator| name.eq_ignore_ascii_case(indicator))
    })
}
