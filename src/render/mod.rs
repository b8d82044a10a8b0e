use chrono::DateTime;

use crate::http_probe::{ProbeError, RawMetrics};
use crate::metrics::{CalculatedMetrics, ConfidenceRange, StatusFlags};

const KEY_WIDTH: usize = 24;
const PREVIEW_LIMIT: usize = 100;
const RULE_WIDTH: usize = 60;

/// Prints the full probe report: raw record, calculated metrics, status
/// flags and the SLA classification, as aligned key/value sections.
pub fn render_report(
    raw: &RawMetrics,
    calculated: &CalculatedMetrics,
    flags: &StatusFlags,
    confidence: ConfidenceRange,
) {
    section("RAW METRICS");
    row("iteration_number", raw.iteration_number);
    row("thread_number", raw.thread_number);
    row("start_time", format_epoch_micros(raw.start_time));
    row("domain_lookup_start", raw.domain_lookup_start);
    row("domain_lookup_end", raw.domain_lookup_end);
    row("request_start", raw.request_start);
    row("response_start", raw.response_start);
    row("response_end", raw.response_end);
    row("end_time", format_epoch_micros(raw.end_time));
    row("request_size", format!("{} bytes", raw.request_size));
    row("response_size", format!("{} bytes", raw.response_size));
    row("transfer_size", format!("{} bytes", raw.transfer_size));
    row("http_status", raw.http_status);
    row("pod_instance", format_optional(raw.pod_instance.as_deref()));
    row("profiling", format_optional(raw.profiling.as_deref()));
    row("http_headers", preview(&raw.http_headers));
    row("result_payload", preview(&raw.result_payload));

    section("CALCULATED METRICS");
    row("duration", format_millis(calculated.duration));
    row("total_response_time", format_millis(calculated.total_response_time));
    row("dns_lookup_time", format_millis(calculated.dns_lookup_time));
    row(
        "server_processing_time",
        format_millis(calculated.server_processing_time),
    );
    row("time_to_first_byte", format_millis(calculated.time_to_first_byte));
    row("download_time", format_millis(calculated.download_time));
    row(
        "total_transfer_size",
        format!("{} bytes", calculated.total_transfer_size),
    );

    section("STATUS FLAGS");
    row("is_success", format_flag(flags.is_success));
    row("is_local_cached", format_flag(flags.is_local_cached));
    row("is_backend_cached", format_flag(flags.is_backend_cached));

    section("CONFIDENCE RANGE");
    let marker = match confidence {
        ConfidenceRange::UnderSla => "🟢",
        ConfidenceRange::WithinSla => "🟡",
        ConfidenceRange::OverSla => "🔴",
    };
    println!("  {marker} {confidence}");
    println!("{}", "═".repeat(RULE_WIDTH));
}

/// Prints a probe failure distinctly from a successful report. For transport
/// failures the partial record's bounds are shown for diagnostics.
pub fn render_failure(err: &ProbeError) {
    section("PROBE FAILED");
    println!("  ❌ {err}");
    if let ProbeError::Transport { partial, .. } = err {
        row("start_time", format_epoch_micros(partial.start_time));
        row("end_time", format_epoch_micros(partial.end_time));
        row("result_payload", preview(&partial.result_payload));
    }
    println!("{}", "═".repeat(RULE_WIDTH));
}

fn section(title: &str) {
    println!("\n{}", "═".repeat(RULE_WIDTH));
    println!("  {title}");
    println!("{}", "═".repeat(RULE_WIDTH));
}

fn row(key: &str, value: impl std::fmt::Display) {
    println!("  {} {}", to_fixed_width(key, KEY_WIDTH), value);
}

fn to_fixed_width(input: &str, width: usize) -> String {
    use unicode_truncate::UnicodeTruncateStr;

    let (truncated, _) = input.unicode_truncate(width);
    format!("{:<width$}", truncated, width = width)
}

/// Bounded preview so header blobs and payloads do not flood the console.
fn preview(text: &str) -> String {
    use unicode_truncate::UnicodeTruncateStr;

    if text.is_empty() {
        return "(empty)".to_owned();
    }
    let (truncated, _) = text.unicode_truncate(PREVIEW_LIMIT);
    if truncated.len() < text.len() {
        format!("{truncated}...")
    } else {
        truncated.to_owned()
    }
}

fn format_epoch_micros(micros: u64) -> String {
    if micros == 0 {
        return "0".to_owned();
    }
    DateTime::from_timestamp_micros(micros as i64)
        .map(|ts| format!("{micros} ({})", ts.to_rfc3339()))
        .unwrap_or_else(|| micros.to_string())
}

fn format_millis(value: f64) -> String {
    format!("{value:.2} ms")
}

fn format_flag(value: bool) -> &'static str {
    if value { "✅ true" } else { "❌ false" }
}

fn format_optional(value: Option<&str>) -> String {
    value.unwrap_or("null").to_owned()
}
