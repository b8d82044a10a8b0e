
use hyper::Method;
use support_probe::{hermetic_resolver, spawn_canned_server, tls_connector};

use probelens::http_probe::{ProbeError, ProbeRequest, TransportStage, run_probe};
use probelens::metrics::{
    ConfidenceRange, classify_confidence, derive_status_flags, derive_timings,
};

const CACHED_RESPONSE: &str = "HTTP/1.1 200 OK\r\n\
    Content-Type: text/plain\r\n\
    Content-Length: 50\r\n\
    Age: 10\r\n\
    X-Pod-Id: pod-42\r\n\
    Server-Timing: app;dur=12.5\r\n\
    Connection: close\r\n\
    \r\n\
    01234567890123456789012345678901234567890123456789";

#[tokio::test]
async fn successful_probe_populates_the_full_record() -> Result<(), String> {
    let (base_url, _server) = spawn_canned_server(CACHED_RESPONSE)?;
    let request = ProbeRequest::get(format!("{base_url}/posts/1"));

    let raw = run_probe(&hermetic_resolver(), &tls_connector(), &request)
        .await
        .map_err(|err| err.to_string())?;

    assert_eq!(raw.http_status, 200);
    assert_eq!(raw.request_size, 0);
    assert_eq!(raw.response_size, 50);
    assert_eq!(raw.transfer_size, raw.request_size + raw.response_size);
    assert_eq!(raw.result_payload.len(), 50);
    assert_eq!(raw.pod_instance.as_deref(), Some("pod-42"));
    assert_eq!(raw.profiling.as_deref(), Some("app;dur=12.5"));

    // IP-literal target: DNS phase skipped, both fields stay 0.
    assert_eq!(raw.domain_lookup_start, 0);
    assert_eq!(raw.domain_lookup_end, 0);

    // Event ordering within the probe.
    assert!(raw.request_start >= raw.start_time);
    assert!(raw.response_start >= raw.request_start);
    assert!(raw.response_end >= raw.response_start);
    assert!(raw.end_time >= raw.start_time);

    let headers: serde_json::Value =
        serde_json::from_str(&raw.http_headers).map_err(|err| err.to_string())?;
    assert_eq!(headers["age"], "10");
    assert_eq!(headers["content-type"], "text/plain");
    Ok(())
}

#[tokio::test]
async fn successful_probe_derives_expected_metrics_and_flags() -> Result<(), String> {
    let (base_url, _server) = spawn_canned_server(CACHED_RESPONSE)?;
    let request = ProbeRequest::get(format!("{base_url}/posts/1"));

    let raw = run_probe(&hermetic_resolver(), &tls_connector(), &request)
        .await
        .map_err(|err| err.to_string())?;

    let flags = derive_status_flags(&raw, 200);
    assert!(flags.is_success);
    assert!(flags.is_backend_cached);
    assert!(!flags.is_local_cached);

    let calculated = derive_timings(&raw);
    assert!(calculated.duration > 0.0);
    assert!(calculated.duration >= calculated.total_response_time);
    assert!(calculated.time_to_first_byte >= 0.0);
    assert!(calculated.download_time >= 0.0);
    assert_eq!(calculated.dns_lookup_time, 0.0);
    assert_eq!(calculated.total_transfer_size, 50);

    // A loopback exchange sits comfortably under a one-minute SLA.
    assert_eq!(
        classify_confidence(&calculated, 60_000.0),
        ConfidenceRange::UnderSla
    );
    Ok(())
}

#[tokio::test]
async fn post_body_is_counted_into_request_and_transfer_size() -> Result<(), String> {
    let (base_url, _server) = spawn_canned_server(CACHED_RESPONSE)?;
    let mut request = ProbeRequest::get(format!("{base_url}/posts"));
    request.method = Method::POST;
    request.body = Some("hello world".to_owned());
    request.iteration_number = 7;
    request.thread_number = 3;

    let raw = run_probe(&hermetic_resolver(), &tls_connector(), &request)
        .await
        .map_err(|err| err.to_string())?;

    assert_eq!(raw.iteration_number, 7);
    assert_eq!(raw.thread_number, 3);
    assert_eq!(raw.request_size, 11);
    assert_eq!(raw.transfer_size, 11 + raw.response_size);
    assert!(!derive_status_flags(&raw, 200).is_local_cached);
    Ok(())
}

#[tokio::test]
async fn unexpected_status_is_not_success() -> Result<(), String> {
    let response = "HTTP/1.1 503 Service Unavailable\r\n\
        Content-Length: 0\r\n\
        Connection: close\r\n\
        \r\n";
    let (base_url, _server) = spawn_canned_server(response)?;
    let request = ProbeRequest::get(format!("{base_url}/health"));

    let raw = run_probe(&hermetic_resolver(), &tls_connector(), &request)
        .await
        .map_err(|err| err.to_string())?;

    assert_eq!(raw.http_status, 503);
    let flags = derive_status_flags(&raw, 200);
    assert!(!flags.is_success);
    // Zero-byte exchange reads as a local-cache hit by definition.
    assert!(flags.is_local_cached);
    assert!(!flags.is_backend_cached);
    Ok(())
}

#[tokio::test]
async fn connection_refused_surfaces_a_transport_failure() -> Result<(), String> {
    // Grab a port that nothing is listening on.
    let listener =
        std::net::TcpListener::bind("127.0.0.1:0").map_err(|err| err.to_string())?;
    let addr = listener.local_addr().map_err(|err| err.to_string())?;
    drop(listener);

    let request = ProbeRequest::get(format!("http://{addr}/"));
    let err = run_probe(&hermetic_resolver(), &tls_connector(), &request)
        .await
        .expect_err("probe against a closed port must fail");

    assert!(!err.to_string().is_empty());
    let (stage, message, partial) = match err {
        ProbeError::Transport {
            stage,
            message,
            partial,
        } => (stage, message, partial),
        other => panic!("expected a transport failure, got {other:?}"),
    };
    assert_eq!(stage, TransportStage::Connect);
    assert!(!message.is_empty());
    assert!(partial.end_time >= partial.start_time);
    assert_eq!(partial.http_status, 0);
    let payload: serde_json::Value =
        serde_json::from_str(&partial.result_payload).map_err(|err| err.to_string())?;
    assert!(payload["error"].as_str().is_some_and(|msg| !msg.is_empty()));
    Ok(())
}

#[tokio::test]
async fn dns_failure_surfaces_a_transport_failure_with_lookup_window_open() {
    // The hermetic resolver has no nameservers, so any domain lookup fails
    // without touching the network.
    let request = ProbeRequest::get("http://unresolvable.test/");
    let err = run_probe(&hermetic_resolver(), &tls_connector(), &request)
        .await
        .expect_err("lookup without nameservers must fail");

    let (stage, partial) = match err {
        ProbeError::Transport { stage, partial, .. } => (stage, partial),
        other => panic!("expected a transport failure, got {other:?}"),
    };
    assert_eq!(stage, TransportStage::Dns);
    assert!(partial.domain_lookup_start > 0);
    assert_eq!(partial.domain_lookup_end, 0);
    assert_eq!(partial.request_start, 0);
    assert!(partial.end_time >= partial.start_time);
}
