use std::net::{IpAddr, SocketAddr};

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::client::conn::http1;
use hyper::header::{self, HeaderMap};
use hyper::{Method, Request};
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_native_tls::TlsConnector as TokioTlsConnector;
use tracing::debug;
use trust_dns_resolver::TokioAsyncResolver;
use url::{Host, Url};

use super::error::{ProbeError, TransportStage};
use super::result::RawMetrics;
use crate::clock::now_micros;

const USER_AGENT: &str = concat!("probelens/", env!("CARGO_PKG_VERSION"));

/// Descriptor for one probe: what to request and which logical slot the
/// result belongs to. Iteration/thread numbers are carried through verbatim
/// for later aggregation.
#[derive(Debug, Clone)]
pub struct ProbeRequest {
    pub url: String,
    pub method: Method,
    pub body: Option<String>,
    pub iteration_number: u64,
    pub thread_number: u64,
}

impl ProbeRequest {
    /// A plain GET probe with slot identifiers zeroed.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: Method::GET,
            body: None,
            iteration_number: 0,
            thread_number: 0,
        }
    }
}

/// Executes exactly one instrumented HTTP(S) request.
///
/// The request is issued over a connection we build by hand (resolve, connect,
/// optional TLS, HTTP/1.1 handshake) so that every lifecycle boundary is an
/// awaited point that can be timestamped with [`now_micros`]. One attempt, no
/// retry: the probe either resolves with a fully populated [`RawMetrics`] or
/// fails with a [`ProbeError`] carrying the underlying cause.
///
/// # Errors
///
/// [`ProbeError::InvalidUrl`], [`ProbeError::UnsupportedScheme`] and
/// [`ProbeError::MissingHost`] are raised before any network activity.
/// [`ProbeError::Transport`] covers everything from DNS resolution to a
/// prematurely terminated response stream and attaches the partial record.
pub async fn run_probe(
    resolver: &TokioAsyncResolver,
    tls: &TokioTlsConnector,
    request: &ProbeRequest,
) -> Result<RawMetrics, ProbeError> {
    let url = Url::parse(&request.url).map_err(|err| ProbeError::InvalidUrl {
        url: request.url.clone(),
        reason: err.to_string(),
    })?;
    let secure = match url.scheme() {
        "http" => false,
        "https" => true,
        other => {
            return Err(ProbeError::UnsupportedScheme {
                scheme: other.to_owned(),
            });
        }
    };
    let host = match url.host() {
        Some(host) => host.to_owned(),
        None => {
            return Err(ProbeError::MissingHost {
                url: request.url.clone(),
            });
        }
    };
    let port = url
        .port_or_known_default()
        .unwrap_or(if secure { 443 } else { 80 });

    let request_size = request.body.as_ref().map_or(0, |body| body.len() as u64);
    let mut metrics = RawMetrics::start(
        request.iteration_number,
        request.thread_number,
        request_size,
    );

    let http_request = match build_http_request(&url, request) {
        Ok(req) => req,
        Err(err) => {
            return Err(ProbeError::transport(
                TransportStage::Request,
                err.to_string(),
                metrics,
            ));
        }
    };

    // IP-literal hosts skip the DNS phase; both domain_lookup_* fields stay 0.
    let address = match &host {
        Host::Domain(domain) => {
            metrics.domain_lookup_start = now_micros();
            let lookup = match resolver.lookup_ip(domain.as_str()).await {
                Ok(lookup) => lookup,
                Err(err) => {
                    return Err(ProbeError::transport(
                        TransportStage::Dns,
                        err.to_string(),
                        metrics,
                    ));
                }
            };
            metrics.domain_lookup_end = now_micros();
            match lookup.iter().next() {
                Some(ip) => SocketAddr::new(ip, port),
                None => {
                    return Err(ProbeError::transport(
                        TransportStage::Dns,
                        format!("no addresses resolved for '{domain}'"),
                        metrics,
                    ));
                }
            }
        }
        Host::Ipv4(ip) => SocketAddr::new(IpAddr::V4(*ip), port),
        Host::Ipv6(ip) => SocketAddr::new(IpAddr::V6(*ip), port),
    };

    let stream = match TcpStream::connect(address).await {
        Ok(stream) => stream,
        Err(err) => {
            return Err(ProbeError::transport(
                TransportStage::Connect,
                err.to_string(),
                metrics,
            ));
        }
    };
    metrics.request_start = now_micros();

    let exchange_result = if secure {
        let sni = url
            .host_str()
            .unwrap_or_default()
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_owned();
        match tls.connect(&sni, stream).await {
            Ok(tls_stream) => exchange(tls_stream, http_request, &mut metrics).await,
            Err(err) => Err((TransportStage::Tls, err.to_string())),
        }
    } else {
        exchange(stream, http_request, &mut metrics).await
    };

    match exchange_result {
        Ok(()) => Ok(metrics),
        Err((stage, message)) => Err(ProbeError::transport(stage, message, metrics)),
    }
}

/// Drives the HTTP/1.1 exchange over an established stream, filling the
/// response half of the record. The spawned connection task finishes once the
/// request side is dropped, releasing the socket on every exit path.
async fn exchange<S>(
    stream: S,
    request: Request<Full<Bytes>>,
    metrics: &mut RawMetrics,
) -> Result<(), (TransportStage, String)>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let io = TokioIo::new(stream);
    let (mut sender, connection) = match http1::handshake::<_, Full<Bytes>>(io).await {
        Ok(pair) => pair,
        Err(err) => return Err((TransportStage::Request, err.to_string())),
    };
    tokio::spawn(async move {
        if let Err(err) = connection.await {
            debug!("probe connection closed with error: {err}");
        }
    });

    let response = match sender.send_request(request).await {
        Ok(response) => response,
        Err(err) => return Err((TransportStage::Request, err.to_string())),
    };

    metrics.http_status = response.status().as_u16();
    metrics.http_headers = serialize_headers(response.headers());
    metrics.pod_instance = header_value(response.headers(), "x-pod-id");
    metrics.profiling = header_value(response.headers(), "server-timing");
    metrics.response_start = now_micros();

    let mut body = response.into_body();
    let mut payload: Vec<u8> = Vec::new();
    while let Some(frame) = body.frame().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(err) => return Err((TransportStage::Body, err.to_string())),
        };
        if let Some(chunk) = frame.data_ref() {
            metrics.response_size += chunk.len() as u64;
            payload.extend_from_slice(chunk);
        }
    }

    let settled = now_micros();
    metrics.response_end = settled;
    metrics.end_time = settled;
    metrics.result_payload = String::from_utf8_lossy(&payload).into_owned();
    metrics.transfer_size = metrics.request_size + metrics.response_size;
    Ok(())
}

fn build_http_request(
    url: &Url,
    probe: &ProbeRequest,
) -> Result<Request<Full<Bytes>>, hyper::http::Error> {
    let mut target = url.path().to_owned();
    if let Some(query) = url.query() {
        target.push('?');
        target.push_str(query);
    }
    let body = probe.body.clone().unwrap_or_default();
    Request::builder()
        .method(probe.method.clone())
        .uri(target)
        .header(header::HOST, host_header_value(url))
        .header(header::USER_AGENT, USER_AGENT)
        .body(Full::new(Bytes::from(body)))
}

/// Host header value: explicit port only when it differs from the scheme
/// default (`Url::port` is None for default ports).
fn host_header_value(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_owned(),
    }
}

/// Serializes the response header map into a JSON object string, lowercase
/// names as keys, repeated headers joined with ", ".
fn serialize_headers(headers: &HeaderMap) -> String {
    let mut map = serde_json::Map::new();
    for (name, value) in headers {
        let text = String::from_utf8_lossy(value.as_bytes()).into_owned();
        match map.entry(name.as_str().to_owned()) {
            serde_json::map::Entry::Vacant(slot) => {
                slot.insert(serde_json::Value::String(text));
            }
            serde_json::map::Entry::Occupied(mut slot) => {
                if let serde_json::Value::String(existing) = slot.get_mut() {
                    existing.push_str(", ");
                    existing.push_str(&text);
                }
            }
        }
    }
    serde_json::Value::Object(map).to_string()
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
}
