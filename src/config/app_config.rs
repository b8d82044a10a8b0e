use std::env;
use std::net::IpAddr;
use std::time::Duration;

use hyper::Method;
use thiserror::Error;
use tokio_native_tls::TlsConnector as TokioTlsConnector;
use tracing::info;
use trust_dns_resolver::{
    TokioAsyncResolver,
    config::{NameServerConfig, NameServerConfigGroup, Protocol, ResolverConfig, ResolverOpts},
};

use super::model::ProbeConfig;
use crate::http_probe::ProbeRequest;

/// Fully resolved application configuration: the request descriptor for the
/// single probe plus the expectation parameters handed to the deriver.
#[derive(Debug)]
pub struct AppConfig {
    pub request: ProbeRequest,
    pub expected_status: u16,
    pub sla_threshold_ms: f64,
    /// Caller-imposed deadline for the whole probe, applied at the entry
    /// point as an abort of the in-flight future. None means no deadline.
    pub timeout_ms: Option<u64>,
    /// Explicit nameserver IPs; when empty the system configuration is used.
    pub dns_hosts: Vec<String>,
    pub insecure_tls: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid YAML in '{path}': {source}")]
    Yaml {
        path: String,
        source: serde_yaml::Error,
    },
    #[error("no target configured: set TARGET_URL or point CONFIG_FILE at a probe config")]
    MissingTarget,
    #[error("invalid HTTP method '{0}'")]
    InvalidMethod(String),
    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: &'static str, value: String },
    #[error("invalid DNS host '{0}': expected an IP address")]
    InvalidDnsHost(String),
}

/// Loads configuration from the optional `CONFIG_FILE` YAML plus environment
/// overrides (`TARGET_URL`, `HTTP_METHOD`, `REQUEST_BODY`, `EXPECTED_STATUS`,
/// `SLA_THRESHOLD_MS`, `ITERATION_NUMBER`, `THREAD_NUMBER`,
/// `PROBE_TIMEOUT_MS`, `DNS_HOSTS`, `INSECURE_TLS`). Environment wins over
/// the file for every field.
///
/// # Errors
///
/// Fails when the file is unreadable or malformed, when no target URL is
/// configured at all, or when an override does not parse.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let file_config = match env::var("CONFIG_FILE") {
        Ok(path) => {
            let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
                path: path.clone(),
                source,
            })?;
            let parsed: ProbeConfig =
                serde_yaml::from_str(&raw).map_err(|source| ConfigError::Yaml { path, source })?;
            Some(parsed)
        }
        Err(_) => None,
    };

    let url = env::var("TARGET_URL")
        .ok()
        .or_else(|| file_config.as_ref().map(|c| c.url.clone()))
        .ok_or(ConfigError::MissingTarget)?;

    let method_text = env::var("HTTP_METHOD")
        .ok()
        .or_else(|| file_config.as_ref().map(|c| c.method.clone()))
        .unwrap_or_else(|| "GET".to_owned());
    let method = parse_method(&method_text)?;

    let body = env::var("REQUEST_BODY")
        .ok()
        .or_else(|| file_config.as_ref().and_then(|c| c.body.clone()));

    let iteration_number = env_or("ITERATION_NUMBER", file_config.as_ref().map_or(0, |c| c.iteration_number))?;
    let thread_number = env_or("THREAD_NUMBER", file_config.as_ref().map_or(0, |c| c.thread_number))?;
    let expected_status = env_or(
        "EXPECTED_STATUS",
        file_config.as_ref().map_or(200, |c| c.expected_status),
    )?;
    let sla_threshold_ms = env_or(
        "SLA_THRESHOLD_MS",
        file_config.as_ref().map_or(1000.0, |c| c.sla_threshold_ms),
    )?;

    let timeout_ms = match env::var("PROBE_TIMEOUT_MS") {
        Ok(value) => Some(parse_value("PROBE_TIMEOUT_MS", &value)?),
        Err(_) => None,
    };

    let dns_hosts = env::var("DNS_HOSTS")
        .map(|hosts| split_hosts(&hosts))
        .unwrap_or_default();

    let insecure_tls = env::var("INSECURE_TLS")
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    Ok(AppConfig {
        request: ProbeRequest {
            url,
            method,
            body,
            iteration_number,
            thread_number,
        },
        expected_status,
        sla_threshold_ms,
        timeout_ms,
        dns_hosts,
        insecure_tls,
    })
}

/// Builds the DNS resolver the probe resolves through. With explicit hosts
/// each one becomes a TCP nameserver entry (TCP is more reliable than UDP
/// for DNS queries); otherwise the system resolver configuration is used.
///
/// # Errors
///
/// Fails when an explicit host is not an IP address or the system resolver
/// configuration cannot be read.
pub fn setup_resolver(dns_hosts: &[String]) -> Result<TokioAsyncResolver, ConfigError> {
    if dns_hosts.is_empty() {
        return TokioAsyncResolver::tokio_from_system_conf().map_err(|err| {
            ConfigError::InvalidValue {
                key: "system resolver configuration",
                value: err.to_string(),
            }
        });
    }

    let mut opts = ResolverOpts::default();
    opts.attempts = 2;
    opts.timeout = Duration::from_millis(500);
    opts.cache_size = 1024;

    let mut name_servers = NameServerConfigGroup::new();
    for host in dns_hosts {
        let ip: IpAddr = host
            .parse()
            .map_err(|_| ConfigError::InvalidDnsHost(host.clone()))?;
        name_servers.push(NameServerConfig {
            socket_addr: (ip, 53).into(),
            protocol: Protocol::Tcp,
            tls_dns_name: None,
            trust_negative_responses: false,
            bind_addr: None,
        });
    }
    info!("using explicit DNS hosts: {:?}", dns_hosts);

    let resolver_config = ResolverConfig::from_parts(None, vec![], name_servers);
    Ok(TokioAsyncResolver::tokio(resolver_config, opts))
}

/// Builds the TLS connector used for https targets. Certificate validation
/// stays on unless `insecure` was requested for lab targets.
pub fn setup_tls_connector(insecure: bool) -> Result<TokioTlsConnector, native_tls::Error> {
    let mut builder = native_tls::TlsConnector::builder();
    if insecure {
        builder.danger_accept_invalid_certs(true);
    }
    let connector = builder.build()?;
    Ok(TokioTlsConnector::from(connector))
}

fn parse_method(text: &str) -> Result<Method, ConfigError> {
    Method::from_bytes(text.to_ascii_uppercase().as_bytes())
        .map_err(|_| ConfigError::InvalidMethod(text.to_owned()))
}

fn split_hosts(hosts: &str) -> Vec<String> {
    hosts
        .split(',')
        .map(str::trim)
        .filter(|host| !host.is_empty())
        .map(str::to_owned)
        .collect()
}

fn env_or<T: std::str::FromStr>(key: &'static str, fallback: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) => parse_value(key, &value),
        Err(_) => Ok(fallback),
    }
}

fn parse_value<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_hosts_trims_and_drops_empty_entries() {
        assert_eq!(
            split_hosts("1.1.1.1, 8.8.8.8 ,,"),
            vec!["1.1.1.1".to_owned(), "8.8.8.8".to_owned()]
        );
        assert!(split_hosts("").is_empty());
    }

    #[test]
    fn methods_are_parsed_case_insensitively() {
        assert_eq!(parse_method("get").unwrap(), Method::GET);
        assert_eq!(parse_method("POST").unwrap(), Method::POST);
        assert!(parse_method("not a verb").is_err());
    }

    #[tokio::test]
    async fn explicit_dns_hosts_must_be_ip_addresses() {
        assert!(setup_resolver(&["1.1.1.1".to_owned()]).is_ok());
        let err = setup_resolver(&["dns.example.com".to_owned()]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDnsHost(_)));
    }
}
