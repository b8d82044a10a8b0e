use std::time::Duration;

use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use probelens::config::{load_config, setup_resolver, setup_tls_connector};
use probelens::http_probe::run_probe;
use probelens::metrics::{classify_confidence, derive_status_flags, derive_timings};
use probelens::render;

fn init_logging() {
    let filter = std::env::var("PROBELENS_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .map_or_else(
            |_| EnvFilter::new("info"),
            |value| EnvFilter::try_new(value).unwrap_or_else(|_| EnvFilter::new("info")),
        );

    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();

    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set global default subscriber: {}", err);
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_logging();
    std::process::exit(run().await);
}

async fn run() -> i32 {
    let config = match load_config() {
        Ok(config) => config,
        Err(err) => {
            error!("configuration error: {err}");
            return 1;
        }
    };
    let resolver = match setup_resolver(&config.dns_hosts) {
        Ok(resolver) => resolver,
        Err(err) => {
            error!("resolver setup failed: {err}");
            return 1;
        }
    };
    let tls = match setup_tls_connector(config.insecure_tls) {
        Ok(tls) => tls,
        Err(err) => {
            error!("TLS connector setup failed: {err}");
            return 1;
        }
    };

    info!(
        "probing {} {} (iteration {}, thread {})",
        config.request.method,
        config.request.url,
        config.request.iteration_number,
        config.request.thread_number
    );

    let probe = run_probe(&resolver, &tls, &config.request);
    let outcome = match config.timeout_ms {
        Some(ms) => match tokio::time::timeout(Duration::from_millis(ms), probe).await {
            Ok(outcome) => outcome,
            Err(_) => {
                // Dropping the in-flight future aborts the request and
                // releases the connection.
                error!("probe timed out after {ms} ms");
                return 1;
            }
        },
        None => probe.await,
    };

    match outcome {
        Ok(raw) => {
            let calculated = derive_timings(&raw);
            let flags = derive_status_flags(&raw, config.expected_status);
            let confidence = classify_confidence(&calculated, config.sla_threshold_ms);
            render::render_report(&raw, &calculated, &flags, confidence);
            0
        }
        Err(err) => {
            render::render_failure(&err);
            1
        }
    }
}
