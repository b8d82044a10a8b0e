pub mod app_config;
pub mod model;

pub use app_config::{AppConfig, ConfigError, load_config, setup_resolver, setup_tls_connector};
