//! Single-shot instrumented HTTP probing.
//!
//! One probe = one real HTTP(S) request with every connection lifecycle
//! boundary timestamped ([`http_probe`]), plus pure derivation of latency
//! breakdowns, status flags and an SLA classification ([`metrics`]).

pub mod clock;
pub mod config;
pub mod http_probe;
pub mod metrics;
pub mod render;
