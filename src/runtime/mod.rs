//! Runtime adapters: UDP listener, metrics export loop, and status payloads.

pub mod api;
pub mod exporter;
pub mod udp;

pub use api::{health, status, Health, StatusResponse};
pub use exporter::{export_once, spawn_export_loop, MetricsExporter};
pub use udp::{serve_datagrams, RECV_BUFFER_SIZE};
