// src/serve/mod.rs

//! Local development proxy.
//!
//! Forwards browser requests to the configured upstream site, injects the
//! live-reload client into HTML responses, and serves the reload event
//! stream itself. No HTTP framework is involved; the proxy speaks plain
//! HTTP/1.1 over `tokio::net`.

pub mod proxy;

pub use proxy::{parse_upstream, Proxy, Upstream};
