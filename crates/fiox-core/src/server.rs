//! HTTP exposition endpoint.
//!
//! Serves the fio snapshot registry in Prometheus text format from a
//! lightweight server on a background thread. Scrapes are pull-based; the
//! endpoint carries no TLS or auth.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use prometheus::{Encoder, Registry, TextEncoder};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Configuration for the telemetry endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Bind address (default: 0.0.0.0).
    pub bind: String,
    /// Port (default: 8080).
    pub port: u16,
    /// URL path (default: /metrics).
    pub path: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 8080,
            path: "/metrics".to_string(),
        }
    }
}

/// Errors starting the telemetry endpoint.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid bind address {addr}: {message}")]
    InvalidAddr { addr: String, message: String },

    #[error("failed to bind {addr}: {message}")]
    Bind { addr: SocketAddr, message: String },

    #[error("failed to spawn server thread: {0}")]
    Spawn(std::io::Error),
}

impl From<ServerError> for fiox_common::Error {
    fn from(err: ServerError) -> Self {
        fiox_common::Error::Telemetry(err.to_string())
    }
}

/// Handle to the running telemetry HTTP server.
pub struct TelemetryServer {
    shutdown: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
    addr: SocketAddr,
}

impl TelemetryServer {
    /// Start the telemetry server on a background thread.
    pub fn start(config: &TelemetryConfig, registry: Registry) -> Result<Self, ServerError> {
        let addr_text = format!("{}:{}", config.bind, config.port);
        let addr: SocketAddr = addr_text.parse().map_err(|e: std::net::AddrParseError| {
            ServerError::InvalidAddr {
                addr: addr_text.clone(),
                message: e.to_string(),
            }
        })?;

        let server = tiny_http::Server::http(addr).map_err(|e| ServerError::Bind {
            addr,
            message: e.to_string(),
        })?;

        info!(addr = %addr, path = %config.path, "telemetry server started");

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let path = config.path.clone();

        let thread = thread::Builder::new()
            .name("telemetry-server".to_string())
            .spawn(move || {
                serve_loop(server, &registry, &shutdown_clone, &path);
            })
            .map_err(ServerError::Spawn)?;

        Ok(Self {
            shutdown,
            thread: Some(thread),
            addr,
        })
    }

    /// Get the bound address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Shut down the telemetry server.
    pub fn shutdown(mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        // Send a dummy request to unblock the accept loop
        let _ = std::net::TcpStream::connect(self.addr);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        info!("telemetry server stopped");
    }
}

impl Drop for TelemetryServer {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        let _ = std::net::TcpStream::connect(self.addr);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Render the registry in Prometheus text exposition format.
fn render(registry: &Registry) -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Main serve loop: accept requests, serve the metrics path, reject the rest.
fn serve_loop(server: tiny_http::Server, registry: &Registry, shutdown: &AtomicBool, path: &str) {
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        // Accept with timeout so we can check the shutdown flag
        let request = match server.recv_timeout(std::time::Duration::from_secs(1)) {
            Ok(Some(req)) => req,
            Ok(None) => continue, // timeout, check shutdown flag
            Err(e) => {
                if !shutdown.load(Ordering::SeqCst) {
                    error!(error = %e, "telemetry server accept error");
                }
                break;
            }
        };

        if shutdown.load(Ordering::SeqCst) {
            let _ = request
                .respond(tiny_http::Response::from_string("shutting down").with_status_code(503));
            break;
        }

        let url = request.url().to_string();
        debug!(method = %request.method(), url = %url, "telemetry scrape");

        if url == path || url == format!("{}/", path) {
            match render(registry) {
                Ok(body) => {
                    let response = tiny_http::Response::from_string(body).with_header(
                        "Content-Type: text/plain; version=0.0.4; charset=utf-8"
                            .parse::<tiny_http::Header>()
                            .unwrap(),
                    );
                    if let Err(e) = request.respond(response) {
                        warn!(error = %e, "failed to send scrape response");
                    }
                }
                Err(e) => {
                    error!(error = %e, "failed to render metrics");
                    let _ = request.respond(
                        tiny_http::Response::from_string(format!("error: {}", e))
                            .with_status_code(500),
                    );
                }
            }
        } else if url == "/health" || url == "/healthz" {
            let _ = request.respond(tiny_http::Response::from_string("ok"));
        } else {
            let _ = request
                .respond(tiny_http::Response::from_string("not found").with_status_code(404));
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::build_registry;
    use crate::store::SnapshotStore;
    use fiox_common::MetricMap;
    use std::io::{Read, Write};

    fn populated_registry() -> Registry {
        let store = Arc::new(SnapshotStore::new());
        let mut metrics = MetricMap::new();
        metrics.insert("read_kb", 1024.0);
        metrics.insert("read_bandwidth", 2048.0);
        store.update(metrics);
        build_registry(store).unwrap()
    }

    fn fetch(addr: SocketAddr, target: &str) -> String {
        let mut stream = std::net::TcpStream::connect(addr).unwrap();
        let request = format!("GET {} HTTP/1.0\r\nHost: localhost\r\n\r\n", target);
        stream.write_all(request.as_bytes()).unwrap();
        let mut body = String::new();
        stream.read_to_string(&mut body).unwrap();
        body
    }

    #[test]
    fn test_server_serves_scrape_and_health() {
        let config = TelemetryConfig {
            bind: "127.0.0.1".to_string(),
            port: 18200 + (std::process::id() % 1000) as u16,
            path: "/metrics".to_string(),
        };

        let server = match TelemetryServer::start(&config, populated_registry()) {
            Ok(s) => s,
            Err(e) => {
                // Port may be in use in CI, skip gracefully
                eprintln!("skipping telemetry server test: {}", e);
                return;
            }
        };

        std::thread::sleep(std::time::Duration::from_millis(100));

        let scrape = fetch(server.addr(), "/metrics");
        assert!(scrape.contains("200 OK"), "expected 200 OK, got: {scrape}");
        assert!(scrape.contains("text/plain; version=0.0.4"));
        assert!(scrape.contains("read_kb 1024"));
        assert!(scrape.contains("read_bandwidth 2048"));

        let health = fetch(server.addr(), "/health");
        assert!(health.contains("200 OK"));
        assert!(health.contains("ok"));

        let missing = fetch(server.addr(), "/unknown");
        assert!(missing.contains("404"));

        server.shutdown();
    }

    #[test]
    fn test_server_custom_path() {
        let config = TelemetryConfig {
            bind: "127.0.0.1".to_string(),
            port: 18400 + (std::process::id() % 1000) as u16,
            path: "/fio".to_string(),
        };

        let server = match TelemetryServer::start(&config, populated_registry()) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("skipping telemetry server test: {}", e);
                return;
            }
        };

        std::thread::sleep(std::time::Duration::from_millis(100));

        let scrape = fetch(server.addr(), "/fio");
        assert!(scrape.contains("read_kb 1024"));

        // The default path is not special when reconfigured
        let missing = fetch(server.addr(), "/metrics");
        assert!(missing.contains("404"));

        server.shutdown();
    }

    #[test]
    fn test_invalid_bind_address() {
        let config = TelemetryConfig {
            bind: "not-an-address".to_string(),
            port: 8080,
            path: "/metrics".to_string(),
        };
        let err = match TelemetryServer::start(&config, Registry::new()) {
            Ok(_) => panic!("binding to a bad address should fail"),
            Err(e) => e,
        };
        assert!(matches!(err, ServerError::InvalidAddr { .. }));

        let common: fiox_common::Error = err.into();
        assert!(matches!(common, fiox_common::Error::Telemetry(_)));
    }

    #[test]
    fn test_default_config() {
        let config = TelemetryConfig::default();
        assert_eq!(config.bind, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert_eq!(config.path, "/metrics");
    }
}
