//! HTTP health and metrics endpoint

use crate::config::MetricsConfig;
use crate::metrics::Metrics;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Health server state
pub struct HealthServer {
    metrics: Arc<Metrics>,
    ready: AtomicBool,
}

impl HealthServer {
    /// Create a new health server
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self {
            metrics,
            ready: AtomicBool::new(false),
        }
    }

    /// Set the ready state
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Check if the server is ready
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    /// Bind the configured address and serve until cancelled
    pub async fn run(
        self: Arc<Self>,
        config: &MetricsConfig,
        cancel_token: CancellationToken,
    ) -> std::io::Result<()> {
        let listener = TcpListener::bind(&config.listen_addr).await?;
        info!("Health server listening on {}", config.listen_addr);
        self.serve(listener, cancel_token).await
    }

    /// Serve on an already bound listener until cancelled
    pub async fn serve(
        self: Arc<Self>,
        listener: TcpListener,
        cancel_token: CancellationToken,
    ) -> std::io::Result<()> {
        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, _)) => {
                        let server = Arc::clone(&self);
                        tokio::spawn(async move {
                            if let Err(e) = server.handle_connection(stream).await {
                                debug!("Health connection error: {}", e);
                            }
                        });
                    }
                    Err(e) => error!("Health server accept error: {}", e),
                }
            }
        }

        info!("Health server stopped");
        Ok(())
    }

    async fn handle_connection(&self, mut stream: TcpStream) -> std::io::Result<()> {
        let mut request_line = String::new();
        BufReader::new(&mut stream).read_line(&mut request_line).await?;

        let (status, content_type, body) = self.route(&request_line);
        let response = format!(
            "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            status_text(status),
            content_type,
            body.len(),
            body
        );

        stream.write_all(response.as_bytes()).await?;
        stream.flush().await
    }

    /// Map a request line ("GET /path HTTP/1.1") to status, content type and body
    fn route(&self, request_line: &str) -> (u16, &'static str, String) {
        let mut parts = request_line.split_whitespace();
        let (Some(method), Some(path)) = (parts.next(), parts.next()) else {
            return (400, "text/plain", "Bad Request".to_string());
        };

        if method != "GET" {
            return (405, "text/plain", "Method Not Allowed".to_string());
        }

        match path {
            "/health" | "/healthz" => (200, "application/json", r#"{"status":"healthy"}"#.to_string()),
            "/ready" | "/readyz" if self.is_ready() => {
                (200, "application/json", r#"{"status":"ready"}"#.to_string())
            }
            "/ready" | "/readyz" => (503, "application/json", r#"{"status":"not ready"}"#.to_string()),
            "/metrics" => (200, "text/plain; version=0.0.4", self.metrics.gather()),
            _ => (404, "text/plain", "Not Found".to_string()),
        }
    }
}

fn status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}
