//! HTTP status endpoint.
//!
//! Serves the health checks published by the last cycle:
//!
//! - `GET /health` - the current checks as JSON (`{}` when healthy)
//! - `GET /healthz` - `OK` while the process is up
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use cephflux_collect::ClusterDump;
//! use cephflux_sdk::status::StatusServer;
//! use cephflux_sdk::Exporter;
//!
//! #[tokio::main]
//! async fn main() {
//!     let exporter = Arc::new(Exporter::builder(Arc::new(ClusterDump::default())).build().unwrap());
//!     StatusServer::new("127.0.0.1:9283").start(exporter.clone());
//!     let _loop = exporter.start().unwrap();
//! }
//! ```

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::exporter::Exporter;

/// Serves exporter health over HTTP.
#[derive(Debug, Clone)]
pub struct StatusServer {
    listen_addr: String,
}

impl StatusServer {
    pub fn new(listen_addr: impl Into<String>) -> Self {
        Self {
            listen_addr: listen_addr.into(),
        }
    }

    pub fn listen_addr(&self) -> &str {
        &self.listen_addr
    }

    /// Spawn the server. It runs until the runtime shuts down.
    pub fn start(&self, exporter: Arc<Exporter>) -> tokio::task::JoinHandle<()> {
        let listen_addr = self.listen_addr.clone();

        tokio::spawn(async move {
            if let Err(e) = run_server(&listen_addr, exporter).await {
                warn!(addr = %listen_addr, error = %e, "Status server stopped");
            }
        })
    }
}

async fn run_server(
    listen_addr: &str,
    exporter: Arc<Exporter>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr: SocketAddr = listen_addr.parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "Serving status");

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let exporter = exporter.clone();

        tokio::spawn(async move {
            let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                let exporter = exporter.clone();
                async move { handle_request(req.uri().path(), &exporter) }
            });

            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                warn!(error = %e, "Status connection error");
            }
        });
    }
}

fn handle_request(path: &str, exporter: &Exporter) -> Result<Response<Full<Bytes>>, Infallible> {
    let (status, content_type, body) = match path {
        "/health" => {
            let checks = exporter.health().current();
            let body = serde_json::to_string(&checks).unwrap_or_else(|_| "{}".to_string());
            (StatusCode::OK, "application/json", body)
        }
        "/healthz" => (StatusCode::OK, "text/plain", "OK".to_string()),
        _ => (StatusCode::NOT_FOUND, "text/plain", "Not Found".to_string()),
    };

    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    Ok(response)
}
