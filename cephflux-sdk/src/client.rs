//! Time-series database clients.
//!
//! The dispatcher talks to destinations through [`TimeSeriesClient`]; a
//! [`ClientFactory`] creates one client per destination and cycle.
//! [`InfluxClient`] implements the InfluxDB 1.x HTTP API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cephflux_types::{Point, Precision};
use reqwest::{Client, StatusCode};

use crate::destination::Destination;
use crate::error::WriteError;
use crate::line_protocol;

/// A connection to one time-series database server.
#[async_trait]
pub trait TimeSeriesClient: Send + Sync {
    /// Write one batch of points.
    async fn write(
        &self,
        database: &str,
        points: &[Point],
        precision: Precision,
    ) -> Result<(), WriteError>;

    /// Create a database.
    async fn create_database(&self, database: &str) -> Result<(), WriteError>;
}

/// Creates clients for destinations.
pub trait ClientFactory: Send + Sync {
    /// Build a client for `destination`. `timeout` bounds each request.
    fn client(
        &self,
        destination: &Destination,
        timeout: Duration,
    ) -> Result<Arc<dyn TimeSeriesClient>, WriteError>;
}

/// Client for the InfluxDB 1.x HTTP API.
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use cephflux_sdk::{resolve_effective, DestinationDefaults, DestinationOverride};
/// use cephflux_sdk::{InfluxClient, TimeSeriesClient};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let destination = resolve_effective(
///         &DestinationOverride::new("localhost"),
///         &DestinationDefaults::default(),
///     )?;
///     let client = InfluxClient::new(&destination, Duration::from_secs(5))?;
///     client.create_database("ceph").await?;
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct InfluxClient {
    http: Client,
    base_url: String,
    username: Option<String>,
    password: Option<String>,
}

impl InfluxClient {
    /// Create a client for the destination's host, port and credentials.
    pub fn new(destination: &Destination, timeout: Duration) -> Result<Self, WriteError> {
        let http = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .danger_accept_invalid_certs(destination.ssl && !destination.verify_ssl)
            .build()
            .map_err(|e| WriteError::Other(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: destination.base_url(),
            username: destination.username.clone(),
            password: destination.password.clone(),
        })
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let request = self.http.post(format!("{}{}", self.base_url, path));
        match &self.username {
            Some(username) => request.basic_auth(username, self.password.as_ref()),
            None => request,
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder, database: &str) -> Result<(), WriteError> {
        let response = request.send().await.map_err(classify)?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(classify_status(status, body, database))
    }
}

#[async_trait]
impl TimeSeriesClient for InfluxClient {
    async fn write(
        &self,
        database: &str,
        points: &[Point],
        precision: Precision,
    ) -> Result<(), WriteError> {
        if points.is_empty() {
            return Ok(());
        }

        let request = self
            .post("/write")
            .query(&[("db", database), ("precision", precision.code())])
            .body(line_protocol::encode(points, precision));

        self.send(request, database).await
    }

    async fn create_database(&self, database: &str) -> Result<(), WriteError> {
        let statement = format!("CREATE DATABASE \"{}\"", database.replace('"', "\\\""));
        let request = self.post("/query").query(&[("q", statement.as_str())]);

        self.send(request, database).await
    }
}

/// Builds an [`InfluxClient`] per destination.
#[derive(Debug, Clone, Copy, Default)]
pub struct InfluxClientFactory;

impl ClientFactory for InfluxClientFactory {
    fn client(
        &self,
        destination: &Destination,
        timeout: Duration,
    ) -> Result<Arc<dyn TimeSeriesClient>, WriteError> {
        Ok(Arc::new(InfluxClient::new(destination, timeout)?))
    }
}

fn classify(error: reqwest::Error) -> WriteError {
    if error.is_timeout() {
        WriteError::Timeout(error.to_string())
    } else if error.is_connect() {
        WriteError::Connection(error.to_string())
    } else {
        WriteError::Other(error.to_string())
    }
}

fn classify_status(status: StatusCode, body: String, database: &str) -> WriteError {
    if status == StatusCode::NOT_FOUND && body.contains("database not found") {
        return WriteError::DatabaseNotFound(database.to_string());
    }

    let message = match body.trim() {
        "" => status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string(),
        text => text.to_string(),
    };
    WriteError::Rejected {
        status: status.as_u16(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::destination::{resolve_effective, DestinationDefaults, DestinationOverride};
    use cephflux_types::{tag, Measurement, Timestamp};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response and return the raw request.
    async fn serve_once(status: &'static str, body: &'static str) -> (u16, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let task = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = stream.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request);
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let length = text[..header_end]
                        .lines()
                        .find_map(|l| {
                            let (name, value) = l.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if request.len() >= header_end + 4 + length {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }

            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&request).into_owned()
        });

        (port, task)
    }

    fn destination(port: u16, username: Option<&str>) -> Destination {
        let mut entry = DestinationOverride::new("127.0.0.1");
        entry.port = Some(port.to_string());
        entry.username = username.map(str::to_string);
        entry.password = username.map(|_| "secret".to_string());
        resolve_effective(&entry, &DestinationDefaults::default()).unwrap()
    }

    fn point() -> Point {
        Point::builder(Measurement::PgSummaryOsd)
            .tag(tag::CEPH_DAEMON, "osd.0")
            .tag(tag::TYPE_INSTANCE, "active+clean")
            .tag(tag::HOST, "node-a")
            .timestamp(Timestamp::from_millis(5_000))
            .value(64.0)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn write_posts_line_protocol() {
        let (port, server) = serve_once("204 No Content", "").await;
        let client = InfluxClient::new(&destination(port, Some("ceph")), Duration::from_secs(5)).unwrap();

        client.write("ceph", &[point()], Precision::Seconds).await.unwrap();

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /write?db=ceph&precision=s "));
        assert!(request.to_ascii_lowercase().contains("authorization: basic "));
        assert!(request.ends_with(
            "ceph_pg_summary_osd,ceph_daemon=osd.0,host=node-a,type_instance=active+clean value=64 5"
        ));
    }

    #[tokio::test]
    async fn missing_database_is_classified() {
        let (port, _server) =
            serve_once("404 Not Found", r#"{"error":"database not found: \"ceph\""}"#).await;
        let client = InfluxClient::new(&destination(port, None), Duration::from_secs(5)).unwrap();

        let err = client.write("ceph", &[point()], Precision::Milliseconds).await.unwrap_err();
        assert!(matches!(err, WriteError::DatabaseNotFound(ref db) if db == "ceph"));
    }

    #[tokio::test]
    async fn other_failures_are_rejections() {
        let (port, _server) = serve_once("401 Unauthorized", r#"{"error":"authorization failed"}"#).await;
        let client = InfluxClient::new(&destination(port, None), Duration::from_secs(5)).unwrap();

        let err = client.write("ceph", &[point()], Precision::Milliseconds).await.unwrap_err();
        assert!(matches!(
            err,
            WriteError::Rejected { status: 401, ref message } if message.contains("authorization failed")
        ));
    }

    #[tokio::test]
    async fn create_database_sends_query() {
        let (port, server) = serve_once("200 OK", r#"{"results":[{}]}"#).await;
        let client = InfluxClient::new(&destination(port, None), Duration::from_secs(5)).unwrap();

        client.create_database("ceph").await.unwrap();

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /query?q=CREATE+DATABASE+%22ceph%22 "));
    }

    #[tokio::test]
    async fn unreachable_host_is_a_connection_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let client = InfluxClient::new(&destination(port, None), Duration::from_secs(5)).unwrap();
        let err = client.write("ceph", &[point()], Precision::Milliseconds).await.unwrap_err();
        assert!(matches!(err, WriteError::Connection(_)));
    }

    #[tokio::test]
    async fn empty_batch_sends_nothing() {
        let client = InfluxClient::new(&destination(1, None), Duration::from_secs(1)).unwrap();
        client.write("ceph", &[], Precision::Milliseconds).await.unwrap();
    }
}
