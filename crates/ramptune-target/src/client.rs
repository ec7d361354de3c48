//! HTTP/1 client for the load generator API.
//!
//! Every call opens a fresh connection, sends one request, and reads the
//! whole response. Calls are bounded by the configured request timeout.

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use http::{Method, Request};
use http_body_util::{BodyExt, Full};
use ramptune_core::{Snapshot, TargetError, TargetSystem, TunerConfig, UpdateMode};
use tracing::debug;

const USER_AGENT: &str = concat!("ramptune/", env!("CARGO_PKG_VERSION"));

/// A load generator reachable over plain HTTP.
#[derive(Debug, Clone)]
pub struct HttpTarget {
    /// `host:port`
    address: String,
    timeout: Duration,
    update_mode: UpdateMode,
}

impl HttpTarget {
    pub fn new(address: impl Into<String>, timeout: Duration, update_mode: UpdateMode) -> Self {
        Self {
            address: address.into(),
            timeout,
            update_mode,
        }
    }

    pub fn from_config(config: &TunerConfig) -> Self {
        Self::new(config.api_authority(), config.request_timeout, config.update_mode)
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// `GET /stats`
    pub async fn stats(&self) -> Result<Snapshot, TargetError> {
        let uri = self.uri("/stats");
        let body = self.send(Method::GET, "/stats", None).await?;
        Snapshot::from_json(&body).map_err(|e| TargetError::Decode {
            uri,
            reason: e.to_string(),
        })
    }

    /// Push a new rate using the configured wire format.
    pub async fn update_rps(&self, rate: u64) -> Result<(), TargetError> {
        match self.update_mode {
            UpdateMode::Path => {
                let path = format!("/update/rps/{rate}");
                self.send(Method::GET, &path, None).await?;
            }
            UpdateMode::Json => {
                let body = serde_json::json!({ "rps": rate }).to_string();
                self.send(Method::PUT, "/update", Some(Bytes::from(body)))
                    .await?;
            }
        }
        debug!(address = %self.address, rate, mode = %self.update_mode, "rate updated");
        Ok(())
    }

    fn uri(&self, path: &str) -> String {
        format!("http://{}{path}", self.address)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Bytes>,
    ) -> Result<Bytes, TargetError> {
        let uri = self.uri(path);
        match tokio::time::timeout(self.timeout, self.round_trip(method, &uri, body)).await {
            Ok(result) => result,
            Err(_) => {
                debug!(%uri, "request timed out");
                Err(TargetError::Timeout {
                    uri,
                    timeout_ms: self.timeout.as_millis() as u64,
                })
            }
        }
    }

    async fn round_trip(
        &self,
        method: Method,
        uri: &str,
        body: Option<Bytes>,
    ) -> Result<Bytes, TargetError> {
        let stream = tokio::net::TcpStream::connect(&self.address)
            .await
            .map_err(|e| TargetError::Connect {
                address: self.address.clone(),
                reason: e.to_string(),
            })?;

        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| TargetError::Connect {
                address: self.address.clone(),
                reason: format!("handshake failed: {e}"),
            })?;

        // Drive the connection in the background.
        tokio::spawn(async move {
            let _ = conn.await;
        });

        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("host", &self.address)
            .header("user-agent", USER_AGENT);
        if body.is_some() {
            builder = builder.header("content-type", "application/json");
        }
        let req = builder
            .body(Full::new(body.unwrap_or_default()))
            .map_err(|e| TargetError::Request {
                uri: uri.to_string(),
                reason: e.to_string(),
            })?;

        let resp = sender.send_request(req).await.map_err(|e| TargetError::Request {
            uri: uri.to_string(),
            reason: e.to_string(),
        })?;

        let status = resp.status();
        let body = resp
            .into_body()
            .collect()
            .await
            .map_err(|e| TargetError::Request {
                uri: uri.to_string(),
                reason: format!("reading body: {e}"),
            })?
            .to_bytes();

        if !status.is_success() {
            debug!(%status, %uri, "non-2xx response");
            return Err(TargetError::Status {
                uri: uri.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(body)
    }
}

impl TargetSystem for HttpTarget {
    fn fetch_snapshot(&self) -> impl Future<Output = Result<Snapshot, TargetError>> + Send {
        self.stats()
    }

    fn apply_rate(&self, rate: u64) -> impl Future<Output = Result<(), TargetError>> + Send {
        self.update_rps(rate)
    }
}
