// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// RPC server: the DocumentAnalysis service over minimal HTTP/1.1 on raw TCP.
//
// # Routes
//
//   POST /seitenwerk.DocumentAnalysis/AnalyzeDocument
//        JSON body `{"image_data": "<base64>"}`, or the raw image bytes
//        with any other content type.
//   GET  /health
//
// One request per connection. The body size is checked against
// `max_request_bytes` before any of it is read.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use seitenwerk_core::config::ServerConfig;
use seitenwerk_core::error::{Result, SeitenwerkError};
use seitenwerk_core::status::{RpcStatus, StatusCode};
use seitenwerk_core::types::{DocumentAnalysisRequest, RequestId};
use seitenwerk_document::ModelContext;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::http::{self, HttpRequest, HttpResponse};
use crate::service::AnalysisService;

/// Fully-qualified path of the AnalyzeDocument method.
pub const ANALYZE_PATH: &str = "/seitenwerk.DocumentAnalysis/AnalyzeDocument";

pub const HEALTH_PATH: &str = "/health";

/// Lifecycle of an [`RpcServer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerStatus {
    Stopped,
    Starting,
    Running,
}

/// State shared with every connection task.
struct SharedState {
    service: AnalysisService,
    active_connections: Arc<AtomicU32>,
    max_request_bytes: usize,
}

/// Outcome of reading one request off a connection.
enum Incoming {
    Request(HttpRequest),
    Rejected(HttpResponse),
    Closed,
}

pub struct RpcServer {
    config: ServerConfig,
    shared: Arc<SharedState>,
    status: ServerStatus,
    shutdown_signal: Arc<Notify>,
    task_handle: Option<JoinHandle<()>>,
    active_connections: Arc<AtomicU32>,
    local_addr: Option<SocketAddr>,
}

impl RpcServer {
    /// Create a stopped server. Call [`start`](Self::start) to accept
    /// connections.
    pub fn new(config: ServerConfig, context: Arc<ModelContext>) -> Self {
        let active_connections = Arc::new(AtomicU32::new(0));
        let shared = Arc::new(SharedState {
            service: AnalysisService::new(context, config.max_workers),
            active_connections: Arc::clone(&active_connections),
            max_request_bytes: config.max_request_bytes,
        });
        Self {
            config,
            shared,
            status: ServerStatus::Stopped,
            shutdown_signal: Arc::new(Notify::new()),
            task_handle: None,
            active_connections,
            local_addr: None,
        }
    }

    pub fn status(&self) -> ServerStatus {
        self.status
    }

    /// Bound address once running. Differs from the configured one when the
    /// configured port is 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Number of currently open client connections.
    pub fn active_connections(&self) -> u32 {
        self.active_connections.load(Ordering::Relaxed)
    }

    /// Bind the listener and spawn the accept loop.
    ///
    /// # Errors
    ///
    /// Returns [`SeitenwerkError::Server`] if the address cannot be bound.
    pub async fn start(&mut self) -> Result<SocketAddr> {
        if let (ServerStatus::Running, Some(addr)) = (self.status, self.local_addr) {
            debug!(%addr, "RPC server already running");
            return Ok(addr);
        }

        self.status = ServerStatus::Starting;

        let bind_addr = self.config.socket_addr();
        let listener = match TcpListener::bind(bind_addr).await {
            Ok(listener) => listener,
            Err(e) => {
                self.status = ServerStatus::Stopped;
                return Err(SeitenwerkError::Server(format!("bind {bind_addr}: {e}")));
            }
        };
        let addr = listener
            .local_addr()
            .map_err(|e| SeitenwerkError::Server(format!("local address: {e}")))?;

        info!(
            %addr,
            max_workers = self.config.max_workers,
            max_request_bytes = self.config.max_request_bytes,
            toolkit = %self.shared.service.health().toolkit,
            "RPC server listening"
        );

        let shutdown = Arc::clone(&self.shutdown_signal);
        let shared = Arc::clone(&self.shared);
        let handle = tokio::spawn(async move {
            Self::accept_loop(listener, shutdown, shared).await;
        });

        self.task_handle = Some(handle);
        self.local_addr = Some(addr);
        self.status = ServerStatus::Running;
        Ok(addr)
    }

    /// Stop accepting connections, then wait until every connection already
    /// accepted has sent its response.
    pub async fn stop(&mut self) -> Result<()> {
        if self.status != ServerStatus::Running {
            return Ok(());
        }

        info!(addr = ?self.local_addr, "Stopping RPC server");
        self.shutdown_signal.notify_one();

        if let Some(handle) = self.task_handle.take() {
            handle
                .await
                .map_err(|e| SeitenwerkError::Server(format!("task join: {e}")))?;
        }

        self.status = ServerStatus::Stopped;
        self.local_addr = None;
        info!("RPC server stopped");
        Ok(())
    }

    async fn accept_loop(listener: TcpListener, shutdown: Arc<Notify>, shared: Arc<SharedState>) {
        let mut connections = JoinSet::new();
        loop {
            tokio::select! {
                _ = shutdown.notified() => {
                    debug!("Accept loop received shutdown signal");
                    break;
                }

                Some(joined) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "Connection task failed");
                    }
                }

                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, peer_addr)) => {
                            debug!(peer = %peer_addr, "Incoming connection");
                            let state = Arc::clone(&shared);
                            state.active_connections.fetch_add(1, Ordering::Relaxed);
                            connections.spawn(async move {
                                if let Err(e) = Self::handle_connection(stream, peer_addr, &state).await {
                                    warn!(peer = %peer_addr, error = %e, "Connection handler error");
                                }
                                state.active_connections.fetch_sub(1, Ordering::Relaxed);
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                        }
                    }
                }
            }
        }

        drop(listener);
        if !connections.is_empty() {
            info!(in_flight = connections.len(), "Draining open connections");
        }
        while let Some(joined) = connections.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Connection task failed");
            }
        }
    }

    async fn handle_connection(
        mut stream: TcpStream,
        peer_addr: SocketAddr,
        state: &SharedState,
    ) -> Result<()> {
        let response = match read_request(&mut stream, state.max_request_bytes).await? {
            Incoming::Request(request) => {
                debug!(
                    peer = %peer_addr,
                    method = %request.head.method,
                    path = %request.head.path,
                    body_bytes = request.body.len(),
                    "Request received"
                );
                route(request, &state.service).await
            }
            Incoming::Rejected(response) => response,
            Incoming::Closed => {
                debug!(peer = %peer_addr, "Connection closed before a request arrived");
                return Ok(());
            }
        };

        send_response(&mut stream, &response).await?;
        debug!(
            peer = %peer_addr,
            status = response.status,
            rpc_status = %response.rpc_status,
            "Response sent"
        );
        Ok(())
    }
}

/// Read the head, enforce the size limit, then read exactly the body.
async fn read_request(stream: &mut TcpStream, max_request_bytes: usize) -> Result<Incoming> {
    let mut buf = Vec::with_capacity(8192);

    let head = loop {
        match http::parse_head(&buf) {
            Ok(Some(head)) => break head,
            Ok(None) => {}
            Err(e) => return Ok(Incoming::Rejected(bad_request(&e.to_string()))),
        }
        let read = stream
            .read_buf(&mut buf)
            .await
            .map_err(|e| SeitenwerkError::Server(format!("read request head: {e}")))?;
        if read == 0 {
            if buf.is_empty() {
                return Ok(Incoming::Closed);
            }
            return Err(SeitenwerkError::Server(
                "connection closed inside request head".into(),
            ));
        }
    };

    let length = match head.content_length() {
        Ok(length) => length,
        Err(e) => return Ok(Incoming::Rejected(bad_request(&e.to_string()))),
    };
    if length > max_request_bytes {
        warn!(length, max_request_bytes, "Request body over limit");
        return Ok(Incoming::Rejected(bad_request(&format!(
            "request body of {length} bytes exceeds the {max_request_bytes} byte limit"
        ))));
    }

    let mut body = buf.split_off(head.body_offset.min(buf.len()));
    if body.len() < length {
        let received = body.len();
        body.resize(length, 0);
        stream
            .read_exact(&mut body[received..])
            .await
            .map_err(|e| SeitenwerkError::Server(format!("read request body: {e}")))?;
    }
    body.truncate(length);

    Ok(Incoming::Request(HttpRequest { head, body }))
}

fn bad_request(detail: &str) -> HttpResponse {
    HttpResponse::from_status(&RpcStatus::invalid_argument(format!(
        "Invalid request: {detail}"
    )))
}

async fn route(request: HttpRequest, service: &AnalysisService) -> HttpResponse {
    match (request.head.method.as_str(), request.head.path.as_str()) {
        ("POST", ANALYZE_PATH) => {
            let message = if request.head.is_json() {
                match serde_json::from_slice::<DocumentAnalysisRequest>(&request.body) {
                    Ok(message) => message,
                    Err(e) => return bad_request(&format!("malformed request body: {e}")),
                }
            } else {
                DocumentAnalysisRequest::new(request.body)
            };
            match service.analyze_document(RequestId::new(), message).await {
                Ok(response) => HttpResponse::ok(&response),
                Err(status) => HttpResponse::from_status(&status),
            }
        }
        ("GET", HEALTH_PATH) => HttpResponse::ok(&service.health()),
        (method, path) => HttpResponse::from_status(&RpcStatus::new(
            StatusCode::Unimplemented,
            format!("Method not found: {method} {path}"),
        )),
    }
}

async fn send_response(stream: &mut TcpStream, response: &HttpResponse) -> Result<()> {
    stream
        .write_all(&response.to_bytes())
        .await
        .map_err(|e| SeitenwerkError::Server(format!("write response: {e}")))?;
    stream
        .flush()
        .await
        .map_err(|e| SeitenwerkError::Server(format!("flush: {e}")))?;
    Ok(())
}
