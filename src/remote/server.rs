use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::Context as _;
use axum::Json;
use axum::Router;
use axum::body::Body;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::{Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use hyper::server::conn::http1;
use hyper_util::rt::{TokioIo, TokioTimer};
use hyper_util::service::TowerToHyperService;
use tokio::sync::oneshot;

use crate::command::schema::Command;
use crate::config::ServerConfig;
use crate::foundation::error::{BatError, BatResult};
use crate::host::SceneQuery;
use crate::remote::queue::PendingCommandQueue;
use crate::remote::wire::{Ack, ApiError, ErrorReply, FrameReply, ObjectReply, STATUS_SUCCESS};

/// Lifecycle of the server, as last observed.
///
/// `Stopped -> Listening -> (per request) Receiving -> Dispatched -> Listening`, and `Stopped`
/// again after shutdown. With overlapping requests the value reflects the latest transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ServerState {
    /// Not accepting connections.
    Stopped = 0,
    /// Waiting for requests.
    Listening = 1,
    /// Reading and parsing a request body.
    Receiving = 2,
    /// A command was just queued.
    Dispatched = 3,
}

impl ServerState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Listening,
            2 => Self::Receiving,
            3 => Self::Dispatched,
            _ => Self::Stopped,
        }
    }
}

#[derive(Clone)]
struct AppState {
    queue: PendingCommandQueue,
    scene: Arc<dyn SceneQuery>,
    lifecycle: Arc<AtomicU8>,
    body_limit: usize,
    timeout: Duration,
}

impl AppState {
    fn set(&self, state: ServerState) {
        self.lifecycle.store(state as u8, Ordering::SeqCst);
    }
}

/// HTTP command server running on its own thread.
///
/// `POST /` validates and enqueues a command; `GET /frame` and `GET /object?name=` read host
/// state directly through the [`SceneQuery`]. Nothing else of the host is reachable from here.
///
/// Every failure, including unknown routes and wrong methods, answers with a JSON
/// [`ErrorReply`]. Header and body reads are each bounded by `request_timeout_ms`.
pub struct RemoteServer {
    addr: SocketAddr,
    lifecycle: Arc<AtomicU8>,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl RemoteServer {
    /// Bind and start serving. Returns once the listener is bound.
    pub fn start(
        cfg: &ServerConfig,
        queue: PendingCommandQueue,
        scene: Arc<dyn SceneQuery>,
    ) -> BatResult<Self> {
        let lifecycle = Arc::new(AtomicU8::new(ServerState::Stopped as u8));
        let app = AppState {
            queue,
            scene,
            lifecycle: Arc::clone(&lifecycle),
            body_limit: cfg.body_limit_bytes,
            timeout: Duration::from_millis(cfg.request_timeout_ms),
        };
        let bind = format!("{}:{}", cfg.host, cfg.port);
        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<SocketAddr, String>>();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let thread = std::thread::Builder::new()
            .name("bat-remote".to_string())
            .spawn(move || {
                let rt = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(e) => {
                        let _ = ready_tx.send(Err(format!("build runtime: {e}")));
                        return;
                    }
                };
                rt.block_on(serve(bind, app, ready_tx, shutdown_rx));
            })
            .context("spawn remote server thread")?;

        let addr = match ready_rx.recv() {
            Ok(Ok(addr)) => addr,
            Ok(Err(msg)) => {
                let _ = thread.join();
                return Err(BatError::Other(anyhow::anyhow!(msg)));
            }
            Err(_) => {
                let _ = thread.join();
                return Err(BatError::Other(anyhow::anyhow!(
                    "remote server thread exited before binding"
                )));
            }
        };
        Ok(Self {
            addr,
            lifecycle,
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        })
    }

    /// Address actually bound (useful with port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ServerState {
        ServerState::from_u8(self.lifecycle.load(Ordering::SeqCst))
    }

    /// Stop accepting connections and wait for the server thread.
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::warn!("remote server thread panicked");
            }
        }
        self.lifecycle
            .store(ServerState::Stopped as u8, Ordering::SeqCst);
    }
}

impl Drop for RemoteServer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn serve(
    bind: String,
    app: AppState,
    ready: std::sync::mpsc::Sender<Result<SocketAddr, String>>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let listener = match tokio::net::TcpListener::bind(&bind).await {
        Ok(l) => l,
        Err(e) => {
            let _ = ready.send(Err(format!("bind {bind}: {e}")));
            return;
        }
    };
    let addr = match listener.local_addr() {
        Ok(a) => a,
        Err(e) => {
            let _ = ready.send(Err(format!("local address: {e}")));
            return;
        }
    };
    let lifecycle = Arc::clone(&app.lifecycle);
    let timeout = app.timeout;
    app.set(ServerState::Listening);
    tracing::info!(%addr, "remote command server listening");
    let _ = ready.send(Ok(addr));

    // The header read is bounded by the same timeout as the body read.
    let mut http = http1::Builder::new();
    http.timer(TokioTimer::new()).header_read_timeout(timeout);
    let service = TowerToHyperService::new(router(app));

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        tracing::debug!(error = %e, "accept failed");
                        continue;
                    }
                };
                let conn = http.serve_connection(TokioIo::new(stream), service.clone());
                tokio::spawn(async move {
                    if let Err(e) = conn.await {
                        tracing::debug!(%peer, error = %e, "connection closed with an error");
                    }
                });
            }
        }
    }
    // Open connections are dropped with the runtime.
    drop(listener);
    lifecycle.store(ServerState::Stopped as u8, Ordering::SeqCst);
    tracing::info!(%addr, "remote command server stopped");
}

fn router(app: AppState) -> Router {
    Router::new()
        .route("/", post(post_command).fallback(unknown_route))
        .route("/frame", get(get_frame).fallback(unknown_route))
        .route("/object", get(get_object).fallback(unknown_route))
        .fallback(unknown_route)
        .with_state(app)
}

async fn post_command(State(app): State<AppState>, body: Body) -> Response {
    app.set(ServerState::Receiving);
    let response = receive(&app, body).await;
    app.set(ServerState::Listening);
    response
}

async fn receive(app: &AppState, body: Body) -> Response {
    let bytes = match tokio::time::timeout(app.timeout, axum::body::to_bytes(body, app.body_limit))
        .await
    {
        Ok(Ok(bytes)) => bytes,
        Ok(Err(e)) => {
            tracing::debug!(error = %e, "request body rejected");
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorReply::new(
                    "TransportError",
                    format!("could not read request body: {e}"),
                )),
            )
                .into_response();
        }
        Err(_) => {
            return (
                StatusCode::REQUEST_TIMEOUT,
                Json(ErrorReply::new(
                    "TransportError",
                    "request body was not received in time",
                )),
            )
                .into_response();
        }
    };

    let command = match Command::parse(&bytes) {
        Ok(c) => c,
        Err(e) => {
            tracing::debug!(error = %e, "command rejected");
            return ApiError(e).into_response();
        }
    };
    if !command.ignored.is_empty() {
        tracing::info!(ignored = ?command.ignored, "command carried unknown keys");
    }
    let ignored = command.ignored.clone();
    let seq = app.queue.push(command);
    app.set(ServerState::Dispatched);
    tracing::debug!(seq, pending = app.queue.len(), "command queued");
    Json(Ack {
        status: STATUS_SUCCESS.to_string(),
        message: "command queued for the next tick".to_string(),
        queued: seq,
        ignored,
    })
    .into_response()
}

async fn get_frame(State(app): State<AppState>) -> Json<FrameReply> {
    Json(FrameReply {
        status: STATUS_SUCCESS.to_string(),
        frame: app.scene.frame(),
    })
}

#[derive(Debug, serde::Deserialize)]
struct ObjectQuery {
    name: Option<String>,
}

async fn get_object(
    State(app): State<AppState>,
    query: Result<Query<ObjectQuery>, QueryRejection>,
) -> Result<Json<ObjectReply>, ApiError> {
    let Query(q) = query.map_err(|e| BatError::validation("name", e.body_text()))?;
    let name = q
        .name
        .filter(|n| !n.is_empty())
        .ok_or_else(|| BatError::validation("name", "query parameter is required"))?;
    let pose = app
        .scene
        .pose(&name)
        .ok_or_else(|| BatError::not_found("object", name.clone()))?;
    Ok(Json(ObjectReply {
        status: STATUS_SUCCESS.to_string(),
        object: name,
        location: pose.location,
        rotation: pose.rotation,
    }))
}

async fn unknown_route(method: Method, uri: Uri) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorReply::new(
            "NotFoundError",
            format!("no route for {method} {}", uri.path()),
        )),
    )
        .into_response()
}
