//! Loopback HTTP server answering status queries and forwarding commands.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::control::{Command, ControlHandle};
use crate::core::WorkerRegistry;
use crate::error::RuntimeError;

use super::wire::{epoch_millis, Ack, ErrorBody, RuntimeStatus, WorkerStatus};

/// Delay between acknowledging `POST /stop` and enqueuing the command, so
/// the caller observes success before shutdown begins.
const STOP_ACK_DELAY: Duration = Duration::from_millis(100);

/// Shared state handed to the request handlers. The surface only reads the
/// registry and forwards commands; it holds no write access to anything.
#[derive(Clone)]
pub struct IpcState {
    pub app_file: String,
    pub started_at: SystemTime,
    pub registry: Arc<WorkerRegistry>,
    pub commands: ControlHandle,
}

/// The bound loopback endpoint, ready to serve.
pub struct IpcServer {
    listener: TcpListener,
    state: IpcState,
}

impl IpcServer {
    /// Binds 127.0.0.1 on `port` (0 = ephemeral). Failure is fatal at
    /// startup.
    pub async fn bind(port: u16, state: IpcState) -> Result<Self, RuntimeError> {
        let addr = SocketAddr::from(([127, 0, 0, 1], port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| RuntimeError::IpcBind { source })?;
        Ok(Self { listener, state })
    }

    /// The actually bound port (relevant with an ephemeral bind).
    pub fn port(&self) -> u16 {
        self.listener
            .local_addr()
            .map(|addr| addr.port())
            .unwrap_or(0)
    }

    /// Serves requests until the token is cancelled.
    pub fn serve(self, token: CancellationToken) -> JoinHandle<()> {
        let app = router(self.state);
        let listener = self.listener;
        tokio::spawn(async move {
            let shutdown = async move { token.cancelled().await };
            if let Err(err) = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await
            {
                tracing::error!(error = %err, "ipc server terminated");
            }
        })
    }
}

fn router(state: IpcState) -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/reload", post(reload))
        .route("/stop", post(stop))
        .route("/scale/up", post(scale_up))
        .route("/scale/down", post(scale_down))
        .fallback(not_found)
        .with_state(state)
}

type CommandResponse = Result<Json<Ack>, (StatusCode, Json<ErrorBody>)>;

async fn status(State(st): State<IpcState>) -> Json<RuntimeStatus> {
    let workers = st
        .registry
        .snapshot()
        .await
        .into_iter()
        .map(WorkerStatus::from)
        .collect();
    Json(RuntimeStatus {
        app_file: st.app_file.clone(),
        start_time: epoch_millis(st.started_at),
        workers,
    })
}

async fn reload(State(st): State<IpcState>) -> CommandResponse {
    enqueue(&st, Command::Reload).await
}

async fn scale_up(State(st): State<IpcState>) -> CommandResponse {
    enqueue(&st, Command::ScaleUp).await
}

async fn scale_down(State(st): State<IpcState>) -> CommandResponse {
    enqueue(&st, Command::ScaleDown).await
}

/// Acknowledges first, enqueues after a short delay: the response must be
/// on the wire before the supervisor starts tearing the process down.
async fn stop(State(st): State<IpcState>) -> Json<Ack> {
    let commands = st.commands.clone();
    tokio::spawn(async move {
        tokio::time::sleep(STOP_ACK_DELAY).await;
        let _ = commands.send(Command::Stop).await;
    });
    Json(Ack::new(Command::Stop.as_str()))
}

async fn enqueue(st: &IpcState, cmd: Command) -> CommandResponse {
    st.commands.send(cmd).await.map_err(|err| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorBody {
                error: err.to_string(),
            }),
        )
    })?;
    Ok(Json(Ack::new(cmd.as_str())))
}

async fn not_found() -> (StatusCode, Json<ErrorBody>) {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody {
            error: "not found".into(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;
    use crate::control;

    async fn serve_test_ipc() -> (u16, mpsc::Receiver<Command>, CancellationToken) {
        let registry = Arc::new(WorkerRegistry::new());
        registry.insert(1, 100, SystemTime::now()).await;
        registry.insert(2, 200, SystemTime::now()).await;
        registry.mark_ready(1).await;
        registry.mark_ready(2).await;

        let (commands, rx) = control::channel(8);
        let state = IpcState {
            app_file: "/srv/app".into(),
            started_at: SystemTime::now(),
            registry,
            commands,
        };

        let server = IpcServer::bind(0, state).await.unwrap();
        let port = server.port();
        assert!(port > 0);

        let token = CancellationToken::new();
        server.serve(token.clone());
        (port, rx, token)
    }

    #[tokio::test]
    async fn status_reports_the_registry_snapshot() {
        let (port, _rx, token) = serve_test_ipc().await;

        let status: RuntimeStatus = reqwest::get(format!("http://127.0.0.1:{port}/status"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(status.app_file, "/srv/app");
        assert_eq!(status.workers.len(), 2);
        assert!(status
            .workers
            .iter()
            .all(|w| w.state == crate::core::WorkerState::Ready));
        assert_eq!(status.workers[0].id, 1);

        token.cancel();
    }

    #[tokio::test]
    async fn command_routes_enqueue_and_acknowledge() {
        let (port, mut rx, token) = serve_test_ipc().await;
        let client = reqwest::Client::new();

        let ack: Ack = client
            .post(format!("http://127.0.0.1:{port}/reload"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(ack.ok);
        assert_eq!(ack.command, "reload");
        assert_eq!(rx.recv().await, Some(Command::Reload));

        let ack: Ack = client
            .post(format!("http://127.0.0.1:{port}/scale/down"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(ack.command, "scale-down");
        assert_eq!(rx.recv().await, Some(Command::ScaleDown));

        token.cancel();
    }

    #[tokio::test]
    async fn stop_acknowledges_before_the_command_lands() {
        let (port, mut rx, token) = serve_test_ipc().await;

        let ack: Ack = reqwest::Client::new()
            .post(format!("http://127.0.0.1:{port}/stop"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(ack.ok);

        // The command arrives only after the post-response delay.
        let cmd = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap();
        assert_eq!(cmd, Some(Command::Stop));

        token.cancel();
    }

    #[tokio::test]
    async fn unknown_routes_get_a_json_404() {
        let (port, _rx, token) = serve_test_ipc().await;

        let resp = reqwest::get(format!("http://127.0.0.1:{port}/nope"))
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 404);
        let body: ErrorBody = resp.json().await.unwrap();
        assert_eq!(body.error, "not found");

        token.cancel();
    }
}
