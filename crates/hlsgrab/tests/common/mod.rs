#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use hlsgrab_engine::{LogHandle, LoggerConfig};
use parking_lot::Mutex;
use tokio::net::TcpListener;

#[derive(Clone)]
struct Route {
    status: StatusCode,
    body: Vec<u8>,
    delay: Option<Duration>,
}

#[derive(Default)]
struct ServerState {
    routes: Mutex<HashMap<String, Route>>,
    hits: Mutex<HashMap<String, usize>>,
}

/// In-process HTTP server answering by path (the query is ignored) and
/// counting requests per path.
pub struct TestServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
}

impl TestServer {
    pub async fn start() -> Self {
        let state = Arc::new(ServerState::default());
        let app = Router::new()
            .fallback(serve)
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn url(&self, path_and_query: &str) -> String {
        format!("http://{}{}", self.addr, path_and_query)
    }

    pub fn route(&self, path: &str, body: impl Into<Vec<u8>>) {
        self.insert(path, StatusCode::OK, body.into(), None);
    }

    pub fn route_slow(&self, path: &str, body: impl Into<Vec<u8>>, delay: Duration) {
        self.insert(path, StatusCode::OK, body.into(), Some(delay));
    }

    pub fn route_status(&self, path: &str, status: StatusCode) {
        self.insert(path, status, Vec::new(), None);
    }

    fn insert(&self, path: &str, status: StatusCode, body: Vec<u8>, delay: Option<Duration>) {
        self.state.routes.lock().insert(
            path.to_string(),
            Route {
                status,
                body,
                delay,
            },
        );
    }

    pub fn hits(&self, path: &str) -> usize {
        self.state.hits.lock().get(path).copied().unwrap_or(0)
    }

    /// Requests whose path starts with `prefix`.
    pub fn hits_under(&self, prefix: &str) -> usize {
        self.state
            .hits
            .lock()
            .iter()
            .filter(|(path, _)| path.starts_with(prefix))
            .map(|(_, count)| count)
            .sum()
    }
}

async fn serve(State(state): State<Arc<ServerState>>, uri: Uri) -> Response {
    let path = uri.path().to_string();
    *state.hits.lock().entry(path.clone()).or_default() += 1;

    let route = state.routes.lock().get(&path).cloned();
    match route {
        Some(route) => {
            if let Some(delay) = route.delay {
                tokio::time::sleep(delay).await;
            }
            (route.status, route.body).into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

pub fn start_log(dir: &std::path::Path) -> LogHandle {
    LogHandle::start(dir.join("hlsgrab.log"), LoggerConfig::default()).unwrap()
}
