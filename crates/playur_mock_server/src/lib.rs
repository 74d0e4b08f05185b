//! # PlayUR Mock Server
//!
//! An in-memory implementation of the parts of the PlayUR API the tooling
//! talks to. All routes live under `/api/`, so the server's API root is
//! `http://<addr>/api/`.

use axum::extract::DefaultBodyLimit;
use axum::{
    Router,
    extract::{Query, State},
    routing::{get, post},
};
use playur_core::prelude::*;
use std::collections::HashMap;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

mod api;

pub mod state;

use state::{MockGame, MockState};

/// The builder for the mock server.
#[derive(Default)]
pub struct MockServer {
    state: MockState,
}

impl MockServer {
    pub fn new(game: MockGame) -> Self {
        Self {
            state: MockState::new(game),
        }
    }

    /// Handle to the served game, for seeding and inspecting it.
    pub fn state(&self) -> MockState {
        self.state.clone()
    }

    pub fn build(&self) -> Router {
        let mut router = Router::new();
        for resource in ResourceType::ALL {
            router = router.route(
                &format!("/api/{}", resource.endpoint()),
                get(move |state: State<MockState>, query: Query<HashMap<String, String>>| {
                    api::list_records(state, query, resource)
                }),
            );
        }

        router
            .route("/api/Build/latestBuildID.php", get(api::latest_build_id))
            .route("/api/Build/", post(api::upload_build))
            .route("/api/User/login.php", post(api::login))
            .route("/api/User/register.php", post(api::register))
            .layer(DefaultBodyLimit::disable())
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Serves on `addr` in a background task. Port `0` picks a free one.
    pub async fn spawn(self, addr: SocketAddr) -> std::io::Result<RunningServer> {
        let listener = TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;
        let app = self.build();

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(error = %e, "mock server stopped");
            }
        });

        Ok(RunningServer {
            addr,
            state: self.state,
            handle,
        })
    }

    /// [`spawn`](Self::spawn) on a free local port.
    pub async fn spawn_local(self) -> std::io::Result<RunningServer> {
        self.spawn(SocketAddr::from(([127, 0, 0, 1], 0))).await
    }
}

/// A server running in the background. Dropping it stops the server.
pub struct RunningServer {
    addr: SocketAddr,
    state: MockState,
    handle: JoinHandle<()>,
}

impl RunningServer {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// API root, as used for `server_url` in the settings.
    pub fn api_url(&self) -> String {
        format!("http://{}/api/", self.addr)
    }

    pub fn state(&self) -> &MockState {
        &self.state
    }
}

impl Drop for RunningServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub mod prelude {
    pub use crate::state::*;
    pub use crate::{MockServer, RunningServer};
}
