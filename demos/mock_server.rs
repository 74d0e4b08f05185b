//! # Mock Server Example
//!
//! Serves a sample game so the CLI can be tried without a PlayUR account.
//!
//! ## Usage
//!
//! ```sh
//! cargo run --example mock_server --features "mock_server"
//! playur --url http://localhost:3000/api/ --game-id 1 --client-secret secret generate-enums
//! ```

use playur::prelude::*;
use std::env;
use std::net::SocketAddr;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    // Game 1, secret "secret", player "alice" / "pw1", main branch at build 5
    let server = MockServer::new(MockGame::sample());

    let port: u16 = env::var("PORT")
        .unwrap_or_else(|_| "3000".to_string())
        .parse()?;
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    println!("Server listening on http://{addr}/api/");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, server.build()).await?;

    Ok(())
}
