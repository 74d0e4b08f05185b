//! # Enum Generation Example
//!
//! Starts the mock server in-process and generates every enum file into
//! `./generated`.
//!
//! ## Usage
//!
//! ```sh
//! cargo run --example generate_enums --features "codegen mock_server"
//! ```

use playur::prelude::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let server = MockServer::new(MockGame::sample()).spawn_local().await?;
    let client = PlayurClient::new(server.api_url(), GameCredentials::new(1, "secret"));

    let generator = EnumGenerator::new(client, NoopRegistry, "generated");
    let report = generator.generate_all(&ResourceType::ALL).await;

    for (resource, result) in &report.results {
        match result {
            Ok(file) => println!("{resource}: {} entries in {:?}", file.count, file.path),
            Err(e) => println!("{resource}: failed ({e})"),
        }
    }

    let action = tokio::fs::read_to_string(generator.output_path(ResourceType::Action)).await?;
    println!("\n{action}");

    Ok(())
}
