//! # PlayUR Code Generation
//!
//! Fetches the game's actions, elements, experiments, experiment groups,
//! analytics columns and parameter keys from the server and writes one C#
//! source file per resource type.
//!
//! Each resource is generated independently: a failed fetch is logged and
//! leaves the existing file untouched, the others still get written.
//!
//! ## Usage
//!
//! ```no_run
//! use playur_client::PlayurClient;
//! use playur_codegen::EnumGenerator;
//! use playur_core::prelude::*;
//!
//! # async fn run() {
//! let client = PlayurClient::new("https://playur.io/api/", GameCredentials::new(1, "secret"));
//! let generator = EnumGenerator::new(client, NoopRegistry, "Assets/PlayURPlugin");
//! let report = generator.generate_all(&ResourceType::ALL).await;
//! println!("{} files written", report.succeeded());
//! # }
//! ```

use playur_client::{PlayurClient, PlayurClientError};
use playur_core::prelude::*;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{error, info};

mod render;
mod sanitize;

pub use render::*;
pub use sanitize::{sanitize, strip_invalid};

#[derive(Error, Debug)]
pub enum CodegenError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Client(#[from] PlayurClientError),
}

/// Where records come from. Implemented by [`PlayurClient`].
pub trait RecordSource: Send + Sync {
    fn fetch(
        &self,
        resource: ResourceType,
    ) -> impl Future<Output = Result<Records, CodegenError>> + Send;
}

impl RecordSource for PlayurClient {
    async fn fetch(&self, resource: ResourceType) -> Result<Records, CodegenError> {
        let records = match resource {
            ResourceType::ExperimentGroup => Records::Groups(self.fetch_records(resource).await?),
            ResourceType::Parameter => Records::Parameters(self.fetch_records(resource).await?),
            _ => Records::Plain(self.fetch_records(resource).await?),
        };
        Ok(records)
    }
}

/// Writes via a temporary file so a reader never sees a partial file.
async fn atomic_write(path: &Path, data: &[u8]) -> Result<(), CodegenError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let tmp_path = path.with_extension("cs.tmp");

    fs::write(&tmp_path, data).await?;
    fs::rename(&tmp_path, path).await?;

    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub resource: ResourceType,
    pub path: PathBuf,
    pub count: usize,
}

#[derive(Debug, Default)]
pub struct GenerationReport {
    pub results: Vec<(ResourceType, Result<GeneratedFile, CodegenError>)>,
}

impl GenerationReport {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|(_, r)| r.is_ok()).count()
    }

    pub fn failed(&self) -> impl Iterator<Item = (ResourceType, &CodegenError)> {
        self.results
            .iter()
            .filter_map(|(resource, r)| r.as_ref().err().map(|e| (*resource, e)))
    }

    pub fn is_complete(&self) -> bool {
        self.results.iter().all(|(_, r)| r.is_ok())
    }
}

pub struct EnumGenerator<S: RecordSource, R: FileRegistry> {
    source: S,
    registry: R,
    output_dir: PathBuf,
}

impl<S: RecordSource, R: FileRegistry> EnumGenerator<S, R> {
    pub fn new(source: S, registry: R, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            source,
            registry,
            output_dir: output_dir.into(),
        }
    }

    pub fn output_path(&self, resource: ResourceType) -> PathBuf {
        self.output_dir.join(resource.file_name())
    }

    /// Fetches, renders and writes a single resource type.
    pub async fn generate(&self, resource: ResourceType) -> Result<GeneratedFile, CodegenError> {
        let records = self.source.fetch(resource).await?;
        let text = render(resource, &records);

        let path = self.output_path(resource);
        atomic_write(&path, text.as_bytes()).await?;
        self.registry.refresh(&path);

        info!(
            %resource,
            count = records.len(),
            path = %path.display(),
            "generated {resource} source"
        );

        Ok(GeneratedFile {
            resource,
            path,
            count: records.len(),
        })
    }

    /// Generates each resource in turn. Failures are logged and reported but
    /// do not stop the remaining resources.
    pub async fn generate_all(&self, resources: &[ResourceType]) -> GenerationReport {
        let mut report = GenerationReport::default();
        for &resource in resources {
            let result = self.generate(resource).await;
            if let Err(e) = &result {
                error!(%resource, error = %e, "could not generate {resource} source");
            }
            report.results.push((resource, result));
        }
        report
    }
}
