use crate::archive::{ArchiveError, ArchiveSummary, compress_directory};
use chrono::{DateTime, Utc};
use playur_client::{ARCHIVE_FILE_NAME, ApiResponse, PlayurClient, PlayurClientError};
use playur_core::prelude::*;
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Server side of the sequence. Implemented by [`PlayurClient`].
pub trait BuildApi: Send + Sync {
    fn game_credentials(&self) -> &GameCredentials;

    fn fetch_latest_build_id(
        &self,
        branch: &str,
    ) -> impl Future<Output = Result<i64, PlayurClientError>> + Send;

    fn upload_archive(
        &self,
        archive: &Path,
        descriptor: &BuildDescriptor,
    ) -> impl Future<Output = Result<ApiResponse, PlayurClientError>> + Send;

    /// Page that plays a build.
    fn build_url(&self, build_id: i64) -> String;
}

impl BuildApi for PlayurClient {
    fn game_credentials(&self) -> &GameCredentials {
        self.credentials()
    }

    async fn fetch_latest_build_id(&self, branch: &str) -> Result<i64, PlayurClientError> {
        self.latest_build_id(Some(branch)).await
    }

    async fn upload_archive(
        &self,
        archive: &Path,
        descriptor: &BuildDescriptor,
    ) -> Result<ApiResponse, PlayurClientError> {
        self.upload_build(archive, descriptor).await
    }

    fn build_url(&self, build_id: i64) -> String {
        self.game_url(build_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Building,
    BuildFailed,
    Archiving,
    ArchiveFailed,
    /// Build-only runs stop here.
    Archived,
    AwaitingBranch,
    Cancelled,
    ResolvingVersion,
    Uploading,
    Uploaded,
    UploadFailed,
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineState::BuildFailed
                | PipelineState::ArchiveFailed
                | PipelineState::Archived
                | PipelineState::Cancelled
                | PipelineState::Uploaded
                | PipelineState::UploadFailed
        )
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineMode {
    /// Build and archive, no upload.
    BuildOnly,
    BuildAndUpload,
    /// Archive and upload an existing build.
    UploadOnly,
}

impl PipelineMode {
    fn builds(&self) -> bool {
        !matches!(self, PipelineMode::UploadOnly)
    }

    fn uploads(&self) -> bool {
        !matches!(self, PipelineMode::BuildOnly)
    }
}

#[derive(Debug, Clone)]
pub struct PipelineRequest {
    pub target: String,
    /// Build output directory. The archive is written inside it.
    pub output_dir: PathBuf,
    pub mode: PipelineMode,
}

impl PipelineRequest {
    pub fn archive_path(&self) -> PathBuf {
        self.output_dir.join(ARCHIVE_FILE_NAME)
    }
}

#[derive(Debug, Clone)]
pub struct UploadReceipt {
    pub build_id: i64,
    pub branch: String,
    pub archive: ArchiveSummary,
    pub url: String,
    pub uploaded_at: DateTime<Utc>,
    pub response: Value,
}

#[derive(Debug, Clone)]
pub enum PipelineOutcome {
    Archived(ArchiveSummary),
    Uploaded(UploadReceipt),
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Build(#[from] BuildError),

    #[error("Archive failed: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Upload cancelled")]
    Cancelled,

    #[error("Could not resolve the next build number: {0}")]
    Version(PlayurClientError),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error(transparent)]
    Transport(PlayurClientError),
}

impl PipelineError {
    /// The terminal state this error ends the sequence in.
    pub fn terminal_state(&self) -> PipelineState {
        match self {
            PipelineError::Build(_) => PipelineState::BuildFailed,
            PipelineError::Archive(_) => PipelineState::ArchiveFailed,
            PipelineError::Cancelled => PipelineState::Cancelled,
            PipelineError::Version(_) | PipelineError::Upload(_) | PipelineError::Transport(_) => {
                PipelineState::UploadFailed
            }
        }
    }
}

/// Build → archive → branch → version → upload, one step at a time.
///
/// Nothing is retried and nothing is cleaned up on failure. The version step
/// reads the latest build number and adds one without any lock, so two runs
/// against the same branch can pick the same number.
pub struct BuildUploadPipeline<B: BuildSystem, P: BranchPrompt, A: BuildApi> {
    build: B,
    prompt: P,
    api: A,
    default_branch: String,
    events: Option<mpsc::UnboundedSender<PipelineState>>,
}

impl<B: BuildSystem, P: BranchPrompt, A: BuildApi> BuildUploadPipeline<B, P, A> {
    pub fn new(build: B, prompt: P, api: A) -> Self {
        Self {
            build,
            prompt,
            api,
            default_branch: DEFAULT_BRANCH.to_string(),
            events: None,
        }
    }

    /// Branch offered when prompting.
    pub fn with_default_branch(mut self, branch: impl Into<String>) -> Self {
        self.default_branch = branch.into();
        self
    }

    /// Every state entered is sent to `events`.
    pub fn with_events(mut self, events: mpsc::UnboundedSender<PipelineState>) -> Self {
        self.events = Some(events);
        self
    }

    fn enter(&self, state: PipelineState) {
        info!(%state, "pipeline");
        if let Some(events) = &self.events {
            let _ = events.send(state);
        }
    }

    pub async fn run(&self, request: &PipelineRequest) -> Result<PipelineOutcome, PipelineError> {
        match self.run_steps(request).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                error!(error = %e, "pipeline failed");
                self.enter(e.terminal_state());
                Err(e)
            }
        }
    }

    async fn run_steps(&self, request: &PipelineRequest) -> Result<PipelineOutcome, PipelineError> {
        if request.mode.builds() {
            self.enter(PipelineState::Building);
            self.build
                .build(&request.target, &request.output_dir)
                .await?;
        }

        self.enter(PipelineState::Archiving);
        let archive = archive(&request.output_dir, &request.archive_path()).await?;

        if !request.mode.uploads() {
            self.enter(PipelineState::Archived);
            return Ok(PipelineOutcome::Archived(archive));
        }

        self.enter(PipelineState::AwaitingBranch);
        let branch = self
            .prompt
            .choose_branch(&self.default_branch)
            .await
            .ok_or(PipelineError::Cancelled)?;
        let branch = match branch.trim() {
            "" => DEFAULT_BRANCH.to_string(),
            name => name.to_string(),
        };
        info!(%branch, "selected branch");

        self.enter(PipelineState::ResolvingVersion);
        let latest = self
            .api
            .fetch_latest_build_id(&branch)
            .await
            .map_err(PipelineError::Version)?;
        let build_id = latest.checked_add(1).ok_or_else(|| {
            PipelineError::Version(PlayurClientError::ServerCommunication(format!(
                "latestBuildID {latest} cannot be incremented"
            )))
        })?;
        let credentials = self.api.game_credentials();
        let descriptor = BuildDescriptor {
            game_id: credentials.game_id,
            client_secret: credentials.client_secret.clone(),
            build_id,
            branch: branch.clone(),
        };
        info!(build_id = descriptor.build_id, %branch, "new build id");

        self.enter(PipelineState::Uploading);
        let response = self
            .api
            .upload_archive(&archive.path, &descriptor)
            .await
            .map_err(|e| match e {
                PlayurClientError::ServerError(status, message) => {
                    PipelineError::Upload(format!("{status}: {message}"))
                }
                other => PipelineError::Transport(other),
            })?;

        let body = match response {
            ApiResponse::Success(body) => body,
            ApiResponse::Failure(message) => return Err(PipelineError::Upload(message)),
        };

        if let Some(server_hash) = body.get("sha256").and_then(Value::as_str) {
            if server_hash != archive.sha256 {
                warn!(
                    local = %archive.sha256,
                    server = %server_hash,
                    "server hash mismatch"
                );
            }
        }

        self.enter(PipelineState::Uploaded);
        info!(build_id = descriptor.build_id, %branch, "build uploaded");

        Ok(PipelineOutcome::Uploaded(UploadReceipt {
            build_id: descriptor.build_id,
            url: self.api.build_url(descriptor.build_id),
            branch,
            archive,
            uploaded_at: Utc::now(),
            response: body,
        }))
    }
}

async fn archive(directory: &Path, archive: &Path) -> Result<ArchiveSummary, ArchiveError> {
    let directory = directory.to_path_buf();
    let archive = archive.to_path_buf();
    tokio::task::spawn_blocking(move || compress_directory(&directory, &archive))
        .await
        .map_err(|join_err| ArchiveError::Io(std::io::Error::other(join_err)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::FixedBranch;
    use serde_json::json;
    use std::sync::Mutex;
    use tokio::sync::Barrier;

    struct FakeBuild {
        succeed: bool,
    }

    impl FakeBuild {
        fn new(succeed: bool) -> Self {
            Self { succeed }
        }
    }

    impl BuildSystem for FakeBuild {
        async fn build(&self, _target: &str, output: &Path) -> Result<(), BuildError> {
            if self.succeed {
                std::fs::create_dir_all(output)?;
                std::fs::write(output.join("index.html"), "<html></html>")?;
                Ok(())
            } else {
                Err(BuildError::Failed("compiler errors".into()))
            }
        }
    }

    struct FakeApi {
        credentials: GameCredentials,
        latest: Mutex<i64>,
        uploads: Mutex<Vec<BuildDescriptor>>,
        reply: ApiResponse,
        barrier: Option<Barrier>,
        offline_upload: bool,
    }

    impl FakeApi {
        fn new(latest: i64) -> Self {
            Self {
                credentials: GameCredentials::new(4, "s3cret"),
                latest: Mutex::new(latest),
                uploads: Mutex::new(Vec::new()),
                reply: ApiResponse::Success(json!({"success": true})),
                barrier: None,
                offline_upload: false,
            }
        }
    }

    impl BuildApi for &FakeApi {
        fn game_credentials(&self) -> &GameCredentials {
            &self.credentials
        }

        async fn fetch_latest_build_id(&self, _branch: &str) -> Result<i64, PlayurClientError> {
            Ok(*self.latest.lock().unwrap())
        }

        async fn upload_archive(
            &self,
            archive: &Path,
            descriptor: &BuildDescriptor,
        ) -> Result<ApiResponse, PlayurClientError> {
            assert!(archive.exists());
            if self.offline_upload {
                return Err(refused_connection().await);
            }
            if let Some(barrier) = &self.barrier {
                barrier.wait().await;
            }
            if self.reply.is_success() {
                *self.latest.lock().unwrap() = descriptor.build_id;
            }
            self.uploads.lock().unwrap().push(descriptor.clone());
            Ok(self.reply.clone())
        }

        fn build_url(&self, build_id: i64) -> String {
            format!("http://playur.test/games.php?/game/s3cret/buildID/{build_id}")
        }
    }

    /// A real transport error from a port nothing listens on.
    async fn refused_connection() -> PlayurClientError {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        reqwest::get(format!("http://{addr}/api/Build/"))
            .await
            .unwrap_err()
            .into()
    }

    fn request(dir: &Path, mode: PipelineMode) -> PipelineRequest {
        PipelineRequest {
            target: "WebGL".into(),
            output_dir: dir.to_path_buf(),
            mode,
        }
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<PipelineState>) -> Vec<PipelineState> {
        let mut states = Vec::new();
        while let Ok(state) = rx.try_recv() {
            states.push(state);
        }
        states
    }

    #[tokio::test]
    async fn full_sequence_increments_build_id() {
        let dir = tempfile::tempdir().unwrap();
        let api = FakeApi::new(5);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let pipeline =
            BuildUploadPipeline::new(FakeBuild::new(true), FixedBranch::new("beta"), &api)
                .with_events(tx);

        let outcome = pipeline
            .run(&request(dir.path(), PipelineMode::BuildAndUpload))
            .await
            .unwrap();

        let PipelineOutcome::Uploaded(receipt) = outcome else {
            panic!("expected an upload");
        };
        assert_eq!(receipt.build_id, 6);
        assert_eq!(receipt.branch, "beta");
        assert!(receipt.url.ends_with("/buildID/6"));
        assert_eq!(receipt.archive.files, 1);

        let uploads = api.uploads.lock().unwrap();
        assert_eq!(
            uploads[0],
            BuildDescriptor {
                game_id: 4,
                client_secret: "s3cret".into(),
                build_id: 6,
                branch: "beta".into(),
            }
        );

        assert_eq!(
            drain(&mut rx),
            vec![
                PipelineState::Building,
                PipelineState::Archiving,
                PipelineState::AwaitingBranch,
                PipelineState::ResolvingVersion,
                PipelineState::Uploading,
                PipelineState::Uploaded,
            ]
        );
    }

    #[tokio::test]
    async fn build_failure_stops_before_archiving() {
        let dir = tempfile::tempdir().unwrap();
        let stale = dir.path().join("index.zip");
        std::fs::write(&stale, "previous archive").unwrap();

        let api = FakeApi::new(5);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let pipeline =
            BuildUploadPipeline::new(FakeBuild::new(false), FixedBranch::new("main"), &api)
                .with_events(tx);

        let err = pipeline
            .run(&request(dir.path(), PipelineMode::BuildAndUpload))
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Build(_)));
        assert_eq!(err.terminal_state(), PipelineState::BuildFailed);
        assert_eq!(std::fs::read_to_string(&stale).unwrap(), "previous archive");
        assert!(api.uploads.lock().unwrap().is_empty());
        assert_eq!(
            drain(&mut rx),
            vec![PipelineState::Building, PipelineState::BuildFailed]
        );
    }

    #[tokio::test]
    async fn upload_only_skips_the_build() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "built earlier").unwrap();

        // A build would fail, so reaching the upload proves it was skipped.
        let api = FakeApi::new(0);
        let pipeline = BuildUploadPipeline::new(FakeBuild::new(false), FixedBranch::new(""), &api);

        let outcome = pipeline
            .run(&request(dir.path(), PipelineMode::UploadOnly))
            .await
            .unwrap();

        let PipelineOutcome::Uploaded(receipt) = outcome else {
            panic!("expected an upload");
        };
        assert_eq!(receipt.build_id, 1);
        assert_eq!(receipt.branch, "main");
    }

    #[tokio::test]
    async fn build_only_stops_after_archive() {
        let dir = tempfile::tempdir().unwrap();
        let api = FakeApi::new(5);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let pipeline =
            BuildUploadPipeline::new(FakeBuild::new(true), FixedBranch::cancelled(), &api)
                .with_events(tx);

        let outcome = pipeline
            .run(&request(dir.path(), PipelineMode::BuildOnly))
            .await
            .unwrap();

        assert!(matches!(outcome, PipelineOutcome::Archived(_)));
        assert!(dir.path().join("index.zip").exists());
        assert_eq!(
            drain(&mut rx),
            vec![
                PipelineState::Building,
                PipelineState::Archiving,
                PipelineState::Archived
            ]
        );
    }

    #[tokio::test]
    async fn cancelled_branch_prompt_has_no_side_effects() {
        let dir = tempfile::tempdir().unwrap();
        let api = FakeApi::new(5);
        let pipeline =
            BuildUploadPipeline::new(FakeBuild::new(true), FixedBranch::cancelled(), &api);

        let err = pipeline
            .run(&request(dir.path(), PipelineMode::BuildAndUpload))
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Cancelled));
        assert_eq!(*api.latest.lock().unwrap(), 5);
        assert!(api.uploads.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_build_output_fails_archiving() {
        let dir = tempfile::tempdir().unwrap();
        let api = FakeApi::new(5);
        let pipeline = BuildUploadPipeline::new(FakeBuild::new(false), FixedBranch::new("x"), &api);

        let err = pipeline
            .run(&request(&dir.path().join("missing"), PipelineMode::UploadOnly))
            .await
            .unwrap_err();

        assert_eq!(err.terminal_state(), PipelineState::ArchiveFailed);
    }

    #[tokio::test]
    async fn server_failure_message_is_surfaced() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "x").unwrap();
        let mut api = FakeApi::new(2);
        api.reply = ApiResponse::Failure("bad secret".into());
        let pipeline = BuildUploadPipeline::new(FakeBuild::new(true), FixedBranch::new("main"), &api);

        let err = pipeline
            .run(&request(dir.path(), PipelineMode::UploadOnly))
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Upload(ref m) if m == "bad secret"));
        assert_eq!(err.terminal_state(), PipelineState::UploadFailed);
    }

    #[tokio::test]
    async fn concurrent_runs_can_pick_the_same_build_id() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        std::fs::write(first.path().join("index.html"), "a").unwrap();
        std::fs::write(second.path().join("index.html"), "b").unwrap();

        let mut api = FakeApi::new(5);
        api.barrier = Some(Barrier::new(2));

        let a = BuildUploadPipeline::new(FakeBuild::new(true), FixedBranch::new("main"), &api);
        let b = BuildUploadPipeline::new(FakeBuild::new(true), FixedBranch::new("main"), &api);
        let request_a = request(first.path(), PipelineMode::UploadOnly);
        let request_b = request(second.path(), PipelineMode::UploadOnly);

        let (ra, rb) = tokio::join!(a.run(&request_a), b.run(&request_b));

        let ids: Vec<i64> = [ra.unwrap(), rb.unwrap()]
            .into_iter()
            .map(|outcome| match outcome {
                PipelineOutcome::Uploaded(receipt) => receipt.build_id,
                PipelineOutcome::Archived(_) => panic!("expected an upload"),
            })
            .collect();
        assert_eq!(ids, vec![6, 6]);
    }

    #[tokio::test]
    async fn transport_failure_during_upload_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "x").unwrap();
        let mut api = FakeApi::new(2);
        api.offline_upload = true;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let pipeline =
            BuildUploadPipeline::new(FakeBuild::new(true), FixedBranch::new("main"), &api)
                .with_events(tx);

        let err = pipeline
            .run(&request(dir.path(), PipelineMode::UploadOnly))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Transport(PlayurClientError::Transport(_))
        ));
        assert_eq!(drain(&mut rx).last(), Some(&PipelineState::UploadFailed));
        assert_eq!(*api.latest.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn exhausted_build_numbers_fail_version_resolution() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "x").unwrap();
        let api = FakeApi::new(i64::MAX);
        let pipeline = BuildUploadPipeline::new(FakeBuild::new(true), FixedBranch::new("main"), &api);

        let err = pipeline
            .run(&request(dir.path(), PipelineMode::UploadOnly))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Version(PlayurClientError::ServerCommunication(_))
        ));
        assert_eq!(err.terminal_state(), PipelineState::UploadFailed);
        assert!(api.uploads.lock().unwrap().is_empty());
    }
}
