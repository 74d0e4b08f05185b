use playur::prelude::*;
use playur::pipeline::PipelineError;
use std::path::Path;
use tokio::sync::mpsc;

async fn start(game: MockGame) -> (RunningServer, PlayurClient) {
    let server = MockServer::new(game).spawn_local().await.unwrap();
    let client = PlayurClient::new(server.api_url(), GameCredentials::new(1, "secret"));
    (server, client)
}

fn write_build(dir: &Path) {
    std::fs::create_dir_all(dir.join("Build")).unwrap();
    std::fs::write(dir.join("index.html"), "<html></html>").unwrap();
    std::fs::write(dir.join("Build").join("game.wasm"), vec![7u8; 2048]).unwrap();
}

/// Never called in upload-only runs.
struct NoBuild;

impl BuildSystem for NoBuild {
    async fn build(&self, _target: &str, _output: &Path) -> Result<(), BuildError> {
        Err(BuildError::Failed("build should have been skipped".into()))
    }
}

fn upload_request(dir: &Path) -> PipelineRequest {
    PipelineRequest {
        target: "WebGL".into(),
        output_dir: dir.to_path_buf(),
        mode: PipelineMode::UploadOnly,
    }
}

#[tokio::test]
async fn generates_every_enum_file() -> anyhow::Result<()> {
    let (_server, client) = start(MockGame::sample()).await;
    let out = tempfile::tempdir()?;

    let generator = EnumGenerator::new(client, NoopRegistry, out.path());
    let report = generator.generate_all(&ResourceType::ALL).await;
    assert!(report.is_complete());
    assert_eq!(report.succeeded(), 6);

    let actions = std::fs::read_to_string(out.path().join("Action.cs"))?;
    assert!(actions.starts_with("namespace PlayUR\n{\n"));
    assert!(actions.contains("\t\tJump = 1,\n"));
    assert!(actions.contains("\t\tCollectCoin = 2,\n"));
    assert!(actions.contains("\t\t_2xBonus = 3,\n"));

    let groups = std::fs::read_to_string(out.path().join("ExperimentGroup.cs"))?;
    assert!(groups.contains("\t\tPilotStudy_Control = 1,\n"));
    assert!(groups.contains("\t\tPilotStudy_FastMode = 2,\n"));

    let parameters = std::fs::read_to_string(out.path().join("Parameter.cs"))?;
    assert!(parameters.contains("public static string levels = \"levels\";"));

    assert!(out.path().join("AnalyticsColumns.cs").exists());
    Ok(())
}

#[tokio::test]
async fn bad_secret_leaves_existing_files_alone() -> anyhow::Result<()> {
    let (server, _) = start(MockGame::sample()).await;
    let client = PlayurClient::new(server.api_url(), GameCredentials::new(1, "wrong"));
    let out = tempfile::tempdir()?;
    std::fs::write(out.path().join("Action.cs"), "old")?;

    let generator = EnumGenerator::new(client, NoopRegistry, out.path());
    let report = generator.generate_all(&[ResourceType::Action]).await;

    assert_eq!(report.succeeded(), 0);
    let (resource, err) = report.failed().next().unwrap();
    assert_eq!(resource, ResourceType::Action);
    assert!(err.to_string().contains("bad secret"));
    assert_eq!(std::fs::read_to_string(out.path().join("Action.cs"))?, "old");
    Ok(())
}

#[tokio::test]
async fn upload_creates_the_next_build() -> anyhow::Result<()> {
    let (server, client) = start(MockGame::sample()).await;
    let dir = tempfile::tempdir()?;
    write_build(dir.path());

    let (tx, mut rx) = mpsc::unbounded_channel();
    let pipeline = BuildUploadPipeline::new(NoBuild, FixedBranch::new(""), client).with_events(tx);
    let outcome = pipeline.run(&upload_request(dir.path())).await?;

    let PipelineOutcome::Uploaded(receipt) = outcome else {
        panic!("expected an upload");
    };
    assert_eq!(receipt.build_id, 6);
    assert_eq!(receipt.branch, "main");
    assert_eq!(receipt.archive.files, 2);
    assert!(receipt.url.ends_with("/games.php?/game/secret/buildID/6"));

    let game = server.state().snapshot();
    assert_eq!(game.uploads.len(), 1);
    let upload = &game.uploads[0];
    assert_eq!(upload.file_name, "index.zip");
    assert_eq!(upload.sha256, receipt.archive.sha256);
    assert_eq!(upload.bytes as u64, receipt.archive.bytes);
    assert_eq!(
        upload.descriptor,
        BuildDescriptor {
            game_id: 1,
            client_secret: "secret".into(),
            build_id: 6,
            branch: "main".into(),
        }
    );

    drop(pipeline);
    let mut states = Vec::new();
    while let Some(state) = rx.recv().await {
        states.push(state);
    }
    assert_eq!(
        states,
        vec![
            PipelineState::Archiving,
            PipelineState::AwaitingBranch,
            PipelineState::ResolvingVersion,
            PipelineState::Uploading,
            PipelineState::Uploaded,
        ]
    );
    Ok(())
}

#[tokio::test]
async fn new_branch_starts_at_one_and_keeps_counting() -> anyhow::Result<()> {
    let (server, client) = start(MockGame::sample()).await;
    let dir = tempfile::tempdir()?;
    write_build(dir.path());

    let pipeline = BuildUploadPipeline::new(NoBuild, FixedBranch::new("beta"), client);
    let request = upload_request(dir.path());

    for expected in [1, 2] {
        match pipeline.run(&request).await? {
            PipelineOutcome::Uploaded(receipt) => assert_eq!(receipt.build_id, expected),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    let game = server.state().snapshot();
    assert_eq!(game.latest_build(Some("beta")), Some(2));
    assert_eq!(game.latest_build(Some("main")), Some(5));
    Ok(())
}

#[tokio::test]
async fn bad_secret_fails_version_resolution() -> anyhow::Result<()> {
    let (server, _) = start(MockGame::sample()).await;
    let client = PlayurClient::new(server.api_url(), GameCredentials::new(1, "wrong"));
    let dir = tempfile::tempdir()?;
    write_build(dir.path());

    let pipeline = BuildUploadPipeline::new(NoBuild, FixedBranch::new("main"), client);
    let err = pipeline.run(&upload_request(dir.path())).await.unwrap_err();

    assert!(matches!(err, PipelineError::Version(_)));
    assert_eq!(err.terminal_state(), PipelineState::UploadFailed);
    assert!(server.state().snapshot().uploads.is_empty());
    Ok(())
}

#[tokio::test]
async fn rejected_upload_reports_server_message() -> anyhow::Result<()> {
    let mut game = MockGame::sample();
    game.upload_rejection = Some("Storage quota exceeded".into());
    let (_server, client) = start(game).await;
    let dir = tempfile::tempdir()?;
    write_build(dir.path());

    let pipeline = BuildUploadPipeline::new(NoBuild, FixedBranch::new("main"), client);
    let err = pipeline.run(&upload_request(dir.path())).await.unwrap_err();

    assert!(matches!(&err, PipelineError::Upload(m) if m == "Storage quota exceeded"));
    // The archive stays behind.
    assert!(dir.path().join("index.zip").exists());
    Ok(())
}

#[tokio::test]
async fn login_controller_against_server() -> anyhow::Result<()> {
    let (_server, client) = start(MockGame::sample()).await;
    let store = MemoryCredentialStore::default();
    let capabilities = Capabilities::for_platform(Platform::Desktop);

    let mut controller = LoginController::new(client.clone(), &store, capabilities);
    controller.username = "alice".into();
    controller.password = "wrong".into();
    assert_eq!(
        controller.submit().await?,
        FormResult::Rejected("Incorrect Username or Password".into())
    );

    controller.password = "pw1".into();
    assert_eq!(controller.submit().await?, FormResult::LoggedIn { scene: 1 });

    // A fresh controller logs in from the stored credentials.
    let mut next = LoginController::new(client, &store, capabilities).with_start_scene(2);
    assert_eq!(
        next.start().await?,
        StartAction::AutoLogin(FormResult::LoggedIn { scene: 2 })
    );
    Ok(())
}
