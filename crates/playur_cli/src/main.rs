use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use playur_client::PlayurClient;
use playur_codegen::EnumGenerator;
use playur_core::prelude::*;
use playur_login::{FileCredentialStore, FormResult, LoginController, StartAction};
use playur_pipeline::{
    BuildUploadPipeline, CommandBuildSystem, FixedBranch, PipelineMode, PipelineOutcome,
    PipelineRequest, StdinBranchPrompt,
};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "playur")]
#[command(about = "CLI for the PlayUR experiment platform")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Settings file
    #[arg(short, long, default_value = DEFAULT_SETTINGS_FILE, env = "PLAYUR_SETTINGS")]
    settings: PathBuf,

    /// API root, e.g. "https://playur.io/api/"
    #[arg(short, long, env = "PLAYUR_SERVER_URL")]
    url: Option<String>,

    #[arg(long, env = "PLAYUR_GAME_ID")]
    game_id: Option<i64>,

    #[arg(long, env = "PLAYUR_CLIENT_SECRET", hide_env_values = true)]
    client_secret: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a settings file with the given credentials
    InitSettings {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Regenerate the enum sources from the server's records
    GenerateEnums {
        /// Only these resources (comma separated, e.g. "actions,elements")
        #[arg(long, value_delimiter = ',')]
        only: Vec<ResourceType>,

        /// Output directory, instead of `generated_dir` from the settings
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Build the web player and zip it, without uploading
    Build {
        /// Build output directory
        #[arg(long)]
        dir: PathBuf,

        /// Build target passed to the build command
        #[arg(long)]
        target: Option<String>,
    },
    /// Build, zip and upload to a branch
    BuildUpload {
        #[arg(long)]
        dir: PathBuf,

        #[arg(long)]
        target: Option<String>,

        /// Skip the prompt and upload to this branch
        #[arg(short, long)]
        branch: Option<String>,

        /// Open the uploaded build in the browser
        #[arg(long)]
        open: bool,
    },
    /// Zip and upload an existing build
    Upload {
        #[arg(long)]
        dir: PathBuf,

        #[arg(short, long)]
        branch: Option<String>,

        #[arg(long)]
        open: bool,
    },
    /// Open the latest build of a branch in the browser
    Open {
        #[arg(short, long)]
        branch: Option<String>,
    },
    /// Log in as a player. Without a username the stored login is used.
    Login {
        username: Option<String>,

        #[arg(short, long, env = "PLAYUR_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Create a player account and log in with it
    Register {
        username: String,

        #[arg(long)]
        email: String,

        #[arg(short, long, env = "PLAYUR_PASSWORD", hide_env_values = true)]
        password: String,

        #[arg(long, default_value = "")]
        first_name: String,

        #[arg(long, default_value = "")]
        last_name: String,
    },
    /// Log in with a JSON payload as sent by the hosting web page
    WebLogin { json: String },
    /// Forget the stored player login
    ClearCredentials,
}

impl Cli {
    /// Settings file contents with the command line overrides applied.
    fn settings(&self) -> anyhow::Result<PlayurSettings> {
        let mut settings = PlayurSettings::load_or_default(&self.settings)
            .with_context(|| format!("loading {}", self.settings.display()))?;

        if let Some(url) = &self.url {
            settings.server_url = url.clone();
        }
        if let Some(game_id) = self.game_id {
            settings.game_id = game_id;
        }
        if let Some(secret) = &self.client_secret {
            settings.client_secret = secret.clone();
        }

        Ok(settings)
    }
}

fn init_tracing(level: LogLevel) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = cli.settings()?;
    init_tracing(settings.log_level);

    if let Commands::InitSettings { force } = &cli.command {
        if cli.settings.exists() && !force {
            bail!(
                "{} already exists (use --force to overwrite)",
                cli.settings.display()
            );
        }
        settings.save(&cli.settings)?;
        println!("✅ Settings written to {}", cli.settings.display());
        return Ok(());
    }

    let client = PlayurClient::from_settings(&settings)?;

    match cli.command {
        Commands::InitSettings { .. } => {}
        Commands::GenerateEnums { only, output } => {
            let resources = if only.is_empty() {
                ResourceType::ALL.to_vec()
            } else {
                only
            };
            let output = output.unwrap_or_else(|| settings.generated_dir.clone());

            println!(
                "🔄 Generating {} enum file(s) into {output:?}...",
                resources.len()
            );
            let generator = EnumGenerator::new(client, NoopRegistry, output);
            let report = generator.generate_all(&resources).await;

            for (resource, result) in &report.results {
                match result {
                    Ok(file) => {
                        println!("  ✅ {resource}: {} entries -> {:?}", file.count, file.path)
                    }
                    Err(e) => println!("  ⚠️  {resource}: {e}"),
                }
            }
            println!("Generated {} of {}.", report.succeeded(), report.results.len());
        }
        Commands::Build { dir, target } => {
            let request = PipelineRequest {
                target: target.unwrap_or_else(|| settings.build.target.clone()),
                output_dir: dir,
                mode: PipelineMode::BuildOnly,
            };
            run_pipeline(&settings, client, FixedBranch::cancelled(), &request, false).await?;
        }
        Commands::BuildUpload {
            dir,
            target,
            branch,
            open,
        } => {
            let request = PipelineRequest {
                target: target.unwrap_or_else(|| settings.build.target.clone()),
                output_dir: dir,
                mode: PipelineMode::BuildAndUpload,
            };
            match branch {
                Some(branch) => {
                    run_pipeline(&settings, client, FixedBranch::new(branch), &request, open).await?
                }
                None => run_pipeline(&settings, client, StdinBranchPrompt, &request, open).await?,
            }
        }
        Commands::Upload { dir, branch, open } => {
            let request = PipelineRequest {
                target: settings.build.target.clone(),
                output_dir: dir,
                mode: PipelineMode::UploadOnly,
            };
            match branch {
                Some(branch) => {
                    run_pipeline(&settings, client, FixedBranch::new(branch), &request, open).await?
                }
                None => run_pipeline(&settings, client, StdinBranchPrompt, &request, open).await?,
            }
        }
        Commands::Open { branch } => {
            let branch = branch.unwrap_or_else(|| settings.default_branch.clone());
            let build_id = client.latest_build_id(Some(branch.as_str())).await?;
            if build_id == 0 {
                bail!("branch '{branch}' has no builds yet");
            }
            let url = client.game_url(build_id);
            println!("🌐 Opening build {build_id} of '{branch}': {url}");
            open::that(&url)?;
        }
        Commands::Login { username, password } => {
            let mut controller = login_controller(&settings, client)?;
            let result = match username {
                Some(username) => {
                    controller.username = username;
                    controller.password = password.unwrap_or_default();
                    controller.submit().await?
                }
                None => match controller.start().await? {
                    StartAction::AutoLogin(result) => result,
                    _ => bail!("No stored login. Pass a username and --password."),
                },
            };
            report_login(&result)?;
        }
        Commands::Register {
            username,
            email,
            password,
            first_name,
            last_name,
        } => {
            let mut controller = login_controller(&settings, client)?;
            controller.open_register();
            controller.register_form.username = username;
            controller.register_form.email = email;
            controller.register_form.password = password.clone();
            controller.register_form.confirm_password = password;
            controller.register_form.first_name = first_name;
            controller.register_form.last_name = last_name;

            println!("📝 Registering {}...", controller.register_form.username);
            let result = controller.register().await?;
            report_login(&result)?;
        }
        Commands::WebLogin { json } => {
            let mut controller = login_controller(&settings, client)?;
            let result = controller.web_login(&json).await?;
            if let Some(experiment) = controller.requested_experiment() {
                println!("Requested experiment: {experiment}");
            }
            if let Some(group) = controller.requested_experiment_group() {
                println!("Requested experiment group: {group}");
            }
            report_login(&result)?;
        }
        Commands::ClearCredentials => {
            let store = FileCredentialStore::open(&settings.credentials_path)?;
            store.clear()?;
            println!("🧹 Stored login removed.");
        }
    }

    Ok(())
}

async fn run_pipeline<P: BranchPrompt>(
    settings: &PlayurSettings,
    client: PlayurClient,
    prompt: P,
    request: &PipelineRequest,
    open_browser: bool,
) -> anyhow::Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let progress = tokio::spawn(async move {
        while let Some(state) = rx.recv().await {
            println!("  ▶ {state}");
        }
    });

    let pipeline = BuildUploadPipeline::new(
        CommandBuildSystem::new(settings.build.clone()),
        prompt,
        client,
    )
    .with_default_branch(settings.default_branch.clone())
    .with_events(tx);

    println!("🚀 Running {:?} for {:?}...", request.mode, request.output_dir);
    let outcome = pipeline.run(request).await;
    drop(pipeline);
    let _ = progress.await;

    match outcome? {
        PipelineOutcome::Archived(summary) => {
            println!(
                "✅ Archived {} files ({} bytes) to {:?}",
                summary.files, summary.bytes, summary.path
            );
        }
        PipelineOutcome::Uploaded(receipt) => {
            println!(
                "✅ Uploaded build {} to '{}' at {}",
                receipt.build_id, receipt.branch, receipt.uploaded_at
            );
            println!("\n  {}\n", receipt.url);
            if open_browser {
                open::that(&receipt.url)?;
            }
        }
    }

    Ok(())
}

fn login_controller(
    settings: &PlayurSettings,
    client: PlayurClient,
) -> anyhow::Result<LoginController<PlayurClient, FileCredentialStore>> {
    let store = FileCredentialStore::open(&settings.credentials_path)?;
    Ok(LoginController::new(client, store, settings.capabilities())
        .with_start_scene(settings.start_scene))
}

fn report_login(result: &FormResult) -> anyhow::Result<()> {
    match result {
        FormResult::LoggedIn { scene } => {
            println!("✅ Logged in. Next scene: {scene}");
            Ok(())
        }
        FormResult::Rejected(message) => bail!("{message}"),
    }
}
