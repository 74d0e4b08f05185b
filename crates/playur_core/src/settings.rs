//! Project settings for the PlayUR toolkit.
//!
//! Settings live in a TOML file (`playur.toml` by default) next to the game
//! project. Every field has a default, so a partial file is valid.

use crate::error::SettingsError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_SETTINGS_FILE: &str = "playur.toml";
pub const DEFAULT_SERVER_URL: &str = "https://playur.io/api/";
pub const DEFAULT_BRANCH: &str = "main";
/// Static editor method the default build command invokes. Not part of the
/// plugin; each project defines it.
pub const DEFAULT_BUILD_METHOD: &str = "ProjectBuild.BuildWebPlayer";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayurSettings {
    /// Game id as registered on the platform. `0` means "not configured".
    pub game_id: i64,

    pub client_secret: String,

    /// API root, e.g. `https://playur.io/api/`. Endpoints are appended to it.
    pub server_url: String,

    /// Where generated enum files are written.
    pub generated_dir: PathBuf,

    pub log_level: LogLevel,

    /// Branch suggested when prompting before an upload.
    pub default_branch: String,

    /// Platform the login client runs on. Decides the capability flags.
    pub platform: Platform,

    /// Scene index the player started from, used after a successful login.
    pub start_scene: u32,

    /// File holding persisted login credentials.
    pub credentials_path: PathBuf,

    pub build: BuildCommand,
}

impl Default for PlayurSettings {
    fn default() -> Self {
        Self {
            game_id: 0,
            client_secret: String::new(),
            server_url: DEFAULT_SERVER_URL.to_string(),
            generated_dir: PathBuf::from("Assets").join("PlayURPlugin"),
            log_level: LogLevel::default(),
            default_branch: DEFAULT_BRANCH.to_string(),
            platform: Platform::default(),
            start_scene: 0,
            credentials_path: PathBuf::from(".playur").join("credentials.toml"),
            build: BuildCommand::default(),
        }
    }
}

impl PlayurSettings {
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path)?;
        let settings: PlayurSettings = toml::from_str(&content)?;
        tracing::debug!(path = %path.display(), "settings loaded");
        Ok(settings)
    }

    /// Loads settings, falling back to defaults when the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, SettingsError> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::warn!(path = %path.display(), "settings file not found, using defaults");
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        // The file carries the client secret.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %path.display(), "settings saved");
        Ok(())
    }

    /// The authentication pair every request carries.
    pub fn credentials(&self) -> Result<GameCredentials, SettingsError> {
        if self.game_id <= 0 {
            return Err(SettingsError::Invalid(
                "game_id is not set. Configure it in the settings file or pass --game-id".into(),
            ));
        }
        if self.client_secret.is_empty() {
            return Err(SettingsError::Invalid(
                "client_secret is not set. Configure it in the settings file or set PLAYUR_CLIENT_SECRET".into(),
            ));
        }

        Ok(GameCredentials {
            game_id: self.game_id,
            client_secret: self.client_secret.clone(),
        })
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities::for_platform(self.platform)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameCredentials {
    pub game_id: i64,
    pub client_secret: String,
}

impl GameCredentials {
    pub fn new(game_id: i64, client_secret: impl Into<String>) -> Self {
        Self {
            game_id,
            client_secret: client_secret.into(),
        }
    }

    /// Query/form pairs, in the order the server expects them.
    pub fn as_form(&self) -> Vec<(&'static str, String)> {
        vec![
            ("gameID", self.game_id.to_string()),
            ("clientSecret", self.client_secret.clone()),
        ]
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    #[serde(alias = "log")]
    Info,
    #[serde(alias = "warning")]
    Warn,
    Error,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`.
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[default]
    Desktop,
    Web,
}

/// Features that depend on where the login client runs, resolved once at
/// startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Remember username and password between launches.
    pub persistence: bool,
    /// Wait for the hosting page to supply credentials.
    pub browser_bridge: bool,
}

impl Capabilities {
    pub fn for_platform(platform: Platform) -> Self {
        match platform {
            // Never store a password in browser storage.
            Platform::Web => Self {
                persistence: false,
                browser_bridge: true,
            },
            Platform::Desktop => Self {
                persistence: true,
                browser_bridge: false,
            },
        }
    }
}

/// External command that produces a player build.
///
/// `{target}` and `{output}` in `args` are replaced with the build target
/// and the output directory.
///
/// The default runs the editor in batch mode and calls
/// [`DEFAULT_BUILD_METHOD`]. The plugin only ships an interactive build menu
/// item, so the project has to provide that static method itself, or
/// override `args`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildCommand {
    pub program: String,
    pub args: Vec<String>,
    pub target: String,
}

impl Default for BuildCommand {
    fn default() -> Self {
        Self {
            program: "Unity".to_string(),
            args: [
                "-batchmode",
                "-quit",
                "-projectPath",
                ".",
                "-buildTarget",
                "{target}",
                "-executeMethod",
                DEFAULT_BUILD_METHOD,
                "-buildPath",
                "{output}",
                "-logFile",
                "-",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            target: "WebGL".to_string(),
        }
    }
}
