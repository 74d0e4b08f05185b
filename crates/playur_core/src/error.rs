use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Settings parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Settings serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Invalid settings: {0}")]
    Invalid(String),
}

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Could not launch build: {0}")]
    Launch(#[from] std::io::Error),

    #[error("Build failed: {0}")]
    Failed(String),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Credential store parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Credential store serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),
}
