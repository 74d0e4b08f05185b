use playur_core::prelude::*;
use std::path::Path;
use tokio::process::Command;
use tracing::{error, info};

/// Runs an external build command, e.g. the editor in batch mode.
#[derive(Debug, Clone)]
pub struct CommandBuildSystem {
    command: BuildCommand,
}

impl CommandBuildSystem {
    pub fn new(command: BuildCommand) -> Self {
        Self { command }
    }

    /// Arguments with `{target}` and `{output}` filled in.
    pub fn arguments(&self, target: &str, output: &Path) -> Vec<String> {
        let output = output.to_string_lossy();
        self.command
            .args
            .iter()
            .map(|arg| arg.replace("{target}", target).replace("{output}", &output))
            .collect()
    }
}

impl BuildSystem for CommandBuildSystem {
    async fn build(&self, target: &str, output: &Path) -> Result<(), BuildError> {
        let args = self.arguments(target, output);
        info!(
            program = %self.command.program,
            ?args,
            "====== BuildPlayer: {target} at {}",
            output.display()
        );

        let status = Command::new(&self.command.program)
            .args(&args)
            .status()
            .await?;

        if status.success() {
            info!(%target, "build succeeded");
            Ok(())
        } else {
            error!(%target, %status, "build failed");
            Err(BuildError::Failed(format!(
                "{} exited with {status}",
                self.command.program
            )))
        }
    }
}
