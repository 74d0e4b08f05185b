use playur_core::traits::BranchPrompt;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// A branch decided up front, e.g. from a command line flag.
#[derive(Debug, Clone, Default)]
pub struct FixedBranch(pub Option<String>);

impl FixedBranch {
    pub fn new(branch: impl Into<String>) -> Self {
        Self(Some(branch.into()))
    }

    /// A prompt that always cancels.
    pub fn cancelled() -> Self {
        Self(None)
    }
}

impl BranchPrompt for FixedBranch {
    async fn choose_branch(&self, _suggested: &str) -> Option<String> {
        self.0.clone()
    }
}

/// Asks on the terminal. End of input cancels.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdinBranchPrompt;

impl BranchPrompt for StdinBranchPrompt {
    async fn choose_branch(&self, suggested: &str) -> Option<String> {
        let mut stderr = tokio::io::stderr();
        let question = format!(
            "Enter the branch to upload this build to [{suggested}] (Ctrl-D to cancel): "
        );
        stderr.write_all(question.as_bytes()).await.ok()?;
        stderr.flush().await.ok()?;

        let mut line = String::new();
        let read = BufReader::new(tokio::io::stdin())
            .read_line(&mut line)
            .await
            .ok()?;
        if read == 0 {
            return None;
        }

        let answer = line.trim();
        Some(if answer.is_empty() { suggested } else { answer }.to_string())
    }
}
