use crate::error::*;

use std::path::Path;

/// The host build system (e.g. the game editor run in batch mode).
pub trait BuildSystem: Send + Sync {
    /// Builds `target` into `output`. Anything but `Ok` stops the pipeline.
    fn build(
        &self,
        target: &str,
        output: &Path,
    ) -> impl Future<Output = Result<(), BuildError>> + Send;
}

/// The host's cached view of project files.
pub trait FileRegistry: Send + Sync {
    /// Called after a generated file has been written.
    fn refresh(&self, path: &Path);
}

/// Asks the user which branch to upload to.
pub trait BranchPrompt: Send + Sync {
    /// Returns `None` when the user cancels. An empty answer is allowed and
    /// means the default branch.
    fn choose_branch(&self, suggested: &str) -> impl Future<Output = Option<String>> + Send;
}

/// Small key/value store for remembered login details.
pub trait CredentialStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Removes every stored value.
    fn clear(&self) -> Result<(), StoreError>;
}

impl<T: CredentialStore + ?Sized> CredentialStore for &T {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set(key, value)
    }

    fn clear(&self) -> Result<(), StoreError> {
        (**self).clear()
    }
}

/// Registry that does nothing, for hosts without an asset cache.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRegistry;

impl FileRegistry for NoopRegistry {
    fn refresh(&self, path: &Path) {
        tracing::debug!(path = %path.display(), "refresh requested");
    }
}
