pub mod dir_ops;
pub mod file_ops;
pub mod transfer_ops;

use std::path::{Path, PathBuf};

use tokio::fs;

use crate::sandbox::PathSandbox;

/// What a filesystem handler may see of the session.
pub struct Workspace<'a> {
    pub sandbox: &'a PathSandbox,
    pub current_dir: &'a Path,
}

impl Workspace<'_> {
    pub fn resolve(&self, argument: &str) -> PathBuf {
        self.sandbox.resolve(self.current_dir, argument)
    }
}

pub(crate) async fn is_dir(path: &Path) -> bool {
    fs::metadata(path).await.is_ok_and(|m| m.is_dir())
}

pub(crate) async fn is_file(path: &Path) -> bool {
    fs::metadata(path).await.is_ok_and(|m| m.is_file())
}

pub(crate) async fn exists(path: &Path) -> bool {
    fs::symlink_metadata(path).await.is_ok()
}
