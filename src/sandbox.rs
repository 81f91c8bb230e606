//! Path normalization and containment checks.
//!
//! Every path a client names is resolved here and must stay inside the
//! session's user directory before any handler touches the filesystem.

use std::path::{Component, Path, PathBuf};

use log::warn;

use crate::error::CommandError;

/// Resolves `.` and `..` without touching the filesystem. `..` at the root
/// stays at the root; leading `..` of a relative path is kept.
pub fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            Component::Normal(name) => out.push(name),
        }
    }
    out
}

/// Canonicalizes `path`. A target that does not exist yet (a pending `mkdir`,
/// a copy destination) keeps its lexical tail on top of the deepest ancestor
/// that does exist, so symlinks in the existing part are still resolved.
pub fn normalize(path: &Path) -> PathBuf {
    let lexical = lexical_normalize(path);
    if let Ok(canonical) = lexical.canonicalize() {
        return canonical;
    }

    let mut tail = Vec::new();
    let mut current = lexical.as_path();
    while let Some(parent) = current.parent() {
        if let Some(name) = current.file_name() {
            tail.push(name.to_os_string());
        }
        if let Ok(mut canonical) = parent.canonicalize() {
            for name in tail.iter().rev() {
                canonical.push(name);
            }
            return canonical;
        }
        current = parent;
    }

    lexical
}

/// True when every component of `base` matches, in order, the leading
/// components of `candidate`. A path is a subpath of itself.
pub fn is_subpath(base: &Path, candidate: &Path) -> bool {
    normalize(candidate).starts_with(normalize(base))
}

/// The subtree a session may read and mutate.
#[derive(Debug, Clone)]
pub struct PathSandbox {
    user_dir: PathBuf,
}

impl PathSandbox {
    pub fn new(user_dir: impl AsRef<Path>) -> Self {
        Self {
            user_dir: normalize(user_dir.as_ref()),
        }
    }

    pub fn user_dir(&self) -> &Path {
        &self.user_dir
    }

    /// Turns a client argument into a normalized absolute path. A leading `/`
    /// anchors the argument at the user directory, anything else is taken
    /// relative to `current_dir`. The result is not checked.
    pub fn resolve(&self, current_dir: &Path, argument: &str) -> PathBuf {
        let joined = if argument.starts_with('/') {
            self.user_dir.join(argument.trim_start_matches('/'))
        } else {
            current_dir.join(argument)
        };
        normalize(&joined)
    }

    pub fn contains(&self, path: &Path) -> bool {
        is_subpath(&self.user_dir, path)
    }

    pub fn is_root(&self, path: &Path) -> bool {
        normalize(path) == self.user_dir
    }

    pub fn check(&self, path: &Path) -> Result<(), CommandError> {
        if self.contains(path) {
            Ok(())
        } else {
            warn!(
                "Sandbox violation: {:?} is outside {:?}",
                path, self.user_dir
            );
            Err(CommandError::SandboxViolation(path.to_path_buf()))
        }
    }

    /// Like [`check`](Self::check) but also refuses the user directory itself,
    /// for operations that would remove or relocate it.
    pub fn check_strict(&self, path: &Path) -> Result<(), CommandError> {
        self.check(path)?;
        if self.is_root(path) {
            warn!("Refusing to remove or move sandbox root {:?}", path);
            return Err(CommandError::SandboxViolation(path.to_path_buf()));
        }
        Ok(())
    }

    /// Shows `path` relative to the user directory, rooted at `/`.
    pub fn display(&self, path: &Path) -> String {
        match path.strip_prefix(&self.user_dir) {
            Ok(rel) if rel.as_os_str().is_empty() => "/".to_string(),
            Ok(rel) => format!("/{}", rel.to_string_lossy()),
            Err(_) => path.to_string_lossy().into_owned(),
        }
    }
}
