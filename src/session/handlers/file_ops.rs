use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{error, info, warn};
use tokio::fs;

use super::{Workspace, is_dir, is_file};
use crate::error::CommandError;

pub async fn handle_delete(ws: &Workspace<'_>, path: &str) -> Result<String, CommandError> {
    if path.is_empty() {
        return Err(CommandError::Validation("File path cannot be empty.".into()));
    }
    let target = ws.resolve(path);
    info!("delete: {:?}", target);

    if !is_file(&target).await {
        return Err(CommandError::NotFound("File does not exist.".into()));
    }
    ws.sandbox.check(&target)?;

    fs::remove_file(&target).await.map_err(|e| {
        error!("Failed to remove file {:?}: {}", target, e);
        CommandError::io("Cannot remove file.", e)
    })?;

    Ok("File deleted.".into())
}

pub async fn handle_move(
    ws: &Workspace<'_>,
    source: &str,
    destination: &str,
) -> Result<String, CommandError> {
    let (from, to) = prepare_pair(ws, source, destination).await?;
    ws.sandbox.check_strict(&from)?;
    ws.sandbox.check(&to)?;
    reject_nested(&from, &to)?;
    info!("move: {:?} -> {:?}", from, to);

    if let Err(e) = fs::rename(&from, &to).await {
        if e.kind() != ErrorKind::CrossesDevices {
            error!("Failed to move {:?} to {:?}: {}", from, to, e);
            return Err(CommandError::io("Cannot move files.", e));
        }
        warn!("rename across devices, copying {:?} instead", from);
        move_by_copy(&from, &to).await.map_err(|e| {
            error!("Failed to move {:?} to {:?}: {}", from, to, e);
            CommandError::io("Cannot move files.", e)
        })?;
    }

    Ok("File moved.".into())
}

pub async fn handle_copy(
    ws: &Workspace<'_>,
    source: &str,
    destination: &str,
) -> Result<String, CommandError> {
    let (from, to) = prepare_pair(ws, source, destination).await?;
    ws.sandbox.check(&from)?;
    ws.sandbox.check(&to)?;
    reject_nested(&from, &to)?;
    info!("copy: {:?} -> {:?}", from, to);

    let result = if is_dir(&from).await {
        copy_dir(&from, &to).await
    } else {
        copy_file(&from, &to).await
    };
    result.map_err(|e| {
        error!("Failed to copy {:?} to {:?}: {}", from, to, e);
        CommandError::io("Cannot copy files.", e)
    })?;

    Ok("File copied.".into())
}

/// Resolves both operands and rejects kind conflicts. Sandbox checks are left
/// to the caller.
async fn prepare_pair(
    ws: &Workspace<'_>,
    source: &str,
    destination: &str,
) -> Result<(PathBuf, PathBuf), CommandError> {
    if source.is_empty() || destination.is_empty() {
        return Err(CommandError::Validation("File path cannot be empty.".into()));
    }
    let from = ws.resolve(source);
    let to = ws.resolve(destination);

    let both_dirs = is_dir(&from).await && is_dir(&to).await;
    let both_files = is_file(&from).await && is_file(&to).await;
    if both_dirs || both_files {
        return Err(CommandError::AlreadyExists(
            "Destination already exists.".into(),
        ));
    }
    Ok((from, to))
}

fn reject_nested(from: &Path, to: &Path) -> Result<(), CommandError> {
    if to.starts_with(from) {
        return Err(CommandError::Validation(
            "Destination is inside the source.".into(),
        ));
    }
    Ok(())
}

/// Copies without overwriting an existing destination.
async fn copy_file(from: &Path, to: &Path) -> std::io::Result<()> {
    if fs::symlink_metadata(to).await.is_ok() {
        return Err(std::io::Error::from(ErrorKind::AlreadyExists));
    }
    fs::copy(from, to).await.map(|_| ())
}

/// Symlinks inside the tree are skipped so a copy never pulls content in
/// from outside the sandbox.
async fn copy_dir(from: &Path, to: &Path) -> std::io::Result<()> {
    let mut pending = vec![(from.to_path_buf(), to.to_path_buf())];
    while let Some((src, dst)) = pending.pop() {
        fs::create_dir(&dst).await?;
        let mut entries = fs::read_dir(&src).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            let target = dst.join(entry.file_name());
            if file_type.is_dir() {
                pending.push((entry.path(), target));
            } else if file_type.is_file() {
                fs::copy(entry.path(), &target).await?;
            }
        }
    }
    Ok(())
}

async fn move_by_copy(from: &Path, to: &Path) -> std::io::Result<()> {
    if is_dir(from).await {
        copy_dir(from, to).await?;
        fs::remove_dir_all(from).await
    } else {
        copy_file(from, to).await?;
        fs::remove_file(from).await
    }
}
