use std::path::PathBuf;

use log::{error, info, warn};
use tokio::fs;

use super::{Workspace, exists, is_dir};
use crate::error::CommandError;

pub async fn handle_list(ws: &Workspace<'_>, path: &str) -> Result<String, CommandError> {
    let target = if path.is_empty() {
        ws.current_dir.to_path_buf()
    } else {
        ws.resolve(path)
    };
    info!("list: {:?}", target);

    if !is_dir(&target).await {
        return Err(CommandError::NotFound("Directory does not exist.".into()));
    }
    ws.sandbox.check(&target)?;

    let mut read_dir = fs::read_dir(&target).await.map_err(|e| {
        error!("Failed to open directory {:?}: {}", target, e);
        CommandError::io("Cannot read directory.", e)
    })?;

    let mut names = Vec::new();
    loop {
        match read_dir.next_entry().await {
            Ok(Some(entry)) => {
                let mut name = entry.file_name().to_string_lossy().into_owned();
                match entry.file_type().await {
                    Ok(file_type) if file_type.is_dir() => name.push('/'),
                    Ok(_) => {}
                    Err(e) => warn!("Failed to get file type for {}: {}", name, e),
                }
                names.push(name);
            }
            Ok(None) => break,
            Err(e) => {
                error!("Failed to read directory {:?}: {}", target, e);
                return Err(CommandError::io("Cannot read directory.", e));
            }
        }
    }
    names.sort();

    let mut listing = Vec::with_capacity(names.len() + 1);
    if path.is_empty() {
        listing.push(format!(
            "Current directory: {}",
            ws.sandbox.display(ws.current_dir)
        ));
    }
    listing.extend(names);
    Ok(listing.join("\n"))
}

/// Returns the new current directory; the caller commits it.
pub async fn handle_cd(ws: &Workspace<'_>, path: &str) -> Result<PathBuf, CommandError> {
    if path.is_empty() {
        return Err(CommandError::Validation(
            "Directory path cannot be empty.".into(),
        ));
    }
    let target = ws.resolve(path);
    info!("cd: {:?}", target);

    if !is_dir(&target).await {
        return Err(CommandError::NotFound("Directory does not exist.".into()));
    }
    ws.sandbox.check(&target)?;

    Ok(target)
}

pub async fn handle_mkdir(ws: &Workspace<'_>, path: &str) -> Result<String, CommandError> {
    if path.is_empty() {
        return Err(CommandError::Validation(
            "Directory path cannot be empty.".into(),
        ));
    }
    let target = ws.resolve(path);
    info!("mkdir: {:?}", target);

    if exists(&target).await {
        return Err(CommandError::AlreadyExists(
            "Directory already exists.".into(),
        ));
    }
    ws.sandbox.check(&target)?;

    fs::create_dir_all(&target).await.map_err(|e| {
        error!("Failed to create directory {:?}: {}", target, e);
        CommandError::io("Cannot create directory.", e)
    })?;

    Ok("Directory created.".into())
}

pub async fn handle_rmdir(ws: &Workspace<'_>, path: &str) -> Result<String, CommandError> {
    if path.is_empty() {
        return Err(CommandError::Validation(
            "Directory path cannot be empty.".into(),
        ));
    }
    let target = ws.resolve(path);
    info!("rmdir: {:?}", target);

    if !is_dir(&target).await {
        return Err(CommandError::NotFound("Directory does not exist.".into()));
    }
    ws.sandbox.check_strict(&target)?;

    fs::remove_dir_all(&target).await.map_err(|e| {
        error!("Failed to remove directory {:?}: {}", target, e);
        CommandError::io("Cannot delete directory.", e)
    })?;

    Ok("Directory deleted.".into())
}
