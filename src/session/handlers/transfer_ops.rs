use std::path::Path;

use log::info;

use super::Workspace;
use crate::error::CommandError;
use crate::protocol::Request;
use crate::transfer::{TransferEngine, TransferRequest};

/// `first_argument` is the client's local file, `second_argument` the optional
/// remote target (defaults to the local file name in the current directory).
pub fn handle_upload(
    ws: &Workspace<'_>,
    engine: &dyn TransferEngine,
    request: &Request,
) -> Result<String, CommandError> {
    if request.first_argument.is_empty() {
        return Err(CommandError::Validation(
            "Missing local path argument.".into(),
        ));
    }

    let remote = if request.second_argument.is_empty() {
        Path::new(&request.first_argument)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| CommandError::Validation("Invalid local path.".into()))?
    } else {
        request.second_argument.clone()
    };

    let transfer = sandboxed(ws, &remote, &request.first_argument, request)?;
    info!("upload: {} -> {:?}", request.first_argument, transfer.target);
    engine.upload(transfer)
}

/// `first_argument` is the remote file, `second_argument` the optional local
/// destination.
pub fn handle_download(
    ws: &Workspace<'_>,
    engine: &dyn TransferEngine,
    request: &Request,
) -> Result<String, CommandError> {
    if request.first_argument.is_empty() {
        return Err(CommandError::Validation(
            "Missing remote path argument.".into(),
        ));
    }

    let transfer = sandboxed(ws, &request.first_argument, &request.second_argument, request)?;
    info!("download: {:?}", transfer.target);
    engine.download(transfer)
}

/// `first_argument` is the local directory, `second_argument` the remote one.
pub fn handle_sync(
    ws: &Workspace<'_>,
    engine: &dyn TransferEngine,
    request: &Request,
) -> Result<String, CommandError> {
    if request.first_argument.is_empty() || request.second_argument.is_empty() {
        return Err(CommandError::Validation(
            "Missing source or destination path argument.".into(),
        ));
    }

    let transfer = sandboxed(ws, &request.second_argument, &request.first_argument, request)?;
    info!("sync: {} -> {:?}", request.first_argument, transfer.target);
    engine.sync(transfer)
}

fn sandboxed(
    ws: &Workspace<'_>,
    remote: &str,
    local: &str,
    request: &Request,
) -> Result<TransferRequest, CommandError> {
    let target = ws.resolve(remote);
    ws.sandbox.check(&target)?;
    Ok(TransferRequest {
        user_dir: ws.sandbox.user_dir().to_path_buf(),
        target,
        local_name: local.to_string(),
        size: request.size,
        hash: request.hash.clone(),
    })
}
