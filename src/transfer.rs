//! Seam for the chunked transfer engine.
//!
//! The session validates and sandboxes upload/download/sync requests, then
//! hands them to a [`TransferEngine`]. Only the contract lives here: request
//! shape, chunk planning and content digests. The default engine refuses
//! every transfer.

use std::fs;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use crate::error::CommandError;

pub const CHUNK_SIZE: u64 = 256 * 1024;

/// Directory next to `files/` where partial uploads are staged.
pub const PARTIAL_DIR: &str = ".partial";

const READ_BUFFER: usize = 8192;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub user_dir: PathBuf,
    /// Sandboxed server-side path.
    pub target: PathBuf,
    /// Client-side path as typed by the user.
    pub local_name: String,
    pub size: u32,
    pub hash: String,
}

pub trait TransferEngine: Send + Sync {
    fn upload(&self, request: TransferRequest) -> Result<String, CommandError>;
    fn download(&self, request: TransferRequest) -> Result<String, CommandError>;
    fn sync(&self, request: TransferRequest) -> Result<String, CommandError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Unavailable;

impl TransferEngine for Unavailable {
    fn upload(&self, _request: TransferRequest) -> Result<String, CommandError> {
        Err(unavailable())
    }

    fn download(&self, _request: TransferRequest) -> Result<String, CommandError> {
        Err(unavailable())
    }

    fn sync(&self, _request: TransferRequest) -> Result<String, CommandError> {
        Err(unavailable())
    }
}

fn unavailable() -> CommandError {
    CommandError::Unavailable("Transfer engine not available.".to_string())
}

/// One entry of a directory scan, consumed by an engine's SYNC planning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    pub relative_path: PathBuf,
    pub size: u64,
    pub last_modified: u64,
    pub hash: String,
}

/// One piece of a chunked upload or download. Engines persist these under
/// [`PARTIAL_DIR`] to resume interrupted transfers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkMetadata {
    pub index: u64,
    pub offset: u64,
    pub size: u32,
    pub hash: String,
}

impl ChunkMetadata {
    /// Splits a file of `file_size` bytes into `CHUNK_SIZE` pieces. Hashes are
    /// left empty until the engine fills them in.
    #[allow(clippy::cast_possible_truncation)] // CHUNK_SIZE fits in u32
    pub fn plan(file_size: u64) -> Vec<ChunkMetadata> {
        (0..file_size.div_ceil(CHUNK_SIZE))
            .map(|index| {
                let offset = index * CHUNK_SIZE;
                ChunkMetadata {
                    index,
                    offset,
                    size: (file_size - offset).min(CHUNK_SIZE) as u32,
                    hash: String::new(),
                }
            })
            .collect()
    }
}

/// Keyed BLAKE3 digest used for whole files and single chunks. Engines fill
/// `Request::hash`/`Response::hash` and [`ChunkMetadata::hash`] with it; the
/// session itself never hashes content.
#[derive(Debug, Clone)]
pub struct ContentDigest {
    key: [u8; 32],
}

impl ContentDigest {
    pub fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    pub fn hash_bytes(&self, data: &[u8]) -> String {
        blake3::keyed_hash(&self.key, data).to_hex().to_string()
    }

    pub fn hash_file(&self, path: &Path) -> std::io::Result<String> {
        let mut file = fs::File::open(path)?;
        let mut hasher = blake3::Hasher::new_keyed(&self.key);
        let mut buffer = [0u8; READ_BUFFER];
        loop {
            let n = file.read(&mut buffer)?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
        }
        Ok(hasher.finalize().to_hex().to_string())
    }

    /// Hashes `size` bytes starting at `offset`. Fails if the file ends first.
    pub fn hash_chunk(&self, path: &Path, offset: u64, size: u64) -> std::io::Result<String> {
        let mut file = fs::File::open(path)?;
        file.seek(SeekFrom::Start(offset))?;

        let mut hasher = blake3::Hasher::new_keyed(&self.key);
        let mut buffer = [0u8; READ_BUFFER];
        let mut remaining = size;
        while remaining > 0 {
            let want = remaining.min(READ_BUFFER as u64) as usize;
            let n = file.read(&mut buffer[..want])?;
            if n == 0 {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "file too small for requested chunk",
                ));
            }
            hasher.update(&buffer[..n]);
            remaining -= n as u64;
        }
        Ok(hasher.finalize().to_hex().to_string())
    }

    /// Lists regular files under `dir` with their size, mtime and digest. This
    /// is what an engine compares against the client's listing for SYNC.
    pub fn scan_directory(&self, dir: &Path, recursive: bool) -> std::io::Result<Vec<FileMetadata>> {
        let mut files = Vec::new();
        let mut pending = vec![dir.to_path_buf()];

        while let Some(current) = pending.pop() {
            for entry in fs::read_dir(&current)? {
                let entry = entry?;
                let path = entry.path();
                let file_type = entry.file_type()?;

                if file_type.is_dir() {
                    if recursive {
                        pending.push(path);
                    }
                    continue;
                }
                if !file_type.is_file() {
                    continue;
                }

                let metadata = entry.metadata()?;
                let last_modified = metadata
                    .modified()
                    .ok()
                    .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                    .map_or(0, |d| d.as_secs());
                files.push(FileMetadata {
                    relative_path: path.strip_prefix(dir).unwrap_or(&path).to_path_buf(),
                    size: metadata.len(),
                    last_modified,
                    hash: self.hash_file(&path)?,
                });
            }
        }

        files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        Ok(files)
    }
}
