//! Durable username → password-hash table.
//!
//! Every read reloads the whole file and every mutation rewrites it through a
//! temporary file that is renamed over the original, so the table on disk is
//! never observed half-written. The store itself does no locking; callers
//! share it through [`SharedAccounts`] and reach it with [`with_store`], which
//! keeps file I/O and password hashing off the async workers.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use log::{info, warn};
use password_hash::SaltString;
use password_hash::rand_core::OsRng;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::AccountError;

pub type SharedAccounts = Arc<Mutex<AccountStore>>;

/// Runs `f` on the blocking pool with the store locked. Callers queue on the
/// lock in the order they arrive, so a lookup followed by a registration
/// inside one `f` cannot interleave with another connection.
pub async fn with_store<F, T>(accounts: &SharedAccounts, f: F) -> Result<T, AccountError>
where
    F: FnOnce(&mut AccountStore) -> Result<T, AccountError> + Send + 'static,
    T: Send + 'static,
{
    let accounts = Arc::clone(accounts);
    tokio::task::spawn_blocking(move || {
        let mut store = accounts.blocking_lock();
        f(&mut store)
    })
    .await?
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub username: String,
    pub password_hash: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct AccountTable {
    users: Vec<Account>,
}

#[derive(Debug)]
pub struct AccountStore {
    path: PathBuf,
    accounts: Vec<Account>,
}

impl AccountStore {
    /// Opens the table at `path`, writing an empty one if the file is missing
    /// or blank.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, AccountError> {
        let mut store = Self {
            path: path.into(),
            accounts: Vec::new(),
        };

        let blank = match fs::read_to_string(&store.path) {
            Ok(contents) => contents.trim().is_empty(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
            Err(e) => return Err(e.into()),
        };
        if blank {
            info!("Initializing empty account table at {:?}", store.path);
            store.save()?;
        }
        store.load()?;

        Ok(store)
    }

    pub fn into_shared(self) -> SharedAccounts {
        Arc::new(Mutex::new(self))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&mut self, username: &str) -> Result<bool, AccountError> {
        self.load()?;
        Ok(self.find(username).is_some())
    }

    /// Checks `password` against the stored hash. Unknown users and hashes
    /// that fail to parse both validate as `false`.
    pub fn validate(&mut self, username: &str, password: &str) -> Result<bool, AccountError> {
        self.load()?;
        let Some(account) = self.find(username) else {
            return Ok(false);
        };

        let parsed = match PasswordHash::new(&account.password_hash) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Stored hash for {} is unreadable: {}", username, e);
                return Ok(false);
            }
        };

        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }

    pub fn add(&mut self, username: &str, password: &str) -> Result<(), AccountError> {
        self.load()?;
        if self.find(username).is_some() {
            return Err(AccountError::AlreadyRegistered(username.to_string()));
        }

        let password_hash = hash_password(password)?;
        self.accounts.push(Account {
            username: username.to_string(),
            password_hash,
        });
        self.save()?;

        info!("Registered account {}", username);
        Ok(())
    }

    fn find(&self, username: &str) -> Option<&Account> {
        self.accounts
            .iter()
            .find(|account| account.username == username)
    }

    fn load(&mut self) -> Result<(), AccountError> {
        let contents = fs::read_to_string(&self.path)?;
        self.accounts = if contents.trim().is_empty() {
            Vec::new()
        } else {
            serde_json::from_str::<AccountTable>(&contents)?.users
        };
        Ok(())
    }

    fn save(&self) -> Result<(), AccountError> {
        let table = AccountTable {
            users: self.accounts.clone(),
        };
        let payload = serde_json::to_vec_pretty(&table)?;

        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut temp = tempfile::NamedTempFile::new_in(parent)?;
        temp.write_all(&payload)?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path)
            .map_err(|e| AccountError::Persist {
                path: self.path.clone(),
                source: e.error,
            })?;
        Ok(())
    }
}

fn hash_password(password: &str) -> Result<String, AccountError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AccountError::Hash(e.to_string()))
}
