use std::future::Future;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{error, info, warn};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;

use crate::accounts::{AccountStore, SharedAccounts};
use crate::error::{AccountError, ProtocolError};
use crate::protocol::{Request, read_message, write_message};
use crate::session::Session;
use crate::transfer::{PARTIAL_DIR, TransferEngine, Unavailable};

#[derive(Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub root_dir: PathBuf,
}

impl ServerConfig {
    pub fn users_file(&self) -> PathBuf {
        self.root_dir.join("users.json")
    }

    pub fn public_files_dir(&self) -> PathBuf {
        self.root_dir.join("public").join("files")
    }

    pub fn private_dir(&self) -> PathBuf {
        self.root_dir.join("private")
    }

    pub fn user_files_dir(&self, username: &str) -> PathBuf {
        self.private_dir().join(username).join("files")
    }

    pub fn user_partial_dir(&self, username: &str) -> PathBuf {
        self.private_dir().join(username).join(PARTIAL_DIR)
    }
}

#[derive(Clone)]
pub struct Server {
    pub config: Arc<ServerConfig>,
    accounts: SharedAccounts,
    transfers: Arc<dyn TransferEngine>,
}

impl Server {
    /// Lays out the root directory and opens the account table.
    pub fn new(config: ServerConfig) -> Result<Self, AccountError> {
        for dir in [config.public_files_dir(), config.private_dir()] {
            if !dir.is_dir() {
                std::fs::create_dir_all(&dir)?;
                info!("Created {:?}", dir);
            }
        }
        let accounts = AccountStore::open(config.users_file())?.into_shared();
        info!("Root directory {:?} is set up", config.root_dir);

        Ok(Self {
            config: Arc::new(config),
            accounts,
            transfers: Arc::new(Unavailable),
        })
    }

    /// Replaces the default engine, which refuses every transfer with 503.
    /// An out-of-crate engine plugs in here.
    pub fn with_transfer_engine(mut self, engine: Arc<dyn TransferEngine>) -> Self {
        self.transfers = engine;
        self
    }

    pub fn root_dir(&self) -> &Path {
        &self.config.root_dir
    }

    pub fn new_session(&self) -> Session {
        Session::new(
            self.config.clone(),
            self.accounts.clone(),
            self.transfers.clone(),
        )
    }

    pub async fn bind(&self) -> std::io::Result<TcpListener> {
        TcpListener::bind((self.config.host.as_str(), self.config.port)).await
    }

    /// Accepts connections until `shutdown` resolves. Each connection runs in
    /// its own task that owns its session.
    pub async fn run(&self, listener: TcpListener, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                result = listener.accept() => match result {
                    Ok((stream, addr)) => {
                        info!("Accepted connection from {}", addr);
                        let session = self.new_session();
                        tokio::spawn(serve_connection(stream, addr, session));
                    }
                    Err(e) => error!("Failed to accept connection: {}", e),
                },
                _ = &mut shutdown => {
                    info!("Server shutting down");
                    break;
                }
            }
        }
    }
}

/// Reads requests and writes responses until the client exits, hangs up or
/// sends a broken frame.
pub async fn serve_connection<S>(stream: S, peer: SocketAddr, mut session: Session)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (mut reader, mut writer) = tokio::io::split(stream);
    loop {
        let request: Request = match read_message(&mut reader).await {
            Ok(request) => request,
            Err(ProtocolError::Closed) => {
                info!("{} disconnected", peer);
                break;
            }
            Err(e) => {
                warn!("Dropping {}: {}", peer, e);
                break;
            }
        };

        let Some(response) = session.handle(request).await else {
            info!("{} exited", peer);
            break;
        };
        if let Err(e) = write_message(&mut writer, &response).await {
            warn!("Failed to reply to {}: {}", peer, e);
            break;
        }
    }
}
