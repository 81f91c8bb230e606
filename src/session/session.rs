use std::path::PathBuf;
use std::sync::Arc;

use log::{error, info, warn};
use tokio::fs;

use crate::accounts::{SharedAccounts, with_store};
use crate::error::CommandError;
use crate::protocol::{Code, Command, Request, Response, Status};
use crate::sandbox::PathSandbox;
use crate::server::ServerConfig;
use crate::transfer::TransferEngine;

use super::SessionState;
use super::handlers::{Workspace, dir_ops, file_ops, transfer_ops};

/// Server-side authority for one connection: handshake progress, identity
/// and working directory. Requests go through [`Session::handle`] one at a
/// time.
pub struct Session {
    pub(crate) state: SessionState,
    pub(crate) username: String,
    pub(crate) sandbox: Option<PathSandbox>,
    pub(crate) current_dir: PathBuf,
    config: Arc<ServerConfig>,
    accounts: SharedAccounts,
    transfers: Arc<dyn TransferEngine>,
}

impl Session {
    pub fn new(
        config: Arc<ServerConfig>,
        accounts: SharedAccounts,
        transfers: Arc<dyn TransferEngine>,
    ) -> Self {
        Self {
            state: SessionState::Login,
            username: String::new(),
            sandbox: None,
            current_dir: PathBuf::new(),
            config,
            accounts,
            transfers,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn user_dir(&self) -> Option<&std::path::Path> {
        self.sandbox.as_ref().map(PathSandbox::user_dir)
    }

    pub fn current_dir(&self) -> &std::path::Path {
        &self.current_dir
    }

    /// Advances the state machine by one request. `None` means the client
    /// asked to exit and nothing should be written back.
    pub async fn handle(&mut self, request: Request) -> Option<Response> {
        let Some(command) = request.command() else {
            warn!("Unknown request {:?} from {}", request.cmd, self.label());
            return Some(Response::error(Code::BadRequest, "Unknown request"));
        };
        info!("{} from {} in state {}", command, self.label(), self.state);

        let response = match command {
            Command::Exit => {
                self.state = SessionState::Exit;
                return None;
            }
            Command::Login => self.login(&request.first_argument).await,
            Command::Auth => self.auth(&request.first_argument).await,
            Command::NeedInput => self.need_input(&request.first_argument).await,
            _ => match self.dispatch(command, &request).await {
                Ok(message) => Response::ok(message),
                Err(e) => {
                    if let CommandError::Io { source, .. } = &e {
                        error!("{} failed for {}: {}", command, self.label(), source);
                    }
                    e.into_response()
                }
            },
        };
        Some(response)
    }

    /// Runs a filesystem command. This is the only place the ready guard lives.
    async fn dispatch(&mut self, command: Command, request: &Request) -> Result<String, CommandError> {
        if self.state != SessionState::Ready {
            return Err(CommandError::NotReady);
        }
        let Some(sandbox) = self.sandbox.clone() else {
            return Err(CommandError::NotReady);
        };

        self.state = SessionState::Processing;
        let ws = Workspace {
            sandbox: &sandbox,
            current_dir: &self.current_dir,
        };
        let first = request.first_argument.as_str();
        let second = request.second_argument.as_str();

        let result = match command {
            Command::List => dir_ops::handle_list(&ws, first).await,
            Command::Mkdir => dir_ops::handle_mkdir(&ws, first).await,
            Command::Rmdir => dir_ops::handle_rmdir(&ws, first).await,
            Command::Cd => match dir_ops::handle_cd(&ws, first).await {
                Ok(next) => {
                    self.current_dir = next;
                    Ok("Directory changed.".to_string())
                }
                Err(e) => Err(e),
            },
            Command::Delete => file_ops::handle_delete(&ws, first).await,
            Command::Move => file_ops::handle_move(&ws, first, second).await,
            Command::Copy => file_ops::handle_copy(&ws, first, second).await,
            Command::Upload => transfer_ops::handle_upload(&ws, self.transfers.as_ref(), request),
            Command::Download => {
                transfer_ops::handle_download(&ws, self.transfers.as_ref(), request)
            }
            Command::Sync => transfer_ops::handle_sync(&ws, self.transfers.as_ref(), request),
            Command::Login | Command::Auth | Command::NeedInput | Command::Exit => {
                Err(CommandError::Validation("Not a filesystem command.".into()))
            }
        };

        self.state = SessionState::Ready;
        result
    }

    async fn login(&mut self, username: &str) -> Response {
        if self.state != SessionState::Login {
            return Response::error(Code::ServiceUnavailable, "Already logged in.");
        }

        if username.is_empty() {
            self.username.clear();
            return match self.enter_public().await {
                Ok(()) => Response::ok("No username provided. Operating in public mode."),
                Err(e) => e.into_response(),
            };
        }

        if !is_valid_username(username) {
            warn!("Rejected invalid username {:?}", username);
            return Response::error(Code::BadRequest, "Invalid username.");
        }

        let name = username.to_string();
        let known = match with_store(&self.accounts, move |store| store.exists(&name)).await {
            Ok(known) => known,
            Err(e) => {
                error!("Account lookup for {} failed: {}", username, e);
                return Response::error(Code::InternalServerError, "Account store unavailable.");
            }
        };

        self.username = username.to_string();
        if known {
            self.state = SessionState::Auth;
            Response::new(
                Status::Auth,
                Code::Unauthorized,
                "Please provide your password.",
            )
        } else {
            self.state = SessionState::NeedInputRegister;
            Response::new(
                Status::NeedInput,
                Code::Unauthorized,
                "User does not exist. Do you want to register? (Y/n)",
            )
        }
    }

    async fn need_input(&mut self, input: &str) -> Response {
        match self.state {
            SessionState::NeedInputRegister => match input {
                "Y" => {
                    self.state = SessionState::Auth;
                    Response::new(
                        Status::Auth,
                        Code::Unauthorized,
                        "For registration, please provide a password.",
                    )
                }
                "n" => {
                    self.username.clear();
                    match self.enter_public().await {
                        Ok(()) => Response::ok("No registration. Operating in public mode."),
                        Err(e) => e.into_response(),
                    }
                }
                _ => Response::error(
                    Code::BadRequest,
                    "Invalid input for registration. Y/n expected.",
                ),
            },
            SessionState::NeedInputResume => {
                Response::error(Code::ServiceUnavailable, "Resume is not available.")
            }
            _ => Response::error(Code::ServiceUnavailable, "No input required at this time."),
        }
    }

    async fn auth(&mut self, password: &str) -> Response {
        if self.state != SessionState::Auth {
            return Response::error(Code::ServiceUnavailable, "Not in authentication state.");
        }
        if password.is_empty() {
            return Response::new(
                Status::Auth,
                Code::BadRequest,
                "Password cannot be empty. Try again.",
            );
        }

        // The subtree must exist before an account record points at it.
        let files = match self.provision_private().await {
            Ok(files) => files,
            Err(e) => return e.into_response(),
        };

        let username = self.username.clone();
        let password = password.to_string();
        let outcome = with_store(&self.accounts, move |store| {
            if store.exists(&username)? {
                let valid = store.validate(&username, &password)?;
                Ok(valid.then_some("Authentication successful."))
            } else {
                store.add(&username, &password)?;
                Ok(Some("Registration successful."))
            }
        })
        .await;

        match outcome {
            Ok(Some(message)) => {
                info!("{} authenticated", self.username);
                self.enter(files);
                Response::ok(message)
            }
            Ok(None) => {
                warn!("Invalid password for {}", self.username);
                Response::new(Status::Auth, Code::Unauthorized, "Invalid password. Try again.")
            }
            Err(e) => {
                error!("Authentication of {} failed: {}", self.username, e);
                Response::error(Code::InternalServerError, "Account store unavailable.")
            }
        }
    }

    async fn enter_public(&mut self) -> Result<(), CommandError> {
        let files = self.config.public_files_dir();
        fs::create_dir_all(&files).await.map_err(|e| {
            error!("Failed to prepare {:?}: {}", files, e);
            CommandError::io("Cannot prepare public directory.", e)
        })?;
        self.enter(files);
        Ok(())
    }

    /// Creates `files/` and `.partial/` for the current user and returns the
    /// former.
    async fn provision_private(&self) -> Result<PathBuf, CommandError> {
        let files = self.config.user_files_dir(&self.username);
        let partial = self.config.user_partial_dir(&self.username);
        for dir in [&files, &partial] {
            fs::create_dir_all(dir).await.map_err(|e| {
                error!("Failed to prepare {:?}: {}", dir, e);
                CommandError::io("Cannot prepare user directory.", e)
            })?;
        }
        Ok(files)
    }

    fn enter(&mut self, user_dir: PathBuf) {
        let sandbox = PathSandbox::new(user_dir);
        self.current_dir = sandbox.user_dir().to_path_buf();
        self.sandbox = Some(sandbox);
        self.state = SessionState::Ready;
    }

    fn label(&self) -> &str {
        if self.username.is_empty() {
            "<anonymous>"
        } else {
            &self.username
        }
    }
}

/// Longest name a single path component may have on common filesystems.
const MAX_USERNAME_LEN: usize = 255;

/// Usernames become directory names under `private/`.
fn is_valid_username(username: &str) -> bool {
    username.len() <= MAX_USERNAME_LEN
        && username != "."
        && username != ".."
        && !username
            .chars()
            .any(|c| c == '/' || c == '\\' || c == '\0' || c.is_control())
}
