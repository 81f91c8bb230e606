//! Client-side mirror of the server session.
//!
//! The state here only decides how to prompt and how to read the next line.
//! The server stays the authority: every transition below is driven by the
//! status of the last response received.

use log::warn;

use crate::protocol::{Code, Command, Request, Response, Status};

pub const PROMPT: &str = "> ";
pub const PASSWORD_PROMPT: &str = "Password: ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Login,
    Ready,
    NeedInput,
    Auth,
    Processing,
    Exit,
    Transferring,
}

/// What the network loop should do with a line the user typed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Send(Request),
    Print(String),
    Exit,
    Nothing,
}

/// How to show a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Render {
    pub text: String,
    pub prompt: Option<&'static str>,
    pub hide_input: bool,
}

/// Commands the user may type in the ready state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LocalCommand {
    List,
    Help,
    Upload,
    Download,
    Delete,
    Cd,
    Mkdir,
    Rmdir,
    Move,
    Copy,
    Sync,
}

impl LocalCommand {
    const ALL: [LocalCommand; 11] = [
        LocalCommand::List,
        LocalCommand::Help,
        LocalCommand::Upload,
        LocalCommand::Download,
        LocalCommand::Delete,
        LocalCommand::Cd,
        LocalCommand::Mkdir,
        LocalCommand::Rmdir,
        LocalCommand::Move,
        LocalCommand::Copy,
        LocalCommand::Sync,
    ];

    fn name(self) -> &'static str {
        match self {
            LocalCommand::List => "LIST",
            LocalCommand::Help => "HELP",
            LocalCommand::Upload => "UPLOAD",
            LocalCommand::Download => "DOWNLOAD",
            LocalCommand::Delete => "DELETE",
            LocalCommand::Cd => "CD",
            LocalCommand::Mkdir => "MKDIR",
            LocalCommand::Rmdir => "RMDIR",
            LocalCommand::Move => "MOVE",
            LocalCommand::Copy => "COPY",
            LocalCommand::Sync => "SYNC",
        }
    }

    fn usage(self) -> &'static str {
        match self {
            LocalCommand::List => "LIST [path]",
            LocalCommand::Help => "HELP",
            LocalCommand::Upload => "UPLOAD <local> [remote]",
            LocalCommand::Download => "DOWNLOAD <remote> [local]",
            LocalCommand::Delete => "DELETE <path>",
            LocalCommand::Cd => "CD <path>",
            LocalCommand::Mkdir => "MKDIR <path>",
            LocalCommand::Rmdir => "RMDIR <path>",
            LocalCommand::Move => "MOVE <source> <destination>",
            LocalCommand::Copy => "COPY <source> <destination>",
            LocalCommand::Sync => "SYNC <local> <remote>",
        }
    }

    fn parse(token: &str) -> Option<Self> {
        let token = token.to_ascii_uppercase();
        Self::ALL.into_iter().find(|command| command.name() == token)
    }
}

#[derive(Debug)]
pub struct ClientMachine {
    state: ClientState,
    username: String,
    exiting: bool,
    /// Handshake state the outstanding request was sent from. The server
    /// stays there when it answers `ERROR`.
    handshake: Option<ClientState>,
}

impl ClientMachine {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            state: ClientState::Login,
            username: username.into(),
            exiting: false,
            handshake: None,
        }
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    pub fn login_request(&mut self) -> Request {
        self.handshake = Some(ClientState::Login);
        self.state = ClientState::Processing;
        Request::with_args(Command::Login, self.username.as_str(), "")
    }

    /// One-shot: the first call moves to `Exit` and returns the farewell
    /// request, later calls return `None`.
    pub fn begin_exit(&mut self) -> Option<Request> {
        if self.exiting {
            return None;
        }
        self.exiting = true;
        self.state = ClientState::Exit;
        Some(Request::new(Command::Exit))
    }

    pub fn on_line(&mut self, line: &str) -> Action {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().eq_ignore_ascii_case(Command::Exit.as_str()) {
            return Action::Exit;
        }

        match self.state {
            ClientState::Login => Action::Send(self.login_request()),
            ClientState::Auth => {
                self.handshake = Some(ClientState::Auth);
                self.send(Request::with_args(Command::Auth, line, ""))
            }
            ClientState::NeedInput => {
                self.handshake = Some(ClientState::NeedInput);
                self.send(Request::with_args(Command::NeedInput, line.trim(), ""))
            }
            ClientState::Ready => self.on_command(line),
            ClientState::Processing | ClientState::Transferring => {
                Action::Print("Waiting for server...\n".into())
            }
            ClientState::Exit => Action::Nothing,
        }
    }

    pub fn on_response(&mut self, response: &Response) -> Render {
        let text = format!("{}: {}\n", response.code, response.message);
        if self.exiting {
            return Render {
                text,
                prompt: None,
                hide_input: false,
            };
        }

        let status = response.status();
        let handshake = match status {
            Some(Status::Busy) | Some(Status::Conflict) | None => self.handshake,
            _ => self.handshake.take(),
        };

        let (text, prompt, hide_input) = match (status, handshake) {
            (Some(Status::Auth), _) | (Some(Status::Error), Some(ClientState::Auth)) => {
                self.state = ClientState::Auth;
                (text, Some(PASSWORD_PROMPT), true)
            }
            (Some(Status::NeedInput), _) => {
                self.state = ClientState::NeedInput;
                (text, Some(PROMPT), false)
            }
            (Some(Status::Error), Some(back)) => {
                self.state = back;
                (text, Some(PROMPT), false)
            }
            (Some(Status::Ok), _) | (Some(Status::Error), None) => {
                self.state = ClientState::Ready;
                (text, Some(PROMPT), false)
            }
            (Some(Status::Busy), _) => {
                self.state = ClientState::Processing;
                ("Server is busy.\n".to_string(), None, false)
            }
            (Some(Status::Conflict), _) => (text, None, false),
            (Some(Status::Exit), _) => {
                self.state = ClientState::Exit;
                (text, None, false)
            }
            (None, _) => {
                warn!("Unknown response status {:?}", response.status);
                (text, None, false)
            }
        };

        Render {
            text,
            prompt,
            hide_input,
        }
    }

    fn send(&mut self, request: Request) -> Action {
        self.state = ClientState::Processing;
        Action::Send(request)
    }

    fn on_command(&mut self, line: &str) -> Action {
        let mut tokens = line.split_whitespace();
        let Some(token) = tokens.next() else {
            return Action::Print(PROMPT.into());
        };
        let Some(command) = LocalCommand::parse(token) else {
            return local_error(&format!("Invalid command \"{token}\"."));
        };
        let first = tokens.next();
        let second = tokens.next();

        let request = match (command, first, second) {
            (LocalCommand::Help, _, _) => return Action::Print(help()),
            (LocalCommand::List, path, _) => {
                Request::with_args(Command::List, path.unwrap_or_default(), "")
            }
            (LocalCommand::Upload, Some(local), remote) => {
                Request::with_args(Command::Upload, local, remote.unwrap_or_default())
            }
            (LocalCommand::Upload, None, _) => {
                return local_error("Missing local path argument.");
            }
            (LocalCommand::Download, Some(remote), local) => {
                Request::with_args(Command::Download, remote, local.unwrap_or_default())
            }
            (LocalCommand::Download, None, _) => {
                return local_error("Missing remote path argument.");
            }
            (LocalCommand::Delete, Some(path), _) => {
                Request::with_args(Command::Delete, path, "")
            }
            (LocalCommand::Cd, Some(path), _) => Request::with_args(Command::Cd, path, ""),
            (LocalCommand::Mkdir, Some(path), _) => Request::with_args(Command::Mkdir, path, ""),
            (LocalCommand::Rmdir, Some(path), _) => Request::with_args(Command::Rmdir, path, ""),
            (
                LocalCommand::Delete | LocalCommand::Cd | LocalCommand::Mkdir | LocalCommand::Rmdir,
                None,
                _,
            ) => {
                return local_error("Missing path argument.");
            }
            (LocalCommand::Move, Some(source), Some(dest)) => {
                Request::with_args(Command::Move, source, dest)
            }
            (LocalCommand::Copy, Some(source), Some(dest)) => {
                Request::with_args(Command::Copy, source, dest)
            }
            (LocalCommand::Sync, Some(source), Some(dest)) => {
                Request::with_args(Command::Sync, source, dest)
            }
            (LocalCommand::Move | LocalCommand::Copy | LocalCommand::Sync, _, _) => {
                return local_error("Missing source or destination path argument.");
            }
        };

        self.send(request)
    }
}

fn local_error(message: &str) -> Action {
    Action::Print(format!(
        "{}: {}\n{}",
        Code::BadRequest.as_u16(),
        message,
        PROMPT
    ))
}

fn help() -> String {
    let mut text = String::from("Commands:\n");
    for command in LocalCommand::ALL {
        text.push_str("  ");
        text.push_str(command.usage());
        text.push('\n');
    }
    text.push_str("  EXIT\n");
    text.push_str("Paths starting with / are relative to your home directory.\n");
    text.push_str(PROMPT);
    text
}
