use std::fmt;

use serde::{Deserialize, Serialize};

/// Client to server message. Every field is always present on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub cmd: String,
    pub first_argument: String,
    pub second_argument: String,
    pub size: u32,
    pub hash: String,
}

impl Request {
    pub fn new(command: Command) -> Self {
        Self {
            cmd: command.as_str().to_string(),
            ..Default::default()
        }
    }

    pub fn with_args(
        command: Command,
        first_argument: impl Into<String>,
        second_argument: impl Into<String>,
    ) -> Self {
        Self {
            cmd: command.as_str().to_string(),
            first_argument: first_argument.into(),
            second_argument: second_argument.into(),
            ..Default::default()
        }
    }

    /// Resolves the command string. `None` for anything outside the command set.
    pub fn command(&self) -> Option<Command> {
        Command::parse(&self.cmd)
    }
}

/// Server to client message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub status: String,
    pub code: u16,
    pub message: String,
    pub hash: String,
}

impl Response {
    pub fn new(status: Status, code: Code, message: impl Into<String>) -> Self {
        Self {
            status: status.as_str().to_string(),
            code: code.as_u16(),
            message: message.into(),
            hash: String::new(),
        }
    }

    pub fn ok(message: impl Into<String>) -> Self {
        Self::new(Status::Ok, Code::Ok, message)
    }

    pub fn error(code: Code, message: impl Into<String>) -> Self {
        Self::new(Status::Error, code, message)
    }

    pub fn status(&self) -> Option<Status> {
        Status::parse(&self.status)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Login,
    Auth,
    NeedInput,
    List,
    Upload,
    Download,
    Delete,
    Cd,
    Mkdir,
    Rmdir,
    Move,
    Copy,
    Sync,
    Exit,
}

impl Command {
    pub const ALL: [Command; 14] = [
        Command::Login,
        Command::Auth,
        Command::NeedInput,
        Command::List,
        Command::Upload,
        Command::Download,
        Command::Delete,
        Command::Cd,
        Command::Mkdir,
        Command::Rmdir,
        Command::Move,
        Command::Copy,
        Command::Sync,
        Command::Exit,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Command::Login => "LOGIN",
            Command::Auth => "AUTH",
            Command::NeedInput => "NEED_INPUT",
            Command::List => "LIST",
            Command::Upload => "UPLOAD",
            Command::Download => "DOWNLOAD",
            Command::Delete => "DELETE",
            Command::Cd => "CD",
            Command::Mkdir => "MKDIR",
            Command::Rmdir => "RMDIR",
            Command::Move => "MOVE",
            Command::Copy => "COPY",
            Command::Sync => "SYNC",
            Command::Exit => "EXIT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|command| command.as_str() == s)
    }

    /// Commands that touch the user's files and therefore require a ready session.
    pub fn is_filesystem(self) -> bool {
        !matches!(
            self,
            Command::Login | Command::Auth | Command::NeedInput | Command::Exit
        )
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Error,
    NeedInput,
    Auth,
    Conflict,
    Busy,
    Exit,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::Error => "ERROR",
            Status::NeedInput => "NEED_INPUT",
            Status::Auth => "AUTH",
            Status::Conflict => "CONFLICT",
            Status::Busy => "BUSY",
            Status::Exit => "EXIT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        [
            Status::Ok,
            Status::Error,
            Status::NeedInput,
            Status::Auth,
            Status::Conflict,
            Status::Busy,
            Status::Exit,
        ]
        .into_iter()
        .find(|status| status.as_str() == s)
    }
}

/// Numeric result codes. The values follow HTTP and never change within a
/// protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Code {
    Ok = 200,
    Accepted = 202,
    BadRequest = 400,
    Unauthorized = 401,
    Forbidden = 403,
    NotFound = 404,
    Conflict = 409,
    PreconditionFailed = 412,
    InternalServerError = 500,
    ServiceUnavailable = 503,
}

impl Code {
    pub fn as_u16(self) -> u16 {
        self as u16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_parse_matches_wire_names() {
        for command in Command::ALL {
            assert_eq!(Command::parse(command.as_str()), Some(command));
        }
        assert_eq!(Command::parse("list"), None);
        assert_eq!(Command::parse("CHMOD"), None);
    }

    #[test]
    fn test_filesystem_commands() {
        assert!(Command::Mkdir.is_filesystem());
        assert!(Command::Upload.is_filesystem());
        assert!(!Command::Login.is_filesystem());
        assert!(!Command::Exit.is_filesystem());
    }

    #[test]
    fn test_request_json_shape() {
        let request = Request::with_args(Command::Move, "a.txt", "b.txt");
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["cmd"], "MOVE");
        assert_eq!(value["first_argument"], "a.txt");
        assert_eq!(value["second_argument"], "b.txt");
        assert_eq!(value["size"], 0);
        assert_eq!(value["hash"], "");
    }

    #[test]
    fn test_request_missing_field_is_rejected() {
        let result: Result<Request, _> = serde_json::from_str(r#"{"cmd":"LIST"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_response_status_and_code() {
        let response = Response::error(Code::PreconditionFailed, "Directory already exists.");
        assert_eq!(response.status(), Some(Status::Error));
        assert_eq!(response.code, 412);

        let unknown = Response {
            status: "TEAPOT".into(),
            ..Default::default()
        };
        assert_eq!(unknown.status(), None);
    }
}
