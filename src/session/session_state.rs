use std::fmt;

/// Handshake and command progress of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Login,
    Auth,
    NeedInputRegister,
    /// Reserved for resumable transfers.
    NeedInputResume,
    Ready,
    Processing,
    Exit,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        self == SessionState::Exit
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Login => "LOGIN",
            SessionState::Auth => "AUTH",
            SessionState::NeedInputRegister => "NEED_INPUT_REGISTER",
            SessionState::NeedInputResume => "NEED_INPUT_RESUME",
            SessionState::Ready => "READY",
            SessionState::Processing => "PROCESSING",
            SessionState::Exit => "EXIT",
        };
        f.write_str(name)
    }
}
