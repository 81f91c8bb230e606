pub mod handlers;
pub mod session;
pub mod session_state;

pub use session::Session;
pub use session_state::SessionState;
