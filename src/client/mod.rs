pub mod client_state;
pub mod connection;

pub use client_state::{Action, ClientMachine, ClientState, Render};
pub use connection::run;
