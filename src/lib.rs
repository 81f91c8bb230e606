//! MiniDrive: a personal remote-storage server and its interactive client.
//!
//! Client and server exchange length-prefixed JSON messages over one TCP
//! connection. Each connection walks a login/registration handshake, after
//! which filesystem commands run inside the user's private directory (or the
//! shared public one).

pub mod accounts;
pub mod args;
pub mod client;
pub mod error;
pub mod protocol;
pub mod sandbox;
pub mod server;
pub mod session;
pub mod terminal;
pub mod transfer;
