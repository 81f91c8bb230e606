pub mod codec;
pub mod message;

pub use codec::{encode, read_message, write_message};
pub use message::{Code, Command, Request, Response, Status};
