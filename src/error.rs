//! Error management.

use derive_more::Display;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display)]
pub enum Error {
    #[display(fmt = "usage: {}", _0)]
    Usage(String),
    #[display(fmt = "cannot read input '{}': {}", path, message)]
    Input { path: String, message: String },
    #[display(fmt = "malformed edge line '{}': {}", line, message)]
    Parse { line: String, message: String },
    #[display(fmt = "codec error: {}", _0)]
    Codec(String),
    #[display(fmt = "protocol error: {}", _0)]
    Protocol(String),
    #[display(fmt = "transport error: {}", _0)]
    Transport(std::io::Error),
    #[display(fmt = "aborted by rank 0: {}", _0)]
    Aborted(String),
    #[display(fmt = "cannot write output: {}", _0)]
    Output(std::io::Error),
}

impl std::error::Error for Error {}

impl Error {
    pub(crate) fn disconnected(peer: usize) -> Self {
        Error::Transport(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            format!("rank {} left the group", peer),
        ))
    }
}
