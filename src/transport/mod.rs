//! The [`Transport`] capability used by the publisher, with one
//! implementation per [`TransportKind`]. Adding a transport means adding a
//! variant and an arm to [`connect`]; the publisher doesn't change.

mod ftp;
mod scp;

pub use ftp::FtpTransport;
pub use scp::ScpTransport;

use crate::config::{Remote, TransportKind};
use std::fmt;
use std::path::Path;

/// A session with a remote host that files can be copied to. Calls are
/// synchronous; timeouts are the implementation's business.
pub trait Transport {
    /// Establishes the session. Called once before any other method.
    fn open(&mut self) -> Result<()>;

    /// Creates `remote_dir` (and its parents) if it doesn't exist.
    fn mkdir(&mut self, remote_dir: &str) -> Result<()>;

    /// Copies the local file at `local` to the remote path `remote`.
    fn put(&mut self, local: &Path, remote: &str) -> Result<()>;

    /// Ends the session.
    fn close(&mut self) -> Result<()>;
}

/// Returns the transport selected by `remote.transport`.
pub fn connect(remote: &Remote) -> Box<dyn Transport> {
    match remote.transport {
        TransportKind::Scp => Box::new(ScpTransport::new(remote.clone())),
        TransportKind::Ftp => Box::new(FtpTransport::new(remote.clone())),
    }
}

/// The result of a fallible transport operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a failed transport operation.
#[derive(Debug)]
pub enum Error {
    /// The remote host rejected the credentials.
    Auth(String),

    /// A network, remote, or tool failure affecting one operation.
    Transfer(String),

    /// A local I/O failure, e.g. the file to upload can't be read.
    Io(std::io::Error),
}

impl Error {
    pub fn is_auth(&self) -> bool {
        matches!(self, Error::Auth(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Auth(msg) => write!(f, "authentication failed: {}", msg),
            Error::Transfer(msg) => msg.fmt(f),
            Error::Io(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Auth(_) | Error::Transfer(_) => None,
            Error::Io(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}
