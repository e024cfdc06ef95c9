//! Publishes over the legacy file transfer protocol with [`suppaftp`].

use super::{Error, Result, Transport};
use crate::config::Remote;
use std::fs::File;
use std::path::Path;
use suppaftp::types::FileType;
use suppaftp::{FtpError, FtpStream, Status};

pub struct FtpTransport {
    remote: Remote,
    stream: Option<FtpStream>,
}

impl FtpTransport {
    pub fn new(remote: Remote) -> FtpTransport {
        FtpTransport {
            remote,
            stream: None,
        }
    }

    fn stream(&mut self) -> Result<&mut FtpStream> {
        self.stream
            .as_mut()
            .ok_or_else(|| Error::Transfer(String::from("transport is not open")))
    }
}

/// Maps a `530 Not logged in` reply to [`Error::Auth`] and anything else,
/// including other negative replies to USER/PASS, to [`Error::Transfer`].
fn classify(err: FtpError) -> Error {
    match &err {
        FtpError::UnexpectedResponse(response)
            if matches!(response.status, Status::NotLoggedIn) =>
        {
            Error::Auth(err.to_string())
        }
        _ => Error::Transfer(err.to_string()),
    }
}

impl Transport for FtpTransport {
    fn open(&mut self) -> Result<()> {
        let address = format!("{}:{}", self.remote.host, self.remote.port);
        log::debug!("connecting to ftp://{}", address);
        let mut stream = FtpStream::connect(&address).map_err(classify)?;

        let (user, password) = match &self.remote.user {
            Some(user) => (user.clone(), self.remote.password.clone().unwrap_or_default()),
            None => (String::from("anonymous"), String::from("anonymous")),
        };
        if let Err(err) = stream.login(user.as_str(), password.as_str()) {
            let _ = stream.quit();
            return Err(classify(err));
        }
        stream.transfer_type(FileType::Binary).map_err(classify)?;
        self.stream = Some(stream);
        Ok(())
    }

    fn mkdir(&mut self, remote_dir: &str) -> Result<()> {
        let stream = self.stream()?;
        // FTP has no `mkdir -p`; create each ancestor and ignore failures for
        // directories that already exist.
        let absolute = remote_dir.starts_with('/');
        let mut path = String::new();
        for component in remote_dir.split('/').filter(|c| !c.is_empty()) {
            if absolute || !path.is_empty() {
                path.push('/');
            }
            path.push_str(component);
            match stream.mkdir(path.as_str()) {
                Ok(()) => log::debug!("created {}", path),
                Err(FtpError::UnexpectedResponse(response))
                    if matches!(response.status, Status::FileUnavailable) => {}
                Err(err) => return Err(classify(err)),
            }
        }
        Ok(())
    }

    fn put(&mut self, local: &Path, remote: &str) -> Result<()> {
        let mut file = File::open(local)?;
        let stream = self.stream()?;
        stream.put_file(remote, &mut file).map_err(classify)?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            stream.quit().map_err(classify)?;
        }
        Ok(())
    }
}
