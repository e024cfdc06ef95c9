//! The publisher: copies every file in the site directory to the remote
//! destination, one file at a time. Failed files are reported and the rest
//! are still attempted; rejected credentials end the run.

use crate::config::Config;
use crate::transport::{self, Error as TransportError, Transport};
use crate::util::remote_join;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A file that couldn't be published, and why.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Failure {
    /// The file's path relative to the site directory.
    pub path: PathBuf,
    pub reason: String,
}

/// The outcome of a publish run that wasn't aborted.
#[derive(Debug, Default)]
pub struct PublishReport {
    /// Files copied, relative to the site directory.
    pub uploaded: Vec<PathBuf>,

    /// Files that failed, in the order they were attempted.
    pub failed: Vec<Failure>,
}

impl PublishReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Publishes the site described by `config` to its configured remote.
pub fn publish_site(config: &Config) -> Result<PublishReport> {
    let remote = config.remote.as_ref().ok_or(Error::NoRemote)?;
    log::info!(
        "publishing {} to {:?}://{}:{}",
        config.site_directory.display(),
        remote.transport,
        remote.host,
        remote.destination
    );
    let mut transport = transport::connect(remote);
    Publisher {
        transport: transport.as_mut(),
        destination: &remote.destination,
    }
    .publish(&config.site_directory)
}

/// Copies a site directory over a [`Transport`].
pub struct Publisher<'a> {
    pub transport: &'a mut dyn Transport,

    /// The remote directory the site directory maps to.
    pub destination: &'a str,
}

impl Publisher<'_> {
    /// Publishes every file under `site_directory`, in file-name order.
    pub fn publish(&mut self, site_directory: &Path) -> Result<PublishReport> {
        if !site_directory.is_dir() {
            return Err(Error::MissingSite(site_directory.to_owned()));
        }
        let files = site_files(site_directory)?;

        self.transport.open().map_err(|err| match err.is_auth() {
            true => Error::Auth(err),
            false => Error::Connect(err),
        })?;

        let result = self.transfer(site_directory, &files);
        if let Err(e) = self.transport.close() {
            log::warn!("closing transport: {}", e);
        }
        result
    }

    fn transfer(&mut self, site_directory: &Path, files: &[PathBuf]) -> Result<PublishReport> {
        let mut report = PublishReport::default();
        let mut seen_dirs: HashSet<PathBuf> = HashSet::new();

        for relative in files {
            let dir = relative.parent().unwrap_or_else(|| Path::new(""));
            if seen_dirs.insert(dir.to_owned()) {
                let remote_dir = remote_join(self.destination, dir);
                if let Err(err) = self.transport.mkdir(&remote_dir) {
                    if err.is_auth() {
                        return Err(Error::Auth(err));
                    }
                    // The upload below reports the file if the directory
                    // really is missing.
                    log::warn!("creating {}: {}", remote_dir, err);
                }
            }

            let remote = remote_join(self.destination, relative);
            match self.transport.put(&site_directory.join(relative), &remote) {
                Ok(()) => {
                    log::info!("uploaded {}", remote);
                    report.uploaded.push(relative.clone());
                }
                Err(err) if err.is_auth() => return Err(Error::Auth(err)),
                Err(err) => {
                    log::warn!("uploading {}: {}", relative.display(), err);
                    report.failed.push(Failure {
                        path: relative.clone(),
                        reason: err.to_string(),
                    });
                }
            }
        }
        Ok(report)
    }
}

/// Lists the files under `site_directory` relative to it, sorted by path.
fn site_files(site_directory: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let walker = WalkDir::new(site_directory)
        .min_depth(1)
        .sort_by(|a, b| a.file_name().cmp(b.file_name()));
    for result in walker {
        let entry = result?;
        if entry.file_type().is_file() {
            if let Ok(relative) = entry.path().strip_prefix(site_directory) {
                files.push(relative.to_owned());
            }
        }
    }
    Ok(files)
}

/// The result of a fallible publish operation.
pub type Result<T> = std::result::Result<T, Error>;

/// The failures that abort a publish run. Per-file failures are reported in
/// [`PublishReport::failed`] instead.
#[derive(Debug)]
pub enum Error {
    /// Returned when the configuration has no `publish` section.
    NoRemote,

    /// Returned when the site hasn't been built.
    MissingSite(PathBuf),

    /// Returned when the remote host rejects the credentials.
    Auth(TransportError),

    /// Returned when the session can't be established for another reason.
    Connect(TransportError),

    /// Returned when the site directory can't be walked.
    WalkDir(walkdir::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::NoRemote => write!(f, "No `publish` section in the configuration"),
            Error::MissingSite(path) => write!(
                f,
                "Site directory `{}` doesn't exist; render the site first",
                path.display()
            ),
            Error::Auth(err) => write!(f, "Publishing aborted: {}", err),
            Error::Connect(err) => write!(f, "Connecting to the remote host: {}", err),
            Error::WalkDir(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::NoRemote | Error::MissingSite(_) => None,
            Error::Auth(err) | Error::Connect(err) => Some(err),
            Error::WalkDir(err) => Some(err),
        }
    }
}

impl From<walkdir::Error> for Error {
    fn from(err: walkdir::Error) -> Error {
        Error::WalkDir(err)
    }
}
