//! The site assembler: writes rendered pages and static assets into a fresh
//! staging directory next to the site directory, then swaps the staging
//! directory into place. A failed build never leaves a half-written site
//! behind; the previous site stays as it was.

use crate::render::RenderedPage;
use std::collections::HashSet;
use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A static asset: its absolute source path and its destination path
/// relative to the site directory.
pub type StaticFile = (PathBuf, PathBuf);

/// Writes a complete site into `site_directory`.
pub struct Assembler<'a> {
    pub site_directory: &'a Path,
}

impl Assembler<'_> {
    /// Writes `pages` and copies `assets`, replacing whatever was in the site
    /// directory before. A page takes precedence over an asset with the same
    /// destination.
    pub fn assemble(&self, pages: &[RenderedPage], assets: &[StaticFile]) -> Result<()> {
        let staging = Staging::create(self.site_directory)?;
        let mut seen_dirs: HashSet<PathBuf> = HashSet::new();

        let page_paths: HashSet<&Path> = pages.iter().map(|p| p.path.as_path()).collect();
        for (source, destination) in assets {
            if page_paths.contains(destination.as_path()) {
                log::warn!(
                    "asset `{}` is shadowed by a rendered page",
                    destination.display()
                );
                continue;
            }
            let target = staging.path.join(destination);
            ensure_parent(&target, &mut seen_dirs)?;
            std::fs::copy(source, &target).map_err(|err| Error::Copy {
                source: source.clone(),
                destination: target.clone(),
                err,
            })?;
        }

        for page in pages {
            let target = staging.path.join(&page.path);
            ensure_parent(&target, &mut seen_dirs)?;
            write_file(&target, &page.contents)?;
        }

        log::info!(
            "wrote {} pages and {} assets to {}",
            pages.len(),
            assets.len(),
            self.site_directory.display()
        );
        staging.commit()
    }
}

/// Lists every file under `directory` except the top-level files named in
/// `exclude`, sorted by path, as static assets.
pub fn collect_assets(directory: &Path, exclude: &[&str]) -> Result<Vec<StaticFile>> {
    let mut assets = Vec::new();
    let walker = WalkDir::new(directory)
        .min_depth(1)
        .sort_by(|a, b| a.file_name().cmp(b.file_name()));
    for result in walker {
        let entry = result?;
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.depth() == 1
            && exclude
                .iter()
                .any(|name| entry.file_name() == std::ffi::OsStr::new(name))
        {
            continue;
        }
        // strip_prefix shouldn't fail since `directory` is always an ancestor
        // of the walked entries
        if let Ok(relative) = entry.path().strip_prefix(directory) {
            assets.push((entry.path().to_owned(), relative.to_owned()));
        }
    }
    Ok(assets)
}

fn ensure_parent(path: &Path, seen_dirs: &mut HashSet<PathBuf>) -> Result<()> {
    if let Some(dir) = path.parent() {
        if seen_dirs.insert(dir.to_owned()) {
            std::fs::create_dir_all(dir).map_err(|err| Error::Io {
                path: dir.to_owned(),
                err,
            })?;
        }
    }
    Ok(())
}

/// Writes `contents` to `path`. The handle is flushed explicitly so write
/// errors surface here rather than being swallowed on drop.
fn write_file(path: &Path, contents: &[u8]) -> Result<()> {
    let annotate = |err| Error::Io {
        path: path.to_owned(),
        err,
    };
    let mut w = BufWriter::new(File::create(path).map_err(annotate)?);
    w.write_all(contents).map_err(annotate)?;
    w.flush().map_err(annotate)?;
    Ok(())
}

/// A staging directory beside the site directory. Dropping it without
/// calling [`Staging::commit`] removes it.
struct Staging<'a> {
    path: PathBuf,
    site_directory: &'a Path,
    committed: bool,
}

impl<'a> Staging<'a> {
    fn create(site_directory: &'a Path) -> Result<Staging<'a>> {
        let path = sibling(site_directory, "staging");
        rmdir(&path)?;
        std::fs::create_dir_all(&path).map_err(|err| Error::Io {
            path: path.clone(),
            err,
        })?;
        Ok(Staging {
            path,
            site_directory,
            committed: false,
        })
    }

    /// Replaces the site directory with the staging directory. The old site
    /// is moved aside first and restored if the swap fails.
    fn commit(mut self) -> Result<()> {
        let backup = match self.site_directory.exists() {
            false => None,
            true => {
                let backup = sibling(self.site_directory, "old");
                rmdir(&backup)?;
                std::fs::rename(self.site_directory, &backup).map_err(|err| Error::Io {
                    path: self.site_directory.to_owned(),
                    err,
                })?;
                Some(backup)
            }
        };

        if let Err(err) = std::fs::rename(&self.path, self.site_directory) {
            if let Some(backup) = &backup {
                if let Err(e) = std::fs::rename(backup, self.site_directory) {
                    log::error!(
                        "could not restore previous site from {}: {}",
                        backup.display(),
                        e
                    );
                }
            }
            return Err(Error::Io {
                path: self.site_directory.to_owned(),
                err,
            });
        }
        self.committed = true;

        if let Some(backup) = backup {
            if let Err(e) = rmdir(&backup) {
                log::warn!("leaving previous site behind: {}", e);
            }
        }
        Ok(())
    }
}

impl Drop for Staging<'_> {
    fn drop(&mut self) {
        if !self.committed {
            if let Err(e) = std::fs::remove_dir_all(&self.path) {
                log::warn!("removing {}: {}", self.path.display(), e);
            }
        }
    }
}

/// `{parent}/.{name}.{suffix}` for the site directory `{parent}/{name}`.
fn sibling(site_directory: &Path, suffix: &str) -> PathBuf {
    let name = site_directory
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| String::from("site"));
    site_directory.with_file_name(format!(".{}.{}", name, suffix))
}

fn rmdir(dir: &Path) -> Result<()> {
    match std::fs::remove_dir_all(dir) {
        Ok(x) => Ok(x),
        Err(e) => match e.kind() {
            io::ErrorKind::NotFound => Ok(()),
            _ => Err(Error::Io {
                path: dir.to_owned(),
                err: e,
            }),
        },
    }
}

/// The result of a fallible assembly operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a failure to write the site. These are fatal to a build.
#[derive(Debug)]
pub enum Error {
    /// Returned when a file or directory can't be created, written, or moved.
    Io { path: PathBuf, err: io::Error },

    /// Returned when a static asset can't be copied.
    Copy {
        source: PathBuf,
        destination: PathBuf,
        err: io::Error,
    },

    /// Returned when the asset directory can't be walked.
    WalkDir(walkdir::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io { path, err } => write!(f, "Writing `{}`: {}", path.display(), err),
            Error::Copy {
                source,
                destination,
                err,
            } => write!(
                f,
                "Copying `{}` to `{}`: {}",
                source.display(),
                destination.display(),
                err
            ),
            Error::WalkDir(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io { err, .. } => Some(err),
            Error::Copy { err, .. } => Some(err),
            Error::WalkDir(err) => Some(err),
        }
    }
}

impl From<walkdir::Error> for Error {
    fn from(err: walkdir::Error) -> Error {
        Error::WalkDir(err)
    }
}
