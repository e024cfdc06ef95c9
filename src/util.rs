use anyhow::{anyhow, Result};
use std::fs::File;
use std::path::Path;

pub fn open(path: &Path, kind: &str) -> Result<File> {
    match File::open(path) {
        Err(e) => Err(anyhow!("Opening {} file `{}`: {}", kind, path.display(), e)),
        Ok(file) => Ok(file),
    }
}

/// Renders a relative path with `/` separators regardless of the local
/// platform's separator, for use in URLs and remote paths.
pub fn slash_path(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Joins `relative` onto a remote directory.
pub fn remote_join(base: &str, relative: &Path) -> String {
    let relative = slash_path(relative);
    if relative.is_empty() {
        return base.to_owned();
    }
    if base.is_empty() {
        return relative;
    }
    format!("{}/{}", base.trim_end_matches('/'), relative)
}
