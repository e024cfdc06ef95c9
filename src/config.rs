//! Loads the blog's `config` file into a [`Config`], the explicit settings
//! object that is passed through every stage of the pipeline.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use url::Url;

/// The name of the configuration file at the root of a blog directory.
pub const CONFIG_FILE: &str = "config";

#[derive(Deserialize)]
struct PageSize(usize);
impl Default for PageSize {
    fn default() -> Self {
        PageSize(10)
    }
}

/// The order in which the post loader yields posts.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Order {
    /// Lexicographic by source file name.
    Filename,

    /// Most recent publish date first, ties broken by file name.
    Date,
}

impl Default for Order {
    fn default() -> Self {
        Order::Filename
    }
}

/// The site author, used for the Atom feed.
#[derive(Deserialize, Clone, Debug)]
pub struct Author {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Selects which [`crate::transport::Transport`] publishes the site.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Scp,
    Ftp,
}

impl TransportKind {
    fn default_port(self) -> u16 {
        match self {
            TransportKind::Scp => 22,
            TransportKind::Ftp => 21,
        }
    }
}

#[derive(Deserialize)]
struct RemoteSection {
    transport: TransportKind,
    host: String,
    #[serde(default)]
    port: Option<u16>,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    identity_file: Option<PathBuf>,
    destination: String,
}

/// Describes where and how the site is published.
#[derive(Clone, Debug)]
pub struct Remote {
    pub transport: TransportKind,
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
    pub identity_file: Option<PathBuf>,
    pub destination: String,
}

#[derive(Deserialize, Default)]
struct Project {
    #[serde(default)]
    title: String,

    #[serde(default)]
    author: Option<Author>,

    #[serde(default)]
    url: Option<Url>,

    #[serde(default)]
    template: Option<String>,

    #[serde(default)]
    index_page_size: PageSize,

    #[serde(default)]
    order: Order,

    #[serde(default)]
    publish: Option<RemoteSection>,
}

pub struct Config {
    pub root_directory: PathBuf,
    pub title: String,
    pub author: Option<Author>,

    /// The base URL of the site. Always ends in a trailing slash so it can be
    /// [`Url::join`]ed onto.
    pub site_url: Url,
    pub template_name: String,
    pub posts_directory: PathBuf,
    pub template_directory: PathBuf,
    pub site_directory: PathBuf,
    pub index_page_size: usize,
    pub order: Order,
    pub remote: Option<Remote>,
}

impl Config {
    /// Loads the configuration for the blog rooted at `dir`. A missing
    /// `config` file yields the defaults.
    pub fn from_directory(dir: &Path) -> Result<Config> {
        let root = dir
            .canonicalize()
            .with_context(|| format!("Resolving blog directory `{}`", dir.display()))?;
        let path = root.join(CONFIG_FILE);
        let project = if path.is_file() {
            let mut contents = String::new();
            crate::util::open(&path, "configuration")?.read_to_string(&mut contents)?;
            Config::parse_project(&contents)
                .with_context(|| format!("Loading configuration `{}`", path.display()))?
        } else {
            log::debug!("no `{}` in {}, using defaults", CONFIG_FILE, root.display());
            Project::default()
        };
        Config::from_project(root, project)
    }

    fn parse_project(contents: &str) -> Result<Project> {
        if contents.trim().is_empty() {
            return Ok(Project::default());
        }
        Ok(serde_yaml::from_str(contents)?)
    }

    fn from_project(root: PathBuf, project: Project) -> Result<Config> {
        if project.index_page_size.0 < 1 {
            return Err(anyhow!("`index_page_size` must be at least 1"));
        }

        let site_directory = root.join("site");
        let mut site_url = match project.url {
            Some(url) => url,
            None => Url::from_directory_path(&site_directory).map_err(|()| {
                anyhow!(
                    "Can't derive a site URL from `{}`",
                    site_directory.display()
                )
            })?,
        };
        if !site_url.path().ends_with('/') {
            let path = format!("{}/", site_url.path());
            site_url.set_path(&path);
        }

        let template_name = project.template.unwrap_or_else(|| String::from("default"));
        let remote = project.publish.map(|section| Remote {
            port: section
                .port
                .unwrap_or_else(|| section.transport.default_port()),
            transport: section.transport,
            host: section.host,
            user: section.user,
            password: section.password,
            identity_file: section.identity_file.map(|p| root.join(p)),
            destination: section.destination,
        });

        Ok(Config {
            title: project.title,
            author: project.author,
            site_url,
            posts_directory: root.join("posts"),
            template_directory: root.join("template").join(&template_name),
            template_name,
            site_directory,
            index_page_size: project.index_page_size.0,
            order: project.order,
            remote,
            root_directory: root,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_without_config_file() -> Result<()> {
        let dir = TempDir::new()?;
        let config = Config::from_directory(dir.path())?;
        assert_eq!("default", config.template_name);
        assert_eq!(10, config.index_page_size);
        assert_eq!(Order::Filename, config.order);
        assert!(config.remote.is_none());
        assert_eq!("file", config.site_url.scheme());
        assert!(config.site_url.path().ends_with("/site/"));
        assert!(config.template_directory.ends_with("template/default"));
        Ok(())
    }

    #[test]
    fn test_full_config() -> Result<()> {
        let dir = TempDir::new()?;
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "title: Notes\n\
             url: https://example.org/blog\n\
             template: plain\n\
             index_page_size: 3\n\
             order: date\n\
             publish:\n\
             \x20 transport: ftp\n\
             \x20 host: ftp.example.org\n\
             \x20 user: alice\n\
             \x20 password: hunter2\n\
             \x20 destination: /htdocs\n",
        )?;
        let config = Config::from_directory(dir.path())?;
        assert_eq!("Notes", config.title);
        assert_eq!("https://example.org/blog/", config.site_url.as_str());
        assert_eq!("plain", config.template_name);
        assert_eq!(3, config.index_page_size);
        assert_eq!(Order::Date, config.order);
        let remote = config.remote.expect("publish section");
        assert_eq!(TransportKind::Ftp, remote.transport);
        assert_eq!(21, remote.port);
        assert_eq!(Some(String::from("alice")), remote.user);
        assert_eq!("/htdocs", remote.destination);
        Ok(())
    }

    #[test]
    fn test_rejects_zero_page_size() -> Result<()> {
        let dir = TempDir::new()?;
        std::fs::write(dir.path().join(CONFIG_FILE), "index_page_size: 0\n")?;
        assert!(Config::from_directory(dir.path()).is_err());
        Ok(())
    }

    #[test]
    fn test_rejects_unknown_transport() -> Result<()> {
        let dir = TempDir::new()?;
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "publish:\n  transport: rsync\n  host: h\n  destination: /d\n",
        )?;
        assert!(Config::from_directory(dir.path()).is_err());
        Ok(())
    }
}
