//! Defines the [`Parser`] (the post loader), the [`Posts`] sequence it
//! produces, and the [`Error`] returned for posts that can't be loaded.

use std::{
    collections::BTreeSet,
    ffi::OsStr,
    fmt,
    fs::{read_dir, File},
    path::{Path, PathBuf},
};

use chrono::NaiveDate;
use serde::Deserialize;
use url::Url;

use crate::config::Order;
use crate::post::{
    slug_for_stem, split_date_prefix, Post, DATE_FORMAT, MARKDOWN_EXTENSIONS,
};
use crate::url::Converter as LinkConverter;
use crate::{markdown, tag::Tag};

/// File stems in the posts directory that are never treated as posts.
const IGNORED_STEMS: &[&str] = &["README", "TEMPLATE"];

/// Loads [`Post`] objects from the posts directory.
#[derive(Clone, Copy)]
pub struct Parser<'a> {
    /// The directory containing the Markdown sources.
    posts_directory: &'a Path,

    /// The base URL of the site. Post pages live directly beneath it
    /// (`{site_url}/{slug}.html`), as do tag indices.
    site_url: &'a Url,

    /// The order in which [`Parser::posts`] yields posts.
    order: Order,
}

impl<'a> Parser<'a> {
    pub fn new(posts_directory: &'a Path, site_url: &'a Url, order: Order) -> Parser<'a> {
        Parser {
            posts_directory,
            site_url,
            order,
        }
    }

    /// Scans the posts directory and returns the sequence of posts in it.
    /// Each source file is a post if its extension is `.md` or `.markdown`
    /// and its stem isn't `README` or `TEMPLATE`. A post file is structured
    /// as follows:
    ///
    /// 1. Optionally, YAML frontmatter between `---` fences with fields
    ///    `title`, `author`, `date` and `tags`.
    /// 2. The post body.
    ///
    /// For example:
    ///
    /// ```md
    /// ---
    /// title: Hello, world!
    /// author: Ann
    /// date: 2024-01-01
    /// tags: [greet]
    /// ---
    /// # Hello
    ///
    /// World
    /// ```
    ///
    /// In filename order the posts are parsed lazily as the sequence is
    /// consumed. Each call rescans the directory.
    pub fn posts(&self) -> Result<Posts<'a>> {
        let sources = self.sources().map_err(|e| Error::Post {
            path: self.posts_directory.to_owned(),
            err: Box::new(e),
        })?;
        log::debug!(
            "found {} post sources in {}",
            sources.len(),
            self.posts_directory.display()
        );

        let inner = match self.order {
            Order::Filename => Inner::Lazy(sources.into_iter()),
            Order::Date => {
                let mut results: Vec<Result<Post>> = sources
                    .iter()
                    .map(|source| self.parse_post(source))
                    .collect();
                // Failures first (already in filename order), then posts
                // most recent first.
                results.sort_by(|a, b| match (a, b) {
                    (Ok(a), Ok(b)) => Post::index_order(a, b),
                    (Err(_), Ok(_)) => std::cmp::Ordering::Less,
                    (Ok(_), Err(_)) => std::cmp::Ordering::Greater,
                    (Err(_), Err(_)) => std::cmp::Ordering::Equal,
                });
                Inner::Eager(results.into_iter())
            }
        };
        Ok(Posts {
            parser: *self,
            inner,
        })
    }

    fn sources(&self) -> Result<Vec<PathBuf>> {
        let mut sources = Vec::new();
        for result in read_dir(self.posts_directory)? {
            let entry = result?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let is_markdown = path
                .extension()
                .and_then(OsStr::to_str)
                .map(|ext| MARKDOWN_EXTENSIONS.contains(&ext))
                .unwrap_or(false);
            let is_ignored = path
                .file_stem()
                .and_then(OsStr::to_str)
                .map(|stem| IGNORED_STEMS.contains(&stem))
                .unwrap_or(false);
            if is_markdown && !is_ignored {
                sources.push(PathBuf::from(entry.file_name()));
            } else {
                log::debug!("ignoring {}", path.display());
            }
        }
        sources.sort();
        Ok(sources)
    }

    /// Parses a single [`Post`] from `file_name`, a path relative to the posts
    /// directory. Errors are annotated with the file name.
    pub fn parse_post(&self, file_name: &Path) -> Result<Post> {
        match self._parse_post(file_name) {
            Ok(p) => Ok(p),
            Err(e) => Err(Error::Post {
                path: file_name.to_owned(),
                err: Box::new(e),
            }),
        }
    }

    fn _parse_post(&self, file_name: &Path) -> Result<Post> {
        use std::io::Read;
        let mut contents = String::new();
        File::open(self.posts_directory.join(file_name))?.read_to_string(&mut contents)?;

        let stem = file_name
            .file_stem()
            .and_then(OsStr::to_str)
            .ok_or_else(|| Error::InvalidFileName(file_name.to_owned()))?;
        let (file_date, _) = split_date_prefix(stem);
        let slug = slug_for_stem(stem);
        if slug.is_empty() {
            return Err(Error::InvalidFileName(file_name.to_owned()));
        }

        let (frontmatter, body, title) = match split_frontmatter(&contents)? {
            Some((yaml, body)) => {
                let frontmatter = Frontmatter::from_yaml(yaml)?;
                let title = frontmatter
                    .title
                    .clone()
                    .map(|t| t.trim().to_owned())
                    .filter(|t| !t.is_empty());
                (frontmatter, body, title)
            }
            None => (
                Frontmatter::default(),
                contents.as_str(),
                markdown::first_heading(&contents),
            ),
        };
        let has_frontmatter = frontmatter.present;
        let title = title.ok_or(Error::MissingTitle)?;

        let date = match &frontmatter.date {
            Some(date) => Some(
                NaiveDate::parse_from_str(date.trim(), DATE_FORMAT)
                    .map_err(|e| Error::InvalidDate(date.clone(), e))?,
            ),
            None => file_date,
        };

        let page = format!("{}.html", slug);
        let mut post = Post {
            source: file_name.to_owned(),
            title,
            author: frontmatter
                .author
                .as_deref()
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(str::to_owned),
            date,
            url: self.site_url.join(&page)?,
            file_path: PathBuf::from(&page),
            tags: frontmatter
                .tags
                .iter()
                .filter_map(|t| Tag::new(t, self.site_url))
                .collect::<BTreeSet<Tag>>(),
            body: String::default(),
            slug,
        };

        let link_converter = LinkConverter::new(self.site_url, &page)?;
        markdown::to_html(&mut post.body, &link_converter, body, !has_frontmatter);
        Ok(post)
    }
}

/// Splits `input` into its YAML frontmatter and body. Returns `None` when the
/// first line isn't a `---` fence.
fn split_frontmatter(input: &str) -> Result<Option<(&str, &str)>> {
    const FENCE: &str = "---";
    let input = input.strip_prefix('\u{feff}').unwrap_or(input);
    let rest = match input.strip_prefix(FENCE) {
        Some(rest) => rest,
        None => return Ok(None),
    };
    let rest = match rest.find('\n') {
        Some(i) if rest[..i].trim().is_empty() => &rest[i + 1..],
        _ => return Ok(None),
    };

    let (yaml, after_fence) = if rest.starts_with(FENCE) {
        ("", &rest[FENCE.len()..])
    } else {
        match rest.find("\n---") {
            Some(i) => (&rest[..i + 1], &rest[i + 1 + FENCE.len()..]),
            None => return Err(Error::FrontmatterMissingEndFence),
        }
    };
    let body = match after_fence.find('\n') {
        Some(i) => &after_fence[i + 1..],
        None => "",
    };
    Ok(Some((yaml, body)))
}

#[derive(Deserialize, Clone, Default)]
struct Frontmatter {
    /// The title of the post.
    #[serde(default, alias = "Title")]
    pub title: Option<String>,

    /// The post's author, overriding the site author in the feed.
    #[serde(default, alias = "Author")]
    pub author: Option<String>,

    /// The date of the post, `YYYY-MM-DD`.
    #[serde(default, alias = "Date")]
    pub date: Option<String>,

    /// The tags associated with the post.
    #[serde(default, alias = "Tags")]
    pub tags: Vec<String>,

    #[serde(skip)]
    present: bool,
}

impl Frontmatter {
    fn from_yaml(yaml: &str) -> Result<Frontmatter> {
        let mut frontmatter = if yaml.trim().is_empty() {
            Frontmatter::default()
        } else {
            serde_yaml::from_str::<Frontmatter>(yaml)?
        };
        frontmatter.present = true;
        Ok(frontmatter)
    }
}

/// A lazy sequence of parse results, one per post source. See
/// [`Parser::posts`].
pub struct Posts<'a> {
    parser: Parser<'a>,
    inner: Inner,
}

enum Inner {
    Lazy(std::vec::IntoIter<PathBuf>),
    Eager(std::vec::IntoIter<Result<Post>>),
}

impl Iterator for Posts<'_> {
    type Item = Result<Post>;

    fn next(&mut self) -> Option<Result<Post>> {
        match &mut self.inner {
            Inner::Lazy(sources) => {
                let source = sources.next()?;
                Some(self.parser.parse_post(&source))
            }
            Inner::Eager(results) => results.next(),
        }
    }
}

/// Represents the result of a [`Post`]-parse operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error parsing a [`Post`] object.
#[derive(Debug)]
pub enum Error {
    /// Returned when a post source file opens a frontmatter fence (`---`)
    /// but never closes it.
    FrontmatterMissingEndFence,

    /// Returned when there was an error parsing the frontmatter as YAML.
    DeserializeYaml(serde_yaml::Error),

    /// Returned when a post has frontmatter without a `title` or, lacking
    /// frontmatter, has no level-1 heading.
    MissingTitle,

    /// Returned when the frontmatter `date` isn't a `YYYY-MM-DD` date.
    InvalidDate(String, chrono::ParseError),

    /// Returned when there is a problem parsing URLs.
    UrlParse(url::ParseError),

    /// Returned for other I/O errors.
    Io(std::io::Error),

    /// Returned when a source file name isn't valid UTF-8 or yields an empty
    /// slug.
    InvalidFileName(PathBuf),

    /// An error annotated with the post source it concerns.
    Post { path: PathBuf, err: Box<Error> },
}

impl Error {
    /// The post source this error concerns, if known.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Error::Post { path, .. } => Some(path),
            Error::InvalidFileName(path) => Some(path),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::FrontmatterMissingEndFence => {
                write!(f, "Missing closing `---`")
            }
            Error::DeserializeYaml(err) => write!(f, "Invalid frontmatter: {}", err),
            Error::MissingTitle => write!(f, "Missing required `title`"),
            Error::InvalidDate(date, err) => {
                write!(f, "Invalid date `{}` (want YYYY-MM-DD): {}", date, err)
            }
            Error::UrlParse(err) => err.fmt(f),
            Error::Io(err) => err.fmt(f),
            Error::InvalidFileName(path) => write!(f, "invalid file name: {:?}", path),
            Error::Post { path, err } => {
                write!(f, "parsing post `{}`: {}", path.display(), err)
            }
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::FrontmatterMissingEndFence => None,
            Error::DeserializeYaml(err) => Some(err),
            Error::MissingTitle => None,
            Error::InvalidDate(_, err) => Some(err),
            Error::UrlParse(err) => Some(err),
            Error::Io(err) => Some(err),
            Error::InvalidFileName(_) => None,
            Error::Post { err, .. } => Some(err),
        }
    }
}

impl From<url::ParseError> for Error {
    /// Converts a [`url::ParseError`] into an [`Error`]. It allows us to use
    /// the `?` operator for URL parsing and joining functions.
    fn from(err: url::ParseError) -> Error {
        Error::UrlParse(err)
    }
}

impl From<serde_yaml::Error> for Error {
    /// Converts a [`serde_yaml::Error`] into an [`Error`]. It allows us to use
    /// the `?` operator for [`serde_yaml`] deserialization functions.
    fn from(err: serde_yaml::Error) -> Error {
        Error::DeserializeYaml(err)
    }
}

impl From<std::io::Error> for Error {
    /// Converts a [`std::io::Error`] into an [`Error`]. It allows us to
    // use the `?` operator for fallible I/O functions.
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tempfile::TempDir;

    type TestResult = std::result::Result<(), Box<dyn std::error::Error>>;

    fn fixture(files: &[(&str, &str)]) -> std::io::Result<TempDir> {
        let dir = TempDir::new()?;
        for (name, contents) in files {
            std::fs::write(dir.path().join(name), contents)?;
        }
        Ok(dir)
    }

    fn site_url() -> Url {
        Url::parse("https://example.com/").unwrap()
    }

    #[test]
    fn test_parse_posts() -> TestResult {
        let dir = fixture(&[
            (
                "2024-01-01-hello.md",
                "---\ntitle: Hello\nauthor: Ann\ntags: [Greet, rust]\n---\n\
                 # Hi\n\nWorld\n",
            ),
            ("simple.markdown", "---\nTitle: Simple\nDate: 0001-01-01\n---\nFirst day.\n"),
            ("README.md", "not a post"),
            ("notes.txt", "not a post either"),
        ])?;
        let site_url = site_url();
        let parser = Parser::new(dir.path(), &site_url, Order::Filename);
        let posts = parser.posts()?.collect::<Result<Vec<Post>>>()?;

        assert_eq!(2, posts.len());
        let hello = &posts[0];
        assert_eq!(PathBuf::from("2024-01-01-hello.md"), hello.source);
        assert_eq!("hello", hello.slug);
        assert_eq!("Hello", hello.title);
        assert_eq!(Some(String::from("Ann")), hello.author);
        assert_eq!(NaiveDate::from_ymd_opt(2024, 1, 1), hello.date);
        assert_eq!("https://example.com/hello.html", hello.url.as_str());
        assert_eq!(PathBuf::from("hello.html"), hello.file_path);
        assert_eq!("<h2>Hi</h2>\n<p>World</p>\n", hello.body);
        let tags: Vec<&str> = hello.tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(vec!["greet", "rust"], tags);

        let simple = &posts[1];
        assert_eq!("Simple", simple.title);
        assert_eq!(None, simple.author);
        assert_eq!(NaiveDate::from_ymd_opt(1, 1, 1), simple.date);
        assert_eq!("<p>First day.</p>\n", simple.body);
        Ok(())
    }

    #[test]
    fn test_title_from_heading_without_frontmatter() -> TestResult {
        let dir = fixture(&[("plain.md", "# Plain Title\n\nText.\n")])?;
        let site_url = site_url();
        let parser = Parser::new(dir.path(), &site_url, Order::Filename);
        let post = parser.parse_post(Path::new("plain.md"))?;
        assert_eq!("Plain Title", post.title);
        assert_eq!(None, post.date);
        assert_eq!("<p>Text.</p>\n", post.body);
        Ok(())
    }

    #[test]
    fn test_malformed_posts_are_reported_individually() -> std::io::Result<()> {
        let dir = fixture(&[
            ("a-no-title.md", "---\ndate: 2024-01-01\n---\nbody\n"),
            ("b-bad-date.md", "---\ntitle: X\ndate: yesterday\n---\nbody\n"),
            ("c-unclosed.md", "---\ntitle: X\nbody\n"),
            ("d-bad-yaml.md", "---\ntitle: [unclosed\n---\nbody\n"),
            ("e-no-heading.md", "just text\n"),
            ("f-good.md", "---\ntitle: Good\n---\nbody\n"),
        ])?;
        let site_url = site_url();
        let parser = Parser::new(dir.path(), &site_url, Order::Filename);
        let results: Vec<Result<Post>> = parser.posts().expect("scan").collect();
        assert_eq!(6, results.len());

        let cause = |r: &Result<Post>| match r {
            Err(Error::Post { err, .. }) => Some(format!("{:?}", err)),
            _ => None,
        };
        let causes: Vec<String> =
            results[..5].iter().filter_map(cause).collect();
        assert_eq!(5, causes.len());
        assert!(causes[0].starts_with("MissingTitle"), "{}", causes[0]);
        assert!(causes[1].starts_with("InvalidDate"), "{}", causes[1]);
        assert!(
            causes[2].starts_with("FrontmatterMissingEndFence"),
            "{}",
            causes[2]
        );
        assert!(causes[3].starts_with("DeserializeYaml"), "{}", causes[3]);
        assert!(causes[4].starts_with("MissingTitle"), "{}", causes[4]);
        assert_eq!(
            Some(Path::new("a-no-title.md")),
            results[0].as_ref().err().and_then(Error::path)
        );
        assert!(results[5].is_ok());
        Ok(())
    }

    #[test]
    fn test_date_order() -> TestResult {
        let dir = fixture(&[
            ("a.md", "---\ntitle: A\ndate: 2020-01-01\n---\n"),
            ("b.md", "---\ntitle: B\ndate: 2022-01-01\n---\n"),
            ("c.md", "---\ntitle: C\n---\n"),
            ("d.md", "---\ndate: 2023-01-01\n---\n"),
        ])?;
        let site_url = site_url();
        let parser = Parser::new(dir.path(), &site_url, Order::Date);
        let titles: Vec<String> = parser
            .posts()?
            .map(|r| r.map(|p| p.title).unwrap_or_else(|_| String::from("<error>")))
            .collect();
        assert_eq!(vec!["<error>", "B", "A", "C"], titles);
        Ok(())
    }

    #[test]
    fn test_posts_is_restartable() -> TestResult {
        let dir = fixture(&[("a.md", "---\ntitle: A\n---\n")])?;
        let site_url = site_url();
        let parser = Parser::new(dir.path(), &site_url, Order::Filename);
        assert_eq!(1, parser.posts()?.count());
        std::fs::write(dir.path().join("b.md"), "---\ntitle: B\n---\n")?;
        assert_eq!(2, parser.posts()?.count());
        Ok(())
    }

    #[test]
    fn test_missing_directory() {
        let site_url = site_url();
        let parser = Parser::new(Path::new("/nonexistent/posts"), &site_url, Order::Filename);
        assert!(parser.posts().is_err());
    }
}
