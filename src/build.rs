//! Exports the [`build_site`] function which stitches together the high-level
//! steps of building the output static site: loading the posts
//! ([`crate::parser`]), rendering post, index, and feed pages
//! ([`crate::render`], [`crate::feed`]), and assembling them together with
//! the template's static assets into the site directory ([`crate::site`]).

use crate::config::Config;
use crate::feed::{self, Error as FeedError, FeedConfig, FEED_FILE};
use crate::parser::{Error as ParseError, Parser as PostParser};
use crate::post::Post;
use crate::render::{Error as RenderError, RenderedPage, Renderer};
use crate::site::{self, Assembler, Error as SiteError};
use gtmpl::Template;
use std::collections::HashSet;
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};

/// The template applied to each post.
pub const POST_TEMPLATE: &str = "post.html";

/// The template applied to each index page.
pub const INDEX_TEMPLATE: &str = "index.html";

/// An optional template prepended to both of the above, typically holding
/// `{{ define }}` blocks they share.
pub const BASE_TEMPLATE: &str = "base.html";

/// Files in the template directory that are templates rather than assets.
pub const TEMPLATE_FILES: &[&str] = &[POST_TEMPLATE, INDEX_TEMPLATE, BASE_TEMPLATE];

/// Slugs that would collide with generated pages.
const RESERVED_SLUGS: &[&str] = &["index"];

/// A post that was left out of the site, and why.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Skipped {
    pub source: PathBuf,
    pub reason: String,
}

/// The outcome of a build that ran to completion.
#[derive(Debug, Default)]
pub struct BuildReport {
    /// The number of posts that were rendered.
    pub posts: usize,

    /// The number of files in the site, pages and assets.
    pub files: usize,

    /// Posts that were left out, ordered by source file name.
    pub skipped: Vec<Skipped>,
}

impl BuildReport {
    /// True when every post made it into the site.
    pub fn is_success(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Builds the site from a [`Config`] object. This calls into
/// [`PostParser::posts`], [`Renderer`], and [`Assembler::assemble`] which do
/// the heavy-lifting. Failures that affect a single post are collected in the
/// returned [`BuildReport`]; failures that would leave the site inconsistent
/// are returned as an [`Error`] and leave the previous site untouched.
pub fn build_site(config: &Config) -> Result<BuildReport> {
    // Parse the template files first; no post can render without them.
    let posts_template = parse_template(&config.template_directory, POST_TEMPLATE)?;
    let index_template = parse_template(&config.template_directory, INDEX_TEMPLATE)?;

    // collect all posts
    let post_parser = PostParser::new(&config.posts_directory, &config.site_url, config.order);
    let mut skipped: Vec<Skipped> = Vec::new();
    let mut posts: Vec<Post> = Vec::new();
    let mut seen_slugs: HashSet<String> = HashSet::new();
    for result in post_parser.posts()? {
        match result {
            Ok(post) => {
                if RESERVED_SLUGS.contains(&post.slug.as_str()) {
                    skip(&mut skipped, &post.source, format!("slug `{}` is reserved", post.slug));
                } else if !seen_slugs.insert(post.slug.clone()) {
                    skip(
                        &mut skipped,
                        &post.source,
                        format!("another post already has slug `{}`", post.slug),
                    );
                } else {
                    posts.push(post);
                }
            }
            Err(err) => {
                let source = err.path().map(Path::to_owned).unwrap_or_default();
                skip(&mut skipped, &source, err.to_string());
            }
        }
    }
    posts.sort_by(Post::index_order);

    let feed_url = config.site_url.join(FEED_FILE)?;
    let renderer = Renderer {
        posts_template: &posts_template,
        index_template: &index_template,
        site_url: &config.site_url,
        site_title: &config.title,
        feed_url: &feed_url,
        index_page_size: config.index_page_size,
    };

    // render the post pages
    let (posts, mut pages) = render_posts(&renderer, posts, &mut skipped);

    // render the index pages and the feed
    pages.extend(renderer.render_indices(&posts)?);
    pages.push(feed::feed_page(
        &FeedConfig {
            title: &config.title,
            author: config.author.as_ref(),
            home_page: &config.site_url,
        },
        &posts,
    )?);

    // write everything, with the template's assets, into the site directory
    let assets = site::collect_assets(&config.template_directory, TEMPLATE_FILES)?;
    Assembler {
        site_directory: &config.site_directory,
    }
    .assemble(&pages, &assets)?;

    skipped.sort_by(|a, b| a.source.cmp(&b.source));
    Ok(BuildReport {
        posts: posts.len(),
        files: pages.len() + assets.len(),
        skipped,
    })
}

/// Renders a page for each post. A post whose page fails to render is
/// skipped, and the remaining posts are rendered again so that no page links
/// to the skipped one as its neighbour.
fn render_posts(
    renderer: &Renderer,
    mut posts: Vec<Post>,
    skipped: &mut Vec<Skipped>,
) -> (Vec<Post>, Vec<RenderedPage>) {
    loop {
        let mut pages = Vec::with_capacity(posts.len());
        let mut failed: HashSet<usize> = HashSet::new();
        for (i, post) in posts.iter().enumerate() {
            let prev = i.checked_sub(1).and_then(|j| posts.get(j));
            let next = posts.get(i + 1);
            match renderer.render_post(post, prev, next) {
                Ok(page) => pages.push(page),
                Err(err) => {
                    skip(skipped, &post.source, err.to_string());
                    failed.insert(i);
                }
            }
        }
        if failed.is_empty() {
            return (posts, pages);
        }
        posts = posts
            .into_iter()
            .enumerate()
            .filter(|(i, _)| !failed.contains(i))
            .map(|(_, post)| post)
            .collect();
    }
}

fn skip(skipped: &mut Vec<Skipped>, source: &Path, reason: String) {
    log::warn!("skipping `{}`: {}", source.display(), reason);
    skipped.push(Skipped {
        source: source.to_owned(),
        reason,
    });
}

// Loads `base.html` (if present) followed by `name` from `directory`, and
// parses the concatenation into a template.
fn parse_template(directory: &Path, name: &str) -> Result<Template> {
    let base = directory.join(BASE_TEMPLATE);
    let mut template_files = Vec::with_capacity(2);
    if base.is_file() {
        template_files.push(base);
    }
    template_files.push(directory.join(name));

    let mut contents = String::new();
    for template_file in &template_files {
        use std::io::Read;
        File::open(template_file)
            .and_then(|mut f| f.read_to_string(&mut contents))
            .map_err(|e| Error::OpenTemplateFile {
                path: template_file.to_owned(),
                err: e,
            })?;
    }

    let mut template = Template::default();
    template.parse(contents).map_err(|e| Error::ParseTemplate {
        path: directory.join(name),
        message: e.to_string(),
    })?;
    Ok(template)
}

type Result<T> = std::result::Result<T, Error>;

/// The error type for building a site. These are the failures that abort a
/// build; per-post failures are reported in [`BuildReport::skipped`].
#[derive(Debug)]
pub enum Error {
    /// Returned when the posts directory can't be scanned.
    Parse(ParseError),

    /// Returned for errors rendering index pages.
    Render(RenderError),

    /// Returned for errors writing the site directory.
    Site(SiteError),

    /// Returned for I/O problems while opening template files.
    OpenTemplateFile { path: PathBuf, err: std::io::Error },

    /// Returned for errors parsing template files.
    ParseTemplate { path: PathBuf, message: String },

    /// Returned for errors writing the feed.
    Feed(FeedError),

    /// Returned when the feed URL can't be derived from the site URL.
    UrlParse(url::ParseError),
}

impl fmt::Display for Error {
    /// Implements [`fmt::Display`] for [`Error`].
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Parse(err) => err.fmt(f),
            Error::Render(err) => err.fmt(f),
            Error::Site(err) => err.fmt(f),
            Error::OpenTemplateFile { path, err } => {
                write!(f, "Opening template file '{}': {}", path.display(), err)
            }
            Error::ParseTemplate { path, message } => {
                write!(f, "Parsing template file '{}': {}", path.display(), message)
            }
            Error::Feed(err) => err.fmt(f),
            Error::UrlParse(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Parse(err) => Some(err),
            Error::Render(err) => Some(err),
            Error::Site(err) => Some(err),
            Error::OpenTemplateFile { path: _, err } => Some(err),
            Error::ParseTemplate { .. } => None,
            Error::Feed(err) => Some(err),
            Error::UrlParse(err) => Some(err),
        }
    }
}

impl From<ParseError> for Error {
    /// Converts [`ParseError`]s into [`Error`]. This allows us to use the `?`
    /// operator.
    fn from(err: ParseError) -> Error {
        Error::Parse(err)
    }
}

impl From<RenderError> for Error {
    /// Converts [`RenderError`]s into [`Error`]. This allows us to use the
    /// `?` operator.
    fn from(err: RenderError) -> Error {
        Error::Render(err)
    }
}

impl From<SiteError> for Error {
    /// Converts [`SiteError`]s into [`Error`]. This allows us to use the `?`
    /// operator.
    fn from(err: SiteError) -> Error {
        Error::Site(err)
    }
}

impl From<FeedError> for Error {
    /// Converts [`FeedError`]s into [`Error`]. This allows us to use the `?`
    /// operator.
    fn from(err: FeedError) -> Error {
        Error::Feed(err)
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Error {
        Error::UrlParse(err)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;
    use walkdir::WalkDir;

    type TestResult = std::result::Result<(), Box<dyn std::error::Error>>;

    const POST: &str = "<html><h1>{{ .item.title }}</h1>\n{{ .item.body }}</html>\n";
    const INDEX: &str = "{{ range .item }}<a href=\"{{ .url }}\">{{ .title }}</a>\n{{ end }}";

    fn blog(posts: &[(&str, &str)]) -> std::io::Result<TempDir> {
        let dir = TempDir::new()?;
        let template = dir.path().join("template/default");
        std::fs::create_dir_all(template.join("css"))?;
        std::fs::create_dir_all(dir.path().join("posts"))?;
        std::fs::write(dir.path().join("config"), "title: Test Blog\nurl: https://example.org/\n")?;
        std::fs::write(template.join(POST_TEMPLATE), POST)?;
        std::fs::write(template.join(INDEX_TEMPLATE), INDEX)?;
        std::fs::write(template.join("css/style.css"), "body { color: #000 }\n# not a heading\n")?;
        for (name, contents) in posts {
            std::fs::write(dir.path().join("posts").join(name), contents)?;
        }
        Ok(dir)
    }

    fn snapshot(site: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
        WalkDir::new(site)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| {
                (
                    e.path().strip_prefix(site).unwrap().to_owned(),
                    std::fs::read(e.path()).unwrap(),
                )
            })
            .collect()
    }

    #[test]
    fn test_hello_and_bad_post() -> TestResult {
        let dir = blog(&[
            ("2024-01-01-hello.md", "---\ntitle: Hello\n---\nHi there.\n"),
            ("bad-post.md", "---\ndate: 2024-01-02\n---\nNo title here.\n"),
        ])?;
        let config = Config::from_directory(dir.path())?;
        let report = build_site(&config)?;

        let hello = std::fs::read_to_string(config.site_directory.join("hello.html"))?;
        assert!(hello.contains("<h1>Hello</h1>"), "{}", hello);
        assert!(hello.contains("<p>Hi there.</p>"), "{}", hello);
        assert!(!config.site_directory.join("bad-post.html").exists());

        assert_eq!(1, report.posts);
        assert_eq!(1, report.skipped.len());
        assert_eq!(PathBuf::from("bad-post.md"), report.skipped[0].source);
        assert!(!report.is_success());
        Ok(())
    }

    #[test]
    fn test_one_page_per_post() -> TestResult {
        let dir = blog(&[
            ("a.md", "---\ntitle: A\ndate: 2024-01-01\ntags: [x]\n---\nA\n"),
            ("b.markdown", "# B\n\nB\n"),
            ("2023-06-01-c.md", "---\ntitle: C\n---\nC\n"),
        ])?;
        let config = Config::from_directory(dir.path())?;
        let report = build_site(&config)?;
        assert!(report.is_success());
        assert_eq!(3, report.posts);

        let files = snapshot(&config.site_directory);
        let post_pages: Vec<&PathBuf> = files
            .keys()
            .filter(|p| p.parent() == Some(Path::new("")))
            .filter(|p| p.extension().map(|e| e == "html").unwrap_or(false))
            .filter(|p| p.as_path() != Path::new("index.html"))
            .collect();
        assert_eq!(
            vec![
                &PathBuf::from("a.html"),
                &PathBuf::from("b.html"),
                &PathBuf::from("c.html")
            ],
            post_pages
        );
        assert!(files.contains_key(Path::new("tags/x/index.html")));
        assert!(files.contains_key(Path::new(FEED_FILE)));

        // newest first, undated last
        let index = String::from_utf8(files[Path::new("index.html")].clone())?;
        let a = index.find(">A<").unwrap();
        let c = index.find(">C<").unwrap();
        let b = index.find(">B<").unwrap();
        assert!(a < c && c < b, "{}", index);
        Ok(())
    }

    #[test]
    fn test_rebuild_is_byte_identical() -> TestResult {
        let dir = blog(&[
            ("a.md", "---\ntitle: A\ndate: 2024-01-01\ntags: [x, y]\n---\nSee [b](b.md).\n"),
            ("b.md", "---\ntitle: B\ndate: 2024-02-01\n---\nB\n<!-- more -->\nrest\n"),
        ])?;
        let config = Config::from_directory(dir.path())?;
        build_site(&config)?;
        let first = snapshot(&config.site_directory);
        build_site(&config)?;
        assert_eq!(first, snapshot(&config.site_directory));
        Ok(())
    }

    #[test]
    fn test_assets_copied_verbatim() -> TestResult {
        let dir = blog(&[])?;
        let config = Config::from_directory(dir.path())?;
        build_site(&config)?;
        assert_eq!(
            std::fs::read(config.template_directory.join("css/style.css"))?,
            std::fs::read(config.site_directory.join("css/style.css"))?
        );
        assert!(!config.site_directory.join(POST_TEMPLATE).exists());
        Ok(())
    }

    #[test]
    fn test_duplicate_and_reserved_slugs() -> TestResult {
        let dir = blog(&[
            ("2024-01-01-same.md", "---\ntitle: First\n---\n"),
            ("same.md", "---\ntitle: Second\n---\n"),
            ("index.md", "---\ntitle: Index\n---\n"),
        ])?;
        let config = Config::from_directory(dir.path())?;
        let report = build_site(&config)?;
        assert_eq!(1, report.posts);
        let skipped: Vec<PathBuf> = report.skipped.iter().map(|s| s.source.clone()).collect();
        assert_eq!(vec![PathBuf::from("index.md"), PathBuf::from("same.md")], skipped);
        Ok(())
    }

    #[test]
    fn test_missing_template_is_fatal() -> TestResult {
        let dir = blog(&[("a.md", "---\ntitle: A\n---\n")])?;
        let config = Config::from_directory(dir.path())?;
        std::fs::remove_file(config.template_directory.join(INDEX_TEMPLATE))?;
        assert!(matches!(
            build_site(&config),
            Err(Error::OpenTemplateFile { .. })
        ));
        assert!(!config.site_directory.exists());
        Ok(())
    }
}
