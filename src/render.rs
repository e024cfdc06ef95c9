//! The template renderer: turns [`Post`]s into [`RenderedPage`]s by applying
//! the post template, and builds the paginated index pages (one index for
//! all posts plus one per tag) from the index template. Rendering is pure;
//! nothing here touches the file system.

use crate::post::Post;
use crate::tag::TAGS_DIRECTORY;
use crate::util::slash_path;
use gtmpl::{Context, Template, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use url::Url;

/// The directory (relative to an index's directory) holding its second and
/// later pages.
const PAGE_DIRECTORY: &str = "page";

/// The output of applying a template: the destination path relative to the
/// site directory and the document bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedPage {
    pub path: PathBuf,
    pub contents: Vec<u8>,
}

/// Applies templates to posts and indices.
pub struct Renderer<'a> {
    /// The template for post pages.
    pub posts_template: &'a Template,

    /// The template for index pages.
    pub index_template: &'a Template,

    /// The base URL of the site, with a trailing slash.
    pub site_url: &'a Url,

    /// The site title, made available to templates as `site.title`.
    pub site_title: &'a str,

    /// The URL of the Atom feed, made available as `site.feed_url`.
    pub feed_url: &'a Url,

    /// The number of posts per index page.
    pub index_page_size: usize,
}

impl Renderer<'_> {
    fn site_value(&self) -> Value {
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("title".to_owned(), Value::String(self.site_title.to_owned()));
        m.insert("url".to_owned(), Value::String(self.site_url.to_string()));
        m.insert("feed_url".to_owned(), Value::String(self.feed_url.to_string()));
        Value::Object(m)
    }

    /// Takes a single [`Page`] and templates it.
    fn render_page(&self, page: Page) -> Result<RenderedPage> {
        let mut value = page.to_value();
        if let Value::Object(obj) = &mut value {
            obj.insert(
                "home_page".to_owned(),
                Value::String(self.site_url.to_string()),
            );
            obj.insert("site".to_owned(), self.site_value());
        }
        let template_error = |message: String| Error::Template {
            page: page.file_path.clone(),
            message,
        };
        let context = Context::from(value).map_err(|e| template_error(e.to_string()))?;
        let mut contents: Vec<u8> = Vec::new();
        page.template
            .execute(&mut contents, &context)
            .map_err(|e| template_error(e.to_string()))?;
        Ok(RenderedPage {
            path: page.file_path,
            contents,
        })
    }

    /// Renders a post page. `prev` and `next` are the neighbouring posts in
    /// index order (newer and older respectively).
    pub fn render_post(
        &self,
        post: &Post,
        prev: Option<&Post>,
        next: Option<&Post>,
    ) -> Result<RenderedPage> {
        log::debug!("rendering {}", post.source.display());
        self.render_page(Page {
            item: post.to_value(),
            file_path: post.file_path.clone(),
            prev: prev.map(|p| p.url.clone()),
            next: next.map(|p| p.url.clone()),
            extra: Vec::new(),
            template: self.posts_template,
        })
    }

    /// Renders every index page for `posts`, which must already be in index
    /// order (see [`Post::index_order`]).
    pub fn render_indices(&self, posts: &[Post]) -> Result<Vec<RenderedPage>> {
        let mut rendered = Vec::new();
        for index in index_posts(posts) {
            for page in index.to_pages(self.site_url, self.index_page_size, self.index_template)? {
                rendered.push(self.render_page(page)?);
            }
        }
        Ok(rendered)
    }
}

/// An output HTML file before templating. A [`Page`] can be converted to a
/// [`Value`] via [`Page::to_value`].
struct Page<'a> {
    /// The main item for the page.
    item: Value,

    /// The output path relative to the site directory.
    file_path: PathBuf,

    /// The URL for the previous page, if any.
    prev: Option<Url>,

    /// The URL for the next page, if any.
    next: Option<Url>,

    /// Additional page-specific fields.
    extra: Vec<(&'static str, Value)>,

    /// The template with which the page will be rendered.
    template: &'a Template,
}

impl Page<'_> {
    /// Converts a [`Page`] into a [`Value`]. The result is a [`Value::Object`]
    /// with fields `item`, `prev`, and `next` plus any extra fields.
    fn to_value(&self) -> Value {
        let option_to_value = |opt: &Option<Url>| match opt {
            Some(url) => Value::String(url.to_string()),
            None => Value::Nil,
        };

        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("item".to_owned(), self.item.clone());
        m.insert("prev".to_owned(), option_to_value(&self.prev));
        m.insert("next".to_owned(), option_to_value(&self.next));
        for (key, value) in &self.extra {
            m.insert((*key).to_owned(), value.clone());
        }
        Value::Object(m)
    }
}

/// `Index` represents the posts listed under one tag, or under no tag for
/// the main index containing all posts.
struct Index<'a> {
    /// The tag name, empty for the main index.
    tag: String,

    /// The directory of the index relative to the site directory.
    directory: PathBuf,

    /// The posts associated with the index, in index order.
    posts: Vec<&'a Post>,
}

impl<'a> Index<'a> {
    fn page_path(&self, i: usize) -> PathBuf {
        match i {
            0 => self.directory.join("index.html"),
            _ => self
                .directory
                .join(PAGE_DIRECTORY)
                .join(format!("{}.html", i + 1)),
        }
    }

    fn page_url(&self, site_url: &Url, i: usize) -> Result<Url> {
        Ok(site_url.join(&slash_path(&self.page_path(i)))?)
    }

    /// Converts the index to a list of index pages of `index_page_size`
    /// posts each. An index with no posts still gets one (empty) page.
    fn to_pages<'t>(
        &self,
        site_url: &Url,
        index_page_size: usize,
        index_template: &'t Template,
    ) -> Result<Vec<Page<'t>>> {
        let chunks: Vec<&[&Post]> = match self.posts.is_empty() {
            true => vec![&self.posts[..]],
            false => self.posts.chunks(index_page_size).collect(),
        };
        let total_pages = chunks.len();

        chunks
            .into_iter()
            .enumerate()
            .map(|(i, chunk)| {
                Ok(Page {
                    item: Value::Array(chunk.iter().map(|p| p.summarize()).collect()),
                    file_path: self.page_path(i),
                    prev: match i {
                        0 => None,
                        _ => Some(self.page_url(site_url, i - 1)?),
                    },
                    next: match i + 1 < total_pages {
                        false => None,
                        true => Some(self.page_url(site_url, i + 1)?),
                    },
                    extra: vec![
                        ("tag", Value::String(self.tag.clone())),
                        ("page_number", Value::from((i + 1) as u64)),
                        ("total_pages", Value::from(total_pages as u64)),
                    ],
                    template: index_template,
                })
            })
            .collect()
    }
}

/// Indexes a list of [`Post`] objects: the main index first, then one index
/// per tag in tag-name order.
fn index_posts(posts: &[Post]) -> Vec<Index<'_>> {
    let mut tagged: BTreeMap<&str, Vec<&Post>> = BTreeMap::new();
    for post in posts {
        for tag in post.tags.iter() {
            tagged.entry(tag.name.as_str()).or_default().push(post);
        }
    }

    let mut indices = vec![Index {
        tag: String::default(),
        directory: PathBuf::new(),
        posts: posts.iter().collect(),
    }];
    indices.extend(tagged.into_iter().map(|(tag, posts)| Index {
        tag: tag.to_owned(),
        directory: Path::new(TAGS_DIRECTORY).join(tag),
        posts,
    }));
    indices
}

/// The result of a fallible rendering operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error rendering a page.
#[derive(Debug)]
pub enum Error {
    /// An error executing the template for the page at `page`.
    Template { page: PathBuf, message: String },

    /// An error building a page URL.
    UrlParse(url::ParseError),
}

impl From<url::ParseError> for Error {
    /// Converts a [`url::ParseError`] into an [`Error`]. This allows us to use
    /// the `?` operator when joining URLs.
    fn from(err: url::ParseError) -> Error {
        Error::UrlParse(err)
    }
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as presentable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Template { page, message } => {
                write!(f, "templating `{}`: {}", page.display(), message)
            }
            Error::UrlParse(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Template { .. } => None,
            Error::UrlParse(err) => Some(err),
        }
    }
}
