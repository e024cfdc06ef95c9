//! Defines the [`Post`] type along with the file-name conventions shared by the
//! loader and the link converter. See [`Post::to_value`] and
//! [`Post::summarize`] for how posts are exposed to templates.

use crate::tag::Tag;
use chrono::NaiveDate;
use gtmpl::Value;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use url::Url;

/// File extensions recognized as Markdown post sources.
pub const MARKDOWN_EXTENSIONS: &[&str] = &["md", "markdown"];

/// The format of publish dates, both in front-matter and file name prefixes.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

const FOLD_TAG: &str = "<!-- more -->";

/// A single Markdown-authored article. Posts are read-only once loaded.
#[derive(Clone, Debug)]
pub struct Post {
    /// The source file name relative to the posts directory, e.g.
    /// `2024-01-01-hello.md`.
    pub source: PathBuf,

    /// The identifier derived from the file name, e.g. `hello`.
    pub slug: String,

    pub title: String,

    /// The post's own author, when it names one. Feeds fall back to the site
    /// author otherwise.
    pub author: Option<String>,

    /// The publish date, if the front-matter or file name provides one.
    pub date: Option<NaiveDate>,

    /// The URL of the rendered page.
    pub url: Url,

    /// The rendered page's path relative to the site directory, e.g.
    /// `hello.html`.
    pub file_path: PathBuf,

    pub tags: BTreeSet<Tag>,

    /// The post body, already converted to HTML.
    pub body: String,
}

impl Post {
    /// Returns the part of the body above the `<!-- more -->` fold and
    /// whether the body was actually folded.
    pub fn summary(&self) -> (&str, bool) {
        match self.body.find(FOLD_TAG) {
            Some(i) => (&self.body[..i], true),
            None => (&self.body, false),
        }
    }

    /// The publish date formatted as `YYYY-MM-DD`, or the empty string.
    pub fn date_string(&self) -> String {
        match self.date {
            Some(date) => date.format(DATE_FORMAT).to_string(),
            None => String::new(),
        }
    }

    /// Orders posts the way index pages list them: most recent first, undated
    /// posts last, ties broken by source file name.
    pub fn index_order(a: &Post, b: &Post) -> Ordering {
        b.date.cmp(&a.date).then_with(|| a.source.cmp(&b.source))
    }

    fn common_fields(&self) -> HashMap<String, Value> {
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("title".to_owned(), Value::String(self.title.clone()));
        m.insert(
            "author".to_owned(),
            Value::String(self.author.clone().unwrap_or_default()),
        );
        m.insert("date".to_owned(), Value::String(self.date_string()));
        m.insert("slug".to_owned(), Value::String(self.slug.clone()));
        m.insert("url".to_owned(), Value::String(self.url.to_string()));
        m.insert(
            "tags".to_owned(),
            Value::Array(self.tags.iter().map(Value::from).collect()),
        );
        m
    }

    /// Converts the full post into a template value with fields `title`,
    /// `author`, `date`, `slug`, `url`, `tags`, `body`, `summary` and `summarized`.
    pub fn to_value(&self) -> Value {
        let (summary, summarized) = self.summary();
        let mut m = self.common_fields();
        m.insert("body".to_owned(), Value::String(self.body.clone()));
        m.insert("summary".to_owned(), Value::String(summary.to_owned()));
        m.insert("summarized".to_owned(), Value::Bool(summarized));
        Value::Object(m)
    }

    /// Converts the post into the smaller template value used on index pages:
    /// like [`Post::to_value`] but without `body`.
    pub fn summarize(&self) -> Value {
        let (summary, summarized) = self.summary();
        let mut m = self.common_fields();
        m.insert("summary".to_owned(), Value::String(summary.to_owned()));
        m.insert("summarized".to_owned(), Value::Bool(summarized));
        Value::Object(m)
    }
}

/// Splits a `YYYY-MM-DD-` prefix off of a file stem. The stem is returned
/// unchanged if it has no such prefix or nothing follows the prefix.
pub fn split_date_prefix(stem: &str) -> (Option<NaiveDate>, &str) {
    const PREFIX_LEN: usize = 10;
    if let (Some(prefix), Some(rest)) = (stem.get(..PREFIX_LEN), stem.get(PREFIX_LEN..)) {
        if let Some(rest) = rest.strip_prefix('-') {
            if !rest.is_empty() {
                if let Ok(date) = NaiveDate::parse_from_str(prefix, DATE_FORMAT) {
                    return (Some(date), rest);
                }
            }
        }
    }
    (None, stem)
}

/// Derives a post's slug from its file stem: `2024-01-01-Hello World`
/// becomes `hello-world`.
pub fn slug_for_stem(stem: &str) -> String {
    let (_, rest) = split_date_prefix(stem);
    slug::slugify(rest)
}

#[cfg(test)]
mod test {
    use super::*;

    fn post(source: &str, date: Option<&str>) -> Post {
        Post {
            source: PathBuf::from(source),
            slug: slug_for_stem(source.trim_end_matches(".md")),
            title: String::from("t"),
            author: None,
            date: date.map(|d| NaiveDate::parse_from_str(d, DATE_FORMAT).unwrap()),
            url: Url::parse("https://example.org/x.html").unwrap(),
            file_path: PathBuf::from("x.html"),
            tags: BTreeSet::new(),
            body: String::from("<p>above</p>\n<!-- more -->\n<p>below</p>"),
        }
    }

    #[test]
    fn test_split_date_prefix() {
        assert_eq!(
            (NaiveDate::from_ymd_opt(2024, 1, 1), "hello"),
            split_date_prefix("2024-01-01-hello")
        );
        assert_eq!((None, "2024-01-01"), split_date_prefix("2024-01-01"));
        assert_eq!((None, "2024-13-01-x"), split_date_prefix("2024-13-01-x"));
        assert_eq!((None, "hello"), split_date_prefix("hello"));
    }

    #[test]
    fn test_slug_for_stem() {
        assert_eq!("hello-world", slug_for_stem("2024-01-01-Hello World"));
        assert_eq!("bad-post", slug_for_stem("bad-post"));
    }

    #[test]
    fn test_summary_folds() {
        let p = post("a.md", None);
        assert_eq!(("<p>above</p>\n", true), p.summary());
    }

    #[test]
    fn test_index_order() {
        let mut posts = vec![
            post("b.md", Some("2024-01-01")),
            post("undated.md", None),
            post("a.md", Some("2024-01-01")),
            post("c.md", Some("2024-02-01")),
        ];
        posts.sort_by(Post::index_order);
        let order: Vec<_> = posts.iter().map(|p| p.source.clone()).collect();
        assert_eq!(
            vec![
                PathBuf::from("c.md"),
                PathBuf::from("a.md"),
                PathBuf::from("b.md"),
                PathBuf::from("undated.md"),
            ],
            order
        );
    }
}
