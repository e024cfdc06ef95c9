//! Support for creating Atom feeds from a list of posts.

use crate::config::Author;
use crate::post::Post;
use crate::render::RenderedPage;
use atom_syndication::{
    Entry, EntryBuilder, Error as AtomError, Feed, FeedBuilder, FixedDateTime, LinkBuilder,
    Person, PersonBuilder, Text,
};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use std::fmt;
use std::path::PathBuf;
use url::Url;

/// The feed's file name, relative to the site directory.
pub const FEED_FILE: &str = "feed.atom";

/// Bundled configuration for creating a feed.
pub struct FeedConfig<'a> {
    pub title: &'a str,
    pub author: Option<&'a Author>,
    pub home_page: &'a Url,
}

/// Creates the feed page from some configuration ([`FeedConfig`]) and a list
/// of [`Post`]s in index order. Undated posts are left out of the feed.
pub fn feed_page(config: &FeedConfig, posts: &[Post]) -> Result<RenderedPage> {
    let contents = feed(config, posts).write_to(Vec::new())?;
    Ok(RenderedPage {
        path: PathBuf::from(FEED_FILE),
        contents,
    })
}

fn midnight(date: NaiveDate) -> Option<FixedDateTime> {
    let naive = date.and_hms_opt(0, 0, 0)?;
    Some(Utc.from_utc_datetime(&naive).into())
}

fn feed(config: &FeedConfig, posts: &[Post]) -> Feed {
    let entries = feed_entries(config, posts);

    // The newest post's date rather than the build time, so that rebuilding
    // unchanged posts produces an identical feed.
    let updated = posts
        .iter()
        .filter_map(|p| p.date)
        .max()
        .and_then(midnight)
        .unwrap_or_else(|| DateTime::<Utc>::from(std::time::UNIX_EPOCH).into());

    FeedBuilder::default()
        .title(config.title)
        .id(config.home_page.to_string())
        .updated(updated)
        .authors(author_to_people(config.author))
        .links(vec![LinkBuilder::default()
            .href(config.home_page.to_string())
            .rel("alternate")
            .build()])
        .entries(entries)
        .build()
}

fn feed_entries(config: &FeedConfig, posts: &[Post]) -> Vec<Entry> {
    posts
        .iter()
        .filter_map(|post| {
            let date = midnight(post.date?)?;
            let (summary, _) = post.summary();
            Some(
                EntryBuilder::default()
                    .id(post.url.to_string())
                    .title(post.title.as_str())
                    .updated(date)
                    .published(Some(date))
                    .authors(entry_authors(config, post))
                    .links(vec![LinkBuilder::default()
                        .href(post.url.to_string())
                        .rel("alternate")
                        .build()])
                    .summary(Some(Text::html(summary)))
                    .build(),
            )
        })
        .collect()
}

/// A post's own author wins over the site author.
fn entry_authors(config: &FeedConfig, post: &Post) -> Vec<Person> {
    match &post.author {
        Some(name) => vec![PersonBuilder::default().name(name.as_str()).build()],
        None => author_to_people(config.author),
    }
}

fn author_to_people(author: Option<&Author>) -> Vec<Person> {
    match author {
        Some(author) => vec![PersonBuilder::default()
            .name(author.name.as_str())
            .email(author.email.clone())
            .build()],
        None => Vec::new(),
    }
}

type Result<T> = std::result::Result<T, Error>;

/// Represents a problem creating a feed.
#[derive(Debug)]
pub enum Error {
    /// Returned when there is an Atom-related error.
    Atom(AtomError),
}

impl fmt::Display for Error {
    /// Implements [`fmt::Display`] for [`Error`].
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Atom(err) => write!(f, "Writing feed: {}", err),
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Atom(err) => Some(err),
        }
    }
}

impl From<AtomError> for Error {
    /// Converts [`AtomError`]s into [`Error`]. This allows us to use the `?`
    /// operator in fallible feed operations.
    fn from(err: AtomError) -> Error {
        Error::Atom(err)
    }
}
