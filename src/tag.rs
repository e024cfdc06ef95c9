//! Defines the [`Tag`] type, which represents a [`crate::post::Post`] tag.

use gtmpl::Value;
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use url::Url;

/// The directory (relative to the site root) holding the per-tag indices.
pub const TAGS_DIRECTORY: &str = "tags";

/// Represents a [`crate::post::Post`] tag.
#[derive(Clone, Debug)]
pub struct Tag {
    /// The tag's name. This is slugified so e.g., `macOS` and `MacOS`
    /// resolve to the same value, and also so the field can be dropped into a
    /// [`Url`] and a file path.
    pub name: String,

    /// The URL for the tag's first index page, i.e.
    /// `{site_url}/tags/{tag_name}/index.html`.
    pub url: Url,
}

impl Tag {
    /// Builds a tag from its source spelling. Returns `None` for tags that
    /// slugify to nothing (e.g., `"!!"`).
    pub fn new(source: &str, site_url: &Url) -> Option<Tag> {
        let name = slug::slugify(source);
        if name.is_empty() {
            return None;
        }
        // `site_url` always carries a trailing slash, so joining a multi
        // segment relative path keeps the site prefix.
        let url = site_url
            .join(&format!("{}/{}/index.html", TAGS_DIRECTORY, name))
            .ok()?;
        Some(Tag { name, url })
    }
}

impl Hash for Tag {
    /// Implements [`Hash`] for [`Tag`] by delegating directly to the `name`
    /// field.
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state)
    }
}

impl PartialEq for Tag {
    /// Implements [`PartialEq`] and [`Eq`] for [`Tag`] by delegating directly
    /// to the `name` field.
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}
impl Eq for Tag {}

impl PartialOrd for Tag {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Tag {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name.cmp(&other.name)
    }
}

impl From<&Tag> for Value {
    /// Converts [`Tag`]s into [`Value`]s for templating.
    fn from(t: &Tag) -> Value {
        use std::collections::HashMap;
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("tag".to_owned(), Value::String(t.name.clone()));
        m.insert("url".to_owned(), Value::String(t.url.to_string()));
        Value::Object(m)
    }
}
