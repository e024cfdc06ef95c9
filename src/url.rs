use crate::post::{slug_for_stem, MARKDOWN_EXTENSIONS};
use url::{ParseError, Url};

const HTML_EXTENSION: &str = ".html";

/// Rewrites links found in post bodies so that links to other posts' source
/// files (`foo.md`) point to their rendered pages (`foo.html`).
pub struct Converter<'a> {
    site_root: &'a Url,
    base: Url,
}

impl<'a> Converter<'a> {
    /// Constructs a new `Converter`
    ///
    /// # Arguments
    ///
    /// * `site_root` - the URL prefix for post pages.
    /// * `base` - the relative path from `site_root` from which target URLs
    ///   will be resolved (the linking post's own page).
    pub fn new(site_root: &'a Url, base: &str) -> Result<Converter<'a>> {
        Ok(Converter {
            site_root,
            base: site_root.join(base)?,
        })
    }

    fn post_source_stem(relative: &str) -> Option<&str> {
        if relative.starts_with("../") || relative.contains('/') {
            return None;
        }
        MARKDOWN_EXTENSIONS
            .iter()
            .find_map(|ext| relative.strip_suffix(&format!(".{}", ext)))
    }

    fn convert_absolute(&self, mut absolute: Url) -> Result<Url> {
        let fragment = absolute.fragment().map(str::to_owned);
        absolute.set_fragment(None);
        if let Some(relative) = self.site_root.make_relative(&absolute) {
            if let Some(stem) = Self::post_source_stem(&relative) {
                let mut target = self
                    .site_root
                    .join(&format!("{}{}", slug_for_stem(stem), HTML_EXTENSION))?;
                target.set_fragment(fragment.as_deref());
                return Ok(target);
            }
        }
        absolute.set_fragment(fragment.as_deref());
        Ok(absolute)
    }

    fn convert_unknown(&self, url: &str) -> Result<Url> {
        match Url::parse(url) {
            Ok(absolute) => self.convert_absolute(absolute),
            Err(ParseError::RelativeUrlWithoutBase) => {
                self.convert_absolute(self.base.join(url)?)
            }
            Err(e) => Err(e),
        }
    }

    pub fn convert(&self, url: &str) -> Result<String> {
        Ok(self.convert_unknown(url)?.to_string())
    }
}

type Result<T> = std::result::Result<T, ParseError>;
