//! Markdown to HTML conversion for post bodies. Conversion is best-effort:
//! anything the converter does not recognize passes through as text, and
//! links that cannot be rewritten are left as written.

use crate::url::Converter as LinkConverter;
use pulldown_cmark::*;

fn options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_SMART_PUNCTUATION);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_TASKLISTS);
    options
}

/// Converts `markdown` to HTML, appending the result to `out`.
///
/// * `link_converter` rewrites links to other posts' sources into links to
///   their rendered pages.
/// * `skip_title` drops the first level-1 heading, for posts whose title was
///   taken from that heading.
pub fn to_html(
    out: &mut String,
    link_converter: &LinkConverter,
    markdown: &str,
    skip_title: bool,
) {
    let event_converter = EventConverter { link_converter };
    let mut in_title = false;
    let mut title_seen = !skip_title;
    let events = Parser::new_ext(markdown, options()).filter_map(|ev| {
        if !title_seen {
            match &ev {
                Event::Start(Tag::Heading(1)) => {
                    in_title = true;
                    return None;
                }
                Event::End(Tag::Heading(1)) => {
                    in_title = false;
                    title_seen = true;
                    return None;
                }
                _ if in_title => return None,
                _ => {}
            }
        }
        Some(event_converter.convert(ev))
    });
    html::push_html(out, events);
}

/// Returns the plain text of the first level-1 heading, if any.
pub fn first_heading(markdown: &str) -> Option<String> {
    let mut title: Option<String> = None;
    for ev in Parser::new_ext(markdown, options()) {
        match ev {
            Event::Start(Tag::Heading(1)) => title = Some(String::new()),
            Event::End(Tag::Heading(1)) => break,
            Event::Text(text) | Event::Code(text) => {
                if let Some(title) = title.as_mut() {
                    title.push_str(&text);
                }
            }
            _ => {}
        }
    }
    title.map(|t| t.trim().to_owned()).filter(|t| !t.is_empty())
}

struct EventConverter<'a, 'b> {
    link_converter: &'a LinkConverter<'b>,
}

impl EventConverter<'_, '_> {
    fn convert_tag<'c>(&self, tag: Tag<'c>) -> Tag<'c> {
        match tag {
            // The page template owns the `<h1>` (the post title), so headings
            // in the body are demoted one level.
            Tag::Heading(level) => Tag::Heading((level + 1).min(6)),

            // Links to other posts' Markdown sources are rewritten to the
            // rendered pages (e.g., `foo.md` becomes `.../foo.html`).
            Tag::Link(link_type, url, title) => {
                match link_type {
                    LinkType::Email => Tag::Link(link_type, url, title),
                    _ => match self.link_converter.convert(&url) {
                        Ok(converted) => Tag::Link(
                            link_type,
                            CowStr::Boxed(converted.into_boxed_str()),
                            title,
                        ),
                        Err(e) => {
                            log::warn!("leaving link `{}` as written: {}", url, e);
                            Tag::Link(link_type, url, title)
                        }
                    },
                }
            }
            _ => tag,
        }
    }

    fn convert<'c>(&self, ev: Event<'c>) -> Event<'c> {
        match ev {
            Event::Start(tag) => Event::Start(self.convert_tag(tag)),
            Event::End(Tag::Heading(level)) => {
                Event::End(Tag::Heading((level + 1).min(6)))
            }
            _ => ev,
        }
    }
}
