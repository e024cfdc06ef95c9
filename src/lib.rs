//! The library code for the `scriven` static blog generator. A blog is a
//! directory:
//!
//! | Path | Contents |
//! |---|---|
//! | `config` | YAML settings ([`crate::config`]) |
//! | `posts/` | Markdown posts, one per file |
//! | `template/<name>/` | `post.html`, `index.html`, optional `base.html`, and static assets |
//! | `site/` | the generated site, rebuilt from scratch on every build |
//!
//! The architecture is a linear pipeline:
//!
//! 1. Loading posts from source files on disk ([`crate::parser`])
//! 2. Rendering post, index, and feed pages ([`crate::render`], [`crate::feed`])
//! 3. Writing the pages and the template's assets into the site directory
//!    ([`crate::site`])
//! 4. Publishing the site directory to a remote host ([`crate::publish`])
//!
//! Steps 1-3 are driven by [`build::build_site`]. A post that fails to load or
//! render is skipped and reported without stopping the build, while a failure
//! to write the site aborts the build and leaves the previous site in place.
//! Publishing likewise reports files that fail to upload and carries on,
//! except when the remote host rejects the credentials.

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]

pub mod build;
pub mod config;
pub mod feed;
pub mod markdown;
pub mod parser;
pub mod post;
pub mod publish;
pub mod render;
pub mod site;
pub mod tag;
pub mod transport;
pub mod url;
mod util;
