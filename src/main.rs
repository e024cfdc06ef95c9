use anyhow::Result;
use clap::{App, AppSettings, Arg, SubCommand};
use scriven::build::build_site;
use scriven::config::Config;
use scriven::publish::publish_site;
use std::path::Path;
use std::process;

/// Every post rendered or every file uploaded.
const EXIT_OK: i32 = 0;

/// The run completed, but some posts were skipped or some files failed.
const EXIT_PARTIAL: i32 = 1;

/// The run was aborted.
const EXIT_FATAL: i32 = 2;

fn main() {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("warn"),
    )
    .init();

    let blog_arg = Arg::with_name("BLOG")
        .help("The blog directory")
        .default_value(".")
        .index(1);
    let matches = App::new("scriven")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Builds a static blog from Markdown posts and publishes it")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .subcommand(
            SubCommand::with_name("render")
                .about("Renders the posts into the blog's `site/` directory")
                .arg(blog_arg.clone()),
        )
        .subcommand(
            SubCommand::with_name("publish")
                .about(
                    "Copies the blog's `site/` directory to the configured \
                     remote host",
                )
                .arg(blog_arg),
        )
        .get_matches();

    let code = match matches.subcommand() {
        ("render", Some(m)) => {
            exit_status(render(Path::new(m.value_of("BLOG").unwrap_or("."))))
        }
        ("publish", Some(m)) => {
            exit_status(publish(Path::new(m.value_of("BLOG").unwrap_or("."))))
        }
        _ => EXIT_FATAL,
    };
    process::exit(code)
}

/// Maps the outcome of a subcommand to the process exit code, reporting a
/// fatal error on stderr.
fn exit_status(result: Result<i32>) -> i32 {
    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            EXIT_FATAL
        }
    }
}

fn exit_code(success: bool) -> i32 {
    match success {
        true => EXIT_OK,
        false => EXIT_PARTIAL,
    }
}

fn render(blog: &Path) -> Result<i32> {
    let config = Config::from_directory(blog)?;
    let report = build_site(&config)?;

    eprintln!(
        "Rendered {} posts ({} files) into {}",
        report.posts,
        report.files,
        config.site_directory.display()
    );
    if !report.is_success() {
        eprintln!("Skipped {} posts:", report.skipped.len());
        for skipped in &report.skipped {
            eprintln!("  {}: {}", skipped.source.display(), skipped.reason);
        }
    }
    Ok(exit_code(report.is_success()))
}

fn publish(blog: &Path) -> Result<i32> {
    let config = Config::from_directory(blog)?;
    let report = publish_site(&config)?;

    eprintln!("Uploaded {} files", report.uploaded.len());
    if !report.is_success() {
        eprintln!("Failed to upload {} files:", report.failed.len());
        for failure in &report.failed {
            eprintln!("  {}: {}", failure.path.display(), failure.reason);
        }
    }
    Ok(exit_code(report.is_success()))
}

#[cfg(test)]
mod test {
    use super::*;
    use tempfile::TempDir;

    fn blog(posts: &[(&str, &str)]) -> std::io::Result<TempDir> {
        let dir = TempDir::new()?;
        let template = dir.path().join("template/default");
        std::fs::create_dir_all(&template)?;
        std::fs::create_dir_all(dir.path().join("posts"))?;
        std::fs::write(
            template.join("post.html"),
            "<h1>{{ .item.title }}</h1>{{ .item.body }}",
        )?;
        std::fs::write(
            template.join("index.html"),
            "{{ range .item }}{{ .title }}{{ end }}",
        )?;
        for (name, contents) in posts {
            std::fs::write(dir.path().join("posts").join(name), contents)?;
        }
        Ok(dir)
    }

    #[test]
    fn test_skipped_post_exits_partial() -> std::io::Result<()> {
        let dir = blog(&[
            ("2024-01-01-hello.md", "---\ntitle: Hello\n---\nHi.\n"),
            ("bad-post.md", "---\ndate: 2024-01-02\n---\nNo title.\n"),
        ])?;
        assert_eq!(EXIT_PARTIAL, exit_status(render(dir.path())));
        let hello = std::fs::read_to_string(dir.path().join("site/hello.html"))?;
        assert!(hello.contains("<h1>Hello</h1>"), "{}", hello);
        Ok(())
    }

    #[test]
    fn test_clean_render_exits_ok() -> std::io::Result<()> {
        let dir = blog(&[("hello.md", "---\ntitle: Hello\n---\nHi.\n")])?;
        assert_eq!(EXIT_OK, exit_status(render(dir.path())));
        Ok(())
    }

    #[test]
    fn test_fatal_errors_exit_fatal() -> std::io::Result<()> {
        let dir = blog(&[("hello.md", "---\ntitle: Hello\n---\nHi.\n")])?;
        // No `publish` section is configured.
        assert_eq!(EXIT_FATAL, exit_status(publish(dir.path())));

        std::fs::remove_file(dir.path().join("template/default/post.html"))?;
        assert_eq!(EXIT_FATAL, exit_status(render(dir.path())));
        Ok(())
    }
}
