use std::{
    fmt,
    path::{Path, PathBuf},
};

use chrono::{DateTime, FixedOffset};

use crate::frontmatter::{self, FrontMatterError};
use crate::markdown::{first_paragraph_text, render_html};
use crate::model::{Group, Page, PageMeta, Post, PostMeta, TimestampError, parse_timestamp};
use crate::taxonomy::{group_posts, sort_pages, sort_posts};
use crate::thumbnail::find_thumbnail;

pub const INDEX_FILE: &str = "_index.md";
pub const POST_DIR: &str = "post";
pub const PAGE_DIR: &str = "page";

/// Failure to scan a content directory. Aborts the parse.
#[derive(Debug)]
pub enum ParseError {
    ReadDir { path: PathBuf, source: std::io::Error },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::ReadDir { path, source } => {
                write!(f, "Unable to read directory {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ParseError::ReadDir { source, .. } => Some(source),
        }
    }
}

/// Failure to parse a single content item. The item is skipped.
#[derive(Debug)]
pub enum ItemError {
    Io(std::io::Error),
    InvalidUtf8,
    FrontMatter(FrontMatterError),
    Metadata(toml::de::Error),
    MissingTitle,
    InvalidTimestamp {
        field: &'static str,
        value: String,
        source: TimestampError,
    },
}

impl fmt::Display for ItemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemError::Io(e) => write!(f, "unable to read index file: {}", e),
            ItemError::InvalidUtf8 => write!(f, "index file is not valid UTF-8"),
            ItemError::FrontMatter(e) => write!(f, "{}", e),
            ItemError::Metadata(e) => write!(f, "unable to parse metadata: {}", e),
            ItemError::MissingTitle => write!(f, "title is not defined"),
            ItemError::InvalidTimestamp { field, value, source } => {
                write!(f, "unable to parse {} {:?}: {}", field, value, source)
            }
        }
    }
}

impl std::error::Error for ItemError {}

impl From<std::io::Error> for ItemError {
    fn from(err: std::io::Error) -> Self {
        ItemError::Io(err)
    }
}

impl From<FrontMatterError> for ItemError {
    fn from(err: FrontMatterError) -> Self {
        ItemError::FrontMatter(err)
    }
}

impl From<toml::de::Error> for ItemError {
    fn from(err: toml::de::Error) -> Self {
        ItemError::Metadata(err)
    }
}

/// A content item left out of the site, with the reason.
#[derive(Debug)]
pub struct Skipped {
    /// Path of the item directory relative to the site root, e.g. `post/foo`.
    pub name: String,
    pub error: ItemError,
}

#[derive(Debug, Default)]
pub struct ParsedPosts {
    pub posts: Vec<Post>,
    pub categories: Vec<Group>,
    pub tags: Vec<Group>,
    pub skipped: Vec<Skipped>,
}

#[derive(Debug, Default)]
pub struct ParsedPages {
    pub pages: Vec<Page>,
    pub skipped: Vec<Skipped>,
}

/// Reads posts and pages from a site root.
pub struct ContentParser {
    root: PathBuf,
}

impl ContentParser {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn parse_posts(&self) -> Result<ParsedPosts, ParseError> {
        log::info!("Start parsing blog posts");

        let mut parsed = ParsedPosts::default();
        for (slug, dir) in self.item_dirs(POST_DIR)? {
            match parse_post(&slug, &dir) {
                Ok(post) => parsed.posts.push(post),
                Err(error) => parsed.skipped.push(skip(POST_DIR, &slug, error)),
            }
        }

        log::info!("Sorting posts");
        sort_posts(&mut parsed.posts);
        let (categories, tags) = group_posts(&parsed.posts);
        parsed.categories = categories;
        parsed.tags = tags;

        log::info!("Finished parsing {} posts", parsed.posts.len());
        Ok(parsed)
    }

    pub fn parse_pages(&self) -> Result<ParsedPages, ParseError> {
        log::info!("Start parsing pages");

        let mut parsed = ParsedPages::default();
        for (slug, dir) in self.item_dirs(PAGE_DIR)? {
            match parse_page(&slug, &dir) {
                Ok(page) => parsed.pages.push(page),
                Err(error) => parsed.skipped.push(skip(PAGE_DIR, &slug, error)),
            }
        }

        log::info!("Sorting pages");
        sort_pages(&mut parsed.pages);

        log::info!("Finished parsing {} pages", parsed.pages.len());
        Ok(parsed)
    }

    /// Subdirectories of `<root>/<kind>`, sorted by name.
    fn item_dirs(&self, kind: &str) -> Result<Vec<(String, PathBuf)>, ParseError> {
        let path = self.root.join(kind);
        let read_dir_error = |source| ParseError::ReadDir {
            path: path.clone(),
            source,
        };

        let mut dirs = Vec::new();
        for entry in std::fs::read_dir(&path).map_err(read_dir_error)? {
            let entry = entry.map_err(read_dir_error)?;
            if !entry.path().is_dir() {
                continue;
            }
            let slug = entry.file_name().to_string_lossy().into_owned();
            dirs.push((slug, entry.path()));
        }

        dirs.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(dirs)
    }
}

fn skip(kind: &str, slug: &str, error: ItemError) -> Skipped {
    let name = format!("{}/{}", kind, slug);
    log::warn!("Skipped {}: {}", name, error);
    Skipped { name, error }
}

/// Reads `_index.md` in `dir` and decodes its metadata, returning the
/// metadata and the markdown body.
fn read_item<T: serde::de::DeserializeOwned>(dir: &Path) -> Result<(T, String), ItemError> {
    let content = std::fs::read(dir.join(INDEX_FILE))?;
    let (metadata, body) = frontmatter::split(&content)?;

    let metadata = std::str::from_utf8(metadata).map_err(|_| ItemError::InvalidUtf8)?;
    let body = std::str::from_utf8(body).map_err(|_| ItemError::InvalidUtf8)?;

    Ok((toml::from_str(metadata)?, body.to_string()))
}

fn timestamp(field: &'static str, value: &str) -> Result<DateTime<FixedOffset>, ItemError> {
    parse_timestamp(value).map_err(|source| ItemError::InvalidTimestamp {
        field,
        value: value.to_string(),
        source,
    })
}

fn excerpt_or_first_paragraph(excerpt: String, body: &str) -> String {
    if excerpt.trim().is_empty() {
        first_paragraph_text(body)
    } else {
        excerpt
    }
}

fn thumbnail_path(path: &str, dir: &Path) -> Option<String> {
    find_thumbnail(dir).map(|name| format!("{}/{}", path, name))
}

/// Trimmed, non-empty, first occurrence kept.
fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if !tag.is_empty() && !out.iter().any(|t| t == tag) {
            out.push(tag.to_string());
        }
    }
    out
}

pub fn parse_post(slug: &str, dir: &Path) -> Result<Post, ItemError> {
    let (meta, body): (PostMeta, String) = read_item(dir)?;

    if meta.title.trim().is_empty() {
        return Err(ItemError::MissingTitle);
    }

    let created_at = meta.created_at;
    let updated_at = if meta.updated_at.is_empty() {
        created_at.clone()
    } else {
        meta.updated_at
    };
    timestamp("createdAt", &created_at)?;
    let updated = timestamp("updatedAt", &updated_at)?;

    let path = format!("/{}/{}", POST_DIR, slug);
    log::debug!("Parsed post {}", path);

    Ok(Post {
        title: meta.title,
        excerpt: excerpt_or_first_paragraph(meta.excerpt, &body),
        created_at,
        updated_at,
        category: meta.category.trim().to_string(),
        tags: normalize_tags(meta.tags),
        author: meta.author,
        slug: slug.to_string(),
        thumbnail: thumbnail_path(&path, dir),
        path,
        html: render_html(&body),
        updated,
        source_dir: dir.to_path_buf(),
    })
}

pub fn parse_page(slug: &str, dir: &Path) -> Result<Page, ItemError> {
    let (meta, body): (PageMeta, String) = read_item(dir)?;

    if meta.title.trim().is_empty() {
        return Err(ItemError::MissingTitle);
    }

    let path = format!("/{}/{}", PAGE_DIR, slug);
    log::debug!("Parsed page {}", path);

    Ok(Page {
        title: meta.title,
        excerpt: excerpt_or_first_paragraph(meta.excerpt, &body),
        slug: slug.to_string(),
        thumbnail: thumbnail_path(&path, dir),
        path,
        html: render_html(&body),
        source_dir: dir.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_item(root: &Path, kind: &str, slug: &str, content: &str) -> PathBuf {
        let dir = root.join(kind).join(slug);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(INDEX_FILE), content).unwrap();
        dir
    }

    fn post_source(title: &str, created: &str, extra: &str) -> String {
        format!(
            "+++\ntitle = \"{}\"\ncreatedAt = \"{}\"\n{}\n+++\nFirst paragraph\nof   the post.\n\nSecond.\n",
            title, created, extra
        )
    }

    #[test]
    fn test_parse_post() {
        let root = tempfile::tempdir().unwrap();
        let dir = write_item(
            root.path(),
            POST_DIR,
            "hello",
            &post_source(
                "Hello",
                "2022-02-02 10:00:00 +0000",
                "category = \" Notes \"\ntags = [\" a \", \"\", \"b\", \"a\"]\nauthor = \"Ann\"",
            ),
        );
        fs::write(dir.join("_thumbnail.gif"), b"GIF89a\x01\x00").unwrap();

        let post = parse_post("hello", &dir).unwrap();
        assert_eq!(post.title, "Hello");
        assert_eq!(post.path, "/post/hello");
        assert_eq!(post.updated_at, post.created_at);
        assert_eq!(post.category, "Notes");
        assert_eq!(post.tags, vec!["a", "b"]);
        assert_eq!(post.author, "Ann");
        assert_eq!(post.excerpt, "First paragraph of the post.");
        assert_eq!(post.thumbnail.as_deref(), Some("/post/hello/_thumbnail.gif"));
        assert!(post.html.contains("<p>Second.</p>"));
    }

    #[test]
    fn test_explicit_excerpt_is_kept() {
        let root = tempfile::tempdir().unwrap();
        let dir = write_item(
            root.path(),
            POST_DIR,
            "x",
            &post_source("X", "2022-02-02 10:00:00 +0000", "excerpt = \"Mine\""),
        );
        assert_eq!(parse_post("x", &dir).unwrap().excerpt, "Mine");
    }

    #[test]
    fn test_item_errors() {
        let root = tempfile::tempdir().unwrap();
        let r = root.path();

        let dir = write_item(r, POST_DIR, "no-open", "title = \"x\"\n+++\nbody");
        assert!(matches!(
            parse_post("no-open", &dir),
            Err(ItemError::FrontMatter(FrontMatterError::MissingOpeningDelimiter))
        ));

        let dir = write_item(r, POST_DIR, "no-title", &post_source(" ", "2022-02-02 10:00:00 +0000", ""));
        assert!(matches!(parse_post("no-title", &dir), Err(ItemError::MissingTitle)));

        let dir = write_item(r, POST_DIR, "bad-date", &post_source("T", "2022-02-02", ""));
        assert!(matches!(
            parse_post("bad-date", &dir),
            Err(ItemError::InvalidTimestamp { field: "createdAt", .. })
        ));

        let dir = write_item(
            r,
            POST_DIR,
            "bad-update",
            &post_source("T", "2022-02-02 10:00:00 +0000", "updatedAt = \"yesterday\""),
        );
        assert!(matches!(
            parse_post("bad-update", &dir),
            Err(ItemError::InvalidTimestamp { field: "updatedAt", .. })
        ));

        for (slug, created) in [
            ("colon-offset", "2022-02-02 10:00:00 +00:00"),
            ("short-fields", "2022-2-2 9:00:00 +0000"),
            ("padded", " 2022-02-02 10:00:00 +0000 "),
        ] {
            let dir = write_item(r, POST_DIR, slug, &post_source("T", created, ""));
            assert!(
                matches!(
                    parse_post(slug, &dir),
                    Err(ItemError::InvalidTimestamp { field: "createdAt", .. })
                ),
                "{}",
                slug
            );
        }

        let dir = write_item(
            r,
            POST_DIR,
            "padded-update",
            &post_source("T", "2022-02-02 10:00:00 +0000", "updatedAt = \"2022-02-03 10:00:00 +0000 \""),
        );
        assert!(matches!(
            parse_post("padded-update", &dir),
            Err(ItemError::InvalidTimestamp { field: "updatedAt", .. })
        ));

        let dir = write_item(r, POST_DIR, "bad-toml", "+++\ntitle = \n+++\n");
        assert!(matches!(parse_post("bad-toml", &dir), Err(ItemError::Metadata(_))));

        let dir = r.join(POST_DIR).join("no-index");
        fs::create_dir_all(&dir).unwrap();
        assert!(matches!(parse_post("no-index", &dir), Err(ItemError::Io(_))));
    }

    #[test]
    fn test_parse_posts_skips_bad_items() {
        let root = tempfile::tempdir().unwrap();
        let r = root.path();
        write_item(r, POST_DIR, "b-good", &post_source("B", "2022-01-01 00:00:00 +0000", "category = \"Go\""));
        write_item(r, POST_DIR, "a-broken", "no front matter at all");
        write_item(r, POST_DIR, "c-good", &post_source("C", "2022-03-01 00:00:00 +0000", "tags = [\"x\"]"));
        fs::write(r.join(POST_DIR).join("stray.md"), "ignored").unwrap();

        let parsed = ContentParser::new(r).parse_posts().unwrap();
        let slugs: Vec<&str> = parsed.posts.iter().map(|p| p.slug.as_str()).collect();
        assert_eq!(slugs, vec!["c-good", "b-good"]);

        assert_eq!(parsed.skipped.len(), 1);
        assert_eq!(parsed.skipped[0].name, "post/a-broken");

        let categories: Vec<&str> = parsed.categories.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(categories, vec!["", "Go"]);
        assert_eq!(parsed.tags.len(), 1);
    }

    #[test]
    fn test_identical_timestamps_keep_name_order() {
        let root = tempfile::tempdir().unwrap();
        for slug in ["delta", "alpha", "charlie", "bravo"] {
            write_item(root.path(), POST_DIR, slug, &post_source(slug, "2022-01-01 00:00:00 +0000", ""));
        }

        let parsed = ContentParser::new(root.path()).parse_posts().unwrap();
        let slugs: Vec<&str> = parsed.posts.iter().map(|p| p.slug.as_str()).collect();
        assert_eq!(slugs, vec!["alpha", "bravo", "charlie", "delta"]);
    }

    #[test]
    fn test_parse_pages() {
        let root = tempfile::tempdir().unwrap();
        let r = root.path();
        write_item(r, PAGE_DIR, "z", "+++\ntitle = \"About\"\n+++\nWho we are.");
        write_item(r, PAGE_DIR, "a", "+++\ntitle = \"Contact\"\nexcerpt = \"Say hi\"\n+++\n");
        write_item(r, PAGE_DIR, "m", "+++\nexcerpt = \"untitled\"\n+++\n");

        let parsed = ContentParser::new(r).parse_pages().unwrap();
        let titles: Vec<&str> = parsed.pages.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["About", "Contact"]);
        assert_eq!(parsed.pages[0].path, "/page/z");
        assert_eq!(parsed.pages[0].excerpt, "Who we are.");
        assert_eq!(parsed.pages[1].excerpt, "Say hi");
        assert_eq!(parsed.skipped.len(), 1);
    }

    #[test]
    fn test_missing_content_dir_is_fatal() {
        let root = tempfile::tempdir().unwrap();
        assert!(matches!(
            ContentParser::new(root.path()).parse_posts(),
            Err(ParseError::ReadDir { .. })
        ));
    }
}
