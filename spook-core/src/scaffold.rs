//! Skeletons for new sites, themes, pages and posts.

use std::{
    fmt,
    fs,
    path::{Path, PathBuf},
};

use chrono::{DateTime, FixedOffset};

use crate::builder::STATIC_DIR;
use crate::config::{CONFIG_FILE, Config, ConfigError, DEFAULT_PAGINATION, THEME_DIR};
use crate::model::{PageMeta, PostMeta, TIMESTAMP_FORMAT};
use crate::parser::{INDEX_FILE, PAGE_DIR, POST_DIR};

pub const PAGE_NAME_LIMIT: usize = 80;
pub const POST_NAME_LIMIT: usize = 100;

const SITE_DIRS: [&str; 4] = [STATIC_DIR, THEME_DIR, PAGE_DIR, POST_DIR];
const THEME_DIRS: [&str; 3] = ["res", "css", "js"];
const THEME_FILES: [&str; 6] = [
    "_base.html",
    "frontpage.html",
    "list.html",
    "page.html",
    "post.html",
    "404.html",
];

#[derive(Debug)]
pub enum ScaffoldError {
    Io { path: PathBuf, source: std::io::Error },
    NotEmpty(PathBuf),
    EmptyTitle,
    InvalidName(String),
    Config(ConfigError),
    Serializing(toml::ser::Error),
}

impl fmt::Display for ScaffoldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScaffoldError::Io { path, source } => write!(f, "IO error on {}: {}", path.display(), source),
            ScaffoldError::NotEmpty(path) => {
                write!(f, "{} already exists and is not empty", path.display())
            }
            ScaffoldError::EmptyTitle => write!(f, "Title must not be empty"),
            ScaffoldError::InvalidName(name) => write!(f, "{:?} is not a valid name", name),
            ScaffoldError::Config(e) => write!(f, "{}", e),
            ScaffoldError::Serializing(e) => write!(f, "TOML write error: {}", e),
        }
    }
}

impl std::error::Error for ScaffoldError {}

impl From<ConfigError> for ScaffoldError {
    fn from(err: ConfigError) -> Self {
        ScaffoldError::Config(err)
    }
}

impl From<toml::ser::Error> for ScaffoldError {
    fn from(err: toml::ser::Error) -> Self {
        ScaffoldError::Serializing(err)
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> ScaffoldError + '_ {
    move |source| ScaffoldError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Values asked for when creating a site.
#[derive(Debug, Clone, Default)]
pub struct SiteInfo {
    pub title: String,
    pub base_url: String,
    pub owner: String,
}

/// Creates the directory layout and `config.toml` of a new site at `path`.
/// A non-empty `path` is refused unless `force` is set.
pub fn new_site(path: &Path, info: &SiteInfo, force: bool) -> Result<(), ScaffoldError> {
    let config = Config {
        title: info.title.trim().to_string(),
        owner: info.owner.trim().to_string(),
        base_url: info.base_url.trim().to_string(),
        pagination: DEFAULT_PAGINATION,
        ..Config::default()
    };

    if config.title.is_empty() {
        return Err(ScaffoldError::EmptyTitle);
    }
    config.validate(false)?;

    fs::create_dir_all(path).map_err(io_error(path))?;
    if !force && !is_empty_dir(path)? {
        return Err(ScaffoldError::NotEmpty(path.to_path_buf()));
    }

    for dir in SITE_DIRS {
        let dir = path.join(dir);
        fs::create_dir_all(&dir).map_err(io_error(&dir))?;
    }

    config.write(path.join(CONFIG_FILE))?;
    log::debug!("Created site skeleton in {}", path.display());
    Ok(())
}

/// Creates `theme/<name>` with empty templates and asset directories.
pub fn new_theme(root: &Path, name: &str) -> Result<PathBuf, ScaffoldError> {
    Config::open(root, false)?;
    check_name(name)?;

    let path = root.join(THEME_DIR).join(name);
    fs::create_dir_all(&path).map_err(io_error(&path))?;
    if !is_empty_dir(&path)? {
        return Err(ScaffoldError::NotEmpty(path));
    }

    for dir in THEME_DIRS {
        let dir = path.join(dir);
        fs::create_dir_all(&dir).map_err(io_error(&dir))?;
    }
    for file in THEME_FILES {
        let file = path.join(file);
        fs::write(&file, "").map_err(io_error(&file))?;
    }

    Ok(path)
}

pub fn new_page(root: &Path, title: &str) -> Result<PathBuf, ScaffoldError> {
    Config::open(root, false)?;
    check_title(title)?;

    let meta = PageMeta {
        title: title.trim().to_string(),
        excerpt: String::new(),
    };
    let name = dir_name_for("", title, PAGE_NAME_LIMIT);

    create_item(&root.join(PAGE_DIR), &name, &toml::to_string(&meta)?)
}

/// Creates a post dated `now`, authored by the site owner.
pub fn new_post(root: &Path, title: &str, now: DateTime<FixedOffset>) -> Result<PathBuf, ScaffoldError> {
    let config = Config::open(root, false)?;
    check_title(title)?;

    let timestamp = now.format(TIMESTAMP_FORMAT).to_string();
    let meta = PostMeta {
        title: title.trim().to_string(),
        created_at: timestamp.clone(),
        updated_at: timestamp,
        author: config.owner,
        ..PostMeta::default()
    };
    let prefix = now.format("%Y-%m-%d-").to_string();
    let name = dir_name_for(&prefix, title, POST_NAME_LIMIT);

    create_item(&root.join(POST_DIR), &name, &toml::to_string(&meta)?)
}

/// Lowercased words of `title` joined by `-` after `prefix`. Words are added
/// until the name reaches `limit` bytes.
pub fn dir_name_for(prefix: &str, title: &str, limit: usize) -> String {
    let mut name = prefix.to_string();
    for word in title.split_whitespace() {
        let word: String = word
            .to_lowercase()
            .chars()
            .map(|c| if c == '/' || c == '\\' { '-' } else { c })
            .collect();
        name.push_str(&word);
        name.push('-');
        if name.len() >= limit {
            break;
        }
    }

    match name.strip_suffix('-') {
        Some(trimmed) => trimmed.to_string(),
        None => name,
    }
}

/// Writes `<parent>/<name>/_index.md`, appending `-1` to `name` until it
/// does not clash with an existing directory.
fn create_item(parent: &Path, name: &str, metadata: &str) -> Result<PathBuf, ScaffoldError> {
    let mut name = name.to_string();
    while parent.join(&name).is_dir() {
        name.push_str("-1");
    }

    let dir = parent.join(&name);
    fs::create_dir_all(&dir).map_err(io_error(&dir))?;

    let index = dir.join(INDEX_FILE);
    fs::write(&index, format!("+++\n{}+++\n", metadata)).map_err(io_error(&index))?;

    log::debug!("Created {}", index.display());
    Ok(dir)
}

fn check_title(title: &str) -> Result<(), ScaffoldError> {
    match title.trim() {
        "" => Err(ScaffoldError::EmptyTitle),
        _ => Ok(()),
    }
}

fn check_name(name: &str) -> Result<(), ScaffoldError> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed == "." || trimmed == ".." || trimmed.contains(['/', '\\']) {
        return Err(ScaffoldError::InvalidName(name.to_string()));
    }
    Ok(())
}

fn is_empty_dir(path: &Path) -> Result<bool, ScaffoldError> {
    let mut entries = fs::read_dir(path).map_err(io_error(path))?;
    Ok(entries.next().is_none())
}
