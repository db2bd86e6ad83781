use std::{
    fmt,
    io::Write,
    path::{Path, PathBuf},
};

use serde::Serialize;
use tera::{Context, Tera};

use crate::config::{Config, ConfigError};
use crate::funcs::FunctionTable;
use crate::layout::{Layout, ListLayout, PageLayout, PostLayout};
use crate::model::Page;
use crate::paginate::{page_count, paginate};
use crate::site::Site;
use crate::taxonomy::{ListKind, category_path, posts_in, tag_path};

pub const FRONT_PAGE_TEMPLATES: [&str; 3] = ["frontpage.html", "index.html", "list.html"];
pub const LIST_TEMPLATE: &str = "list.html";
pub const PAGE_TEMPLATE: &str = "page.html";
pub const POST_TEMPLATE: &str = "post.html";
pub const NOT_FOUND_TEMPLATE: &str = "404.html";

const PARTIAL_PREFIX: &str = "_";
const TEMPLATE_EXTENSION: &str = ".html";

#[derive(Debug)]
pub enum RenderError {
    Config(ConfigError),
    ReadTheme { path: PathBuf, source: std::io::Error },
    TemplateNotFound(String),
    Template(tera::Error),
    PageOutOfRange { page: usize, max_page: usize },
    PostOutOfRange(usize),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::Config(e) => write!(f, "Invalid configuration: {}", e),
            RenderError::ReadTheme { path, source } => {
                write!(f, "Unable to read theme {}: {}", path.display(), source)
            }
            RenderError::TemplateNotFound(name) => write!(f, "Template {} does not exist", name),
            RenderError::Template(e) => write!(f, "Template error: {}", e),
            RenderError::PageOutOfRange { page, max_page } => {
                write!(f, "Page {} is out of range, last page is {}", page, max_page)
            }
            RenderError::PostOutOfRange(index) => write!(f, "No post at index {}", index),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::Config(e) => Some(e),
            RenderError::ReadTheme { source, .. } => Some(source),
            RenderError::Template(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for RenderError {
    fn from(err: ConfigError) -> Self {
        RenderError::Config(err)
    }
}

impl From<tera::Error> for RenderError {
    fn from(err: tera::Error) -> Self {
        RenderError::Template(err)
    }
}

/// Which page of a list was rendered and how many there are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListSummary {
    pub current_page: usize,
    pub max_page: usize,
    pub posts: usize,
}

/// Renders site views through the theme's templates. Templates are read from
/// disk on every call.
pub struct Renderer<'a> {
    config: &'a Config,
    root: &'a Path,
    site: &'a Site,
    functions: FunctionTable,
}

impl<'a> Renderer<'a> {
    pub fn new(config: &'a Config, root: &'a Path, site: &'a Site, functions: FunctionTable) -> Self {
        Self {
            config,
            root,
            site,
            functions,
        }
    }

    /// Uses the first of `frontpage.html`, `index.html` and `list.html` the
    /// theme provides.
    pub fn render_front_page<W: Write>(&self, w: W) -> Result<ListSummary, RenderError> {
        self.config.validate(true)?;

        let theme_dir = self.config.theme_dir(self.root);
        let template = FRONT_PAGE_TEMPLATES
            .into_iter()
            .find(|name| is_present(&theme_dir.join(name)))
            .ok_or_else(|| RenderError::TemplateNotFound(FRONT_PAGE_TEMPLATES.join(", ")))?;

        self.render_list_with(template, ListKind::Posts, "", 1, w)
    }

    /// Renders the 1-indexed `page` of a list. `name` is the category or tag
    /// and is ignored for `ListKind::Posts`.
    pub fn render_list<W: Write>(
        &self,
        kind: ListKind,
        name: &str,
        page: usize,
        w: W,
    ) -> Result<ListSummary, RenderError> {
        self.config.validate(true)?;
        self.render_list_with(LIST_TEMPLATE, kind, name, page, w)
    }

    pub fn render_page<W: Write>(&self, page: &Page, w: W) -> Result<(), RenderError> {
        self.config.validate(true)?;

        let view = PageLayout::new(self.layout(), page);
        self.execute(PAGE_TEMPLATE, &view, w)
    }

    /// Renders the post at `index` of `Site::posts`, linked to its older and
    /// newer neighbours.
    pub fn render_post<W: Write>(&self, index: usize, w: W) -> Result<(), RenderError> {
        self.config.validate(true)?;

        let (post, older, newer) = self
            .site
            .post_with_neighbours(index)
            .ok_or(RenderError::PostOutOfRange(index))?;

        let view = PostLayout::new(self.layout(), post, older, newer);
        self.execute(POST_TEMPLATE, &view, w)
    }

    pub fn render_not_found<W: Write>(&self, w: W) -> Result<(), RenderError> {
        self.config.validate(true)?;

        let view = self.layout().content("Page not found", "", &self.config.owner);
        self.execute(NOT_FOUND_TEMPLATE, &view, w)
    }

    fn layout(&self) -> Layout<'a> {
        Layout::new(
            self.config,
            &self.site.categories,
            &self.site.tags,
            &self.site.pages,
        )
    }

    fn render_list_with<W: Write>(
        &self,
        template: &str,
        kind: ListKind,
        name: &str,
        page: usize,
        w: W,
    ) -> Result<ListSummary, RenderError> {
        let name = name.trim();
        let page = page.max(1);
        let size = self.config.page_size();

        let posts = posts_in(&self.site.posts, kind, name);
        let max_page = page_count(posts.len(), size);
        let current = match paginate(&posts, page, size) {
            Some(current) => current.to_vec(),
            // An empty list still has a first page.
            None if page == 1 => Vec::new(),
            None => return Err(RenderError::PageOutOfRange { page, max_page }),
        };

        let (title, path) = match kind {
            ListKind::Posts => (self.config.title.as_str(), "/posts".to_string()),
            ListKind::Category => (name, category_path(name)),
            ListKind::Tag => (name, tag_path(name)),
        };

        let summary = ListSummary {
            current_page: page,
            max_page,
            posts: current.len(),
        };

        let view = ListLayout {
            layout: self.layout().content(title, &self.config.description, &self.config.owner),
            kind,
            path,
            posts: current,
            current_page: page,
            max_page,
        };
        self.execute(template, &view, w)?;

        Ok(summary)
    }

    /// Loads the theme's partials plus `template` into a fresh template set
    /// and renders `template`.
    fn execute<T: Serialize, W: Write>(&self, template: &str, view: &T, w: W) -> Result<(), RenderError> {
        let theme_dir = self.config.theme_dir(self.root);
        let path = theme_dir.join(template);
        if !is_present(&path) {
            return Err(RenderError::TemplateNotFound(template.to_string()));
        }

        let mut files = partials(&theme_dir)?;
        files.push((path, Some(template.to_string())));
        log::debug!("Rendering {} with {} templates", template, files.len());

        let mut tera = Tera::default();
        self.functions.register(&mut tera);
        tera.add_template_files(files)?;

        let context = Context::from_serialize(view)?;
        tera.render_to(template, &context, w)?;
        Ok(())
    }
}

/// Present means an existing, non-empty file.
fn is_present(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}

/// `_*.html` files of the theme, named after their file names.
fn partials(theme_dir: &Path) -> Result<Vec<(PathBuf, Option<String>)>, RenderError> {
    let read_error = |source| RenderError::ReadTheme {
        path: theme_dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in std::fs::read_dir(theme_dir).map_err(read_error)? {
        let entry = entry.map_err(read_error)?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(PARTIAL_PREFIX) && name.ends_with(TEMPLATE_EXTENSION) && entry.path().is_file() {
            files.push((entry.path(), Some(name)));
        }
    }

    files.sort();
    Ok(files)
}
