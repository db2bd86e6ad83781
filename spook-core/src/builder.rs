use std::{
    fmt,
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use walkdir::WalkDir;

use crate::config::{Config, ConfigError, THEME_DIR};
use crate::funcs::FunctionTable;
use crate::model::Group;
use crate::parser::{INDEX_FILE, PAGE_DIR, POST_DIR, ParseError, Skipped};
use crate::renderer::{ListSummary, RenderError, Renderer};
use crate::site::Site;
use crate::taxonomy::{ListKind, UNCATEGORIZED};

pub const STATIC_DIR: &str = "static";
const INDEX_HTML: &str = "index.html";
const NOT_FOUND_HTML: &str = "404.html";

/// Site directories an output directory must stay out of.
const SOURCE_DIRS: [&str; 4] = [POST_DIR, PAGE_DIR, STATIC_DIR, THEME_DIR];

#[derive(Debug)]
pub enum BuildError {
    Config(ConfigError),
    Parse(ParseError),
    Render { path: PathBuf, source: RenderError },
    Io { path: PathBuf, source: std::io::Error },
    Walk(walkdir::Error),
    /// The output directory would swallow the site sources when cleaned.
    OutputContainsRoot(PathBuf),
    /// The output directory lies within one of the site's source directories.
    OutputInsideSources(PathBuf),
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::Config(e) => write!(f, "Invalid configuration: {}", e),
            BuildError::Parse(e) => write!(f, "Parse error: {}", e),
            BuildError::Render { path, source } => {
                write!(f, "Unable to render {}: {}", path.display(), source)
            }
            BuildError::Io { path, source } => write!(f, "IO error on {}: {}", path.display(), source),
            BuildError::Walk(e) => write!(f, "Unable to walk directory: {}", e),
            BuildError::OutputContainsRoot(p) => {
                write!(f, "Refusing to clean {}: it contains the site root", p.display())
            }
            BuildError::OutputInsideSources(p) => {
                write!(f, "Refusing to clean {}: it is inside the site sources", p.display())
            }
        }
    }
}

impl std::error::Error for BuildError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BuildError::Config(e) => Some(e),
            BuildError::Parse(e) => Some(e),
            BuildError::Render { source, .. } => Some(source),
            BuildError::Io { source, .. } => Some(source),
            BuildError::Walk(e) => Some(e),
            BuildError::OutputContainsRoot(_) | BuildError::OutputInsideSources(_) => None,
        }
    }
}

impl From<ConfigError> for BuildError {
    fn from(err: ConfigError) -> Self {
        BuildError::Config(err)
    }
}

impl From<ParseError> for BuildError {
    fn from(err: ParseError) -> Self {
        BuildError::Parse(err)
    }
}

impl From<walkdir::Error> for BuildError {
    fn from(err: walkdir::Error) -> Self {
        BuildError::Walk(err)
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> BuildError + '_ {
    move |source| BuildError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[derive(Debug, Default)]
pub struct BuildReport {
    /// Rendered pages plus copied files.
    pub files_written: usize,
    pub skipped: Vec<Skipped>,
}

/// Renders the whole site under `root` into `output_dir`, which is emptied
/// first.
pub fn build_site(root: &Path, config: &Config, output_dir: &Path) -> Result<BuildReport, BuildError> {
    config.validate(true)?;

    log::info!("Cleaning output directory {}", output_dir.display());
    clean_dir(root, output_dir)?;

    let mut report = BuildReport::default();

    let static_dir = root.join(STATIC_DIR);
    if static_dir.is_dir() {
        log::info!("Copying static files");
        report.files_written += copy_dir(&static_dir, &output_dir.join(STATIC_DIR), |_| false)?;
    }

    log::info!("Copying theme assets");
    let theme_dir = config.theme_dir(root);
    for entry in fs::read_dir(&theme_dir).map_err(io_error(&theme_dir))? {
        let entry = entry.map_err(io_error(&theme_dir))?;
        if entry.file_type().map_err(io_error(&entry.path()))?.is_dir() {
            report.files_written += copy_dir(&entry.path(), &output_dir.join(entry.file_name()), |_| false)?;
        }
    }

    let mut site = Site::load(root)?;
    {
        let renderer = Renderer::new(config, root, &site, FunctionTable::standard());
        let mut writer = OutputWriter {
            output_dir,
            files_written: 0,
        };

        log::info!("Rendering front page");
        writer.write(INDEX_HTML, |w| renderer.render_front_page(w))?;

        log::info!("Rendering lists");
        writer.write_list(&renderer, ListKind::Posts, "", "posts")?;
        write_groups(&mut writer, &renderer, ListKind::Category, &site.categories)?;
        write_groups(&mut writer, &renderer, ListKind::Tag, &site.tags)?;

        log::info!("Rendering {} pages", site.pages.len());
        for page in &site.pages {
            let dir = Path::new(PAGE_DIR).join(&page.slug);
            report.files_written += copy_item_dir(&page.source_dir, &output_dir.join(&dir))?;
            writer.write(dir.join(INDEX_HTML), |w| renderer.render_page(page, w))?;
        }

        log::info!("Rendering {} posts", site.posts.len());
        for (index, post) in site.posts.iter().enumerate() {
            let dir = Path::new(POST_DIR).join(&post.slug);
            report.files_written += copy_item_dir(&post.source_dir, &output_dir.join(&dir))?;
            writer.write(dir.join(INDEX_HTML), |w| renderer.render_post(index, w))?;
        }

        match writer.write(NOT_FOUND_HTML, |w| renderer.render_not_found(w)) {
            Ok(()) => {}
            Err(BuildError::Render {
                source: RenderError::TemplateNotFound(_),
                path,
            }) => {
                log::debug!("Theme has no 404 template");
                if let Err(e) = fs::remove_file(&path) {
                    log::warn!("Unable to remove {}: {}", path.display(), e);
                }
            }
            Err(e) => return Err(e),
        }

        report.files_written += writer.files_written;
    }

    report.skipped = std::mem::take(&mut site.skipped);
    log::info!(
        "Wrote {} files to {} ({} items skipped)",
        report.files_written,
        output_dir.display(),
        report.skipped.len()
    );
    Ok(report)
}

fn write_groups(
    writer: &mut OutputWriter<'_>,
    renderer: &Renderer<'_>,
    kind: ListKind,
    groups: &[Group],
) -> Result<(), BuildError> {
    for group in groups {
        let name = match (kind, group.name.as_str()) {
            (ListKind::Category, "") => UNCATEGORIZED,
            (_, name) => name,
        };
        if name.contains(['/', '\\']) || name == "." || name == ".." {
            log::warn!("Skipped {:?}: not usable as a directory name", group.path);
            continue;
        }
        writer.write_list(renderer, kind, name, group.path.trim_start_matches('/'))?;
    }
    Ok(())
}

struct OutputWriter<'a> {
    output_dir: &'a Path,
    files_written: usize,
}

impl OutputWriter<'_> {
    /// Creates `<output_dir>/<rel>` and renders into it.
    fn write<P, F, T>(&mut self, rel: P, render: F) -> Result<T, BuildError>
    where
        P: AsRef<Path>,
        F: FnOnce(&mut BufWriter<File>) -> Result<T, RenderError>,
    {
        let path = self.output_dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_error(parent))?;
        }

        let file = File::create(&path).map_err(io_error(&path))?;
        let mut w = BufWriter::new(file);
        let result = render(&mut w).map_err(|source| BuildError::Render {
            path: path.clone(),
            source,
        })?;
        w.flush().map_err(io_error(&path))?;

        log::debug!("Wrote {}", path.display());
        self.files_written += 1;
        Ok(result)
    }

    /// Writes page 1 to `<dir>/index.html` and every page *n* to
    /// `<dir>/<n>/index.html`.
    fn write_list(
        &mut self,
        renderer: &Renderer<'_>,
        kind: ListKind,
        name: &str,
        dir: &str,
    ) -> Result<(), BuildError> {
        let dir = Path::new(dir);
        let first: ListSummary =
            self.write(dir.join(INDEX_HTML), |w| renderer.render_list(kind, name, 1, w))?;

        for page in 1..=first.max_page {
            let rel = dir.join(page.to_string()).join(INDEX_HTML);
            self.write(rel, |w| renderer.render_list(kind, name, page, w))?;
        }
        Ok(())
    }
}

/// Empties `dir`, creating it if needed.
fn clean_dir(root: &Path, dir: &Path) -> Result<(), BuildError> {
    fs::create_dir_all(dir).map_err(io_error(dir))?;

    let canonical_dir = fs::canonicalize(dir).map_err(io_error(dir))?;
    let canonical_root = fs::canonicalize(root).map_err(io_error(root))?;
    if canonical_root.starts_with(&canonical_dir) {
        return Err(BuildError::OutputContainsRoot(dir.to_path_buf()));
    }
    for source in SOURCE_DIRS {
        let Ok(source) = fs::canonicalize(canonical_root.join(source)) else {
            continue;
        };
        if canonical_dir.starts_with(&source) {
            return Err(BuildError::OutputInsideSources(dir.to_path_buf()));
        }
    }

    for entry in fs::read_dir(dir).map_err(io_error(dir))? {
        let path = entry.map_err(io_error(dir))?.path();
        let removed = if path.is_dir() && !path.is_symlink() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        removed.map_err(io_error(&path))?;
    }
    Ok(())
}

/// Copies the assets of a page or post directory, leaving its index file
/// behind.
fn copy_item_dir(src: &Path, dst: &Path) -> Result<usize, BuildError> {
    copy_dir(src, dst, |rel| rel == Path::new(INDEX_FILE))
}

/// Recursively copies `src` into `dst`, returning the number of files
/// copied. Symlinks are skipped, as are files for which `skip` returns true
/// given their path relative to `src`.
pub fn copy_dir<F>(src: &Path, dst: &Path, skip: F) -> Result<usize, BuildError>
where
    F: Fn(&Path) -> bool,
{
    let mut copied = 0;
    for entry in WalkDir::new(src).follow_links(false) {
        let entry = entry?;
        let Ok(rel) = entry.path().strip_prefix(src) else {
            continue;
        };
        let target = dst.join(rel);

        let file_type = entry.file_type();
        if file_type.is_symlink() {
            log::debug!("Skipping symlink {}", entry.path().display());
        } else if file_type.is_dir() {
            fs::create_dir_all(&target).map_err(io_error(&target))?;
        } else if !skip(rel) {
            fs::copy(entry.path(), &target).map_err(io_error(entry.path()))?;
            copied += 1;
        }
    }
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_dir() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        fs::create_dir_all(src.path().join("nested/deeper")).unwrap();
        fs::write(src.path().join(INDEX_FILE), "+++\n+++\n").unwrap();
        fs::write(src.path().join("image.png"), "png").unwrap();
        fs::write(src.path().join("nested/deeper/note.txt"), "note").unwrap();
        fs::write(src.path().join("nested").join(INDEX_FILE), "kept").unwrap();

        let out = dst.path().join("item");
        assert_eq!(copy_item_dir(src.path(), &out).unwrap(), 3);
        assert!(!out.join(INDEX_FILE).exists());
        assert!(out.join("image.png").is_file());
        assert!(out.join("nested").join(INDEX_FILE).is_file());
        assert_eq!(fs::read_to_string(out.join("nested/deeper/note.txt")).unwrap(), "note");
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_dir_skips_symlinks() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        fs::write(src.path().join("real.txt"), "x").unwrap();
        std::os::unix::fs::symlink(src.path().join("real.txt"), src.path().join("link.txt")).unwrap();

        assert_eq!(copy_dir(src.path(), dst.path(), |_| false).unwrap(), 1);
        assert!(!dst.path().join("link.txt").exists());
    }

    #[test]
    fn test_clean_dir() {
        let root = tempfile::tempdir().unwrap();
        let out = root.path().join("public");
        fs::create_dir_all(out.join("old/dir")).unwrap();
        fs::write(out.join("stale.html"), "x").unwrap();

        clean_dir(root.path(), &out).unwrap();
        assert!(out.is_dir());
        assert_eq!(fs::read_dir(&out).unwrap().count(), 0);

        assert!(matches!(
            clean_dir(root.path(), root.path()),
            Err(BuildError::OutputContainsRoot(_))
        ));
    }

    #[test]
    fn test_clean_dir_refuses_source_dirs() {
        let root = tempfile::tempdir().unwrap();
        let r = root.path();
        fs::create_dir_all(r.join("post/hello")).unwrap();
        fs::write(r.join("post/hello").join(INDEX_FILE), "+++\n+++\n").unwrap();
        fs::create_dir_all(r.join("theme/plain")).unwrap();
        fs::write(r.join("theme/plain/list.html"), "list").unwrap();

        for out in [r.join("post"), r.join("post/hello"), r.join("theme"), r.join("static/out")] {
            assert!(
                matches!(clean_dir(r, &out), Err(BuildError::OutputInsideSources(_))),
                "{}",
                out.display()
            );
        }
        assert!(r.join("post/hello").join(INDEX_FILE).is_file());
        assert!(r.join("theme/plain/list.html").is_file());

        // Sharing a name prefix with a source dir is fine.
        clean_dir(r, &r.join("posts-out")).unwrap();
    }

    #[test]
    fn test_build_refuses_source_dirs() {
        let root = tempfile::tempdir().unwrap();
        let r = root.path();
        fs::create_dir_all(r.join("post/hello")).unwrap();
        fs::write(r.join("post/hello").join(INDEX_FILE), "+++\ntitle = \"Hello\"\n+++\n").unwrap();

        let config = Config {
            base_url: "/".into(),
            theme: "plain".into(),
            ..Config::default()
        };
        assert!(matches!(
            build_site(r, &config, &r.join("post")),
            Err(BuildError::OutputInsideSources(_))
        ));
        assert!(r.join("post/hello").join(INDEX_FILE).is_file());
    }

    #[test]
    fn test_invalid_config_is_fatal() {
        let root = tempfile::tempdir().unwrap();
        let config = Config::default();
        assert!(matches!(
            build_site(root.path(), &config, &root.path().join("public")),
            Err(BuildError::Config(ConfigError::MissingBaseUrl))
        ));
    }
}
