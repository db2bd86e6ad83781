use anyhow::{Context, Result};
use axum::{
    Router,
    extract::{Path as UrlPath, Request, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
};
use spook_core::{
    Config, FunctionTable, ListKind, ParseError, RenderError, Renderer, Site,
    builder::STATIC_DIR,
    parser::{INDEX_FILE, PAGE_DIR, POST_DIR},
};
use std::{
    fmt,
    net::SocketAddr,
    path::{Component, Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use tower::ServiceExt;
use tower_http::{
    services::{ServeDir, ServeFile},
    timeout::TimeoutLayer,
};

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Theme directories served as-is.
const THEME_ASSET_DIRS: [&str; 3] = ["css", "js", "res"];

/// Configuration for the preview server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to serve on
    pub port: u16,
    /// Site root
    pub root: PathBuf,
    /// Auto-open browser
    pub open: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            root: PathBuf::from("."),
            open: false,
        }
    }
}

/// Serves a site straight from its sources, parsing and rendering on every
/// request.
pub struct Server {
    config: ServerConfig,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    pub async fn run(self) -> Result<()> {
        let root = &self.config.root;
        if !root.is_dir() {
            return Err(anyhow::anyhow!("Root directory does not exist: {}", root.display()));
        }

        let site_config = Config::open(root, true)
            .with_context(|| format!("Unable to load site configuration from {}", root.display()))?;
        let app = router(ServerState::new(root.clone(), site_config));

        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port).parse()?;
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Unable to listen on {}", addr))?;

        log::info!("Serving {} at http://{}", root.display(), addr);

        if self.config.open
            && let Err(e) = open::that(format!("http://{}", addr))
        {
            log::warn!("Failed to open browser: {}", e);
        }

        axum::serve(listener, app).await?;
        Ok(())
    }
}

/// Read-only state shared by every request.
#[derive(Clone)]
pub struct ServerState {
    root: Arc<PathBuf>,
    config: Arc<Config>,
}

impl ServerState {
    pub fn new(root: PathBuf, config: Config) -> Self {
        Self {
            root: Arc::new(root),
            config: Arc::new(config),
        }
    }
}

pub fn router(state: ServerState) -> Router {
    let theme_dir = state.config.theme_dir(state.root.as_path());
    let static_dir = state.root.join(STATIC_DIR);

    let mut app = Router::new()
        .route("/", get(front_page))
        .route("/posts", get(posts))
        .route("/posts/{n}", get(posts_page))
        .route("/category/{name}", get(category))
        .route("/category/{name}/{n}", get(category_page))
        .route("/tag/{name}", get(tag))
        .route("/tag/{name}/{n}", get(tag_page))
        .route("/page/{*rest}", get(page_item))
        .route("/post/{*rest}", get(post_item))
        .nest_service("/static", ServeDir::new(static_dir));

    for dir in THEME_ASSET_DIRS {
        app = app.nest_service(&format!("/{}", dir), ServeDir::new(theme_dir.join(dir)));
    }

    app.fallback(fallback)
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .with_state(state)
}

#[derive(Debug)]
pub enum AppError {
    NotFound,
    Parse(ParseError),
    Render(RenderError),
    Join(tokio::task::JoinError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::NotFound => write!(f, "Not found"),
            AppError::Parse(e) => write!(f, "{}", e),
            AppError::Render(e) => write!(f, "{}", e),
            AppError::Join(e) => write!(f, "Render task failed: {}", e),
        }
    }
}

impl std::error::Error for AppError {}

impl From<ParseError> for AppError {
    fn from(err: ParseError) -> Self {
        AppError::Parse(err)
    }
}

impl From<RenderError> for AppError {
    fn from(err: RenderError) -> Self {
        match err {
            RenderError::PageOutOfRange { .. } => AppError::NotFound,
            err => AppError::Render(err),
        }
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Join(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::NotFound => (StatusCode::NOT_FOUND, "404 page not found").into_response(),
            err => {
                log::error!("{}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
            }
        }
    }
}

/// What a request asks to render.
#[derive(Debug, Clone)]
enum View {
    FrontPage,
    List { kind: ListKind, name: String, page: usize },
    Page(String),
    Post(String),
    NotFound,
}

fn render_view(root: &Path, config: &Config, view: &View) -> Result<Vec<u8>, AppError> {
    let site = Site::load(root)?;
    let renderer = Renderer::new(config, root, &site, FunctionTable::standard());

    let mut out = Vec::new();
    match view {
        View::FrontPage => {
            renderer.render_front_page(&mut out)?;
        }
        View::List { kind, name, page } => {
            renderer.render_list(*kind, name, *page, &mut out)?;
        }
        View::Page(slug) => {
            let page = site.find_page(slug).ok_or(AppError::NotFound)?;
            renderer.render_page(page, &mut out)?;
        }
        View::Post(slug) => {
            let index = site.find_post(slug).ok_or(AppError::NotFound)?;
            renderer.render_post(index, &mut out)?;
        }
        View::NotFound => renderer.render_not_found(&mut out)?,
    }
    Ok(out)
}

async fn render(state: &ServerState, view: View) -> Result<Vec<u8>, AppError> {
    let root = Arc::clone(&state.root);
    let config = Arc::clone(&state.config);
    tokio::task::spawn_blocking(move || render_view(&root, &config, &view)).await?
}

async fn respond(state: ServerState, view: View) -> Response {
    log::debug!("Rendering {:?}", view);
    match render(&state, view).await {
        Ok(html) => Html(html).into_response(),
        Err(AppError::NotFound) => not_found(state).await,
        Err(e) => e.into_response(),
    }
}

/// 404 through the theme's `404.html`, or plain text when it can't be
/// rendered.
async fn not_found(state: ServerState) -> Response {
    match render(&state, View::NotFound).await {
        Ok(html) => (StatusCode::NOT_FOUND, Html(html)).into_response(),
        Err(e) => {
            log::debug!("No themed 404 page: {}", e);
            AppError::NotFound.into_response()
        }
    }
}

/// Page numbers that aren't positive integers mean the first page.
fn page_number(n: &str) -> usize {
    n.parse::<usize>().unwrap_or(1).max(1)
}

fn list(kind: ListKind, name: String, page: usize) -> View {
    View::List { kind, name, page }
}

async fn front_page(State(state): State<ServerState>) -> Response {
    respond(state, View::FrontPage).await
}

async fn posts(State(state): State<ServerState>) -> Response {
    respond(state, list(ListKind::Posts, String::new(), 1)).await
}

async fn posts_page(State(state): State<ServerState>, UrlPath(n): UrlPath<String>) -> Response {
    respond(state, list(ListKind::Posts, String::new(), page_number(&n))).await
}

async fn category(State(state): State<ServerState>, UrlPath(name): UrlPath<String>) -> Response {
    respond(state, list(ListKind::Category, name, 1)).await
}

async fn category_page(
    State(state): State<ServerState>,
    UrlPath((name, n)): UrlPath<(String, String)>,
) -> Response {
    respond(state, list(ListKind::Category, name, page_number(&n))).await
}

async fn tag(State(state): State<ServerState>, UrlPath(name): UrlPath<String>) -> Response {
    respond(state, list(ListKind::Tag, name, 1)).await
}

async fn tag_page(
    State(state): State<ServerState>,
    UrlPath((name, n)): UrlPath<(String, String)>,
) -> Response {
    respond(state, list(ListKind::Tag, name, page_number(&n))).await
}

async fn page_item(state: State<ServerState>, rest: UrlPath<String>, req: Request) -> Response {
    item(PAGE_DIR, state, rest, req).await
}

async fn post_item(state: State<ServerState>, rest: UrlPath<String>, req: Request) -> Response {
    item(POST_DIR, state, rest, req).await
}

/// `<kind>/<slug>` redirects to `<kind>/<slug>/`, which renders the item.
/// Anything deeper is an asset file of the item.
async fn item(
    kind: &'static str,
    State(state): State<ServerState>,
    UrlPath(rest): UrlPath<String>,
    req: Request,
) -> Response {
    let rest = rest.trim_start_matches('/');
    let (slug, file) = match rest.split_once('/') {
        Some((slug, file)) => (slug, Some(file)),
        None => (rest, None),
    };

    if slug.is_empty() {
        return not_found(state).await;
    }

    match file {
        None => Redirect::permanent(&format!("/{}/{}/", kind, slug)).into_response(),
        Some("") => {
            let view = match kind {
                PAGE_DIR => View::Page(slug.to_string()),
                _ => View::Post(slug.to_string()),
            };
            respond(state, view).await
        }
        Some(file) => match asset_path(&state.root, kind, slug, file) {
            Some(path) => serve_file(state, path, req).await,
            None => not_found(state).await,
        },
    }
}

/// Path of an item's asset on disk. Index files and anything that would step
/// outside the item directory are refused.
fn asset_path(root: &Path, kind: &str, slug: &str, file: &str) -> Option<PathBuf> {
    let rel = Path::new(slug).join(file);
    if !rel.components().all(|c| matches!(c, Component::Normal(_))) {
        return None;
    }
    if rel.components().count() == 2 && rel.ends_with(INDEX_FILE) {
        return None;
    }
    Some(root.join(kind).join(rel))
}

async fn serve_file(state: ServerState, path: PathBuf, req: Request) -> Response {
    if !path.is_file() {
        return not_found(state).await;
    }

    match ServeFile::new(&path).oneshot(req).await {
        Ok(res) => res.into_response(),
        Err(e) => match e {},
    }
}

async fn fallback(State(state): State<ServerState>, req: Request) -> Response {
    log::debug!("No route for {}", req.uri());
    let mut res = not_found(state).await;
    res.headers_mut()
        .insert(header::CACHE_CONTROL, header::HeaderValue::from_static("no-store"));
    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use std::fs;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn site() -> (tempfile::TempDir, ServerState) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();

        let theme = root.join("theme/plain");
        write(&theme.join("list.html"), "list {{ content_title }} {{ current_page }}/{{ max_page }}");
        write(&theme.join("post.html"), "post {{ content_title }}");
        write(&theme.join("page.html"), "page {{ content_title }}");
        write(&theme.join("css/site.css"), "body {}");
        write(&root.join("static/robots.txt"), "User-agent: *");

        for (slug, updated) in [("one", "01"), ("two", "02"), ("three", "03")] {
            write(
                &root.join("post").join(slug).join(INDEX_FILE),
                &format!(
                    "+++\ntitle = \"{}\"\ncreatedAt = \"2020-01-{} 00:00:00 +0000\"\ntags = [\"misc\"]\n+++\nbody",
                    slug, updated
                ),
            );
        }
        write(&root.join("post/one/photo.txt"), "photo");
        write(&root.join("page/about").join(INDEX_FILE), "+++\ntitle = \"About\"\n+++\n");

        let config = Config {
            title: "Spooky".into(),
            base_url: "/".into(),
            theme: "plain".into(),
            pagination: 2,
            ..Config::default()
        };
        let state = ServerState::new(root.to_path_buf(), config);
        (dir, state)
    }

    async fn get(state: &ServerState, uri: &str) -> (StatusCode, String, Option<String>) {
        let req = axum::http::Request::builder()
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let res = router(state.clone()).oneshot(req).await.unwrap();

        let status = res.status();
        let location = res
            .headers()
            .get(header::LOCATION)
            .map(|v| v.to_str().unwrap().to_string());
        let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap(), location)
    }

    #[test]
    fn test_page_number() {
        assert_eq!(page_number("3"), 3);
        assert_eq!(page_number("0"), 1);
        assert_eq!(page_number("-2"), 1);
        assert_eq!(page_number("abc"), 1);
    }

    #[test]
    fn test_asset_path() {
        let root = Path::new("/site");
        assert_eq!(
            asset_path(root, POST_DIR, "one", "img/a.png"),
            Some(PathBuf::from("/site/post/one/img/a.png"))
        );
        assert_eq!(asset_path(root, POST_DIR, "one", "../../config.toml"), None);
        assert_eq!(asset_path(root, POST_DIR, "..", "x"), None);
        assert_eq!(asset_path(root, PAGE_DIR, "about", INDEX_FILE), None);
    }

    #[tokio::test]
    async fn test_lists() {
        let (_dir, state) = site();

        assert_eq!(get(&state, "/").await.1, "list Spooky 1/2");
        assert_eq!(get(&state, "/posts").await.1, "list Spooky 1/2");
        assert_eq!(get(&state, "/posts/2").await.1, "list Spooky 2/2");
        assert_eq!(get(&state, "/posts/nope").await.1, "list Spooky 1/2");
        assert_eq!(get(&state, "/tag/misc/2").await.1, "list misc 2/2");
        assert_eq!(get(&state, "/category/uncategorized").await.1, "list uncategorized 1/2");

        let (status, body, _) = get(&state, "/posts/3").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, "404 page not found");
    }

    #[tokio::test]
    async fn test_items() {
        let (_dir, state) = site();

        let (status, _, location) = get(&state, "/post/two").await;
        assert_eq!(status, StatusCode::PERMANENT_REDIRECT);
        assert_eq!(location.as_deref(), Some("/post/two/"));

        let (status, body, _) = get(&state, "/post/two/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "post two");

        assert_eq!(get(&state, "/page/about/").await.1, "page About");
        assert_eq!(get(&state, "/post/one/photo.txt").await.1, "photo");

        assert_eq!(get(&state, "/post/missing/").await.0, StatusCode::NOT_FOUND);
        assert_eq!(get(&state, "/post/one/_index.md").await.0, StatusCode::NOT_FOUND);
        assert_eq!(get(&state, "/post/one/nothing.txt").await.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_assets() {
        let (_dir, state) = site();
        assert_eq!(get(&state, "/css/site.css").await.1, "body {}");
        assert_eq!(get(&state, "/static/robots.txt").await.1, "User-agent: *");
        assert_eq!(get(&state, "/nowhere").await.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_themed_not_found() {
        let (dir, state) = site();
        write(&dir.path().join("theme/plain/404.html"), "gone: {{ content_title }}");

        let (status, body, _) = get(&state, "/post/missing/").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, "gone: Page not found");
    }

    #[tokio::test]
    async fn test_render_errors_are_500() {
        let (dir, state) = site();
        fs::remove_file(dir.path().join("theme/plain/post.html")).unwrap();

        let (status, body, _) = get(&state, "/post/one/").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.contains("post.html"));
    }

    #[tokio::test]
    async fn test_sources_are_reread() {
        let (dir, state) = site();
        assert_eq!(get(&state, "/post/two/").await.1, "post two");

        write(&dir.path().join("theme/plain/post.html"), "changed {{ content_title }}");
        assert_eq!(get(&state, "/post/two/").await.1, "changed two");
    }
}
