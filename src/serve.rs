//! Development server rendering pages on demand.
//!
//! Built on `tiny_http`. Every page URL of the manifest becomes a route that
//! re-renders the page (templates and data re-read from disk) on each
//! request. The page mapped to `/` additionally serves files from
//! `<sourceDir>/static` for any path no other page claims.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐   shutdown channel   ┌──────────────────┐
//! │  Shutdown waiter │ ◄─────────────────── │  Ctrl+C / TERM   │
//! └────────┬─────────┘                      └──────────────────┘
//!          │ unblock()
//!          ▼
//! ┌──────────────────┐   one scoped thread per request
//! │   Accept loop    │ ──────────────► Router ──► render / static / 404
//! └──────────────────┘
//! ```
//!
//! On shutdown the accept loop stops and the scope joins every in-flight
//! request before `run` returns.

use crate::{
    config::{PageDef, SiteConfig},
    log,
    render::{SourceDirs, render_to_vec},
    utils::{fs::safe_join, log::Logger},
};
use anyhow::{Context, Result, anyhow};
use std::{
    borrow::Cow,
    collections::HashMap,
    fs,
    net::{IpAddr, SocketAddr},
    path::{Path, PathBuf},
    sync::{Arc, mpsc::Receiver},
    thread,
};
use tiny_http::{Header, Request, Response, Server, StatusCode};

/// Try binding to port, retry with incremented port if in use
const MAX_PORT_RETRIES: u16 = 10;

// ============================================================================
// Routing
// ============================================================================

/// Resolved target of a request path.
#[derive(Debug, PartialEq, Eq)]
enum Route<'a> {
    Page(&'a str, &'a PageDef),
    Static(PathBuf),
    NotFound,
}

/// URL → page table built once from the manifest.
#[derive(Debug)]
pub struct Router {
    /// url → (output key, page)
    pages: HashMap<String, (String, PageDef)>,
    source_dir: PathBuf,
    data_dir: PathBuf,
    /// Set only when some page is mounted at `/`.
    static_dir: Option<PathBuf>,
}

impl Router {
    pub fn new(config: &SiteConfig, logger: Logger) -> Self {
        for (url, keys) in config.duplicate_urls() {
            log!(logger => "warn"; "url {} claimed by {}, serving {}",
                url, keys.join(", "), keys.last().copied().unwrap_or_default());
        }

        // BTreeMap order: for duplicate urls the last output key wins
        let pages: HashMap<_, _> = config
            .pages
            .iter()
            .map(|(key, page)| (page.url.clone(), (key.clone(), page.clone())))
            .collect();
        let static_dir = pages.contains_key("/").then(|| config.static_dir());

        Self {
            pages,
            source_dir: config.source_dir.clone(),
            data_dir: config.data_dir.clone(),
            static_dir,
        }
    }

    fn dirs(&self) -> SourceDirs<'_> {
        SourceDirs {
            templates: &self.source_dir,
            data: &self.data_dir,
        }
    }

    /// Page URLs match exactly; a trailing `/` (e.g. `/blog/`) is not a subtree pattern.
    fn route(&self, path: &str) -> Route<'_> {
        if let Some((key, page)) = self.pages.get(path) {
            return Route::Page(key, page);
        }

        let Some(static_dir) = &self.static_dir else {
            return Route::NotFound;
        };
        match safe_join(static_dir, path) {
            Some(file) if file.is_file() => Route::Static(file),
            _ => Route::NotFound,
        }
    }
}

// ============================================================================
// Server
// ============================================================================

/// A bound, not yet running, development server.
pub struct DevServer {
    server: Arc<Server>,
    addr: SocketAddr,
    router: Router,
    logger: Logger,
}

impl DevServer {
    /// Bind `interface:port`, moving up to the next free port if needed.
    pub fn bind(config: &SiteConfig, interface: IpAddr, port: u16, logger: Logger) -> Result<Self> {
        let (server, addr) = try_bind_port(interface, port, MAX_PORT_RETRIES, logger)?;
        Ok(Self {
            server: Arc::new(server),
            addr,
            router: Router::new(config, logger),
            logger,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Serve until a message arrives on `shutdown` (or every sender is dropped).
    pub fn run(self, shutdown: Receiver<()>) -> Result<()> {
        let logger = self.logger;
        let server = Arc::clone(&self.server);
        thread::Builder::new()
            .name("shutdown".into())
            .spawn(move || {
                // Err means every sender is gone, which also ends the server
                let _ = shutdown.recv();
                log!(logger => "serve"; "shutting down...");
                server.unblock();
            })
            .context("Failed to spawn shutdown thread")?;

        log!(logger => "serve"; "http://{}", self.addr());

        let router = &self.router;
        thread::scope(|scope| {
            for request in self.server.incoming_requests() {
                scope.spawn(move || {
                    if let Err(e) = handle_request(request, router, logger) {
                        log!(logger => "serve"; "request error: {e:#}");
                    }
                });
            }
        });

        log!(logger => "serve"; "shutdown complete");
        Ok(())
    }
}

/// Bind and serve the site until `shutdown` fires.
pub fn serve_site(
    config: &SiteConfig,
    interface: IpAddr,
    port: u16,
    logger: Logger,
    shutdown: Receiver<()>,
) -> Result<()> {
    DevServer::bind(config, interface, port, logger)?.run(shutdown)
}

/// Try to bind to a port, retrying with incremented port numbers if in use.
fn try_bind_port(
    interface: IpAddr,
    base_port: u16,
    max_retries: u16,
    logger: Logger,
) -> Result<(Server, SocketAddr)> {
    let mut last_error = None;
    for offset in 0..max_retries {
        let port = base_port.saturating_add(offset);
        let addr = SocketAddr::new(interface, port);

        match Server::http(addr) {
            Ok(server) => {
                if offset > 0 {
                    log!(logger => "serve"; "port {} in use, using {} instead", base_port, port);
                }
                // Port 0 asks the OS for a free port; report the real one
                let bound = server.server_addr().to_ip().unwrap_or(addr);
                return Ok((server, bound));
            }
            Err(e) => last_error = Some(e),
        }
    }

    Err(anyhow!(
        "Failed to bind after {} attempts (ports {}-{}): {}",
        max_retries,
        base_port,
        base_port.saturating_add(max_retries.saturating_sub(1)),
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}

// ============================================================================
// Request Handling
// ============================================================================

fn handle_request(request: Request, router: &Router, logger: Logger) -> Result<()> {
    let path = request_path(request.url());

    match router.route(&path) {
        Route::Page(key, page) => match render_to_vec(page, router.dirs()) {
            Ok(body) => serve_html(request, body),
            Err(err) => {
                let message = format!("{:#}", anyhow::Error::from(err));
                log!(logger => "error"; "{} ({}): {}", path, key, message);
                serve_error(request, message)
            }
        },
        Route::Static(file) => serve_file(request, &file),
        Route::NotFound => serve_not_found(request),
    }
}

/// Strip the query string and percent-decode the path part of a request URL.
fn request_path(url: &str) -> String {
    let raw = url.split('?').next().unwrap_or(url);
    urlencoding::decode(raw)
        .map(Cow::into_owned)
        .unwrap_or_else(|_| raw.to_owned())
}

// ============================================================================
// Response Helpers
// ============================================================================

fn content_type(value: &str) -> Result<Header> {
    Header::from_bytes("Content-Type", value).map_err(|()| anyhow!("invalid header: {value}"))
}

fn serve_file(request: Request, path: &Path) -> Result<()> {
    let content = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let response = Response::from_data(content).with_header(content_type(guess_content_type(path))?);
    request.respond(response)?;
    Ok(())
}

fn serve_html(request: Request, body: Vec<u8>) -> Result<()> {
    let response = Response::from_data(body).with_header(content_type("text/html; charset=utf-8")?);
    request.respond(response)?;
    Ok(())
}

fn serve_error(request: Request, message: String) -> Result<()> {
    let response = Response::from_string(message)
        .with_status_code(StatusCode(500))
        .with_header(content_type("text/plain; charset=utf-8")?);
    request.respond(response)?;
    Ok(())
}

fn serve_not_found(request: Request) -> Result<()> {
    let response = Response::from_string("404 Not Found")
        .with_status_code(StatusCode(404))
        .with_header(content_type("text/plain; charset=utf-8")?);
    request.respond(response)?;
    Ok(())
}

/// Guess MIME content type from file extension.
///
/// Returns `application/octet-stream` for unknown extensions.
fn guess_content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => "application/javascript; charset=utf-8",
        Some("json") => "application/json; charset=utf-8",
        Some("xml") => "application/xml; charset=utf-8",
        Some("txt") => "text/plain; charset=utf-8",

        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("ico") => "image/x-icon",

        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",

        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        io::{Read, Write},
        net::{Ipv4Addr, TcpStream},
        sync::mpsc,
        thread::JoinHandle,
    };
    use tempfile::TempDir;

    fn page(url: &str, sources: &[&str], data_sources: &[&str]) -> PageDef {
        PageDef {
            url: url.into(),
            sources: sources.iter().map(|s| s.to_string()).collect(),
            data_sources: data_sources.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn make_site(root: &Path) -> SiteConfig {
        let site = root.join("site");
        fs::create_dir_all(site.join("static/img")).unwrap();
        fs::create_dir_all(root.join("data")).unwrap();
        fs::write(site.join("index.html"), "<h1>{{ Data.profile.name }}</h1>").unwrap();
        fs::write(site.join("about.html"), "about {{ seq(1, 2) | join(',') }}").unwrap();
        fs::write(site.join("broken.html"), "{{ Data.missing.field }}").unwrap();
        fs::write(site.join("static/img/logo.png"), [0x89u8, b'P', b'N', b'G']).unwrap();
        fs::write(site.join("static/robots.txt"), "User-agent: *").unwrap();
        fs::write(root.join("data/profile.json"), r#"{"name": "Ada"}"#).unwrap();

        let mut config = SiteConfig {
            source_dir: site,
            data_dir: root.join("data"),
            ..Default::default()
        };
        config
            .pages
            .insert("index.html".into(), page("/", &["index.html"], &["profile.json"]));
        config
            .pages
            .insert("about.html".into(), page("/about", &["about.html"], &[]));
        config
            .pages
            .insert("broken.html".into(), page("/broken", &["broken.html"], &[]));
        config
    }

    struct Running {
        addr: SocketAddr,
        shutdown: mpsc::Sender<()>,
        handle: JoinHandle<Result<()>>,
    }

    impl Running {
        fn start(config: &SiteConfig) -> Self {
            let server =
                DevServer::bind(config, IpAddr::V4(Ipv4Addr::LOCALHOST), 0, Logger::new(true))
                    .unwrap();
            let addr = server.addr();
            let (shutdown, rx) = mpsc::channel();
            let handle = thread::spawn(move || server.run(rx));
            Self {
                addr,
                shutdown,
                handle,
            }
        }

        fn stop(self) {
            self.shutdown.send(()).unwrap();
            self.handle.join().unwrap().unwrap();
        }
    }

    /// Minimal HTTP/1.1 GET returning (status, body).
    fn get(addr: SocketAddr, path: &str) -> (u16, Vec<u8>) {
        let mut stream = TcpStream::connect(addr).unwrap();
        write!(
            stream,
            "GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n"
        )
        .unwrap();
        let mut raw = Vec::new();
        stream.read_to_end(&mut raw).unwrap();

        let split = raw.windows(4).position(|w| w == b"\r\n\r\n").unwrap();
        let head = String::from_utf8_lossy(&raw[..split]).into_owned();
        let status = head.split_whitespace().nth(1).unwrap().parse().unwrap();
        (status, raw[split + 4..].to_vec())
    }

    fn get_text(addr: SocketAddr, path: &str) -> (u16, String) {
        let (status, body) = get(addr, path);
        (status, String::from_utf8(body).unwrap())
    }

    #[test]
    fn test_request_path() {
        assert_eq!(request_path("/about?t=1"), "/about");
        assert_eq!(request_path("/my%20file.txt"), "/my file.txt");
        assert_eq!(request_path("/"), "/");
    }

    #[test]
    fn test_guess_content_type() {
        assert_eq!(guess_content_type(Path::new("a.css")), "text/css; charset=utf-8");
        assert_eq!(guess_content_type(Path::new("a.png")), "image/png");
        assert_eq!(guess_content_type(Path::new("a.bin")), "application/octet-stream");
        assert_eq!(guess_content_type(Path::new("noext")), "application/octet-stream");
    }

    #[test]
    fn test_router_routes() {
        let dir = TempDir::new().unwrap();
        let config = make_site(dir.path());
        let router = Router::new(&config, Logger::new(true));

        assert!(matches!(router.route("/"), Route::Page("index.html", _)));
        assert!(matches!(router.route("/about"), Route::Page("about.html", _)));
        assert_eq!(
            router.route("/robots.txt"),
            Route::Static(config.static_dir().join("robots.txt"))
        );
        assert_eq!(router.route("/img"), Route::NotFound);
        assert_eq!(router.route("/nonexistent-static-path"), Route::NotFound);
        assert_eq!(router.route("/../data/profile.json"), Route::NotFound);
    }

    #[test]
    fn test_router_matches_page_urls_exactly() {
        let dir = TempDir::new().unwrap();
        let mut config = make_site(dir.path());
        config.pages.remove("index.html");
        config
            .pages
            .insert("blog.html".into(), page("/blog/", &["about.html"], &[]));
        let router = Router::new(&config, Logger::new(true));

        assert!(matches!(router.route("/blog/"), Route::Page("blog.html", _)));
        assert_eq!(router.route("/blog/post"), Route::NotFound);
        assert_eq!(router.route("/about/"), Route::NotFound);
    }

    #[test]
    fn test_router_without_root_page_has_no_static_fallback() {
        let dir = TempDir::new().unwrap();
        let mut config = make_site(dir.path());
        config.pages.remove("index.html");
        let router = Router::new(&config, Logger::new(true));

        assert_eq!(router.route("/"), Route::NotFound);
        assert_eq!(router.route("/robots.txt"), Route::NotFound);
    }

    #[test]
    fn test_router_duplicate_url_last_key_wins() {
        let dir = TempDir::new().unwrap();
        let mut config = make_site(dir.path());
        config
            .pages
            .insert("zz.html".into(), page("/about", &["index.html"], &[]));
        let router = Router::new(&config, Logger::new(true));

        assert!(matches!(router.route("/about"), Route::Page("zz.html", _)));
    }

    #[test]
    fn test_serve_root_page() {
        let dir = TempDir::new().unwrap();
        let server = Running::start(&make_site(dir.path()));

        assert_eq!(get_text(server.addr, "/"), (200, "<h1>Ada</h1>".to_string()));
        assert_eq!(get_text(server.addr, "/about"), (200, "about 1,2".to_string()));

        server.stop();
    }

    #[test]
    fn test_serve_static_files_and_not_found() {
        let dir = TempDir::new().unwrap();
        let server = Running::start(&make_site(dir.path()));

        assert_eq!(
            get(server.addr, "/img/logo.png"),
            (200, vec![0x89, b'P', b'N', b'G'])
        );
        assert_eq!(get(server.addr, "/nonexistent-static-path").0, 404);
        assert_eq!(get(server.addr, "/../data/profile.json").0, 404);

        server.stop();
    }

    #[test]
    fn test_serve_renders_fresh_on_each_request() {
        let dir = TempDir::new().unwrap();
        let config = make_site(dir.path());
        let server = Running::start(&config);

        assert_eq!(get_text(server.addr, "/").1, "<h1>Ada</h1>");
        fs::write(dir.path().join("data/profile.json"), r#"{"name": "Grace"}"#).unwrap();
        assert_eq!(get_text(server.addr, "/").1, "<h1>Grace</h1>");

        server.stop();
    }

    #[test]
    fn test_serve_render_error_is_500_and_isolated() {
        let dir = TempDir::new().unwrap();
        let server = Running::start(&make_site(dir.path()));

        let (status, body) = get_text(server.addr, "/broken");
        assert_eq!(status, 500);
        assert!(body.contains("broken.html"));

        // The server keeps serving after a failed render
        assert_eq!(get(server.addr, "/about").0, 200);

        server.stop();
    }

    #[test]
    fn test_serve_concurrent_requests() {
        let dir = TempDir::new().unwrap();
        let server = Running::start(&make_site(dir.path()));
        let addr = server.addr;

        let workers: Vec<_> = (0..8)
            .map(|i| {
                thread::spawn(move || {
                    for _ in 0..5 {
                        if i % 2 == 0 {
                            assert_eq!(get_text(addr, "/").1, "<h1>Ada</h1>");
                        } else {
                            assert_eq!(get_text(addr, "/about").1, "about 1,2");
                        }
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        server.stop();
    }
}
