//! The embeddable web server: transport boundary around the route registry.
//!
//! The server owns the listener and the per-request plumbing; all routing
//! decisions live in [`RouteCollection`]. Per request it builds an
//! [`Exchange`], asks the current routes snapshot to dispatch, and maps the
//! outcome: `Ok` writes the handler payload, `WrongMethod` becomes 405, any
//! other miss becomes 404, and a handler error becomes an error page (with
//! the error detail only outside production mode).
//!
//! Configuration follows the snapshot model: `configure` builds a complete
//! [`RouteCollection`] and swaps it in atomically. Request workers keep the
//! snapshot they loaded, so a concurrent `reload` never tears a dispatch in
//! half.

use arc_swap::ArcSwap;
use bytes::{Buf, Bytes, BytesMut};
use http::header::{CONNECTION, CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderValue, Request, Response, StatusCode, Version};
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

use crate::error::{ConfigError, ErrorPage, HttpError};
use crate::exchange::Exchange;
use crate::payload::Payload;
use crate::routes::RouteCollection;
use crate::routes::matching::Match;

const MAX_HEADER_SIZE: usize = 8 * 1024;
const MAX_HEADERS: usize = 64;

type Configurator = Box<dyn Fn(&mut RouteCollection) -> Result<(), ConfigError> + Send + Sync>;

/// Atomically swappable routes snapshot.
struct RoutesProvider {
    current: ArcSwap<RouteCollection>,
    configurator: Mutex<Option<Configurator>>,
}

impl RoutesProvider {
    fn empty() -> Self {
        Self { current: ArcSwap::from_pointee(RouteCollection::new()), configurator: Mutex::new(None) }
    }

    fn rebuild(&self) -> Result<(), ConfigError> {
        let guard = match self.configurator.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(configurator) = guard.as_ref() {
            let mut routes = RouteCollection::new();
            configurator(&mut routes)?;
            self.current.store(Arc::new(routes));
        }
        Ok(())
    }
}

/// An embeddable http server.
///
/// ```no_run
/// use pocket_web::WebServer;
///
/// #[tokio::main]
/// async fn main() -> std::io::Result<()> {
///     WebServer::new()
///         .configure(|routes| {
///             routes.get("/hello", || "Hello World")?;
///             Ok(())
///         })
///         .expect("invalid routes")
///         .start("127.0.0.1:8080")
///         .await
/// }
/// ```
pub struct WebServer {
    provider: RoutesProvider,
    prod_mode: bool,
}

impl Default for WebServer {
    fn default() -> Self {
        Self::new()
    }
}

impl WebServer {
    /// Creates a server with no routes. Production mode follows the
    /// `PROD_MODE` environment variable.
    pub fn new() -> Self {
        Self { provider: RoutesProvider::empty(), prod_mode: std::env::var_os("PROD_MODE").is_some() }
    }

    /// Overrides the mode detected from the environment. Outside production
    /// mode, 500 pages carry the error detail.
    pub fn prod_mode(mut self, prod_mode: bool) -> Self {
        self.prod_mode = prod_mode;
        self
    }

    /// Applies a configuration, failing fast on any registration error.
    ///
    /// The configuration closure is kept so [`reload`](Self::reload) can
    /// rebuild the routes later (development reload).
    pub fn configure<F>(self, configuration: F) -> Result<Self, ConfigError>
    where
        F: Fn(&mut RouteCollection) -> Result<(), ConfigError> + Send + Sync + 'static,
    {
        let mut routes = RouteCollection::new();
        configuration(&mut routes)?;
        self.provider.current.store(Arc::new(routes));
        match self.provider.configurator.lock() {
            Ok(mut guard) => *guard = Some(Box::new(configuration)),
            Err(poisoned) => *poisoned.into_inner() = Some(Box::new(configuration)),
        }
        Ok(self)
    }

    /// Rebuilds the routes from the stored configuration and swaps the
    /// snapshot. In-flight requests finish on the snapshot they loaded.
    pub fn reload(&self) -> Result<(), ConfigError> {
        self.provider.rebuild()
    }

    /// The current routes snapshot.
    pub fn routes(&self) -> Arc<RouteCollection> {
        self.provider.current.load_full()
    }

    /// Dispatches one request to the current snapshot and renders the
    /// outcome. This is the whole per-request boundary; any transport can
    /// call it.
    pub fn handle(&self, request: Request<Bytes>) -> Response<Bytes> {
        let routes = self.provider.current.load();
        let exchange = Exchange::new(request);

        let outcome = routes.apply(exchange.request().path(), exchange.request().method(), &exchange);
        match outcome {
            Ok(Match::Ok) => exchange.into_response(),
            Ok(Match::WrongMethod) => error_response(StatusCode::METHOD_NOT_ALLOWED, None),
            Ok(Match::WrongUrl) => error_response(StatusCode::NOT_FOUND, None),
            Err(e) => {
                error!(cause = %e, "handler failed");
                let detail = (!self.prod_mode).then(|| e.to_string());
                error_response(e.status(), detail)
            }
        }
    }

    /// Binds the listener without serving yet; useful for picking a random
    /// port.
    pub async fn bind(self, addr: impl ToSocketAddrs) -> io::Result<BoundWebServer> {
        let listener = TcpListener::bind(addr).await?;
        Ok(BoundWebServer { server: Arc::new(self), listener })
    }

    /// Binds and serves until the process dies.
    pub async fn start(self, addr: impl ToSocketAddrs) -> io::Result<()> {
        let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
        let _ = tracing::subscriber::set_global_default(subscriber);

        let bound = self.bind(addr).await?;
        info!("server started on {}", bound.local_addr()?);
        bound.serve().await
    }
}

impl std::fmt::Debug for WebServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebServer").field("prod_mode", &self.prod_mode).finish_non_exhaustive()
    }
}

/// A server with a bound listener, ready to accept connections.
#[derive(Debug)]
pub struct BoundWebServer {
    server: Arc<WebServer>,
    listener: TcpListener,
}

impl BoundWebServer {
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept loop: one task per connection.
    pub async fn serve(self) -> io::Result<()> {
        loop {
            let (stream, _remote_addr) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!(cause = %e, "failed to accept");
                    continue;
                }
            };

            let server = Arc::clone(&self.server);
            tokio::spawn(async move {
                if let Err(e) = handle_connection(server, stream).await {
                    warn!(cause = %e, "connection closed with error");
                }
            });
        }
    }
}

async fn handle_connection(server: Arc<WebServer>, mut stream: TcpStream) -> io::Result<()> {
    let mut buffer = BytesMut::with_capacity(4096);

    loop {
        let request = match read_request(&mut stream, &mut buffer).await {
            Ok(Some(request)) => request,
            Ok(None) => return Ok(()),
            Err(e) => {
                warn!(cause = %e, "unparseable request");
                let response = error_response(StatusCode::BAD_REQUEST, None);
                write_response(&mut stream, response, false).await?;
                return Ok(());
            }
        };

        let keep_alive = wants_keep_alive(&request);
        let response = server.handle(request);
        write_response(&mut stream, response, keep_alive).await?;

        if !keep_alive {
            return Ok(());
        }
    }
}

fn wants_keep_alive(request: &Request<Bytes>) -> bool {
    let connection = request.headers().get(CONNECTION).and_then(|value| value.to_str().ok()).unwrap_or("");
    match request.version() {
        Version::HTTP_11 => !connection.eq_ignore_ascii_case("close"),
        _ => connection.eq_ignore_ascii_case("keep-alive"),
    }
}

/// Reads one request off the wire. `Ok(None)` is a clean EOF between
/// requests.
async fn read_request(stream: &mut TcpStream, buffer: &mut BytesMut) -> Result<Option<Request<Bytes>>, HttpError> {
    let (head, header_len, content_length) = loop {
        if let Some(parsed) = parse_head(buffer)? {
            break parsed;
        }
        if buffer.len() > MAX_HEADER_SIZE {
            return Err(HttpError::bad_request(format!("header block exceeds {MAX_HEADER_SIZE} bytes")));
        }
        let read = stream.read_buf(buffer).await.map_err(HttpError::io)?;
        if read == 0 {
            if buffer.is_empty() {
                return Ok(None);
            }
            return Err(HttpError::bad_request("connection closed mid-request"));
        }
    };

    buffer.advance(header_len);
    while buffer.len() < content_length {
        let read = stream.read_buf(buffer).await.map_err(HttpError::io)?;
        if read == 0 {
            return Err(HttpError::bad_request("connection closed mid-body"));
        }
    }
    let body = buffer.split_to(content_length).freeze();

    Ok(Some(head.map(|_| body)))
}

/// Parses the header block, returning the bodyless request, the consumed
/// byte count and the declared content length. `None` means more bytes are
/// needed.
fn parse_head(buffer: &[u8]) -> Result<Option<(Request<()>, usize, usize)>, HttpError> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut parsed = httparse::Request::new(&mut headers);

    let header_len = match parsed.parse(buffer) {
        Ok(httparse::Status::Complete(len)) => len,
        Ok(httparse::Status::Partial) => return Ok(None),
        Err(e) => return Err(HttpError::bad_request(e)),
    };

    let method = parsed.method.ok_or_else(|| HttpError::bad_request("missing method"))?;
    let path = parsed.path.ok_or_else(|| HttpError::bad_request("missing path"))?;
    let version = match parsed.version {
        Some(0) => Version::HTTP_10,
        _ => Version::HTTP_11,
    };

    let mut builder = Request::builder().method(method).uri(path).version(version);
    if let Some(header_map) = builder.headers_mut() {
        header_map.reserve(parsed.headers.len());
    }
    for header in parsed.headers.iter() {
        builder = builder.header(header.name, header.value);
    }
    let head = builder.body(()).map_err(HttpError::bad_request)?;

    let content_length = match head.headers().get(CONTENT_LENGTH) {
        Some(value) => value
            .to_str()
            .ok()
            .and_then(|value| value.parse::<usize>().ok())
            .ok_or_else(|| HttpError::bad_request("invalid content-length header"))?,
        None => 0,
    };

    Ok(Some((head, header_len, content_length)))
}

async fn write_response(stream: &mut TcpStream, response: Response<Bytes>, keep_alive: bool) -> io::Result<()> {
    let status = response.status();
    let mut wire = BytesMut::with_capacity(256 + response.body().len());

    wire.extend_from_slice(
        format!("HTTP/1.1 {} {}\r\n", status.as_u16(), status.canonical_reason().unwrap_or("")).as_bytes(),
    );
    for (name, value) in response.headers() {
        wire.extend_from_slice(name.as_str().as_bytes());
        wire.extend_from_slice(b": ");
        wire.extend_from_slice(value.as_bytes());
        wire.extend_from_slice(b"\r\n");
    }
    wire.extend_from_slice(format!("content-length: {}\r\n", response.body().len()).as_bytes());
    let connection: &[u8] = if keep_alive { b"connection: keep-alive\r\n" } else { b"connection: close\r\n" };
    wire.extend_from_slice(connection);
    wire.extend_from_slice(b"\r\n");
    wire.extend_from_slice(response.body());

    stream.write_all(&wire).await?;
    stream.flush().await
}

/// Renders an error page into a wire response. Never fails: a payload whose
/// content type cannot be encoded falls back to a bare response.
fn error_response(code: StatusCode, detail: Option<String>) -> Response<Bytes> {
    let mut page = ErrorPage::new(code);
    if let Some(detail) = detail {
        page = page.with_detail(detail);
    }
    payload_response(&page.payload())
}

fn payload_response(payload: &Payload) -> Response<Bytes> {
    let mut response = Response::new(payload.data().clone());
    *response.status_mut() = payload.code();
    if let Some(content_type) = payload.content_type()
        && let Ok(value) = HeaderValue::from_str(content_type.as_ref())
    {
        response.headers_mut().insert(CONTENT_TYPE, value);
    }
    response
}
