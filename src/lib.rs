//! pocket-web: an embeddable http server with fluent route registration.
//!
//! Routes are registered programmatically against a [`RouteCollection`]:
//! url-pattern routes bound to closures, whole [`Resource`] objects declaring
//! their route tables, a static-file fallback, and a pre-routing filter
//! chain. Dispatch ranks partial matches so the transport can answer 404 vs
//! 405 correctly, and the most recently registered route always wins over an
//! earlier, more general one.
//!
//! ```no_run
//! use pocket_web::WebServer;
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     WebServer::new()
//!         .configure(|routes| {
//!             routes.get("/hello", || "Hello World")?;
//!             routes.get("/bye/:whom", |whom: &str| format!("Good Bye {whom}"))?;
//!             routes.static_dir("web");
//!             Ok(())
//!         })
//!         .expect("invalid routes")
//!         .start("127.0.0.1:8080")
//!         .await
//! }
//! ```

mod error;
mod exchange;
mod payload;
mod server;

pub mod filter;
pub mod pattern;
pub mod routes;

pub use error::{ConfigError, ErrorPage, HttpError};
pub use exchange::{Context, Cookies, Exchange, Request, Response};
pub use filter::{Filter, LogRequestFilter, fn_filter};
pub use pattern::UriPattern;
pub use payload::{IntoPayload, Payload};
pub use routes::RouteCollection;
pub use routes::matching::Match;
pub use routes::resource::{Arg, Args, Binding, Resource, ResourceRoute};
pub use routes::route::ParamHandler;
pub use server::{BoundWebServer, WebServer};
