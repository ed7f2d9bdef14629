//! Static directory fallback.

use bytes::Bytes;
use http::Method;
use mime::Mime;
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::error::HttpError;
use crate::exchange::Exchange;
use crate::payload::Payload;
use crate::routes::matching::Match;
use crate::routes::route::Route;

/// Serves GET requests straight from a filesystem directory.
///
/// Unlike pattern routes there is no segment-count requirement: any uri is
/// resolved against the configured root and matches when the resolved file
/// exists. Directories fall back to their `index.html`. Registration puts
/// static routes at the lowest priority so a later, more specific route is
/// never shadowed by a catch-all directory.
pub(crate) struct StaticRoute {
    root: PathBuf,
}

impl StaticRoute {
    pub(crate) fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolves a request uri to an existing file under the root.
    ///
    /// Any parent-directory component rejects the uri outright: the resolved
    /// path must stay inside the configured directory.
    fn resolve(&self, uri: &str) -> Option<PathBuf> {
        let relative = uri.trim_start_matches('/');
        if Path::new(relative).components().any(|c| matches!(c, Component::ParentDir)) {
            return None;
        }

        let mut path = self.root.join(relative);
        if path.is_dir() {
            path = path.join("index.html");
        }
        path.is_file().then_some(path)
    }
}

impl Route for StaticRoute {
    fn apply(&self, uri: &str, method: &Method, exchange: &Exchange) -> Result<Match, HttpError> {
        let Some(path) = self.resolve(uri) else {
            return Ok(Match::WrongUrl);
        };
        if *method != Method::GET {
            return Ok(Match::WrongMethod);
        }

        let content = fs::read(&path).map_err(HttpError::io)?;
        exchange.write(&Payload::new(content_type_of(&path), Bytes::from(content)));
        Ok(Match::Ok)
    }
}

fn content_type_of(path: &Path) -> Mime {
    let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");
    match extension {
        "html" | "htm" => mime::TEXT_HTML,
        "css" => mime::TEXT_CSS,
        "js" => mime::APPLICATION_JAVASCRIPT,
        "json" => mime::APPLICATION_JSON,
        "txt" | "md" => mime::TEXT_PLAIN,
        "png" => mime::IMAGE_PNG,
        "jpg" | "jpeg" => mime::IMAGE_JPEG,
        "gif" => mime::IMAGE_GIF,
        "svg" => mime::IMAGE_SVG,
        "pdf" => mime::APPLICATION_PDF,
        _ => mime::APPLICATION_OCTET_STREAM,
    }
}

#[cfg(test)]
mod tests {
    use super::StaticRoute;
    use crate::exchange::Exchange;
    use crate::routes::matching::Match;
    use crate::routes::route::Route;
    use bytes::Bytes;
    use http::Method;
    use std::fs;
    use std::path::PathBuf;

    fn exchange(uri: &str) -> Exchange {
        Exchange::new(http::Request::builder().uri(uri).body(Bytes::new()).unwrap())
    }

    fn web_root(name: &str) -> PathBuf {
        let root = std::env::temp_dir().join(format!("pocket-web-static-{name}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&root);
        fs::create_dir_all(root.join("css")).unwrap();
        fs::write(root.join("index.html"), "<h1>home</h1>").unwrap();
        fs::write(root.join("css").join("site.css"), "body {}").unwrap();
        root
    }

    #[test]
    fn serves_existing_files_with_content_type() {
        let root = web_root("serve");
        let route = StaticRoute::new(&root);

        let exchange = exchange("/css/site.css");
        assert_eq!(route.apply("/css/site.css", &Method::GET, &exchange).unwrap(), Match::Ok);

        let response = exchange.into_response();
        assert_eq!(response.headers().get("content-type").unwrap(), "text/css");
        assert_eq!(response.body().as_ref(), b"body {}");

        fs::remove_dir_all(root).unwrap();
    }

    #[test]
    fn directories_fall_back_to_index_html() {
        let root = web_root("index");
        let route = StaticRoute::new(&root);

        let exchange = exchange("/");
        assert_eq!(route.apply("/", &Method::GET, &exchange).unwrap(), Match::Ok);
        assert_eq!(exchange.into_response().body().as_ref(), b"<h1>home</h1>");

        fs::remove_dir_all(root).unwrap();
    }

    #[test]
    fn missing_file_is_wrong_url_and_wrong_method_is_reported() {
        let root = web_root("miss");
        let route = StaticRoute::new(&root);

        let miss = exchange("/nope.html");
        assert_eq!(route.apply("/nope.html", &Method::GET, &miss).unwrap(), Match::WrongUrl);

        let post = exchange("/index.html");
        assert_eq!(route.apply("/index.html", &Method::POST, &post).unwrap(), Match::WrongMethod);

        fs::remove_dir_all(root).unwrap();
    }

    #[test]
    fn rejects_parent_directory_traversal() {
        let root = web_root("traversal");
        let route = StaticRoute::new(root.join("css"));

        let exchange = exchange("/../index.html");
        assert_eq!(route.apply("/../index.html", &Method::GET, &exchange).unwrap(), Match::WrongUrl);

        fs::remove_dir_all(root).unwrap();
    }
}
