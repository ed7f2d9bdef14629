//! Pre-routing request interceptors.
//!
//! Filters run before any route is tried, in the order they were registered.
//! A filter sees only the raw uri and the live exchange, never pattern or
//! method matching. Returning `true` means the filter fully handled the
//! request: whatever it wrote to the exchange is the complete response and
//! dispatch stops with an overall [`Match::Ok`](crate::Match::Ok).

use tracing::info;

use crate::error::HttpError;
use crate::exchange::Exchange;

/// A request interceptor.
///
/// `Send + Sync` is required: the filter chain is shared by all concurrent
/// request workers.
pub trait Filter: Send + Sync {
    /// Returns `Ok(true)` when this filter fully handled the exchange.
    fn apply(&self, uri: &str, exchange: &Exchange) -> Result<bool, HttpError>;
}

struct FnFilter<F>(F);

impl<F> Filter for FnFilter<F>
where
    F: Fn(&str, &Exchange) -> Result<bool, HttpError> + Send + Sync,
{
    fn apply(&self, uri: &str, exchange: &Exchange) -> Result<bool, HttpError> {
        (self.0)(uri, exchange)
    }
}

/// Creates a filter from a closure.
///
/// # Example
/// ```
/// use pocket_web::IntoPayload;
/// use pocket_web::filter::fn_filter;
///
/// let health = fn_filter(|uri, exchange| {
///     if uri != "/health" {
///         return Ok(false);
///     }
///     exchange.write(&"UP".into_payload()?);
///     Ok(true)
/// });
/// ```
pub fn fn_filter<F>(f: F) -> impl Filter + 'static
where
    F: Fn(&str, &Exchange) -> Result<bool, HttpError> + Send + Sync + 'static,
{
    FnFilter(f)
}

/// Logs every request and lets routing continue.
#[derive(Debug, Default)]
pub struct LogRequestFilter;

impl Filter for LogRequestFilter {
    fn apply(&self, uri: &str, exchange: &Exchange) -> Result<bool, HttpError> {
        info!(method = %exchange.request().method(), uri, "request");
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::{Filter, LogRequestFilter, fn_filter};
    use crate::exchange::Exchange;
    use bytes::Bytes;

    fn exchange(uri: &str) -> Exchange {
        Exchange::new(http::Request::builder().uri(uri).body(Bytes::new()).unwrap())
    }

    #[test]
    fn fn_filter_sees_the_raw_uri() {
        let filter = fn_filter(|uri, _exchange| Ok(uri.starts_with("/admin")));

        assert!(filter.apply("/admin/users", &exchange("/admin/users")).unwrap());
        assert!(!filter.apply("/public", &exchange("/public")).unwrap());
    }

    #[test]
    fn log_filter_never_short_circuits() {
        let filter = LogRequestFilter;

        assert!(!filter.apply("/anything", &exchange("/anything")).unwrap());
    }
}
