//! Route registry and the dispatch algorithm.
//!
//! [`RouteCollection`] owns two ordered sequences: the filter chain (insertion
//! order, always evaluated before routing) and the routes. Pattern routes are
//! pushed to the *front*, so the most recently registered route is tried
//! first: re-registering a pattern overrides an earlier, more general one
//! without any explicit priority numbers. Static directories go to the
//! *back*, making them the fallback they are meant to be.
//!
//! Registration validates everything it can (placeholder count against
//! handler arity, binding-plan shape) and refuses to store an invalid
//! route, so request handling never has to revalidate.

pub mod matching;
pub mod resource;
pub mod route;
mod static_route;

use http::Method;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{ConfigError, HttpError};
use crate::exchange::Exchange;
use crate::filter::Filter;
use crate::pattern::{UriPattern, params_count};
use matching::Match;
use resource::{Resource, ResourceHandler};
use route::{AnyRoute, CallbackRoute, ParamHandler, Route, RouteWrapper};
use static_route::StaticRoute;

/// The mutable route registry and dispatcher.
///
/// Created empty, populated during configuration, then read concurrently by
/// request workers without synchronization. Structural mutation (`get`,
/// `post`, `add`, `reset`, ...) must not overlap live traffic; the server
/// guarantees that by swapping whole immutable snapshots (see
/// [`crate::server::WebServer`]).
#[derive(Default)]
pub struct RouteCollection {
    routes: VecDeque<Box<dyn Route>>,
    filters: Vec<Box<dyn Filter>>,
}

impl RouteCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a GET route: a precomputed payload or a closure taking 0 to
    /// 4 `&str` path parameters.
    ///
    /// Fails fast when the pattern's placeholder count differs from the
    /// handler arity.
    pub fn get<H, Args>(&mut self, pattern: &str, handler: H) -> Result<&mut Self, ConfigError>
    where
        H: ParamHandler<Args> + 'static,
        Args: Send + Sync + 'static,
    {
        self.add_callback(Method::GET, pattern, handler)
    }

    /// Registers a POST route. Same contract as [`get`](Self::get).
    pub fn post<H, Args>(&mut self, pattern: &str, handler: H) -> Result<&mut Self, ConfigError>
    where
        H: ParamHandler<Args> + 'static,
        Args: Send + Sync + 'static,
    {
        self.add_callback(Method::POST, pattern, handler)
    }

    /// Registers every declared route of a resource.
    pub fn add<T: Resource>(&mut self, resource: T) -> Result<&mut Self, ConfigError> {
        self.add_prefixed("", resource)
    }

    /// Registers a resource with an extra uri prefix in front of the
    /// resource's own [`prefix`](Resource::prefix).
    pub fn add_prefixed<T: Resource>(&mut self, url_prefix: &str, resource: T) -> Result<&mut Self, ConfigError> {
        let target = Arc::new(resource);

        for declared in target.routes() {
            let pattern = format!("{}{}{}", url_prefix, target.prefix(), declared.pattern());
            check_pattern(&pattern)?;
            declared.validate(&pattern)?;
            check_parameter_count(&pattern, declared.param_count())?;

            let method = declared.method().clone();
            let handler = ResourceHandler::new(Arc::clone(&target), declared);
            self.add_wrapped(method, &pattern, Box::new(handler));
        }

        Ok(self)
    }

    /// Registers a static directory fallback, tried after every pattern
    /// route regardless of registration order.
    pub fn static_dir(&mut self, dir: impl Into<PathBuf>) -> &mut Self {
        self.routes.push_back(Box::new(StaticRoute::new(dir)));
        self
    }

    /// Appends a filter to the chain.
    pub fn filter<F: Filter + 'static>(&mut self, filter: F) -> &mut Self {
        self.filters.push(Box::new(filter));
        self
    }

    /// Clears all routes and filters (configuration reload).
    pub fn reset(&mut self) {
        self.routes.clear();
        self.filters.clear();
    }

    /// Dispatches one request.
    ///
    /// Filters run first, in insertion order; the first one returning `true`
    /// short-circuits with [`Match::Ok`]. Routes are then tried newest-first;
    /// the first `Ok` wins, otherwise the best-ranked miss is returned so the
    /// caller can pick 404 vs 405. Handler errors propagate uncaught.
    pub fn apply(&self, uri: &str, method: &Method, exchange: &Exchange) -> Result<Match, HttpError> {
        for filter in &self.filters {
            if filter.apply(uri, exchange)? {
                return Ok(Match::Ok);
            }
        }

        let mut best_match = Match::WrongUrl;

        for route in &self.routes {
            let current = route.apply(uri, method, exchange)?;
            if current == Match::Ok {
                return Ok(Match::Ok);
            }
            if current.is_better_than(best_match) {
                best_match = current;
            }
        }

        Ok(best_match)
    }

    fn add_callback<H, Args>(&mut self, method: Method, pattern: &str, handler: H) -> Result<&mut Self, ConfigError>
    where
        H: ParamHandler<Args> + 'static,
        Args: Send + Sync + 'static,
    {
        check_pattern(pattern)?;
        check_parameter_count(pattern, H::ARITY)?;
        self.add_wrapped(method, pattern, Box::new(CallbackRoute::new(handler)));
        Ok(self)
    }

    fn add_wrapped(&mut self, method: Method, pattern: &str, body: Box<dyn AnyRoute>) {
        self.routes.push_front(Box::new(RouteWrapper::new(method, UriPattern::compile(pattern), body)));
    }
}

impl std::fmt::Debug for RouteCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteCollection")
            .field("routes", &self.routes.len())
            .field("filters", &self.filters.len())
            .finish()
    }
}

fn check_pattern(pattern: &str) -> Result<(), ConfigError> {
    if !pattern.starts_with('/') {
        return Err(ConfigError::invalid_pattern(pattern, "must start with '/'"));
    }
    if pattern.split('/').any(|segment| segment == ":") {
        return Err(ConfigError::invalid_pattern(pattern, "placeholder is missing a name"));
    }
    Ok(())
}

fn check_parameter_count(pattern: &str, arity: usize) -> Result<(), ConfigError> {
    let expected = params_count(pattern);
    if expected != arity {
        return Err(ConfigError::parameter_count_mismatch(pattern, expected, arity));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::RouteCollection;
    use crate::error::{ConfigError, HttpError};
    use crate::exchange::Exchange;
    use crate::filter::Filter;
    use crate::routes::matching::Match;
    use bytes::Bytes;
    use http::Method;
    use mockall::mock;

    mock! {
        RequestFilter {}

        impl Filter for RequestFilter {
            fn apply(&self, uri: &str, exchange: &Exchange) -> Result<bool, HttpError>;
        }
    }

    fn exchange(uri: &str) -> Exchange {
        Exchange::new(http::Request::builder().uri(uri).body(Bytes::new()).unwrap())
    }

    #[test]
    fn arity_mismatch_fails_at_registration() {
        let mut routes = RouteCollection::new();

        let err = routes.get("/bye/:whom", || "no params").unwrap_err();
        assert!(matches!(err, ConfigError::ParameterCountMismatch { expected: 1, actual: 0, .. }));

        let err = routes.get("/hello", |_a: &str, _b: &str| "two params").unwrap_err();
        assert!(matches!(err, ConfigError::ParameterCountMismatch { expected: 0, actual: 2, .. }));

        // nothing was stored
        let probe = exchange("/hello");
        assert_eq!(routes.apply("/hello", &Method::GET, &probe).unwrap(), Match::WrongUrl);
    }

    #[test]
    fn malformed_patterns_are_rejected() {
        let mut routes = RouteCollection::new();

        let err = routes.get("hello", || "no slash").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPattern { .. }));

        let err = routes.get("/bye/:", |_whom: &str| "nameless").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPattern { .. }));
    }

    #[test]
    fn newest_route_wins() {
        let mut routes = RouteCollection::new();
        routes.get("/greet", || "first").unwrap().get("/greet", || "second").unwrap();

        let exchange = exchange("/greet");
        assert_eq!(routes.apply("/greet", &Method::GET, &exchange).unwrap(), Match::Ok);
        assert_eq!(exchange.into_response().body().as_ref(), b"second");
    }

    #[test]
    fn best_match_distinguishes_405_from_404() {
        let mut routes = RouteCollection::new();
        routes.post("/item", || "created").unwrap();

        let wrong_method = exchange("/item");
        assert_eq!(routes.apply("/item", &Method::GET, &wrong_method).unwrap(), Match::WrongMethod);

        let wrong_url = exchange("/missing");
        assert_eq!(routes.apply("/missing", &Method::GET, &wrong_url).unwrap(), Match::WrongUrl);
    }

    #[test]
    fn short_circuiting_filter_stops_routing() {
        let mut filter = MockRequestFilter::new();
        filter.expect_apply().withf(|uri, _exchange| uri == "/health").times(1).returning(|_, _| Ok(true));

        let mut routes = RouteCollection::new();
        routes.filter(filter);
        routes.get("/health", || "from route, should never run").unwrap();

        let exchange = exchange("/health");
        assert_eq!(routes.apply("/health", &Method::GET, &exchange).unwrap(), Match::Ok);
        assert!(exchange.into_response().body().is_empty());
    }

    #[test]
    fn declining_filters_run_in_insertion_order_then_routing_continues() {
        let mut first = MockRequestFilter::new();
        first.expect_apply().times(1).returning(|_, _| Ok(false));
        let mut second = MockRequestFilter::new();
        second.expect_apply().times(1).returning(|_, _| Ok(false));

        let mut routes = RouteCollection::new();
        routes.filter(first).filter(second);
        routes.get("/hello", || "Hello").unwrap();

        let exchange = exchange("/hello");
        assert_eq!(routes.apply("/hello", &Method::GET, &exchange).unwrap(), Match::Ok);
        assert_eq!(exchange.into_response().body().as_ref(), b"Hello");
    }

    #[test]
    fn dispatch_is_idempotent() {
        let mut routes = RouteCollection::new();
        routes.get("/bye/:whom", |whom: &str| format!("Good Bye {whom}")).unwrap();

        for _ in 0..3 {
            let exchange = exchange("/bye/Bob");
            assert_eq!(routes.apply("/bye/Bob", &Method::GET, &exchange).unwrap(), Match::Ok);
            assert_eq!(exchange.into_response().body().as_ref(), b"Good Bye Bob");
        }
    }

    #[test]
    fn reset_clears_routes_and_filters() {
        let mut declined = MockRequestFilter::new();
        declined.expect_apply().times(0).returning(|_, _| Ok(false));

        let mut routes = RouteCollection::new();
        routes.get("/hello", || "Hello").unwrap();
        routes.filter(declined);
        routes.reset();

        let exchange = exchange("/hello");
        assert_eq!(routes.apply("/hello", &Method::GET, &exchange).unwrap(), Match::WrongUrl);
    }

    #[test]
    fn handler_error_propagates() {
        let mut routes = RouteCollection::new();
        routes
            .get("/boom", || -> Result<String, HttpError> { Err(HttpError::internal("kaboom")) })
            .unwrap();

        let exchange = exchange("/boom");
        assert!(matches!(routes.apply("/boom", &Method::GET, &exchange), Err(HttpError::Internal { .. })));
    }
}
