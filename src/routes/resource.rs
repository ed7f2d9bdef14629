//! Resource routes: the registration-time introspection pass.
//!
//! A [`Resource`] declares a table of routes, each carrying an http method,
//! a uri pattern, a *binding plan* and a callable. The binding plan tags
//! every declared handler parameter slot as either "path parameter at index
//! i" or "inject this accessor" ([`Binding`]). The plan is validated once,
//! when the resource is added to a collection, and stored next to the
//! callable; per request the arguments are simply reassembled from the plan,
//! with no scanning.
//!
//! # Example
//! ```
//! use pocket_web::{Args, Binding, Resource, ResourceRoute};
//!
//! struct Greetings;
//!
//! impl Resource for Greetings {
//!     fn routes(&self) -> Vec<ResourceRoute<Self>> {
//!         vec![
//!             ResourceRoute::get("/hello", [], |_me: &Self, _args: &Args| "Hello"),
//!             ResourceRoute::get("/bye/:whom", [Binding::Param(0)], |_me: &Self, args: &Args| {
//!                 Ok::<_, pocket_web::HttpError>(format!("Good Bye {}", args.path(0)?))
//!             }),
//!         ]
//!     }
//! }
//! ```

use http::Method;
use mime::Mime;
use std::sync::Arc;

use crate::error::{ConfigError, HttpError};
use crate::exchange::{Context, Cookies, Exchange, Request, Response};
use crate::payload::{IntoPayload, Payload};
use crate::routes::route::AnyRoute;

/// An object exposing a table of routes.
///
/// Instead of reflecting over the target at request time, the table is data
/// returned once and introspected at registration.
pub trait Resource: Send + Sync + 'static {
    /// Uri prefix applied to every declared pattern of this resource.
    fn prefix(&self) -> &'static str {
        ""
    }

    /// The declared routes. Called once, when the resource is registered.
    fn routes(&self) -> Vec<ResourceRoute<Self>>
    where
        Self: Sized;
}

/// How one declared handler parameter slot is filled at invocation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// The i-th extracted path parameter.
    Param(usize),
    /// Inject the read-only request accessor.
    Request,
    /// Inject the writable response accessor.
    Response,
    /// Inject the parsed request cookies.
    Cookies,
    /// Inject the generic per-request context.
    Context,
}

/// One assembled handler argument.
#[derive(Debug)]
pub enum Arg<'x> {
    Param(usize, &'x str),
    Request(&'x Request),
    Response(&'x Response),
    Cookies(&'x Cookies),
    Context(&'x Context),
}

/// The arguments assembled for one invocation, in declared slot order.
#[derive(Debug)]
pub struct Args<'x> {
    values: Vec<Arg<'x>>,
}

impl<'x> Args<'x> {
    /// The path parameter extracted at placeholder index `index`.
    pub fn path(&self, index: usize) -> Result<&'x str, HttpError> {
        self.values
            .iter()
            .find_map(|arg| match arg {
                Arg::Param(i, value) if *i == index => Some(*value),
                _ => None,
            })
            .ok_or_else(|| HttpError::internal(format!("no path parameter bound at index {index}")))
    }

    pub fn request(&self) -> Result<&'x Request, HttpError> {
        self.values
            .iter()
            .find_map(|arg| match arg {
                Arg::Request(request) => Some(*request),
                _ => None,
            })
            .ok_or_else(|| HttpError::internal("no request binding declared"))
    }

    pub fn response(&self) -> Result<&'x Response, HttpError> {
        self.values
            .iter()
            .find_map(|arg| match arg {
                Arg::Response(response) => Some(*response),
                _ => None,
            })
            .ok_or_else(|| HttpError::internal("no response binding declared"))
    }

    pub fn cookies(&self) -> Result<&'x Cookies, HttpError> {
        self.values
            .iter()
            .find_map(|arg| match arg {
                Arg::Cookies(cookies) => Some(*cookies),
                _ => None,
            })
            .ok_or_else(|| HttpError::internal("no cookies binding declared"))
    }

    pub fn context(&self) -> Result<&'x Context, HttpError> {
        self.values
            .iter()
            .find_map(|arg| match arg {
                Arg::Context(context) => Some(*context),
                _ => None,
            })
            .ok_or_else(|| HttpError::internal("no context binding declared"))
    }
}

type Callable<T> = Arc<dyn for<'x> Fn(&T, &Args<'x>) -> Result<Payload, HttpError> + Send + Sync>;

/// One declared route of a [`Resource`].
pub struct ResourceRoute<T: ?Sized> {
    method: Method,
    pattern: String,
    bindings: Vec<Binding>,
    produces: Option<Mime>,
    callable: Callable<T>,
}

impl<T> ResourceRoute<T> {
    pub fn get<F, R>(pattern: &str, bindings: impl Into<Vec<Binding>>, f: F) -> Self
    where
        F: for<'x> Fn(&T, &Args<'x>) -> R + Send + Sync + 'static,
        R: IntoPayload,
    {
        Self::new(Method::GET, pattern, bindings, f)
    }

    pub fn post<F, R>(pattern: &str, bindings: impl Into<Vec<Binding>>, f: F) -> Self
    where
        F: for<'x> Fn(&T, &Args<'x>) -> R + Send + Sync + 'static,
        R: IntoPayload,
    {
        Self::new(Method::POST, pattern, bindings, f)
    }

    fn new<F, R>(method: Method, pattern: &str, bindings: impl Into<Vec<Binding>>, f: F) -> Self
    where
        F: for<'x> Fn(&T, &Args<'x>) -> R + Send + Sync + 'static,
        R: IntoPayload,
    {
        let callable: Callable<T> = Arc::new(move |target, args| f(target, args).into_payload());
        Self { method, pattern: pattern.to_string(), bindings: bindings.into(), produces: None, callable }
    }

    /// Forces the response content type, overriding whatever the payload
    /// conversion picked.
    pub fn produces(mut self, content_type: Mime) -> Self {
        self.produces = Some(content_type);
        self
    }

    pub(crate) fn method(&self) -> &Method {
        &self.method
    }

    pub(crate) fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Number of path-parameter slots in the binding plan.
    pub(crate) fn param_count(&self) -> usize {
        self.bindings.iter().filter(|b| matches!(b, Binding::Param(_))).count()
    }

    /// Rejects malformed plans: duplicate or non-contiguous path-parameter
    /// indices, or the same accessor injected twice.
    pub(crate) fn validate(&self, full_pattern: &str) -> Result<(), ConfigError> {
        let param_count = self.param_count();
        let mut seen = vec![false; param_count];

        for binding in &self.bindings {
            match binding {
                Binding::Param(index) => {
                    if *index >= param_count {
                        return Err(ConfigError::invalid_bindings(
                            full_pattern,
                            format!("path parameter index {index} out of range, plan declares {param_count}"),
                        ));
                    }
                    if seen[*index] {
                        return Err(ConfigError::invalid_bindings(
                            full_pattern,
                            format!("path parameter index {index} bound twice"),
                        ));
                    }
                    seen[*index] = true;
                }
                injection => {
                    if self.bindings.iter().filter(|b| *b == injection).count() > 1 {
                        return Err(ConfigError::invalid_bindings(
                            full_pattern,
                            format!("{injection:?} injected more than once"),
                        ));
                    }
                }
            }
        }

        Ok(())
    }
}

impl<T> std::fmt::Debug for ResourceRoute<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceRoute")
            .field("method", &self.method)
            .field("pattern", &self.pattern)
            .field("bindings", &self.bindings)
            .field("produces", &self.produces)
            .finish_non_exhaustive()
    }
}

/// The stored form: target object plus one validated table entry.
pub(crate) struct ResourceHandler<T> {
    target: Arc<T>,
    bindings: Vec<Binding>,
    produces: Option<Mime>,
    callable: Callable<T>,
}

impl<T> ResourceHandler<T> {
    pub(crate) fn new(target: Arc<T>, route: ResourceRoute<T>) -> Self {
        Self { target, bindings: route.bindings, produces: route.produces, callable: route.callable }
    }
}

impl<T: Send + Sync> AnyRoute for ResourceHandler<T> {
    fn body(&self, exchange: &Exchange, params: &[&str]) -> Result<Payload, HttpError> {
        let values = self
            .bindings
            .iter()
            .map(|binding| match binding {
                // index validity guaranteed by registration-time validation
                Binding::Param(index) => Arg::Param(*index, params[*index]),
                Binding::Request => Arg::Request(exchange.request()),
                Binding::Response => Arg::Response(exchange.response()),
                Binding::Cookies => Arg::Cookies(exchange.cookies()),
                Binding::Context => Arg::Context(exchange.context()),
            })
            .collect();

        let payload = (self.callable)(&self.target, &Args { values })?;
        match &self.produces {
            Some(content_type) => Ok(payload.with_content_type(content_type.clone())),
            None => Ok(payload),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Args, Binding, Resource, ResourceRoute};

    struct Dummy;

    impl Resource for Dummy {
        fn routes(&self) -> Vec<ResourceRoute<Self>> {
            vec![]
        }
    }

    fn route(bindings: impl Into<Vec<Binding>>) -> ResourceRoute<Dummy> {
        ResourceRoute::get("/x/:a/:b", bindings, |_me: &Dummy, _args: &Args| "")
    }

    #[test]
    fn valid_plan_passes() {
        let plan = route([Binding::Param(0), Binding::Cookies, Binding::Param(1), Binding::Request]);
        assert!(plan.validate("/x/:a/:b").is_ok());
        assert_eq!(plan.param_count(), 2);
    }

    #[test]
    fn duplicate_param_index_is_rejected() {
        let plan = route([Binding::Param(0), Binding::Param(0)]);
        assert!(plan.validate("/x/:a/:b").is_err());
    }

    #[test]
    fn out_of_range_param_index_is_rejected() {
        let plan = route([Binding::Param(0), Binding::Param(2)]);
        assert!(plan.validate("/x/:a/:b").is_err());
    }

    #[test]
    fn duplicate_injection_is_rejected() {
        let plan = route([Binding::Cookies, Binding::Cookies]);
        assert!(plan.validate("/x/:a/:b").is_err());
    }
}
