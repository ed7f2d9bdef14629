//! Route variants and the callback-handler arity machinery.
//!
//! Every registered rule ends up as a [`Route`] trait object with one
//! capability: test itself against a request and, on a hit, write the
//! response payload. Method-plus-pattern routes share [`RouteWrapper`],
//! which owns the compiled pattern and defers the payload production to an
//! [`AnyRoute`] body (a fixed payload, an arity-N closure, or a resource
//! method).

use http::Method;

use crate::error::HttpError;
use crate::exchange::Exchange;
use crate::pattern::UriPattern;
use crate::payload::{IntoPayload, Payload};
use crate::routes::matching::Match;
use std::marker::PhantomData;

/// A registered routing rule.
pub(crate) trait Route: Send + Sync {
    /// Tests the rule: url first, then method, then handler invocation.
    ///
    /// Only the `Ok` path has side effects (the payload is written to the
    /// exchange). A handler failure propagates untouched.
    fn apply(&self, uri: &str, method: &Method, exchange: &Exchange) -> Result<Match, HttpError>;
}

/// Produces the response payload once a rule has matched.
pub(crate) trait AnyRoute: Send + Sync {
    fn body(&self, exchange: &Exchange, params: &[&str]) -> Result<Payload, HttpError>;
}

/// A method + compiled pattern bound to a payload-producing body.
pub(crate) struct RouteWrapper {
    method: Method,
    pattern: UriPattern,
    body: Box<dyn AnyRoute>,
}

impl RouteWrapper {
    pub(crate) fn new(method: Method, pattern: UriPattern, body: Box<dyn AnyRoute>) -> Self {
        Self { method, pattern, body }
    }
}

impl Route for RouteWrapper {
    fn apply(&self, uri: &str, method: &Method, exchange: &Exchange) -> Result<Match, HttpError> {
        let Some(params) = self.pattern.extract(uri) else {
            return Ok(Match::WrongUrl);
        };
        if self.method != *method {
            return Ok(Match::WrongMethod);
        }

        let payload = self.body.body(exchange, &params)?;
        exchange.write(&payload);
        Ok(Match::Ok)
    }
}

/// A handler callable with exactly `ARITY` extracted path parameters.
///
/// Implemented for plain closures of arity 0 to 4 taking `&str` arguments
/// and returning any [`IntoPayload`] value, and for [`Payload`] itself
/// (a precomputed, zero-parameter response). The `Args` marker type lets
/// one generic registration method accept all shapes without a separate
/// `get`/`post` method per arity.
pub trait ParamHandler<Args>: Send + Sync {
    /// Number of path parameters the handler declares.
    ///
    /// Checked against the pattern's placeholder count at registration.
    const ARITY: usize;

    /// Invokes the handler. `params` holds exactly `ARITY` values; the
    /// registration-time check makes any other length impossible.
    fn invoke(&self, params: &[&str]) -> Result<Payload, HttpError>;
}

/// Marker for the precomputed-payload handler shape.
#[derive(Debug)]
pub struct PayloadArgs;

impl ParamHandler<PayloadArgs> for Payload {
    const ARITY: usize = 0;

    fn invoke(&self, _params: &[&str]) -> Result<Payload, HttpError> {
        Ok(self.clone())
    }
}

macro_rules! param_handler_markers {
    ($($marker:ident)*) => {
        $(
            #[doc = concat!("Marker for the `", stringify!($marker), "` closure shape.")]
            #[derive(Debug)]
            pub struct $marker;
        )*
    };
}

param_handler_markers! { Args0 Args1 Args2 Args3 Args4 }

impl<Func, Ret> ParamHandler<(Args0, Ret)> for Func
where
    Func: Fn() -> Ret + Send + Sync,
    Ret: IntoPayload,
{
    const ARITY: usize = 0;

    fn invoke(&self, _params: &[&str]) -> Result<Payload, HttpError> {
        (self)().into_payload()
    }
}

impl<Func, Ret> ParamHandler<(Args1, Ret)> for Func
where
    Func: Fn(&str) -> Ret + Send + Sync,
    Ret: IntoPayload,
{
    const ARITY: usize = 1;

    fn invoke(&self, params: &[&str]) -> Result<Payload, HttpError> {
        (self)(params[0]).into_payload()
    }
}

impl<Func, Ret> ParamHandler<(Args2, Ret)> for Func
where
    Func: Fn(&str, &str) -> Ret + Send + Sync,
    Ret: IntoPayload,
{
    const ARITY: usize = 2;

    fn invoke(&self, params: &[&str]) -> Result<Payload, HttpError> {
        (self)(params[0], params[1]).into_payload()
    }
}

impl<Func, Ret> ParamHandler<(Args3, Ret)> for Func
where
    Func: Fn(&str, &str, &str) -> Ret + Send + Sync,
    Ret: IntoPayload,
{
    const ARITY: usize = 3;

    fn invoke(&self, params: &[&str]) -> Result<Payload, HttpError> {
        (self)(params[0], params[1], params[2]).into_payload()
    }
}

impl<Func, Ret> ParamHandler<(Args4, Ret)> for Func
where
    Func: Fn(&str, &str, &str, &str) -> Ret + Send + Sync,
    Ret: IntoPayload,
{
    const ARITY: usize = 4;

    fn invoke(&self, params: &[&str]) -> Result<Payload, HttpError> {
        (self)(params[0], params[1], params[2], params[3]).into_payload()
    }
}

/// Adapts a [`ParamHandler`] into an [`AnyRoute`] body.
pub(crate) struct CallbackRoute<H, Args> {
    handler: H,
    _args: PhantomData<fn(Args)>,
}

impl<H, Args> CallbackRoute<H, Args> {
    pub(crate) fn new(handler: H) -> Self {
        Self { handler, _args: PhantomData }
    }
}

impl<H, Args> AnyRoute for CallbackRoute<H, Args>
where
    H: ParamHandler<Args>,
    Args: Send + Sync,
{
    fn body(&self, _exchange: &Exchange, params: &[&str]) -> Result<Payload, HttpError> {
        self.handler.invoke(params)
    }
}

#[cfg(test)]
mod tests {
    use super::{CallbackRoute, ParamHandler, Route, RouteWrapper};
    use crate::exchange::Exchange;
    use crate::pattern::UriPattern;
    use crate::payload::Payload;
    use crate::routes::matching::Match;
    use bytes::Bytes;
    use http::Method;

    fn exchange(uri: &str) -> Exchange {
        Exchange::new(http::Request::builder().uri(uri).body(Bytes::new()).unwrap())
    }

    fn wrapper<H, Args>(method: Method, pattern: &str, handler: H) -> RouteWrapper
    where
        H: ParamHandler<Args> + 'static,
        Args: Send + Sync + 'static,
    {
        RouteWrapper::new(method, UriPattern::compile(pattern), Box::new(CallbackRoute::new(handler)))
    }

    #[test]
    fn url_is_tested_before_method() {
        let route = wrapper(Method::POST, "/item", || "created");

        let miss = exchange("/other");
        assert_eq!(route.apply("/other", &Method::GET, &miss).unwrap(), Match::WrongUrl);

        let wrong_method = exchange("/item");
        assert_eq!(route.apply("/item", &Method::GET, &wrong_method).unwrap(), Match::WrongMethod);
    }

    #[test]
    fn matched_route_writes_payload() {
        let route = wrapper(Method::GET, "/bye/:whom", |whom: &str| format!("Good Bye {whom}"));

        let exchange = exchange("/bye/Bob");
        assert_eq!(route.apply("/bye/Bob", &Method::GET, &exchange).unwrap(), Match::Ok);

        let response = exchange.into_response();
        assert_eq!(response.body().as_ref(), b"Good Bye Bob");
    }

    #[test]
    fn arity_constants() {
        fn arity_of<H: ParamHandler<Args>, Args>(_handler: &H) -> usize {
            H::ARITY
        }

        assert_eq!(arity_of(&|| ""), 0);
        assert_eq!(arity_of(&|_a: &str| ""), 1);
        assert_eq!(arity_of(&|_a: &str, _b: &str| ""), 2);
        assert_eq!(arity_of(&|_a: &str, _b: &str, _c: &str| ""), 3);
        assert_eq!(arity_of(&|_a: &str, _b: &str, _c: &str, _d: &str| ""), 4);
        assert_eq!(arity_of(&Payload::empty()), 0);
    }
}
