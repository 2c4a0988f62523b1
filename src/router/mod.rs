//! Route registration and dispatch.
//!
//! All registration happens on a [`RouterBuilder`] before [`build`]
//! produces an immutable [`Router`]; after startup the route table is
//! read-only and shared across in-flight requests without locking.
//!
//! Dispatch never lets a failure escape to the event loop: preprocessing
//! errors become 400, unmatched paths become the not-found outcome, and
//! handler or middleware errors become 500.

mod trie;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use http::{Method, StatusCode};
use tracing::{debug, error, warn};

use crate::body::BodySource;
use crate::context::Context;
use crate::error::{FlushError, HandlerError, RouteError};
use crate::gateway::{self, BodyReceiver, ResponseSender};
use crate::request::HttpRequest;
use crate::response::ResponseWriter;
use crate::scope::{preprocess, Scope};
use self::trie::{parse_pattern, split_path, Node, Segment};

/// Whether the middleware chain keeps going after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// Stop the chain; the response as written so far is final.
    Halt,
}

/// The terminal step of a route's execution chain.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(
        &self,
        req: &mut HttpRequest,
        res: &mut ResponseWriter,
        ctx: &mut Context,
    ) -> Result<(), HandlerError>;
}

/// A request-processing step executed before the handler. May mutate the
/// response and context, and may halt the chain.
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn call(
        &self,
        req: &mut HttpRequest,
        res: &mut ResponseWriter,
        ctx: &mut Context,
    ) -> Result<Flow, HandlerError>;
}

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Adapts a boxed-future closure into a [`Handler`]:
///
/// ```
/// use gateling::router::handler_fn;
/// let handler = handler_fn(|_req, res, _ctx| {
///     Box::pin(async move {
///         res.set_body("hello");
///         Ok(())
///     })
/// });
/// ```
pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
    F: for<'a> Fn(&'a mut HttpRequest, &'a mut ResponseWriter, &'a mut Context) -> BoxFuture<'a, Result<(), HandlerError>>
        + Send
        + Sync,
{
    FnHandler(f)
}

pub struct FnHandler<F>(F);

#[async_trait]
impl<F> Handler for FnHandler<F>
where
    F: for<'a> Fn(&'a mut HttpRequest, &'a mut ResponseWriter, &'a mut Context) -> BoxFuture<'a, Result<(), HandlerError>>
        + Send
        + Sync,
{
    async fn handle(
        &self,
        req: &mut HttpRequest,
        res: &mut ResponseWriter,
        ctx: &mut Context,
    ) -> Result<(), HandlerError> {
        (self.0)(req, res, ctx).await
    }
}

/// Adapts a boxed-future closure into a [`Middleware`].
pub fn middleware_fn<F>(f: F) -> FnMiddleware<F>
where
    F: for<'a> Fn(&'a mut HttpRequest, &'a mut ResponseWriter, &'a mut Context) -> BoxFuture<'a, Result<Flow, HandlerError>>
        + Send
        + Sync,
{
    FnMiddleware(f)
}

pub struct FnMiddleware<F>(F);

#[async_trait]
impl<F> Middleware for FnMiddleware<F>
where
    F: for<'a> Fn(&'a mut HttpRequest, &'a mut ResponseWriter, &'a mut Context) -> BoxFuture<'a, Result<Flow, HandlerError>>
        + Send
        + Sync,
{
    async fn call(
        &self,
        req: &mut HttpRequest,
        res: &mut ResponseWriter,
        ctx: &mut Context,
    ) -> Result<Flow, HandlerError> {
        (self.0)(req, res, ctx).await
    }
}

/// A handler plus its method, optional subdomain scope and route-specific
/// middleware, staged for registration.
pub struct Endpoint {
    method: Method,
    subdomain: Option<String>,
    handler: Arc<dyn Handler>,
    middleware: Vec<Arc<dyn Middleware>>,
}

impl Endpoint {
    pub fn of<H: Handler + 'static>(method: Method, handler: H) -> Self {
        Self { method, subdomain: None, handler: Arc::new(handler), middleware: Vec::new() }
    }

    /// Attaches route-specific middleware, run after the global chain in
    /// attachment order.
    pub fn with<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Scopes this route to one subdomain. Unscoped routes match any
    /// subdomain as a fallback.
    pub fn on(mut self, subdomain: impl Into<String>) -> Self {
        self.subdomain = Some(subdomain.into());
        self
    }
}

macro_rules! method_endpoint {
    ($name:ident, $method:ident) => {
        pub fn $name<H: Handler + 'static>(handler: H) -> Endpoint {
            Endpoint::of(Method::$method, handler)
        }
    };
}

method_endpoint!(get, GET);
method_endpoint!(post, POST);
method_endpoint!(put, PUT);
method_endpoint!(delete, DELETE);
method_endpoint!(head, HEAD);
method_endpoint!(options, OPTIONS);
method_endpoint!(patch, PATCH);
method_endpoint!(trace, TRACE);
method_endpoint!(connect, CONNECT);

/// The matched route's execution material.
struct Route {
    handler: Arc<dyn Handler>,
    middleware: Vec<Arc<dyn Middleware>>,
}

pub struct RouterBuilder {
    routes: Vec<(String, Endpoint)>,
    middleware: Vec<Arc<dyn Middleware>>,
    not_found: Option<Arc<dyn Handler>>,
}

impl RouterBuilder {
    fn new() -> Self {
        Self { routes: Vec::new(), middleware: Vec::new(), not_found: None }
    }

    /// Registers a route. Registration order is the tie-break: the first
    /// compatible registration wins at dispatch.
    pub fn route(mut self, pattern: impl Into<String>, endpoint: Endpoint) -> Self {
        self.routes.push((pattern.into(), endpoint));
        self
    }

    /// Appends to the global middleware chain, run before any
    /// route-specific middleware.
    pub fn middleware<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Replaces the default 404 outcome for unmatched requests.
    pub fn not_found<H: Handler + 'static>(mut self, handler: H) -> Self {
        self.not_found = Some(Arc::new(handler));
        self
    }

    pub fn build(self) -> Result<Router, RouteError> {
        let mut unscoped = Node::new();
        let mut scoped: HashMap<String, Node<Route>> = HashMap::new();

        for (pattern, endpoint) in self.routes {
            let segments: Vec<Segment> = parse_pattern(&pattern)?;
            let route = Route { handler: endpoint.handler, middleware: endpoint.middleware };
            let tree = match endpoint.subdomain {
                Some(subdomain) => scoped.entry(subdomain).or_insert_with(Node::new),
                None => &mut unscoped,
            };
            tree.insert(&segments, endpoint.method, route)?;
        }

        Ok(Router { unscoped, scoped, middleware: self.middleware, not_found: self.not_found })
    }
}

/// The route table and middleware chain. Immutable after build.
pub struct Router {
    unscoped: Node<Route>,
    scoped: HashMap<String, Node<Route>>,
    middleware: Vec<Arc<dyn Middleware>>,
    not_found: Option<Arc<dyn Handler>>,
}

impl Router {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    /// Handles one incoming event end to end and returns the response to
    /// flush. Infallible by contract: every failure mode maps to a
    /// response outcome.
    pub async fn dispatch(&self, scope: Scope, body: BodySource) -> ResponseWriter {
        let mut response = ResponseWriter::new();
        let mut ctx = Context::new();

        let metadata = match preprocess(&scope) {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!(cause = %e, "malformed request scope");
                response.set_status(StatusCode::BAD_REQUEST);
                response.set_body("bad request");
                return response;
            }
        };

        let subdomain = metadata.subdomain.clone();
        let method = scope.method.clone();
        let path = scope.path.clone();
        let mut request = HttpRequest::new(scope, body, metadata);

        let mut captures = Vec::new();
        let route = self.lookup(&subdomain, &path, &method, &mut captures);

        let route = match route {
            Some(route) => route,
            None => {
                debug!(%method, path = %path, "no route matched");
                self.run_not_found(&mut request, &mut response, &mut ctx).await;
                return response;
            }
        };

        for (name, value) in captures {
            if let Err(e) = request.set_param(name, value) {
                warn!(cause = %e, "malformed query string");
                response.set_status(StatusCode::BAD_REQUEST);
                response.set_body("bad request");
                return response;
            }
        }

        self.run_chain(route, &mut request, &mut response, &mut ctx).await;
        response
    }

    /// Dispatches and flushes the response events into the send channel.
    pub async fn serve(&self, scope: Scope, receive: BodyReceiver, send: ResponseSender) -> Result<(), FlushError> {
        let response = self.dispatch(scope, BodySource::Channel(receive)).await;
        gateway::flush(response, &send).await
    }

    /// Exact-subdomain tree first, then the unscoped tree as fallback.
    fn lookup<'router>(
        &'router self,
        subdomain: &str,
        path: &str,
        method: &Method,
        captures: &mut Vec<(String, String)>,
    ) -> Option<&'router Route> {
        let segments = split_path(path);

        if let Some(tree) = self.scoped.get(subdomain) {
            if let Some(route) = tree.find(&segments, method, captures) {
                return Some(route);
            }
            captures.clear();
        }

        self.unscoped.find(&segments, method, captures)
    }

    /// Runs [global middleware…, route middleware…, handler], checking for
    /// a halt after every step. A failing step yields the server-error
    /// outcome; the failure stops at this boundary.
    async fn run_chain(
        &self,
        route: &Route,
        request: &mut HttpRequest,
        response: &mut ResponseWriter,
        ctx: &mut Context,
    ) {
        for middleware in self.middleware.iter().chain(route.middleware.iter()) {
            match middleware.call(request, response, ctx).await {
                Ok(Flow::Continue) => {}
                Ok(Flow::Halt) => {
                    debug!("middleware halted the chain");
                    return;
                }
                Err(e) => {
                    error!(cause = %e, "middleware failed");
                    *response = server_error();
                    return;
                }
            }
        }

        if let Err(e) = route.handler.handle(request, response, ctx).await {
            error!(cause = %e, "handler failed");
            *response = server_error();
        }
    }

    async fn run_not_found(&self, request: &mut HttpRequest, response: &mut ResponseWriter, ctx: &mut Context) {
        match &self.not_found {
            Some(handler) => {
                if let Err(e) = handler.handle(request, response, ctx).await {
                    error!(cause = %e, "not-found handler failed");
                    *response = server_error();
                }
            }
            None => {
                response.set_status(StatusCode::NOT_FOUND);
                response.set_body("not found");
            }
        }
    }
}

/// The response substituted when a chain step fails. Replacing the writer
/// wholesale keeps partial writes from leaking out as a complete response.
fn server_error() -> ResponseWriter {
    let mut response = ResponseWriter::new();
    response.set_status(StatusCode::INTERNAL_SERVER_ERROR);
    response.set_body("internal server error");
    response
}
