//! Radix-tree request router.
//!
//! One tree per HTTP method. O(path-length) lookup. You register a path, you
//! get a handler, and every handler receives a clone of the shared state.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use matchit::Router as MatchitRouter;

use crate::handler::{BoxedHandler, Handler};
use crate::method::Method;
use crate::middleware;
use crate::request::Request;
use crate::response::Response;
use crate::status::Status;

/// The application router.
///
/// Build it once at startup and pass it to [`Server::serve`](crate::Server::serve).
/// Each [`Router::on`] call returns `self` so registrations chain naturally.
pub struct Router<S> {
    routes: HashMap<Method, MatchitRouter<BoxedHandler<S>>>,
    state: S,
}

impl<S: Clone + Send + Sync + 'static> Router<S> {
    pub fn with_state(state: S) -> Self {
        Self { routes: HashMap::new(), state }
    }

    /// Register a handler for a method + path pair. Returns `self` for chaining.
    ///
    /// Path parameters use `{name}` syntax; `req.param("name")` retrieves them.
    ///
    /// # Panics
    ///
    /// Panics if `path` is not a valid route or collides with one already
    /// registered for `method`. Routes are fixed at startup, so this is a
    /// programming error.
    pub fn on(mut self, method: Method, path: &str, handler: impl Handler<S>) -> Self {
        self.routes
            .entry(method)
            .or_insert_with(MatchitRouter::new)
            .insert(path, handler.into_boxed_handler())
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self
    }

    /// Registers the same handler for both `GET` and `POST`, the way a
    /// form view answers both the blank form and its submission.
    pub fn form(self, path: &str, handler: impl Handler<S> + Clone) -> Self {
        self.on(Method::Get, path, handler.clone())
            .on(Method::Post, path, handler)
    }

    pub(crate) fn lookup(
        &self,
        method: Method,
        path: &str,
    ) -> Option<(BoxedHandler<S>, HashMap<String, String>)> {
        // HEAD is answered by the GET view; hyper drops the body.
        let method = if method == Method::Head { Method::Get } else { method };
        let tree = self.routes.get(&method)?;
        let matched = tree.at(path).ok()?;
        let handler = Arc::clone(matched.value);
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((handler, params))
    }

    /// Routes one buffered request and produces one response.
    ///
    /// A path routed only under other methods gets `405` with an `allow`
    /// header, an unknown path `404`. Every request is traced once with its
    /// status and latency.
    pub async fn handle(&self, req: http::Request<Bytes>) -> Response {
        let (parts, body) = req.into_parts();
        let path = parts.uri.path().to_owned();

        let Ok(method) = Method::try_from(&parts.method) else {
            return middleware::trace(parts.method.as_str(), &path, async {
                self.not_routed(&path)
            })
            .await;
        };

        middleware::trace(method.as_str(), &path, async {
            match self.lookup(method, &path) {
                Some((handler, params)) => {
                    let req = Request::new(method, parts, body, params);
                    handler.call(self.state.clone(), req).await
                }
                None => self.not_routed(&path),
            }
        })
        .await
    }
}

impl<S> Router<S> {
    /// Methods with a route matching `path`, in a stable order.
    fn allowed(&self, path: &str) -> Vec<Method> {
        let mut methods: Vec<Method> = self.routes.iter()
            .filter(|(_, tree)| tree.at(path).is_ok())
            .map(|(method, _)| *method)
            .collect();
        if methods.contains(&Method::Get) {
            methods.push(Method::Head);
        }
        methods.sort_by_key(|m| m.as_str());
        methods
    }

    /// `405` when another method routes `path`, `404` otherwise.
    fn not_routed(&self, path: &str) -> Response {
        let allowed = self.allowed(path);
        if allowed.is_empty() {
            return Response::status(Status::NotFound);
        }
        let allow = allowed.iter().map(|m| m.as_str()).collect::<Vec<_>>().join(", ");
        Response::builder()
            .status(Status::MethodNotAllowed)
            .header("allow", &allow)
            .no_body()
    }
}
