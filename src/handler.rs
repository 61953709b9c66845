//! Views as route handlers.
//!
//! A view is any `async fn(state, Request) -> impl IntoResponse`. The router
//! keeps views of many concrete types in one tree, so each is wrapped and
//! stored as `Arc<dyn ErasedHandler<S>>`:
//!
//! ```text
//! views::index                         async fn(Arc<App>, Request) -> Result<Response, AppError>
//!   .into_boxed_handler()              Arc<FnHandler<_>> as BoxedHandler<Arc<App>>
//!   .call(app.clone(), req)            Pin<Box<dyn Future<Output = Response>>>
//! ```
//!
//! `S` is cloned into every call; in this crate it is always `Arc<App>`.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::request::Request;
use crate::response::{IntoResponse, Response};

pub(crate) type BoxFuture = Pin<Box<dyn Future<Output = Response> + Send + 'static>>;

/// Object-safe call interface behind [`BoxedHandler`]. Public only because
/// [`Handler::into_boxed_handler`] names it.
#[doc(hidden)]
pub trait ErasedHandler<S> {
    fn call(&self, state: S, req: Request) -> BoxFuture;
}

#[doc(hidden)]
pub type BoxedHandler<S> = Arc<dyn ErasedHandler<S> + Send + Sync + 'static>;

/// Anything the router accepts as a view.
///
/// Sealed: the blanket impl for async functions is the only one.
pub trait Handler<S>: sealed::Sealed<S> + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler<S>;
}

mod sealed {
    pub trait Sealed<S> {}
}

impl<F, Fut, R, S> sealed::Sealed<S> for F
where
    F: Fn(S, Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
}

impl<F, Fut, R, S> Handler<S> for F
where
    F: Fn(S, Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
    S: 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler<S> {
        Arc::new(FnHandler(self))
    }
}

struct FnHandler<F>(F);

impl<F, Fut, R, S> ErasedHandler<S> for FnHandler<F>
where
    F: Fn(S, Request) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, state: S, req: Request) -> BoxFuture {
        let pending = (self.0)(state, req);
        Box::pin(async move { pending.await.into_response() })
    }
}
