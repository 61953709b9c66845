//! # yatube
//!
//! A small blogging service. Authors publish posts, optionally filed under a
//! topic group. Readers page through listings, comment, and follow authors
//! to get a personal feed.
//!
//! ## Layout
//!
//! - An HTTP layer: radix-tree routing via [`matchit`], hyper connections
//!   on tokio, graceful shutdown on SIGTERM / Ctrl-C.
//! - [`store`]: SQLite tables for users, sessions, groups, posts,
//!   comments and follows.
//! - [`views`] and [`auth`]: one async function per route. Each reads or
//!   writes a row or a page of rows, then renders a JSON context or redirects.
//! - [`forms`], [`paginator`], [`cache`]: validation, page slicing, and the
//!   timed cache in front of the index listing.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use yatube::{App, Config, Server, router};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), yatube::Error> {
//!     let config = Config::load()?;
//!     let bind = config.bind.clone();
//!     let app = Arc::new(App::open(config)?);
//!     Server::bind(&bind)?.serve(router(app)).await
//! }
//! ```

mod error;
mod handler;
mod method;
mod middleware;
mod request;
mod response;
mod router;
mod server;
mod status;

pub mod app;
pub mod auth;
pub mod cache;
pub mod config;
pub mod forms;
pub mod health;
pub mod models;
pub mod paginator;
pub mod store;
pub mod views;

pub use app::{App, router};
pub use config::Config;
pub use error::{AppError, Error};
pub use handler::Handler;
pub use method::Method;
pub use request::Request;
pub use response::{ContentType, IntoResponse, Response, ResponseBuilder};
pub use router::Router;
pub use server::Server;
pub use status::Status;
pub use store::Store;
