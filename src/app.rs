//! Shared application state and the route table.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::cache::PageCache;
use crate::config::Config;
use crate::error::Error;
use crate::method::Method;
use crate::router::Router;
use crate::store::Store;
use crate::{auth, health, views};

/// Everything a view needs. Shared behind an `Arc`.
pub struct App {
    pub config: Config,
    pub store: Store,
    /// Rendered pages of the index listing.
    pub index_cache: PageCache,
}

impl App {
    pub fn new(config: Config, store: Store) -> Self {
        let index_cache = PageCache::new(
            Duration::from_secs(config.index_cache_secs),
            config.index_cache_entries,
        );
        Self { config, store, index_cache }
    }

    /// Opens the configured database and creates the configured groups.
    pub fn open(config: Config) -> Result<Self, Error> {
        let store = Store::open(&config.database)?;
        let app = Self::new(config, store);
        app.seed_groups()?;
        Ok(app)
    }

    pub fn seed_groups(&self) -> Result<(), Error> {
        for seed in &self.config.groups {
            let (group, created) = self.store.ensure_group(seed)?;
            if created {
                info!(slug = %group.slug, title = %group.title, "group created");
            }
        }
        Ok(())
    }
}

/// The full route table.
pub fn router(app: Arc<App>) -> Router<Arc<App>> {
    Router::with_state(app)
        .on(Method::Get, "/",                             views::index)
        .on(Method::Get, "/group/{slug}/",                views::group_posts)
        .on(Method::Get, "/profile/{username}/",          views::profile)
        .on(Method::Get, "/posts/{post_id}/",             views::post_detail)
        .form("/create/",                                 views::post_create)
        .form("/posts/{post_id}/edit/",                   views::post_edit)
        .form("/posts/{post_id}/comment/",                views::add_comment)
        .on(Method::Get, "/follow/",                      views::follow_index)
        .form("/profile/{username}/follow/",              views::profile_follow)
        .form("/profile/{username}/unfollow/",            views::profile_unfollow)
        .form("/auth/signup/",                            auth::signup)
        .form("/auth/login/",                             auth::login)
        .form("/auth/logout/",                            auth::logout)
        .on(Method::Get, "/healthz",                      health::liveness)
        .on(Method::Get, "/readyz",                       health::readiness)
}
