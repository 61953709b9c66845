//! In-process client for driving the route table in tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde_json::Value;
use yatube::models::{Group, NewUser, Post, PostData, User};
use yatube::{App, Config, Response, Router, Store, router};

pub struct Harness {
    pub app: Arc<App>,
    pub router: Router<Arc<App>>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(Config { database: ":memory:".to_owned(), ..Config::default() })
    }

    pub fn with_config(config: Config) -> Self {
        let store = Store::open_in_memory().expect("in-memory database should open");
        let app = Arc::new(App::new(config, store));
        let router = router(Arc::clone(&app));
        Self { app, router }
    }

    pub fn user(&self, username: &str) -> User {
        self.app
            .store
            .create_user(&NewUser {
                username: username.to_owned(),
                password: format!("{username}-password"),
                ..NewUser::default()
            })
            .expect("user should be created")
    }

    pub fn group(&self, title: &str, slug: &str, description: &str) -> Group {
        self.app.store.create_group(title, slug, description).expect("group should be created")
    }

    pub fn post(&self, author: &User, text: &str, group: Option<&Group>) -> Post {
        let data = PostData { text: text.to_owned(), group_id: group.map(|g| g.id), image: None };
        self.app.store.create_post(author.id, &data).expect("post should be created")
    }

    /// A `cookie` header value carrying a fresh session for `user`.
    pub fn login(&self, user: &User) -> String {
        let token = self
            .app
            .store
            .create_session(user.id, Duration::from_secs(3600))
            .expect("session should be created");
        format!("sessionid={token}")
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response {
        self.send(http::Method::GET, uri, cookie, "").await
    }

    pub async fn post_form(&self, uri: &str, cookie: Option<&str>, body: &str) -> Response {
        self.send(http::Method::POST, uri, cookie, body).await
    }

    async fn send(&self, method: http::Method, uri: &str, cookie: Option<&str>, body: &str) -> Response {
        let mut builder = http::Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header("cookie", cookie);
        }
        if !body.is_empty() {
            builder = builder.header("content-type", "application/x-www-form-urlencoded");
        }
        let req = builder.body(Bytes::from(body.to_owned())).expect("request should build");
        self.router.handle(req).await
    }
}

pub fn json(res: &Response) -> Value {
    serde_json::from_slice(res.body()).expect("body should be JSON")
}

pub fn location(res: &Response) -> &str {
    res.header("location").expect("response should redirect")
}

/// `sessionid=<token>` from a `set-cookie` header.
pub fn session_cookie(res: &Response) -> String {
    let set = res.header("set-cookie").expect("response should set a cookie");
    set.split(';').next().unwrap_or_default().to_owned()
}

pub fn page_len(context: &Value) -> usize {
    context["page_obj"]["items"].as_array().map(Vec::len).unwrap_or_default()
}
