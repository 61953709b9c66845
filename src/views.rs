//! Post, group, comment and follow views.
//!
//! Every view takes the shared [`App`] and the request, and returns either a
//! rendered context (JSON) or a redirect. Missing rows become `404` through
//! [`AppError::NotFound`]. Views that change data require a signed-in user
//! and send anonymous visitors to the login page.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::app::App;
use crate::auth::{current_user, redirect_to_login};
use crate::error::AppError;
use crate::forms::{CommentForm, Form, FormView, PostForm};
use crate::method::Method;
use crate::models::{Comment, Group, Post, PostFilter, User};
use crate::paginator::{Page, Paginator};
use crate::request::Request;
use crate::response::Response;

fn profile_url(username: &str) -> String {
    format!("/profile/{username}/")
}

fn detail_url(post_id: i64) -> String {
    format!("/posts/{post_id}/")
}

/// `{post_id}` as a row id. Anything unparsable cannot name a row.
fn post_id(req: &Request) -> Result<i64, AppError> {
    req.param("post_id")
        .and_then(|raw| raw.parse().ok())
        .ok_or(AppError::NotFound)
}

fn author(app: &App, req: &Request) -> Result<User, AppError> {
    let username = req.param("username").unwrap_or_default();
    app.store.user_by_username(username)?.ok_or(AppError::NotFound)
}

/// One page of `filter`, picked by `?page=`.
fn paginate(app: &App, filter: PostFilter, req: &Request) -> Result<Page<Post>, AppError> {
    let paginator = Paginator::new(app.store.count_posts(filter)?, app.config.page_size);
    let number = paginator.page_number(req.query_param("page").as_deref());
    let items = app.store.posts(filter, paginator.offset(number), paginator.per_page())?;
    Ok(paginator.page(number, items))
}

// ── Listings ─────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ListContext<'a> {
    page_obj: &'a Page<Post>,
}

/// `GET /`: every post, newest first. Served from the page cache while fresh.
pub async fn index(app: Arc<App>, req: Request) -> Result<Response, AppError> {
    let key = req.target();
    if let Some(cached) = app.index_cache.get(&key) {
        return Ok(cached);
    }
    let page = paginate(&app, PostFilter::All, &req)?;
    let res = Response::render(&ListContext { page_obj: &page })?;
    app.index_cache.insert(key, res.clone());
    Ok(res)
}

#[derive(Serialize)]
struct GroupContext<'a> {
    group: &'a Group,
    page_obj: &'a Page<Post>,
}

/// `GET /group/{slug}/`
pub async fn group_posts(app: Arc<App>, req: Request) -> Result<Response, AppError> {
    let slug = req.param("slug").unwrap_or_default();
    let group = app.store.group_by_slug(slug)?.ok_or(AppError::NotFound)?;
    let page = paginate(&app, PostFilter::Group(group.id), &req)?;
    Ok(Response::render(&GroupContext { group: &group, page_obj: &page })?)
}

#[derive(Serialize)]
struct ProfileContext<'a> {
    author: &'a User,
    full_name: String,
    page_obj: &'a Page<Post>,
    /// Whether the viewer follows `author`. Always false for anonymous viewers.
    following: bool,
}

/// `GET /profile/{username}/`
pub async fn profile(app: Arc<App>, req: Request) -> Result<Response, AppError> {
    let author = author(&app, &req)?;
    let page = paginate(&app, PostFilter::Author(author.id), &req)?;
    let following = match current_user(&app.store, &req)? {
        Some(viewer) => app.store.is_following(viewer.id, author.id)?,
        None => false,
    };
    Ok(Response::render(&ProfileContext {
        full_name: author.full_name(),
        author: &author,
        page_obj: &page,
        following,
    })?)
}

#[derive(Serialize)]
struct DetailContext<'a> {
    post: &'a Post,
    author_post_count: usize,
    comments: &'a [Comment],
    form: FormView,
}

/// `GET /posts/{post_id}/`: the post, its comments and a blank comment form.
pub async fn post_detail(app: Arc<App>, req: Request) -> Result<Response, AppError> {
    let id = post_id(&req)?;
    let post = app.store.post_by_id(id)?.ok_or(AppError::NotFound)?;
    let comments = app.store.comments(id)?;
    Ok(Response::render(&DetailContext {
        author_post_count: app.store.count_posts(PostFilter::Author(post.author.id))?,
        post: &post,
        comments: &comments,
        form: CommentForm::blank().view(),
    })?)
}

// ── Writes ───────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct PostFormContext {
    form: FormView,
    is_edit: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    post_id: Option<i64>,
}

/// `GET|POST /create/`: on success the post belongs to the viewer and the
/// browser lands on their profile.
pub async fn post_create(app: Arc<App>, req: Request) -> Result<Response, AppError> {
    let Some(user) = current_user(&app.store, &req)? else {
        return Ok(redirect_to_login(&req));
    };
    let form = match req.method() {
        Method::Post => PostForm::bind(&req.form()),
        _ => PostForm::blank(),
    };
    let mut form = form.with_groups(&app.store.groups()?);
    let Some(data) = form.validate(&app.store)? else {
        return Ok(Response::render(&PostFormContext {
            form: form.view(),
            is_edit: false,
            post_id: None,
        })?);
    };
    let post = app.store.create_post(user.id, &data)?;
    app.index_cache.clear();
    info!(post_id = post.id, author = %user.username, "post published");
    Ok(Response::redirect(&profile_url(&user.username)))
}

/// `GET|POST /posts/{post_id}/edit/`: only the author may edit; anyone else
/// is sent back to the post.
pub async fn post_edit(app: Arc<App>, req: Request) -> Result<Response, AppError> {
    let Some(user) = current_user(&app.store, &req)? else {
        return Ok(redirect_to_login(&req));
    };
    let id = post_id(&req)?;
    let post = app.store.post_by_id(id)?.ok_or(AppError::NotFound)?;
    if post.author.id != user.id {
        return Ok(Response::redirect(&detail_url(id)));
    }
    let form = match req.method() {
        Method::Post => PostForm::bind(&req.form()),
        _ => PostForm::from_post(&post),
    };
    let mut form = form.with_groups(&app.store.groups()?);
    let Some(data) = form.validate(&app.store)? else {
        return Ok(Response::render(&PostFormContext {
            form: form.view(),
            is_edit: true,
            post_id: Some(id),
        })?);
    };
    app.store.update_post(id, &data)?.ok_or(AppError::NotFound)?;
    app.index_cache.clear();
    info!(post_id = id, author = %user.username, "post edited");
    Ok(Response::redirect(&detail_url(id)))
}

/// `GET|POST /posts/{post_id}/comment/`: saves a valid comment; always
/// returns to the post.
pub async fn add_comment(app: Arc<App>, req: Request) -> Result<Response, AppError> {
    let Some(user) = current_user(&app.store, &req)? else {
        return Ok(redirect_to_login(&req));
    };
    let id = post_id(&req)?;
    app.store.post_by_id(id)?.ok_or(AppError::NotFound)?;
    let mut form = match req.method() {
        Method::Post => CommentForm::bind(&req.form()),
        _ => CommentForm::blank(),
    };
    if let Some(text) = form.validate() {
        let comment = app.store.create_comment(id, user.id, &text)?;
        info!(post_id = id, comment_id = comment.id, author = %user.username, "comment added");
    }
    Ok(Response::redirect(&detail_url(id)))
}

// ── Follows ──────────────────────────────────────────────────────────────────

/// `GET /follow/`: posts by the authors the viewer follows.
pub async fn follow_index(app: Arc<App>, req: Request) -> Result<Response, AppError> {
    let Some(user) = current_user(&app.store, &req)? else {
        return Ok(redirect_to_login(&req));
    };
    let page = paginate(&app, PostFilter::FollowedBy(user.id), &req)?;
    Ok(Response::render(&ListContext { page_obj: &page })?)
}

/// `GET|POST /profile/{username}/follow/`: following yourself is a no-op.
pub async fn profile_follow(app: Arc<App>, req: Request) -> Result<Response, AppError> {
    let Some(user) = current_user(&app.store, &req)? else {
        return Ok(redirect_to_login(&req));
    };
    let author = author(&app, &req)?;
    if user.id != author.id {
        app.store.follow(user.id, author.id)?;
    }
    Ok(Response::redirect(&profile_url(&author.username)))
}

/// `GET|POST /profile/{username}/unfollow/`
pub async fn profile_unfollow(app: Arc<App>, req: Request) -> Result<Response, AppError> {
    let Some(user) = current_user(&app.store, &req)? else {
        return Ok(redirect_to_login(&req));
    };
    let author = author(&app, &req)?;
    app.store.unfollow(user.id, author.id)?;
    Ok(Response::redirect(&profile_url(&author.username)))
}
