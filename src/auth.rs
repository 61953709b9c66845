//! Accounts and sessions.
//!
//! A session is a random token in the `sessionid` cookie that maps to a row
//! in `auth_session`. Views that need a signed-in user call
//! [`current_user`] and, on `None`, answer with [`redirect_to_login`], which
//! sends the browser to the login page with a `next` parameter pointing back.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::info;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use crate::app::App;
use crate::error::{AppError, Error};
use crate::forms::{Form, FormView, LoginForm, SignupForm};
use crate::method::Method;
use crate::models::User;
use crate::request::Request;
use crate::response::Response;
use crate::store::Store;

pub const SESSION_COOKIE: &str = "sessionid";
pub const LOGIN_URL: &str = "/auth/login/";

/// Characters escaped in the `next` parameter. Path separators stay
/// readable: `?next=/posts/1/edit/`.
const NEXT_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Salted password digests, stored as `sha256$<salt>$<hex digest>`.
pub mod password {
    use sha2::{Digest, Sha256};
    use subtle::ConstantTimeEq;

    const ALGORITHM: &str = "sha256";

    fn digest(salt: &str, raw: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(salt.as_bytes());
        hasher.update(b"$");
        hasher.update(raw.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Encodes `raw` with a fresh random salt.
    pub fn make(raw: &str) -> String {
        let salt = uuid::Uuid::new_v4().simple().to_string();
        format!("{ALGORITHM}${salt}${}", digest(&salt, raw))
    }

    /// Whether `raw` matches an encoded password. Malformed encodings never match.
    pub fn check(raw: &str, encoded: &str) -> bool {
        let mut parts = encoded.splitn(3, '$');
        let (Some(ALGORITHM), Some(salt), Some(expected)) = (parts.next(), parts.next(), parts.next())
        else {
            return false;
        };
        digest(salt, raw).as_bytes().ct_eq(expected.as_bytes()).into()
    }

}

/// The signed-in user, if the request carries a live session.
pub fn current_user(store: &Store, req: &Request) -> Result<Option<User>, Error> {
    match req.cookie(SESSION_COOKIE) {
        Some(token) if !token.is_empty() => store.session_user(token),
        _ => Ok(None),
    }
}

/// `302` to the login page, asking it to come back to this request.
pub fn redirect_to_login(req: &Request) -> Response {
    let target = req.target();
    let next = utf8_percent_encode(&target, NEXT_ENCODE_SET);
    Response::redirect(&format!("{LOGIN_URL}?next={next}"))
}

/// Only same-site absolute paths are followed after login. Anything but
/// printable ASCII (control characters included) would make an invalid
/// `location` header, so it is refused.
fn safe_next(next: Option<String>) -> String {
    match next {
        Some(n)
            if n.starts_with('/')
                && !n.starts_with("//")
                && !n.contains('\\')
                && n.bytes().all(|b| b.is_ascii_graphic()) =>
        {
            n
        }
        _ => "/".to_owned(),
    }
}

fn session_cookie(token: &str, ttl: Duration) -> String {
    format!(
        "{SESSION_COOKIE}={token}; Max-Age={}; Path=/; HttpOnly; SameSite=Lax",
        ttl.as_secs()
    )
}

fn expired_cookie() -> String {
    format!("{SESSION_COOKIE}=; Max-Age=0; Path=/; HttpOnly; SameSite=Lax")
}

/// Starts a session for `user` and redirects to `location` with its cookie.
fn login_redirect(app: &App, user: &User, location: &str) -> Result<Response, AppError> {
    let ttl = Duration::from_secs(app.config.session_ttl_secs);
    let token = app.store.create_session(user.id, ttl)?;
    info!(username = %user.username, "user signed in");
    Ok(Response::redirect(location).with_header("set-cookie", &session_cookie(&token, ttl)))
}

#[derive(Serialize)]
struct AuthContext<'a> {
    form: FormView,
    #[serde(skip_serializing_if = "Option::is_none")]
    next: Option<&'a str>,
}

/// `GET|POST /auth/signup/`: create an account and sign in.
pub async fn signup(app: Arc<App>, req: Request) -> Result<Response, AppError> {
    let mut form = match req.method() {
        Method::Post => SignupForm::bind(&req.form()),
        _ => SignupForm::blank(),
    };
    let Some(new) = form.validate(&app.store)? else {
        return Ok(Response::render(&AuthContext { form: form.view(), next: None })?);
    };
    let user = app.store.create_user(&new)?;
    login_redirect(&app, &user, "/")
}

/// `GET|POST /auth/login/`: verify credentials, then follow `next`.
pub async fn login(app: Arc<App>, req: Request) -> Result<Response, AppError> {
    let data = req.form();
    let next = data.get("next").cloned().or_else(|| req.query_param("next"));
    let mut form = match req.method() {
        Method::Post => LoginForm::bind(&data),
        _ => LoginForm::blank(),
    };
    let Some(user) = form.validate(&app.store)? else {
        return Ok(Response::render(&AuthContext { form: form.view(), next: next.as_deref() })?);
    };
    login_redirect(&app, &user, &safe_next(next))
}

/// `GET|POST /auth/logout/`: end the session and go home.
pub async fn logout(app: Arc<App>, req: Request) -> Result<Response, AppError> {
    if let Some(token) = req.cookie(SESSION_COOKIE) {
        app.store.delete_session(token)?;
    }
    Ok(Response::redirect("/").with_header("set-cookie", &expired_cookie()))
}
