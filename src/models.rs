//! Rows as the views see them.
//!
//! Posts and comments carry their author (and group) already joined in, so
//! a listing is one query, not one per row.

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub date_joined: DateTime<Utc>,
}

impl User {
    /// `"first last"`, or the username when both are blank.
    pub fn full_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        match full.trim() {
            "" => self.username.clone(),
            name => name.to_owned(),
        }
    }
}

/// Fields collected at sign-up.
#[derive(Clone, Debug, Default)]
pub struct NewUser {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

/// A topic group posts can be filed under.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Group {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub description: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Post {
    pub id: i64,
    pub text: String,
    pub pub_date: DateTime<Utc>,
    pub author: User,
    pub group: Option<Group>,
    /// Relative media path, e.g. `posts/small.gif`.
    pub image: Option<String>,
}

/// The editable part of a post, as validated by [`PostForm`](crate::forms::PostForm).
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PostData {
    pub text: String,
    pub group_id: Option<i64>,
    pub image: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub author: User,
    pub text: String,
    pub created: DateTime<Utc>,
}

/// `user` subscribes to the posts of `author`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct Follow {
    pub id: i64,
    pub user_id: i64,
    pub author_id: i64,
}

/// Which posts a listing shows.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PostFilter {
    All,
    Group(i64),
    Author(i64),
    /// Posts by every author the given user follows.
    FollowedBy(i64),
}
