//! Relational storage backed by SQLite.
//!
//! One connection behind a mutex, shared by every request. Each method takes
//! the lock for the duration of its statements and releases it before
//! returning, so views never hold it across an `.await`.
//!
//! # Schema
//!
//! | Table           | Columns |
//! |-----------------|---------|
//! | `auth_user`     | `id`, `username` (unique), `first_name`, `last_name`, `password`, `date_joined` |
//! | `auth_session`  | `token`, `user_id`, `expires_at` |
//! | `posts_group`   | `id`, `title`, `slug` (unique), `description` |
//! | `posts_post`    | `id`, `text`, `pub_date`, `author_id`, `group_id` (nullable), `image` (nullable) |
//! | `posts_comment` | `id`, `post_id`, `author_id`, `text`, `created` |
//! | `posts_follow`  | `id`, `user_id`, `author_id`; unique pair, no self-follows |
//!
//! Timestamps are RFC 3339 UTC strings with fixed microsecond precision, so
//! they sort lexically in time order.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use tracing::{debug, info};

use crate::auth::password;
use crate::config::GroupSeed;
use crate::error::Error;
use crate::models::{Comment, Follow, Group, NewUser, Post, PostData, PostFilter, User};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS auth_user (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        username    TEXT NOT NULL UNIQUE,
        first_name  TEXT NOT NULL DEFAULT '',
        last_name   TEXT NOT NULL DEFAULT '',
        password    TEXT NOT NULL,
        date_joined TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS auth_session (
        token      TEXT PRIMARY KEY,
        user_id    INTEGER NOT NULL REFERENCES auth_user(id) ON DELETE CASCADE,
        expires_at TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS posts_group (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        title       TEXT NOT NULL,
        slug        TEXT NOT NULL UNIQUE,
        description TEXT NOT NULL DEFAULT ''
    );
    CREATE TABLE IF NOT EXISTS posts_post (
        id        INTEGER PRIMARY KEY AUTOINCREMENT,
        text      TEXT NOT NULL,
        pub_date  TEXT NOT NULL,
        author_id INTEGER NOT NULL REFERENCES auth_user(id) ON DELETE CASCADE,
        group_id  INTEGER REFERENCES posts_group(id) ON DELETE SET NULL,
        image     TEXT
    );
    CREATE INDEX IF NOT EXISTS posts_post_pub_date ON posts_post (pub_date DESC, id DESC);
    CREATE INDEX IF NOT EXISTS posts_post_author ON posts_post (author_id);
    CREATE INDEX IF NOT EXISTS posts_post_group ON posts_post (group_id);
    CREATE TABLE IF NOT EXISTS posts_comment (
        id        INTEGER PRIMARY KEY AUTOINCREMENT,
        post_id   INTEGER NOT NULL REFERENCES posts_post(id) ON DELETE CASCADE,
        author_id INTEGER NOT NULL REFERENCES auth_user(id) ON DELETE CASCADE,
        text      TEXT NOT NULL,
        created   TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS posts_comment_post ON posts_comment (post_id);
    CREATE TABLE IF NOT EXISTS posts_follow (
        id        INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id   INTEGER NOT NULL REFERENCES auth_user(id) ON DELETE CASCADE,
        author_id INTEGER NOT NULL REFERENCES auth_user(id) ON DELETE CASCADE,
        UNIQUE (user_id, author_id),
        CHECK (user_id <> author_id)
    );
";

const USER_COLUMNS: &str = "u.id, u.username, u.first_name, u.last_name, u.date_joined";

const POST_SELECT: &str = "
    SELECT p.id, p.text, p.pub_date, p.image,
           u.id, u.username, u.first_name, u.last_name, u.date_joined,
           g.id, g.title, g.slug, g.description
      FROM posts_post p
      JOIN auth_user u ON u.id = p.author_id
      LEFT JOIN posts_group g ON g.id = p.group_id";

/// Shared handle to the database. Cloning is cheap.
#[derive(Clone, Debug)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Opens (creating if needed) the database at `path`. `:memory:` gives
    /// a private in-memory database.
    pub fn open(path: &str) -> Result<Self, Error> {
        let conn = if path == ":memory:" {
            Connection::open_in_memory()?
        } else {
            Connection::open(Path::new(path))?
        };
        let store = Self::init(conn)?;
        info!(%path, "database ready");
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, Error> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, Error> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, Error> {
        self.conn.lock().map_err(|_| Error::Poisoned)
    }

    /// Round-trips a trivial query; used by the readiness probe.
    pub fn ping(&self) -> Result<(), Error> {
        self.conn()?.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
    }

    // ── Users ────────────────────────────────────────────────────────────────

    pub fn create_user(&self, new: &NewUser) -> Result<User, Error> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO auth_user (username, first_name, last_name, password, date_joined)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                new.username,
                new.first_name,
                new.last_name,
                password::make(&new.password),
                timestamp_text(Utc::now()),
            ],
        )?;
        let id = conn.last_insert_rowid();
        debug!(user_id = id, username = %new.username, "user created");
        Ok(user_where(&conn, "u.id = ?1", id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?)
    }

    pub fn user_by_username(&self, username: &str) -> Result<Option<User>, Error> {
        Ok(user_where(&*self.conn()?, "u.username = ?1", username)?)
    }

    pub fn user_by_id(&self, id: i64) -> Result<Option<User>, Error> {
        Ok(user_where(&*self.conn()?, "u.id = ?1", id)?)
    }

    /// The user whose stored digest matches `raw_password`, if any.
    pub fn authenticate(&self, username: &str, raw_password: &str) -> Result<Option<User>, Error> {
        let conn = self.conn()?;
        let stored: Option<(i64, String)> = conn
            .query_row(
                "SELECT id, password FROM auth_user WHERE username = ?1",
                [username],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        match stored {
            Some((id, encoded)) if password::check(raw_password, &encoded) => {
                Ok(user_where(&conn, "u.id = ?1", id)?)
            }
            _ => Ok(None),
        }
    }

    // ── Sessions ─────────────────────────────────────────────────────────────

    /// Starts a session for `user_id` and returns its token. Sessions that
    /// have already expired are purged on the way.
    pub fn create_session(&self, user_id: i64, ttl: Duration) -> Result<String, Error> {
        let token = uuid::Uuid::new_v4().simple().to_string();
        let now = Utc::now();
        let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::weeks(52 * 100));
        let expires_at = now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC);
        let conn = self.conn()?;
        let purged = conn.execute(
            "DELETE FROM auth_session WHERE expires_at <= ?1",
            [timestamp_text(now)],
        )?;
        if purged > 0 {
            debug!(purged, "expired sessions removed");
        }
        conn.execute(
            "INSERT INTO auth_session (token, user_id, expires_at) VALUES (?1, ?2, ?3)",
            params![token, user_id, timestamp_text(expires_at)],
        )?;
        Ok(token)
    }

    /// The user owning an unexpired session `token`.
    pub fn session_user(&self, token: &str) -> Result<Option<User>, Error> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM auth_session s JOIN auth_user u ON u.id = s.user_id
              WHERE s.token = ?1 AND s.expires_at > ?2"
        );
        Ok(conn
            .query_row(&sql, params![token, timestamp_text(Utc::now())], |row| user_at(row, 0))
            .optional()?)
    }

    pub fn delete_session(&self, token: &str) -> Result<(), Error> {
        self.conn()?.execute("DELETE FROM auth_session WHERE token = ?1", [token])?;
        Ok(())
    }

    // ── Groups ───────────────────────────────────────────────────────────────

    pub fn create_group(&self, title: &str, slug: &str, description: &str) -> Result<Group, Error> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO posts_group (title, slug, description) VALUES (?1, ?2, ?3)",
            params![title, slug, description],
        )?;
        let id = conn.last_insert_rowid();
        Ok(group_where(&conn, "id = ?1", id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?)
    }

    /// Creates the group unless its slug is taken. Returns the stored group
    /// and whether it was created.
    pub fn ensure_group(&self, seed: &GroupSeed) -> Result<(Group, bool), Error> {
        let conn = self.conn()?;
        let created = conn.execute(
            "INSERT OR IGNORE INTO posts_group (title, slug, description) VALUES (?1, ?2, ?3)",
            params![seed.title, seed.slug, seed.description],
        )? == 1;
        let group = group_where(&conn, "slug = ?1", &seed.slug)?
            .ok_or(rusqlite::Error::QueryReturnedNoRows)?;
        Ok((group, created))
    }

    pub fn group_by_slug(&self, slug: &str) -> Result<Option<Group>, Error> {
        Ok(group_where(&*self.conn()?, "slug = ?1", slug)?)
    }

    pub fn group_by_id(&self, id: i64) -> Result<Option<Group>, Error> {
        Ok(group_where(&*self.conn()?, "id = ?1", id)?)
    }

    /// Every group, ordered by title. These are the choices of the post form.
    pub fn groups(&self) -> Result<Vec<Group>, Error> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, title, slug, description FROM posts_group ORDER BY title, id",
        )?;
        let rows = stmt.query_map([], group_row)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    // ── Posts ────────────────────────────────────────────────────────────────

    pub fn create_post(&self, author_id: i64, data: &PostData) -> Result<Post, Error> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO posts_post (text, pub_date, author_id, group_id, image)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![data.text, timestamp_text(Utc::now()), author_id, data.group_id, data.image],
        )?;
        let id = conn.last_insert_rowid();
        debug!(post_id = id, author_id, "post created");
        Ok(post_where(&conn, id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?)
    }

    /// Overwrites the editable fields. `None` when the post does not exist.
    pub fn update_post(&self, id: i64, data: &PostData) -> Result<Option<Post>, Error> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE posts_post SET text = ?1, group_id = ?2, image = ?3 WHERE id = ?4",
            params![data.text, data.group_id, data.image, id],
        )?;
        if changed == 0 {
            return Ok(None);
        }
        Ok(post_where(&conn, id)?)
    }

    /// Deletes a post and, by cascade, its comments. Returns whether it existed.
    #[cfg(test)]
    pub(crate) fn delete_post(&self, id: i64) -> Result<bool, Error> {
        Ok(self.conn()?.execute("DELETE FROM posts_post WHERE id = ?1", [id])? == 1)
    }

    pub fn post_by_id(&self, id: i64) -> Result<Option<Post>, Error> {
        Ok(post_where(&*self.conn()?, id)?)
    }

    pub fn count_posts(&self, filter: PostFilter) -> Result<usize, Error> {
        let conn = self.conn()?;
        let sql = format!("SELECT COUNT(*) FROM posts_post p {}", filter_clause(filter));
        let count: i64 = conn.query_row(&sql, params_from_iter(filter_arg(filter)), |r| r.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    /// Newest-first window of the posts matching `filter`.
    pub fn posts(&self, filter: PostFilter, offset: usize, limit: usize) -> Result<Vec<Post>, Error> {
        let conn = self.conn()?;
        let sql = format!(
            "{POST_SELECT} {} ORDER BY p.pub_date DESC, p.id DESC LIMIT {limit} OFFSET {offset}",
            filter_clause(filter),
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(filter_arg(filter)), post_row)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    // ── Comments ─────────────────────────────────────────────────────────────

    pub fn create_comment(&self, post_id: i64, author_id: i64, text: &str) -> Result<Comment, Error> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO posts_comment (post_id, author_id, text, created) VALUES (?1, ?2, ?3, ?4)",
            params![post_id, author_id, text, timestamp_text(Utc::now())],
        )?;
        let id = conn.last_insert_rowid();
        let sql = format!("{} WHERE c.id = ?1", comment_select());
        Ok(conn.query_row(&sql, [id], comment_row)?)
    }

    /// Comments on `post_id`, oldest first.
    pub fn comments(&self, post_id: i64) -> Result<Vec<Comment>, Error> {
        let conn = self.conn()?;
        let sql = format!("{} WHERE c.post_id = ?1 ORDER BY c.created, c.id", comment_select());
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([post_id], comment_row)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    // ── Follows ──────────────────────────────────────────────────────────────

    /// Get-or-create of the `user_id → author_id` subscription.
    ///
    /// Following yourself is refused with `None`.
    pub fn follow(&self, user_id: i64, author_id: i64) -> Result<Option<Follow>, Error> {
        if user_id == author_id {
            return Ok(None);
        }
        let conn = self.conn()?;
        let created = conn.execute(
            "INSERT OR IGNORE INTO posts_follow (user_id, author_id) VALUES (?1, ?2)",
            [user_id, author_id],
        )? == 1;
        if created {
            debug!(user_id, author_id, "follow created");
        }
        Ok(conn
            .query_row(
                "SELECT id, user_id, author_id FROM posts_follow WHERE user_id = ?1 AND author_id = ?2",
                [user_id, author_id],
                |row| Ok(Follow { id: row.get(0)?, user_id: row.get(1)?, author_id: row.get(2)? }),
            )
            .optional()?)
    }

    /// Removes the subscription if present. Returns whether one existed.
    pub fn unfollow(&self, user_id: i64, author_id: i64) -> Result<bool, Error> {
        let removed = self.conn()?.execute(
            "DELETE FROM posts_follow WHERE user_id = ?1 AND author_id = ?2",
            [user_id, author_id],
        )?;
        Ok(removed > 0)
    }

    pub fn is_following(&self, user_id: i64, author_id: i64) -> Result<bool, Error> {
        Ok(self.conn()?.query_row(
            "SELECT EXISTS (SELECT 1 FROM posts_follow WHERE user_id = ?1 AND author_id = ?2)",
            [user_id, author_id],
            |row| row.get(0),
        )?)
    }
}

// ── Row mapping ──────────────────────────────────────────────────────────────

fn timestamp_text(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn timestamp_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Reads the five [`USER_COLUMNS`] starting at column `base`.
fn user_at(row: &Row<'_>, base: usize) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(base)?,
        username: row.get(base + 1)?,
        first_name: row.get(base + 2)?,
        last_name: row.get(base + 3)?,
        date_joined: timestamp_at(row, base + 4)?,
    })
}

fn user_where(
    conn: &Connection,
    predicate: &str,
    arg: impl rusqlite::ToSql,
) -> rusqlite::Result<Option<User>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM auth_user u WHERE {predicate}");
    conn.query_row(&sql, [arg], |row| user_at(row, 0)).optional()
}

fn group_row(row: &Row<'_>) -> rusqlite::Result<Group> {
    Ok(Group {
        id: row.get(0)?,
        title: row.get(1)?,
        slug: row.get(2)?,
        description: row.get(3)?,
    })
}

fn group_where(
    conn: &Connection,
    predicate: &str,
    arg: impl rusqlite::ToSql,
) -> rusqlite::Result<Option<Group>> {
    let sql = format!("SELECT id, title, slug, description FROM posts_group WHERE {predicate}");
    conn.query_row(&sql, [arg], group_row).optional()
}

fn post_row(row: &Row<'_>) -> rusqlite::Result<Post> {
    let group = match row.get::<_, Option<i64>>(9)? {
        Some(id) => Some(Group {
            id,
            title: row.get(10)?,
            slug: row.get(11)?,
            description: row.get(12)?,
        }),
        None => None,
    };
    Ok(Post {
        id: row.get(0)?,
        text: row.get(1)?,
        pub_date: timestamp_at(row, 2)?,
        image: row.get(3)?,
        author: user_at(row, 4)?,
        group,
    })
}

fn post_where(conn: &Connection, id: i64) -> rusqlite::Result<Option<Post>> {
    let sql = format!("{POST_SELECT} WHERE p.id = ?1");
    conn.query_row(&sql, [id], post_row).optional()
}

fn filter_clause(filter: PostFilter) -> &'static str {
    match filter {
        PostFilter::All => "",
        PostFilter::Group(_) => "WHERE p.group_id = ?1",
        PostFilter::Author(_) => "WHERE p.author_id = ?1",
        PostFilter::FollowedBy(_) => {
            "WHERE p.author_id IN (SELECT author_id FROM posts_follow WHERE user_id = ?1)"
        }
    }
}

fn filter_arg(filter: PostFilter) -> Option<i64> {
    match filter {
        PostFilter::All => None,
        PostFilter::Group(id) | PostFilter::Author(id) | PostFilter::FollowedBy(id) => Some(id),
    }
}

fn comment_select() -> String {
    format!(
        "SELECT c.id, c.post_id, c.text, c.created, {USER_COLUMNS}
           FROM posts_comment c JOIN auth_user u ON u.id = c.author_id"
    )
}

fn comment_row(row: &Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get(0)?,
        post_id: row.get(1)?,
        text: row.get(2)?,
        created: timestamp_at(row, 3)?,
        author: user_at(row, 4)?,
    })
}
