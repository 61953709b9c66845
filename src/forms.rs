//! Model-bound forms: binding, validation and redisplay.
//!
//! A form is built either blank, from an existing row (initial values for an
//! edit page), or bound to submitted data. Only bound forms validate. An
//! invalid form is rendered back with per-field errors and the submitted
//! values.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::error::Error;
use crate::models::{Group, NewUser, Post, PostData};
use crate::store::Store;

pub const REQUIRED: &str = "This field is required.";
pub const INVALID_CHOICE: &str = "Select a valid choice. That choice is not one of the available choices.";

/// Static description of one form field.
#[derive(Clone, Copy, Debug)]
pub struct FieldSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub help_text: &'static str,
    pub required: bool,
}

/// Field name → messages. Ordered so redisplay is stable.
pub type FieldErrors = BTreeMap<&'static str, Vec<String>>;

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Choice {
    pub value: String,
    pub label: String,
}

/// Serialized shape of a form, as views put it in their context.
#[derive(Debug, Serialize)]
pub struct FormView {
    pub is_bound: bool,
    pub fields: Vec<FieldView>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub non_field_errors: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct FieldView {
    pub name: &'static str,
    pub label: &'static str,
    pub help_text: &'static str,
    pub required: bool,
    pub value: String,
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<Choice>>,
}

/// Shared rendering for every form in the service.
pub trait Form {
    const FIELDS: &'static [FieldSpec];

    fn is_bound(&self) -> bool;
    fn value(&self, name: &str) -> &str;
    fn errors(&self) -> &FieldErrors;

    fn choices(&self, _name: &str) -> Option<Vec<Choice>> {
        None
    }

    fn non_field_errors(&self) -> &[String] {
        &[]
    }

    fn view(&self) -> FormView {
        let fields = Self::FIELDS
            .iter()
            .map(|def| FieldView {
                name: def.name,
                label: def.label,
                help_text: def.help_text,
                required: def.required,
                // Secrets are never echoed back.
                value: if def.name == "password" { String::new() } else { self.value(def.name).to_owned() },
                errors: self.errors().get(def.name).cloned().unwrap_or_default(),
                choices: self.choices(def.name),
            })
            .collect();
        FormView {
            is_bound: self.is_bound(),
            fields,
            non_field_errors: self.non_field_errors().to_vec(),
        }
    }
}

fn field(data: &HashMap<String, String>, name: &str) -> String {
    data.get(name).cloned().unwrap_or_default()
}

fn add_error(errors: &mut FieldErrors, name: &'static str, message: impl Into<String>) {
    errors.entry(name).or_default().push(message.into());
}

// ── PostForm ──────────────────────────────────────────────────────────────────

/// Post form: `group`, `text`, `image`.
#[derive(Debug, Default)]
pub struct PostForm {
    bound: bool,
    group: String,
    text: String,
    image: String,
    groups: Vec<Choice>,
    errors: FieldErrors,
}

pub const IMAGE_PATH_MAX: usize = 100;

impl PostForm {
    pub fn blank() -> Self {
        Self::default()
    }

    /// Unbound form showing `post`'s current values.
    pub fn from_post(post: &Post) -> Self {
        Self {
            group: post.group.as_ref().map(|g| g.id.to_string()).unwrap_or_default(),
            text: post.text.clone(),
            image: post.image.clone().unwrap_or_default(),
            ..Self::default()
        }
    }

    pub fn bind(data: &HashMap<String, String>) -> Self {
        Self {
            bound: true,
            group: field(data, "group"),
            text: field(data, "text"),
            image: field(data, "image"),
            ..Self::default()
        }
    }

    /// Offers `groups` as the choices of the `group` field.
    pub fn with_groups(mut self, groups: &[Group]) -> Self {
        self.groups = groups
            .iter()
            .map(|g| Choice { value: g.id.to_string(), label: g.title.clone() })
            .collect();
        self
    }

    /// Validates a bound form. On success returns the cleaned data; on
    /// failure records errors and returns `None`. Unbound forms are never valid.
    pub fn validate(&mut self, store: &Store) -> Result<Option<PostData>, Error> {
        if !self.bound {
            return Ok(None);
        }
        self.errors.clear();

        let text = self.text.trim();
        if text.is_empty() {
            add_error(&mut self.errors, "text", REQUIRED);
        }

        let group_id = match self.group.trim() {
            "" => None,
            raw => match raw.parse::<i64>() {
                Ok(id) if store.group_by_id(id)?.is_some() => Some(id),
                _ => {
                    add_error(&mut self.errors, "group", INVALID_CHOICE);
                    None
                }
            },
        };

        let image = match self.image.trim() {
            "" => None,
            path if is_media_path(path) => Some(path.to_owned()),
            _ => {
                add_error(&mut self.errors, "image", "Enter a valid image path.");
                None
            }
        };

        if !self.errors.is_empty() {
            return Ok(None);
        }
        Ok(Some(PostData { text: text.to_owned(), group_id, image }))
    }
}

/// Relative, no parent components, not too long.
fn is_media_path(path: &str) -> bool {
    path.len() <= IMAGE_PATH_MAX
        && !path.starts_with('/')
        && !path.contains('\\')
        && path.split('/').all(|seg| !seg.is_empty() && seg != "." && seg != "..")
}

impl Form for PostForm {
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec { name: "group", label: "Group", help_text: "Choose a group", required: false },
        FieldSpec { name: "text", label: "Text", help_text: "Enter the post text", required: true },
        FieldSpec { name: "image", label: "Image", help_text: "", required: false },
    ];

    fn is_bound(&self) -> bool { self.bound }

    fn value(&self, name: &str) -> &str {
        match name {
            "group" => &self.group,
            "text" => &self.text,
            "image" => &self.image,
            _ => "",
        }
    }

    fn errors(&self) -> &FieldErrors { &self.errors }

    fn choices(&self, name: &str) -> Option<Vec<Choice>> {
        (name == "group").then(|| self.groups.clone())
    }
}

// ── CommentForm ───────────────────────────────────────────────────────────────

/// Comment form: a single `text` field.
#[derive(Debug, Default)]
pub struct CommentForm {
    bound: bool,
    text: String,
    errors: FieldErrors,
}

impl CommentForm {
    pub fn blank() -> Self {
        Self::default()
    }

    pub fn bind(data: &HashMap<String, String>) -> Self {
        Self { bound: true, text: field(data, "text"), errors: FieldErrors::new() }
    }

    /// The cleaned comment text, if the form is bound and valid.
    pub fn validate(&mut self) -> Option<String> {
        if !self.bound {
            return None;
        }
        self.errors.clear();
        match self.text.trim() {
            "" => {
                add_error(&mut self.errors, "text", REQUIRED);
                None
            }
            text => Some(text.to_owned()),
        }
    }
}

impl Form for CommentForm {
    const FIELDS: &'static [FieldSpec] = &[FieldSpec {
        name: "text",
        label: "Comment",
        help_text: "Enter the comment text",
        required: true,
    }];

    fn is_bound(&self) -> bool { self.bound }

    fn value(&self, name: &str) -> &str {
        if name == "text" { &self.text } else { "" }
    }

    fn errors(&self) -> &FieldErrors { &self.errors }
}

// ── Account forms ─────────────────────────────────────────────────────────────

pub const USERNAME_MAX: usize = 150;
pub const PASSWORD_MIN: usize = 8;

/// Sign-up form: names, username and password.
#[derive(Debug, Default)]
pub struct SignupForm {
    bound: bool,
    first_name: String,
    last_name: String,
    username: String,
    password: String,
    errors: FieldErrors,
}

impl SignupForm {
    pub fn blank() -> Self {
        Self::default()
    }

    pub fn bind(data: &HashMap<String, String>) -> Self {
        Self {
            bound: true,
            first_name: field(data, "first_name"),
            last_name: field(data, "last_name"),
            username: field(data, "username"),
            password: field(data, "password"),
            errors: FieldErrors::new(),
        }
    }

    pub fn validate(&mut self, store: &Store) -> Result<Option<NewUser>, Error> {
        if !self.bound {
            return Ok(None);
        }
        self.errors.clear();

        let username = self.username.trim();
        if username.is_empty() {
            add_error(&mut self.errors, "username", REQUIRED);
        } else if username.chars().count() > USERNAME_MAX
            || !username.chars().all(|c| c.is_ascii_alphanumeric() || "@.+-_".contains(c))
        {
            add_error(
                &mut self.errors,
                "username",
                "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
            );
        } else if store.user_by_username(username)?.is_some() {
            add_error(&mut self.errors, "username", "A user with that username already exists.");
        }

        if self.password.is_empty() {
            add_error(&mut self.errors, "password", REQUIRED);
        } else if self.password.chars().count() < PASSWORD_MIN {
            add_error(
                &mut self.errors,
                "password",
                format!("This password is too short. It must contain at least {PASSWORD_MIN} characters."),
            );
        }

        if !self.errors.is_empty() {
            return Ok(None);
        }
        Ok(Some(NewUser {
            username: username.to_owned(),
            first_name: self.first_name.trim().to_owned(),
            last_name: self.last_name.trim().to_owned(),
            password: self.password.clone(),
        }))
    }
}

impl Form for SignupForm {
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec { name: "first_name", label: "First name", help_text: "", required: false },
        FieldSpec { name: "last_name", label: "Last name", help_text: "", required: false },
        FieldSpec {
            name: "username",
            label: "Username",
            help_text: "Letters, digits and @/./+/-/_ only.",
            required: true,
        },
        FieldSpec { name: "password", label: "Password", help_text: "", required: true },
    ];

    fn is_bound(&self) -> bool { self.bound }

    fn value(&self, name: &str) -> &str {
        match name {
            "first_name" => &self.first_name,
            "last_name" => &self.last_name,
            "username" => &self.username,
            "password" => &self.password,
            _ => "",
        }
    }

    fn errors(&self) -> &FieldErrors { &self.errors }
}

/// Login form. Bad credentials are a non-field error.
#[derive(Debug, Default)]
pub struct LoginForm {
    bound: bool,
    username: String,
    password: String,
    errors: FieldErrors,
    non_field_errors: Vec<String>,
}

impl LoginForm {
    pub fn blank() -> Self {
        Self::default()
    }

    pub fn bind(data: &HashMap<String, String>) -> Self {
        Self {
            bound: true,
            username: field(data, "username"),
            password: field(data, "password"),
            ..Self::default()
        }
    }

    /// The authenticated user, if the credentials match.
    pub fn validate(&mut self, store: &Store) -> Result<Option<crate::models::User>, Error> {
        if !self.bound {
            return Ok(None);
        }
        self.errors.clear();
        self.non_field_errors.clear();
        if self.username.trim().is_empty() {
            add_error(&mut self.errors, "username", REQUIRED);
        }
        if self.password.is_empty() {
            add_error(&mut self.errors, "password", REQUIRED);
        }
        if !self.errors.is_empty() {
            return Ok(None);
        }
        let user = store.authenticate(self.username.trim(), &self.password)?;
        if user.is_none() {
            self.non_field_errors.push(
                "Please enter a correct username and password. Note that both fields may be case-sensitive."
                    .to_owned(),
            );
        }
        Ok(user)
    }
}

impl Form for LoginForm {
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec { name: "username", label: "Username", help_text: "", required: true },
        FieldSpec { name: "password", label: "Password", help_text: "", required: true },
    ];

    fn is_bound(&self) -> bool { self.bound }

    fn value(&self, name: &str) -> &str {
        match name {
            "username" => &self.username,
            "password" => &self.password,
            _ => "",
        }
    }

    fn errors(&self) -> &FieldErrors { &self.errors }

    fn non_field_errors(&self) -> &[String] { &self.non_field_errors }
}
