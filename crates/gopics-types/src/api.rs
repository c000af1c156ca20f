use serde::{Deserialize, Serialize};

use crate::models::{Post, User};

pub const PAGE_TITLE: &str = "GoPics | ";

// -- Auth --

#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub name: String,
    pub password: String,
}

// -- Pages --

/// View model handed to the page renderer.
#[derive(Debug, Default, Serialize)]
pub struct Page {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    pub posts: Vec<Post>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logged_user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub val_error: Option<String>,
}

impl Page {
    pub fn titled(suffix: &str) -> Self {
        Self {
            title: format!("{PAGE_TITLE}{suffix}"),
            ..Default::default()
        }
    }
}
