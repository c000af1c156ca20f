//! Record layouts and key namespacing.
//!
//! Users, posts and timelines live under disjoint key prefixes of the same
//! store. Records are flattened into one hash per entity.

use std::collections::HashMap;

use gopics_types::models::{Post, User};

use crate::{DbError, Result};

pub const USER_PREFIX: &str = "user:";
pub const POST_PREFIX: &str = "post:";
pub const TIMELINE_PREFIX: &str = "timeline:";

pub fn user_key(name: &str) -> String {
    format!("{USER_PREFIX}{name}")
}

pub fn post_key(name: &str) -> String {
    format!("{POST_PREFIX}{name}")
}

pub fn timeline_key(owner: &str) -> String {
    format!("{TIMELINE_PREFIX}{owner}")
}

/// An entity stored as a flat field/value hash.
pub trait HashRecord: Sized {
    fn to_fields(&self) -> Vec<(&'static str, Vec<u8>)>;
    fn from_fields(key: &str, fields: HashMap<String, Vec<u8>>) -> Result<Self>;
}

struct Fields<'a> {
    key: &'a str,
    inner: HashMap<String, Vec<u8>>,
}

impl Fields<'_> {
    fn bytes(&mut self, field: &str) -> Result<Vec<u8>> {
        self.inner.remove(field).ok_or_else(|| DbError::Corrupt {
            key: self.key.to_string(),
            reason: format!("missing field {field}"),
        })
    }

    fn string(&mut self, field: &str) -> Result<String> {
        String::from_utf8(self.bytes(field)?).map_err(|_| DbError::Corrupt {
            key: self.key.to_string(),
            reason: format!("field {field} is not UTF-8"),
        })
    }
}

impl HashRecord for User {
    fn to_fields(&self) -> Vec<(&'static str, Vec<u8>)> {
        vec![
            ("name", self.name.as_bytes().to_vec()),
            ("email", self.email.as_bytes().to_vec()),
            ("password", self.password.clone()),
            ("pic_url", self.pic_url.as_bytes().to_vec()),
        ]
    }

    fn from_fields(key: &str, fields: HashMap<String, Vec<u8>>) -> Result<Self> {
        let mut f = Fields { key, inner: fields };
        Ok(Self {
            name: f.string("name")?,
            email: f.string("email")?,
            password: f.bytes("password")?,
            pic_url: f.string("pic_url")?,
        })
    }
}

impl HashRecord for Post {
    fn to_fields(&self) -> Vec<(&'static str, Vec<u8>)> {
        vec![
            ("author_name", self.author_name.as_bytes().to_vec()),
            ("author_pic_url", self.author_pic_url.as_bytes().to_vec()),
            ("name", self.name.as_bytes().to_vec()),
            ("text", self.text.as_bytes().to_vec()),
            ("time", self.time.as_bytes().to_vec()),
        ]
    }

    fn from_fields(key: &str, fields: HashMap<String, Vec<u8>>) -> Result<Self> {
        let mut f = Fields { key, inner: fields };
        Ok(Self {
            author_name: f.string("author_name")?,
            author_pic_url: f.string("author_pic_url")?,
            name: f.string("name")?,
            text: f.string("text")?,
            time: f.string("time")?,
        })
    }
}
