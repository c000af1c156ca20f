use serde::Serialize;

/// A registered GoPics user.
///
/// `password` holds the irreversible hash, never the plaintext, and is
/// never serialized into a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub name: String,
    pub email: String,
    #[serde(skip)]
    pub password: Vec<u8>,
    pub pic_url: String,
}

/// A published picture with its caption.
///
/// `author_pic_url` is copied from the author at publish time and is not
/// kept in sync with later changes to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Post {
    pub author_name: String,
    pub author_pic_url: String,
    pub name: String,
    pub text: String,
    pub time: String,
}
