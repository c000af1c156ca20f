#![allow(dead_code)]

use std::io::Cursor;
use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, Response, header},
};
use http_body_util::BodyExt;
use image::{DynamicImage, ImageFormat, RgbImage};
use serde_json::Value;
use tempfile::TempDir;
use tower::util::ServiceExt;

use gopics_api::{AppState, AppStateInner, router};
use gopics_crypto::Keyring;
use gopics_crypto::keys::generate_key;
use gopics_db::{Database, PoolConfig};
use gopics_media::{ImageLimits, MediaStore};

pub const BOUNDARY: &str = "gopics-test-boundary";

pub struct TestApp {
    pub state: AppState,
    router: Router,
    _dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let db = Database::open(&dir.path().join("gopics.db"), PoolConfig::default()).unwrap();
        let media = MediaStore::new(dir.path().join("media")).await.unwrap();
        let keyring = Keyring::new(&generate_key(32), Some(generate_key(32).as_slice())).unwrap();

        let state: AppState = Arc::new(AppStateInner {
            db,
            keyring,
            media,
            limits: ImageLimits::default(),
        });

        Self {
            router: router(state.clone()),
            state,
            _dir: dir,
        }
    }

    pub async fn send(&self, req: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(req).await.unwrap()
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response<Body> {
        let mut req = Request::get(uri);
        if let Some(cookie) = cookie {
            req = req.header(header::COOKIE, cookie);
        }
        self.send(req.body(Body::empty()).unwrap()).await
    }

    pub async fn register(&self, name: &str, email: &str, password: &str) -> Response<Body> {
        let body = format!(
            "name={}&email={}&password={}",
            encode(name),
            encode(email),
            encode(password)
        );
        self.send(form("/registration", body)).await
    }

    /// Register `name` and return its `AUTH=...` cookie pair.
    pub async fn sign_up(&self, name: &str) -> String {
        let resp = self
            .register(name, &format!("{name}@example.com"), "password1")
            .await;
        assert_eq!(resp.status(), 303);
        cookie_pair(&resp, "AUTH").expect("registration sets a session")
    }

    pub async fn upload(
        &self,
        cookie: Option<&str>,
        parts: &[Part<'_>],
        content_length: Length,
    ) -> Response<Body> {
        let body = multipart(parts);
        let mut req = Request::post("/post").header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
        match content_length {
            Length::Exact => req = req.header(header::CONTENT_LENGTH, body.len()),
            Length::Declared(n) => req = req.header(header::CONTENT_LENGTH, n),
            Length::Missing => {}
        }
        if let Some(cookie) = cookie {
            req = req.header(header::COOKIE, cookie);
        }
        self.send(req.body(Body::from(body)).unwrap()).await
    }

    pub async fn post_picture(&self, cookie: &str, picture: Vec<u8>, text: &str) -> Response<Body> {
        self.upload(
            Some(cookie),
            &[Part::picture(picture), Part::text(text)],
            Length::Exact,
        )
        .await
    }

    pub async fn media_files(&self) -> Vec<String> {
        self.state.media.list().await.unwrap()
    }
}

pub enum Length {
    Exact,
    Declared(u64),
    Missing,
}

pub struct Part<'a> {
    pub name: &'a str,
    pub filename: Option<&'a str>,
    pub data: Vec<u8>,
}

impl Part<'_> {
    pub fn picture(data: Vec<u8>) -> Self {
        Part {
            name: "picture",
            filename: Some("upload.png"),
            data,
        }
    }

    pub fn text(text: &str) -> Self {
        Part {
            name: "text",
            filename: None,
            data: text.as_bytes().to_vec(),
        }
    }
}

pub fn multipart(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part.filename {
            Some(filename) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                     Content-Type: application/octet-stream\r\n\r\n",
                    part.name, filename
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", part.name).as_bytes(),
            ),
        }
        body.extend_from_slice(&part.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn form(uri: &str, body: String) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header(header::CONTENT_LENGTH, body.len())
        .body(Body::from(body))
        .unwrap()
}

/// Minimal form encoding for test input.
fn encode(value: &str) -> String {
    value
        .replace('%', "%25")
        .replace('&', "%26")
        .replace('+', "%2B")
        .replace('=', "%3D")
        .replace('@', "%40")
        .replace(' ', "+")
}

/// Full `Set-Cookie` header for the named cookie.
pub fn set_cookie(resp: &Response<Body>, name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    resp.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with(&prefix))
        .map(str::to_owned)
}

/// `name=value` part of the named cookie, ready for a `Cookie` header.
pub fn cookie_pair(resp: &Response<Body>, name: &str) -> Option<String> {
    set_cookie(resp, name).map(|c| c.split(';').next().unwrap_or_default().to_owned())
}

pub fn location(resp: &Response<Body>) -> &str {
    resp.headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

pub async fn body_bytes(resp: Response<Body>) -> Vec<u8> {
    resp.into_body().collect().await.unwrap().to_bytes().to_vec()
}

pub async fn json(resp: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(resp).await).unwrap()
}

pub fn png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 64])
    });
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}
