use std::collections::HashMap;

use crate::{Error, Result};

/// A GET request: a path plus ordered query parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub path: String,
    pub query: Vec<(String, String)>,
}

impl Request {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            query: Vec::new(),
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// First value of `name`, if present.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn url(&self) -> String {
        if self.query.is_empty() {
            return self.path.clone();
        }
        let query = self
            .query
            .iter()
            .map(|(key, value)| format!("{}={}", form_urlencode(key), form_urlencode(value)))
            .collect::<Vec<_>>()
            .join("&");
        format!("{}?{query}", self.path)
    }

    pub fn parse(url: &str) -> Result<Self> {
        let (path, query) = match url.split_once('?') {
            Some((path, query)) => (path, query),
            None => (url, ""),
        };
        if !path.starts_with('/') {
            return Err(Error::InvalidQuery(format!("path must be absolute: {url}")));
        }

        let mut request = Self::get(path);
        for pair in query.split('&').filter(|pair| !pair.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            request
                .query
                .push((form_urldecode(key)?, form_urldecode(value)?));
        }
        Ok(request)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: String,
}

impl Response {
    pub fn ok(body: impl Into<String>) -> Self {
        Self::with_status(200, body)
    }

    pub fn with_status(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn not_found() -> Self {
        Self::with_status(404, "Not Found")
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Anything that can answer a request synchronously.
pub trait Backend {
    fn handle(&self, request: &Request) -> Response;
}

impl<F> Backend for F
where
    F: Fn(&Request) -> Response,
{
    fn handle(&self, request: &Request) -> Response {
        self(request)
    }
}

/// Canned bodies keyed by full URL. Unknown URLs answer 404.
#[derive(Debug, Clone, Default)]
pub struct FetchMocks {
    bodies: HashMap<String, String>,
}

impl FetchMocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, url: &str, body: &str) {
        self.bodies.insert(url.to_string(), body.to_string());
    }

    pub fn clear(&mut self) {
        self.bodies.clear();
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }
}

impl Backend for FetchMocks {
    fn handle(&self, request: &Request) -> Response {
        self.bodies
            .get(&request.url())
            .map(|body| Response::ok(body.clone()))
            .unwrap_or_else(Response::not_found)
    }
}

/// `application/x-www-form-urlencoded` byte serializer.
pub(crate) fn form_urlencode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'*' | b'-' | b'.' | b'_' => {
                out.push(byte as char)
            }
            b' ' => out.push('+'),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

pub(crate) fn form_urldecode(value: &str) -> Result<String> {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0usize;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' => {
                let hex = bytes
                    .get(i + 1..i + 3)
                    .filter(|pair| pair.iter().all(u8::is_ascii_hexdigit))
                    .and_then(|pair| std::str::from_utf8(pair).ok())
                    .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                    .ok_or_else(|| {
                        Error::InvalidQuery(format!("bad percent escape in {value:?}"))
                    })?;
                out.push(hex);
                i += 3;
            }
            byte => {
                out.push(byte);
                i += 1;
            }
        }
    }
    String::from_utf8(out)
        .map_err(|_| Error::InvalidQuery(format!("{value:?} does not decode to UTF-8")))
}
