//! Request handler module
//!
//! Defines the uniform handler capability every unit of request processing
//! implements: leaf handlers (application delegation, file serving, fixed
//! responses), middleware wrappers, and the route table itself.

pub mod app;
pub mod file_serve;
pub mod fixed;

use async_trait::async_trait;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{HeaderMap, Method, Response, Version};
use std::collections::HashMap;
use std::net::SocketAddr;
use thiserror::Error;

use crate::session::SessionHandle;

/// Response type flowing back through the pipeline.
pub type HttpResponse = Response<Full<Bytes>>;

/// A fault raised by a handler, as opposed to an error *response*.
///
/// Error responses (404, 413, ...) are regular `Ok` values; a fault means
/// the handler could not produce a response at all. Faults propagate out
/// through the wrappers and are converted to a 500 at the pipeline boundary.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("kernel fault: {0}")]
    Kernel(String),

    #[error("i/o fault: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-request context carried through the middleware chain.
///
/// Owned exclusively by one in-flight request and mutated in place as it
/// passes through the wrappers: `ParsingWrapper` fills `params` and
/// `cookies`, `SessionWrapper` attaches `session`.
pub struct RequestContext {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub version: Version,
    pub headers: HeaderMap,
    pub peer_addr: Option<SocketAddr>,
    pub body: Bytes,

    /// Decoded query-string and form parameters (filled by `ParsingWrapper`).
    pub params: HashMap<String, String>,
    /// Cookies from the `Cookie` header (filled by `ParsingWrapper`).
    pub cookies: HashMap<String, String>,
    /// Session attached by `SessionWrapper` for application routes.
    pub session: Option<SessionHandle>,
}

impl RequestContext {
    /// Build a context from the decomposed transport request.
    pub fn new(
        method: Method,
        path: String,
        query: Option<String>,
        version: Version,
        headers: HeaderMap,
        peer_addr: Option<SocketAddr>,
        body: Bytes,
    ) -> Self {
        Self {
            method,
            path,
            query,
            version,
            headers,
            peer_addr,
            body,
            params: HashMap::new(),
            cookies: HashMap::new(),
            session: None,
        }
    }

    /// Shorthand for contexts that only carry a path (fixed routes, tests).
    pub fn for_path(path: &str) -> Self {
        Self::new(
            Method::GET,
            path.to_string(),
            None,
            Version::HTTP_11,
            HeaderMap::new(),
            None,
            Bytes::new(),
        )
    }

    pub fn is_head(&self) -> bool {
        self.method == Method::HEAD
    }

    /// Header value as UTF-8, `None` when absent or non-ASCII.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Uniform handler capability: accept a context, produce a response.
///
/// Wrappers hold exactly one inner `Handler` and implement the same trait,
/// so composition nests to arbitrary depth.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, ctx: &mut RequestContext) -> Result<HttpResponse, HandlerError>;
}
