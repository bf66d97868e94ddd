//! Session wrapper
//!
//! Attaches a session to the request context before the application runs
//! and commits mutations back to the store afterwards. The commit is
//! unconditional: error responses and even handler faults must not lose
//! session writes that already happened.
//!
//! The per-token lock is held for the whole inner invocation, so two
//! requests for the same token never interleave their read-modify-write;
//! requests for different tokens proceed independently.

use async_trait::async_trait;
use hyper::header::{HeaderValue, SET_COOKIE};
use std::sync::Arc;

use crate::handler::{Handler, HandlerError, HttpResponse, RequestContext};
use crate::logger;
use crate::session::{SessionHandle, SessionStore};

/// Correlation cookie carrying the session token.
pub const SESSION_COOKIE: &str = "sid";

pub struct SessionWrapper {
    inner: Arc<dyn Handler>,
    store: Arc<SessionStore>,
}

impl SessionWrapper {
    pub fn new(inner: Arc<dyn Handler>, store: Arc<SessionStore>) -> Self {
        Self { inner, store }
    }
}

#[async_trait]
impl Handler for SessionWrapper {
    async fn handle(&self, ctx: &mut RequestContext) -> Result<HttpResponse, HandlerError> {
        // This wrapper sits outside the parser, so the token comes off the
        // raw Cookie header; parsed cookies are only there when some outer
        // stage already filled them.
        let presented = ctx
            .cookies
            .get(SESSION_COOKIE)
            .cloned()
            .or_else(|| token_from_header(ctx.header("cookie")));
        let (token, is_new) = match presented {
            Some(token) => (token, false),
            None => (SessionStore::generate_token(), true),
        };

        let entry = self.store.entry(&token).await;
        // Held across the inner call: serializes same-token requests.
        let mut guard = Arc::clone(&entry).lock_owned().await;

        ctx.session = Some(SessionHandle {
            token: token.clone(),
            is_new,
            data: guard.clone(),
        });

        let result = self.inner.handle(ctx).await;

        // Commit regardless of response status or fault.
        if let Some(handle) = ctx.session.take() {
            *guard = handle.data;
        }
        drop(guard);

        match result {
            Ok(mut response) => {
                if is_new {
                    set_session_cookie(&mut response, &token);
                }
                Ok(response)
            }
            Err(fault) => Err(fault),
        }
    }
}

/// Lenient scan of the raw Cookie header for the session token.
fn token_from_header(header: Option<&str>) -> Option<String> {
    header?.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name.trim() == SESSION_COOKIE).then(|| value.trim().to_string())
    })
}

fn set_session_cookie(response: &mut HttpResponse, token: &str) {
    let value = format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly");
    match HeaderValue::from_str(&value) {
        Ok(header) => {
            response.headers_mut().append(SET_COOKIE, header);
        }
        Err(e) => logger::log_error(&format!("Invalid session cookie value: {e}")),
    }
}
