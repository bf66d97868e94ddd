//! Request parsing wrapper
//!
//! Normalizes the raw transport request before the application sees it:
//! decodes query-string and form parameters into `ctx.params` and the
//! `Cookie` header into `ctx.cookies`. Malformed input answers 400 without
//! invoking the inner handler; parsing never raises a fault.

use async_trait::async_trait;
use std::sync::Arc;

use crate::handler::{Handler, HandlerError, HttpResponse, RequestContext};
use crate::http;
use crate::logger;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

pub struct ParsingWrapper {
    inner: Arc<dyn Handler>,
}

impl ParsingWrapper {
    pub fn new(inner: Arc<dyn Handler>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl Handler for ParsingWrapper {
    async fn handle(&self, ctx: &mut RequestContext) -> Result<HttpResponse, HandlerError> {
        if let Err(reason) = normalize(ctx) {
            logger::log_warning(&format!("Rejecting malformed request: {reason}"));
            return Ok(http::build_400_response());
        }
        self.inner.handle(ctx).await
    }
}

/// Fill `params` and `cookies` in place; `Err` describes the first
/// malformed piece encountered.
fn normalize(ctx: &mut RequestContext) -> Result<(), String> {
    if let Some(query) = ctx.query.clone() {
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            ctx.params.insert(key.into_owned(), value.into_owned());
        }
    }

    parse_cookies(ctx)?;
    parse_form_body(ctx)?;
    Ok(())
}

fn parse_cookies(ctx: &mut RequestContext) -> Result<(), String> {
    if !ctx.headers.contains_key("cookie") {
        return Ok(());
    }
    let Some(header) = ctx.header("cookie") else {
        return Err("Cookie header is not valid UTF-8".to_string());
    };

    let mut cookies = Vec::new();
    for pair in header.split(';') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        let Some((name, value)) = pair.split_once('=') else {
            return Err(format!("cookie pair without '=': '{pair}'"));
        };
        cookies.push((name.trim().to_string(), value.trim().to_string()));
    }

    for (name, value) in cookies {
        ctx.cookies.insert(name, value);
    }
    Ok(())
}

/// Form submissions are decoded into `params`; body values override query
/// values of the same name.
fn parse_form_body(ctx: &mut RequestContext) -> Result<(), String> {
    let is_form = ctx
        .header("content-type")
        .is_some_and(|ct| ct.split(';').next().is_some_and(|t| t.trim() == FORM_CONTENT_TYPE));
    if !is_form || ctx.body.is_empty() {
        return Ok(());
    }

    let body = std::str::from_utf8(&ctx.body)
        .map_err(|_| "form body is not valid UTF-8".to_string())?;

    let parsed: Vec<(String, String)> = url::form_urlencoded::parse(body.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    for (key, value) in parsed {
        ctx.params.insert(key, value);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::Full;
    use hyper::body::Bytes;
    use hyper::header::{HeaderValue, CONTENT_TYPE, COOKIE};
    use hyper::{HeaderMap, Method, Response, Version};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Inner handler counting invocations and echoing a parsed param.
    struct ProbeHandler {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Handler for ProbeHandler {
        async fn handle(&self, ctx: &mut RequestContext) -> Result<HttpResponse, HandlerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let tag = ctx.params.get("tag").cloned().unwrap_or_default();
            Ok(Response::builder()
                .status(200)
                .header("X-Tag", tag)
                .body(Full::new(Bytes::new()))
                .unwrap())
        }
    }

    fn wrapper() -> (ParsingWrapper, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            ParsingWrapper::new(Arc::new(ProbeHandler {
                calls: calls.clone(),
            })),
            calls,
        )
    }

    fn ctx_with(
        query: Option<&str>,
        headers: HeaderMap,
        body: &'static [u8],
    ) -> RequestContext {
        RequestContext::new(
            Method::POST,
            "/app".to_string(),
            query.map(String::from),
            Version::HTTP_11,
            headers,
            None,
            Bytes::from_static(body),
        )
    }

    #[tokio::test]
    async fn test_query_params_are_decoded() {
        let (w, _) = wrapper();
        let mut ctx = ctx_with(Some("tag=hello%20world&n=1"), HeaderMap::new(), b"");
        let resp = w.handle(&mut ctx).await.unwrap();
        assert_eq!(
            resp.headers().get("X-Tag").unwrap().to_str().unwrap(),
            "hello world"
        );
    }

    #[tokio::test]
    async fn test_form_body_overrides_query() {
        let (w, _) = wrapper();
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded; charset=utf-8"),
        );
        let mut ctx = ctx_with(Some("tag=from-query"), headers, b"tag=from-body");
        let resp = w.handle(&mut ctx).await.unwrap();
        assert_eq!(
            resp.headers().get("X-Tag").unwrap().to_str().unwrap(),
            "from-body"
        );
    }

    #[tokio::test]
    async fn test_cookies_are_parsed() {
        let (w, _) = wrapper();
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("sid=abc123; theme=dark"));
        let mut ctx = ctx_with(None, headers, b"");
        w.handle(&mut ctx).await.unwrap();
        assert_eq!(ctx.cookies.get("sid").map(String::as_str), Some("abc123"));
        assert_eq!(ctx.cookies.get("theme").map(String::as_str), Some("dark"));
    }

    #[tokio::test]
    async fn test_malformed_cookie_is_400_without_inner_call() {
        let (w, calls) = wrapper();
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("not-a-pair"));
        let mut ctx = ctx_with(None, headers, b"");
        let resp = w.handle(&mut ctx).await.unwrap();
        assert_eq!(resp.status(), 400);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_non_utf8_form_body_is_400_without_inner_call() {
        let (w, calls) = wrapper();
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        let mut ctx = ctx_with(None, headers, &[0xff, 0xfe, 0xfd]);
        let resp = w.handle(&mut ctx).await.unwrap();
        assert_eq!(resp.status(), 400);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_non_form_body_is_left_alone() {
        let (w, calls) = wrapper();
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let mut ctx = ctx_with(None, headers, &[0xff, 0xfe]);
        let resp = w.handle(&mut ctx).await.unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
