//! Fixed response handler
//!
//! Serves one constant canned response regardless of the request. Used for
//! the `/favicon.ico` short-circuit, which answers an empty 404 instead of
//! falling through to an asset root.

use async_trait::async_trait;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::Response;

use super::{Handler, HandlerError, HttpResponse, RequestContext};
use crate::logger;

pub struct FixedResponseHandler {
    status: u16,
    body: Bytes,
}

impl FixedResponseHandler {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Empty-body 404, the canned favicon answer.
    pub fn not_found() -> Self {
        Self::new(404, Bytes::new())
    }
}

#[async_trait]
impl Handler for FixedResponseHandler {
    async fn handle(&self, _ctx: &mut RequestContext) -> Result<HttpResponse, HandlerError> {
        Ok(Response::builder()
            .status(self.status)
            .header("Content-Length", self.body.len())
            .body(Full::new(self.body.clone()))
            .unwrap_or_else(|e| {
                logger::log_error(&format!("Failed to build fixed response: {e}"));
                Response::new(Full::new(Bytes::new()))
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_not_found_is_404_with_empty_body() {
        let handler = FixedResponseHandler::not_found();
        let mut ctx = RequestContext::for_path("/favicon.ico");
        let resp = handler.handle(&mut ctx).await.unwrap();
        assert_eq!(resp.status(), 404);
        assert_eq!(
            resp.headers().get("Content-Length").unwrap().to_str().unwrap(),
            "0"
        );
    }

    #[tokio::test]
    async fn test_same_response_every_time() {
        let handler = FixedResponseHandler::new(200, "pong");
        for _ in 0..3 {
            let mut ctx = RequestContext::for_path("/ping");
            let resp = handler.handle(&mut ctx).await.unwrap();
            assert_eq!(resp.status(), 200);
        }
    }
}
