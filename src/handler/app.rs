//! Application handler
//!
//! Delegates the fully-prepared request context to an application kernel.
//! The kernel is opaque: whatever framework sits behind it, this handler
//! only relies on the kernel capability contract.

use async_trait::async_trait;
use std::sync::Arc;

use super::{Handler, HandlerError, HttpResponse, RequestContext};
use crate::kernel::Kernel;

pub struct ApplicationHandler {
    kernel: Arc<dyn Kernel>,
}

impl ApplicationHandler {
    pub fn new(kernel: Arc<dyn Kernel>) -> Self {
        Self { kernel }
    }
}

#[async_trait]
impl Handler for ApplicationHandler {
    async fn handle(&self, ctx: &mut RequestContext) -> Result<HttpResponse, HandlerError> {
        self.kernel.handle(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::Full;
    use hyper::body::Bytes;
    use hyper::Response;

    struct FaultyKernel;

    #[async_trait]
    impl Kernel for FaultyKernel {
        fn name(&self) -> &str {
            "faulty"
        }

        async fn handle(
            &self,
            _ctx: &mut RequestContext,
        ) -> Result<HttpResponse, HandlerError> {
            Err(HandlerError::Kernel("backend unavailable".to_string()))
        }

        fn parameter(&self, _name: &str) -> Option<String> {
            None
        }
    }

    struct OkKernel;

    #[async_trait]
    impl Kernel for OkKernel {
        fn name(&self) -> &str {
            "ok"
        }

        async fn handle(
            &self,
            _ctx: &mut RequestContext,
        ) -> Result<HttpResponse, HandlerError> {
            Ok(Response::new(Full::new(Bytes::from("hello"))))
        }

        fn parameter(&self, _name: &str) -> Option<String> {
            None
        }
    }

    #[tokio::test]
    async fn test_delegates_to_kernel() {
        let handler = ApplicationHandler::new(Arc::new(OkKernel));
        let mut ctx = RequestContext::for_path("/");
        assert_eq!(handler.handle(&mut ctx).await.unwrap().status(), 200);
    }

    #[tokio::test]
    async fn test_kernel_fault_propagates() {
        let handler = ApplicationHandler::new(Arc::new(FaultyKernel));
        let mut ctx = RequestContext::for_path("/");
        assert!(matches!(
            handler.handle(&mut ctx).await,
            Err(HandlerError::Kernel(_))
        ));
    }
}
