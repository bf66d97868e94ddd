//! Runner module
//!
//! Orchestrates the pipeline: built exactly once per process lifetime
//! (kernels, discovery, route table, middleware chain), then dispatches
//! every incoming request through the composed chain. A `Runner` that
//! exists is ready; construction failure means the process never serves.

use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::Request;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::config::Config;
use crate::discovery;
use crate::handler::app::ApplicationHandler;
use crate::handler::file_serve::FileServeHandler;
use crate::handler::fixed::FixedResponseHandler;
use crate::handler::{Handler, HttpResponse, RequestContext};
use crate::http;
use crate::kernel::{KernelFactory, KernelInitError, KernelRegistry};
use crate::logger;
use crate::middleware::{LoggingWrapper, ParsingWrapper, SessionWrapper};
use crate::routing::{RouteBinding, RouteTable};
use crate::session::SessionStore;

/// Fatal startup failure. Any of these aborts the process before it
/// serves a single request.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Kernel(#[from] KernelInitError),
}

pub struct Runner {
    pipeline: Arc<dyn Handler>,
    registry: Arc<KernelRegistry>,
    max_body_size: u64,
}

impl Runner {
    /// Build the pipeline once: construct every configured kernel (a
    /// failure here is fatal), run asset discovery, freeze the route
    /// table, and wrap it in the outermost logging wrapper.
    pub fn build(config: &Config, factory: &KernelFactory) -> Result<Self, StartupError> {
        let session_store = Arc::new(SessionStore::new());
        let mut registry = KernelRegistry::new();
        let mut bindings = Vec::new();

        // Fixed short-circuit: favicon answers an empty 404 instead of
        // falling through to an asset root.
        bindings.push(RouteBinding::new(
            "/favicon.ico",
            Arc::new(FixedResponseHandler::not_found()) as Arc<dyn Handler>,
        ));

        for kernel_config in &config.kernels {
            let kernel = factory(kernel_config)?;
            logger::log_kernel_registered(kernel.name(), &kernel_config.path);
            registry.register(Arc::clone(&kernel));

            // Innermost out: application -> parsing -> session.
            let app = Arc::new(ApplicationHandler::new(kernel));
            let parsing = Arc::new(ParsingWrapper::new(app));
            let session = Arc::new(SessionWrapper::new(parsing, Arc::clone(&session_store)));
            bindings.push(RouteBinding::new(kernel_config.path.clone(), session));
        }

        if let Some(web_root) = &config.assets.web_root {
            for root in discovery::discover(Path::new(web_root), &registry) {
                bindings.push(RouteBinding::new(
                    root.url_prefix.clone(),
                    Arc::new(FileServeHandler::new(
                        root.url_prefix,
                        root.fs_path,
                        root.max_file_bytes,
                    )) as Arc<dyn Handler>,
                ));
            }
        }

        let table = RouteTable::build(bindings);
        logger::log_route_count(table.len());
        let pipeline = Arc::new(LoggingWrapper::new(
            Arc::new(table),
            &config.logging.access_log_format,
        ));

        Ok(Self {
            pipeline,
            registry: Arc::new(registry),
            max_body_size: config.http.max_body_size,
        })
    }

    pub fn kernel_count(&self) -> usize {
        self.registry.len()
    }

    /// Dispatch one request context through the pipeline.
    ///
    /// This is the outermost fault boundary: a fault that escaped the
    /// wrappers becomes a plain 500 here, never a raw error to the
    /// transport.
    pub async fn dispatch(&self, mut ctx: RequestContext) -> HttpResponse {
        match self.pipeline.handle(&mut ctx).await {
            Ok(response) => response,
            Err(_fault) => {
                // Already recorded by the logging wrapper
                http::build_500_response()
            }
        }
    }

    /// Transport adapter: decompose a hyper request into a context and
    /// dispatch it. Infallible by contract; every outcome is a response.
    pub async fn serve(
        &self,
        req: Request<Incoming>,
        peer_addr: Option<SocketAddr>,
    ) -> Result<HttpResponse, Infallible> {
        if let Some(resp) = self.check_body_size(&req) {
            return Ok(resp);
        }

        let (parts, body) = req.into_parts();
        let body = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                logger::log_warning(&format!("Failed to read request body: {e}"));
                return Ok(http::build_400_response());
            }
        };

        let ctx = RequestContext::new(
            parts.method,
            parts.uri.path().to_string(),
            parts.uri.query().map(String::from),
            parts.version,
            parts.headers,
            peer_addr,
            body,
        );

        Ok(self.dispatch(ctx).await)
    }

    /// Validate Content-Length before collecting the body.
    fn check_body_size(&self, req: &Request<Incoming>) -> Option<HttpResponse> {
        let size_str = req
            .headers()
            .get("content-length")
            .and_then(|v| v.to_str().ok())?;
        match size_str.parse::<u64>() {
            Ok(size) if size > self.max_body_size => {
                logger::log_warning(&format!(
                    "Request body too large: {size} bytes (max: {})",
                    self.max_body_size
                ));
                Some(http::build_413_response())
            }
            _ => None,
        }
    }
}
