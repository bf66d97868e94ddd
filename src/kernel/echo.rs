//! Built-in echo kernel
//!
//! A minimal kernel so the server runs standalone: echoes the request line
//! back as plain text and counts hits in the session. Real deployments
//! replace it through the kernel factory.

use async_trait::async_trait;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::Response;
use std::collections::HashMap;

use super::Kernel;
use crate::config::KernelConfig;
use crate::handler::{HandlerError, HttpResponse, RequestContext};
use crate::logger;

pub struct EchoKernel {
    name: String,
    params: HashMap<String, String>,
}

impl EchoKernel {
    pub fn from_config(config: &KernelConfig) -> Self {
        Self {
            name: config.name.clone(),
            params: config.params.clone(),
        }
    }
}

#[async_trait]
impl Kernel for EchoKernel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, ctx: &mut RequestContext) -> Result<HttpResponse, HandlerError> {
        let hits = match ctx.session.as_mut() {
            Some(session) => {
                let hits = session
                    .data
                    .get("hits")
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(0)
                    + 1;
                session.data.set("hits", &hits.to_string());
                hits
            }
            None => 1,
        };

        let body = format!(
            "{} {} handled by '{}' (visit {})\n",
            ctx.method, ctx.path, self.name, hits
        );

        Response::builder()
            .status(200)
            .header("Content-Type", "text/plain; charset=utf-8")
            .header("Content-Length", body.len())
            .body(Full::new(Bytes::from(body)))
            .map_err(|e| {
                logger::log_error(&format!("Echo kernel response build failed: {e}"));
                HandlerError::Kernel(e.to_string())
            })
    }

    fn parameter(&self, name: &str) -> Option<String> {
        self.params.get(name).cloned()
    }
}
