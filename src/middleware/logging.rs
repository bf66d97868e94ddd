//! Access logging wrapper
//!
//! Records one access log entry per pipeline invocation: method, path,
//! status, body size, and handler time. The response passes through
//! untouched; a fault from the inner chain is recorded as a 500 before
//! being re-propagated.

use async_trait::async_trait;
use hyper::Version;
use std::sync::Arc;
use std::time::Instant;

use crate::handler::{Handler, HandlerError, HttpResponse, RequestContext};
use crate::logger::{self, AccessLogEntry};

/// Destination for access log entries.
///
/// The default sink writes to the process access log; tests inject their
/// own to observe what gets recorded.
pub trait AccessSink: Send + Sync {
    fn record(&self, entry: &AccessLogEntry);
}

/// Default sink: the global access log in the configured format.
struct GlobalLogSink {
    format: String,
}

impl AccessSink for GlobalLogSink {
    fn record(&self, entry: &AccessLogEntry) {
        logger::log_access(entry, &self.format);
    }
}

pub struct LoggingWrapper {
    inner: Arc<dyn Handler>,
    sink: Arc<dyn AccessSink>,
}

impl LoggingWrapper {
    /// Wrap `inner`, logging in the named access log format.
    pub fn new(inner: Arc<dyn Handler>, format: &str) -> Self {
        Self::with_sink(
            inner,
            Arc::new(GlobalLogSink {
                format: format.to_string(),
            }),
        )
    }

    pub fn with_sink(inner: Arc<dyn Handler>, sink: Arc<dyn AccessSink>) -> Self {
        Self { inner, sink }
    }
}

#[async_trait]
impl Handler for LoggingWrapper {
    async fn handle(&self, ctx: &mut RequestContext) -> Result<HttpResponse, HandlerError> {
        // Capture the request line up front; inner handlers mutate the
        // context but never what we log.
        let mut entry = AccessLogEntry::new(
            ctx.peer_addr
                .map_or_else(|| "-".to_string(), |a| a.ip().to_string()),
            ctx.method.to_string(),
            ctx.path.clone(),
        );
        entry.query = ctx.query.clone();
        entry.http_version = version_label(ctx.version).to_string();

        let start = Instant::now();
        let result = self.inner.handle(ctx).await;
        entry.request_time_us =
            u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX);

        match &result {
            Ok(response) => {
                entry.status = response.status().as_u16();
                entry.body_bytes = response
                    .headers()
                    .get("Content-Length")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(0);
            }
            Err(fault) => {
                // The fault becomes a 500 at the boundary; log it as such
                entry.status = 500;
                logger::log_handler_fault(&format!(
                    "{} {}: {fault}",
                    entry.method, entry.path
                ));
            }
        }

        self.sink.record(&entry);
        result
    }
}

fn version_label(version: Version) -> &'static str {
    match version {
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2",
        _ => "1.1",
    }
}
