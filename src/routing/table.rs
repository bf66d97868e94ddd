//! Route table module
//!
//! Immutable longest-prefix-match table mapping URL prefixes to handlers.
//! Built exactly once at startup from discovery results and kernel
//! bindings; shared read-only across all in-flight requests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::handler::{Handler, HandlerError, HttpResponse, RequestContext};
use crate::http;

/// Association of a URL path prefix with a handler.
pub struct RouteBinding {
    pub prefix: String,
    pub handler: Arc<dyn Handler>,
}

impl RouteBinding {
    pub fn new(prefix: impl Into<String>, handler: Arc<dyn Handler>) -> Self {
        Self {
            prefix: prefix.into(),
            handler,
        }
    }
}

/// Immutable prefix routing table.
///
/// Prefixes are plain strings with no wildcard syntax. At build time a
/// later binding for an identical prefix overwrites the earlier one; at
/// lookup time the longest stored prefix of the request path wins, so
/// distinct prefixes never shadow each other's subtrees.
pub struct RouteTable {
    routes: HashMap<String, Arc<dyn Handler>>,
}

impl RouteTable {
    /// Freeze a binding sequence into a table. Last writer wins per
    /// exact prefix string.
    pub fn build(bindings: Vec<RouteBinding>) -> Self {
        let mut routes: HashMap<String, Arc<dyn Handler>> = HashMap::new();
        for binding in bindings {
            routes.insert(binding.prefix, binding.handler);
        }
        Self { routes }
    }

    /// Longest-matching-prefix lookup. `None` when no stored prefix is a
    /// prefix of `path`; the caller treats that as a 404.
    pub fn lookup(&self, path: &str) -> Option<&Arc<dyn Handler>> {
        self.routes
            .iter()
            .filter(|(prefix, _)| path.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, handler)| handler)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// The table is itself a handler: a lookup miss is the pipeline's 404
/// fallback, so no separate default handler exists.
#[async_trait]
impl Handler for RouteTable {
    async fn handle(&self, ctx: &mut RequestContext) -> Result<HttpResponse, HandlerError> {
        match self.lookup(&ctx.path) {
            Some(handler) => {
                let handler = Arc::clone(handler);
                handler.handle(ctx).await
            }
            None => Ok(http::build_404_response()),
        }
    }
}
