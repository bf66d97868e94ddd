//! File serving handler
//!
//! Serves whole files from one asset root bound to a URL prefix. Simple by
//! contract: no directory index, no caching layer, no range requests.
//! Files above the configured ceiling answer a deterministic 413 rather
//! than ever streaming truncated content.

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;

use super::{Handler, HandlerError, HttpResponse, RequestContext};
use crate::http::{self, mime};
use crate::logger;

pub struct FileServeHandler {
    /// URL prefix this root is bound under, stripped from request paths.
    prefix: String,
    root: PathBuf,
    max_bytes: u64,
}

impl FileServeHandler {
    pub fn new(prefix: impl Into<String>, root: impl Into<PathBuf>, max_bytes: u64) -> Self {
        Self {
            prefix: prefix.into(),
            root: root.into(),
            max_bytes,
        }
    }

    /// Resolve the request path to a file inside the root.
    ///
    /// `None` means "not servable": missing file, a directory, or a path
    /// that escapes the root after normalization. All of those are 404 to
    /// the client; filesystem detail stays in the logs.
    fn resolve(&self, path: &str) -> Option<PathBuf> {
        let relative = path
            .strip_prefix(&self.prefix)
            .unwrap_or(path)
            .trim_start_matches('/');

        let root = match self.root.canonicalize() {
            Ok(p) => p,
            Err(e) => {
                logger::log_warning(&format!(
                    "Asset root not found or inaccessible '{}': {e}",
                    self.root.display()
                ));
                return None;
            }
        };

        // Canonicalization resolves `..` and symlinks; anything landing
        // outside the root is a traversal attempt.
        let candidate = root.join(relative);
        let resolved = candidate.canonicalize().ok()?;
        if !resolved.starts_with(&root) {
            logger::log_warning(&format!(
                "Path traversal attempt blocked: {path} -> {}",
                resolved.display()
            ));
            return None;
        }

        Some(resolved)
    }
}

#[async_trait]
impl Handler for FileServeHandler {
    async fn handle(&self, ctx: &mut RequestContext) -> Result<HttpResponse, HandlerError> {
        let Some(file_path) = self.resolve(&ctx.path) else {
            return Ok(http::build_404_response());
        };

        let Ok(meta) = fs::metadata(&file_path).await else {
            return Ok(http::build_404_response());
        };
        if meta.is_dir() {
            // No directory listing policy
            return Ok(http::build_404_response());
        }
        if meta.len() > self.max_bytes {
            logger::log_warning(&format!(
                "Refusing to serve oversize file '{}' ({} > {} bytes)",
                file_path.display(),
                meta.len(),
                self.max_bytes
            ));
            return Ok(http::build_413_response());
        }

        let content = match fs::read(&file_path).await {
            Ok(c) => c,
            Err(e) => {
                logger::log_error(&format!(
                    "Failed to read file '{}': {e}",
                    file_path.display()
                ));
                return Ok(http::build_404_response());
            }
        };

        let content_type =
            mime::get_content_type(file_path.extension().and_then(|e| e.to_str()));
        Ok(http::build_file_response(content, content_type, ctx.is_head()))
    }
}
