//! Application kernel module
//!
//! A kernel is an external application framework instance, opaque to the
//! dispatch core beyond two capabilities: handling a normalized request
//! context and answering optional named-parameter lookups (used by static
//! asset discovery to find a compatibility-layer root).

pub mod echo;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::config::KernelConfig;
use crate::handler::{HandlerError, HttpResponse, RequestContext};

/// Kernel capability contract consumed from the application framework.
#[async_trait]
pub trait Kernel: Send + Sync {
    /// Kernel name, used for registry logging.
    fn name(&self) -> &str;

    /// Handle a normalized, session-bearing request context.
    async fn handle(&self, ctx: &mut RequestContext) -> Result<HttpResponse, HandlerError>;

    /// Optional named-parameter lookup.
    ///
    /// Discovery queries `midgard.midcomcompat.root` here to merge
    /// compatibility-layer static roots.
    fn parameter(&self, name: &str) -> Option<String>;
}

/// Failure to construct a kernel at startup. Always fatal.
#[derive(Debug, Error)]
#[error("kernel '{name}' failed to initialize: {reason}")]
pub struct KernelInitError {
    pub name: String,
    pub reason: String,
}

/// Constructor turning a kernel descriptor into a live kernel.
///
/// The default factory builds the built-in echo kernel; embedding an
/// external framework means supplying a different factory to the runner.
pub type KernelFactory =
    dyn Fn(&KernelConfig) -> Result<Arc<dyn Kernel>, KernelInitError> + Send + Sync;

/// Process-wide list of initialized kernels.
///
/// Populated once during startup, read-only afterward; consulted only by
/// discovery and the route assembly.
#[derive(Default)]
pub struct KernelRegistry {
    kernels: Vec<Arc<dyn Kernel>>,
}

impl KernelRegistry {
    pub fn new() -> Self {
        Self {
            kernels: Vec::new(),
        }
    }

    pub fn register(&mut self, kernel: Arc<dyn Kernel>) {
        self.kernels.push(kernel);
    }

    /// Kernels in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Kernel>> {
        self.kernels.iter()
    }

    pub fn len(&self) -> usize {
        self.kernels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kernels.is_empty()
    }
}

/// Default factory: builds the built-in echo kernel.
pub fn default_factory(config: &KernelConfig) -> Result<Arc<dyn Kernel>, KernelInitError> {
    Ok(Arc::new(echo::EchoKernel::from_config(config)))
}
