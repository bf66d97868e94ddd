//! Middleware module
//!
//! Wrapper handlers adding cross-cutting behavior around one inner
//! handler: access logging, request parsing/normalization, and session
//! attachment. Each wrapper implements the same handler capability as the
//! handlers it wraps, so the chain composes by plain nesting.

mod logging;
mod parsing;
mod session;

pub use logging::{AccessSink, LoggingWrapper};
pub use parsing::ParsingWrapper;
pub use session::{SessionWrapper, SESSION_COOKIE};
