//! Routing module
//!
//! Longest-prefix-match routing over plain string prefixes, frozen at
//! startup. No wildcard syntax and no runtime re-registration.

mod table;

pub use table::{RouteBinding, RouteTable};
