//! Request extractors.

mod context;
pub use context::RequestContext;
