//! Route tables.

mod resource;
pub(crate) use resource::resource_routes;
