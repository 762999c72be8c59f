//! HTTP handlers for generated resources.

pub(crate) mod resource;
