//! Minimal: generated REST CRUD resources on axum and PostgreSQL, with
//! auto-migration, response envelopes, logging, TLS and templates.

pub mod config;
pub mod error;
pub mod extractors;
mod handlers;
pub mod logging;
pub mod middleware;
pub mod migration;
pub mod model;
pub mod patch;
pub mod provider;
pub mod resource;
pub mod response;
mod routes;
pub mod server;
pub mod service;
pub mod sql;
pub mod store;
pub mod templates;
pub mod tls;

pub use config::Config;
pub use error::{Error, ResourceError};
pub use extractors::RequestContext;
pub use migration::auto_migrate;
pub use model::{Column, Model, ModelSchema};
pub use provider::Provider;
pub use resource::Resource;
pub use response::{fail, fail_code, ok, ok_code, BaseResponse, ModelResponse};
pub use server::{App, Server};
pub use service::CrudService;
pub use store::init_database;
pub use templates::Templates;
