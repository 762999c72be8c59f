//! CRUD routes for one mounted resource.

use crate::handlers::resource::{create, delete_by_id, get_all, get_by_id, write_by_id};
use crate::model::Model;
use crate::resource::Mounted;
use axum::{routing::get, Router};
use std::sync::Arc;

pub(crate) fn resource_routes<T: Model>(prefix: &str, mounted: Arc<Mounted<T>>) -> Router {
    let base = prefix.trim_end_matches('/');
    let collection = if base.is_empty() { "/".to_string() } else { base.to_string() };
    Router::new()
        .route(&collection, get(get_all::<T>).post(create::<T>))
        .route(
            &format!("{}/{{id}}", base),
            get(get_by_id::<T>).put(write_by_id::<T>).delete(delete_by_id::<T>),
        )
        .with_state(mounted)
}
