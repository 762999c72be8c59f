//! Resource CRUD handlers: list all, get, write, create, delete.

use crate::error::ResourceError;
use crate::extractors::RequestContext;
use crate::model::Model;
use crate::resource::Mounted;
use crate::response::ok;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

/// Ids are non-negative integers.
fn parse_id(id_str: &str) -> Result<i64, ResourceError> {
    id_str
        .parse::<i64>()
        .ok()
        .filter(|id| *id >= 0)
        .ok_or(ResourceError::InvalidId)
}

/// Errors a by-id operation reports as such; everything else is a database problem.
fn by_id_error(e: ResourceError) -> ResourceError {
    match e {
        ResourceError::NoResourceFound | ResourceError::NoResourceAccess | ResourceError::InvalidData => e,
        _ => ResourceError::Database,
    }
}

pub(crate) async fn get_all<T: Model>(
    State(m): State<Arc<Mounted<T>>>,
    ctx: RequestContext,
) -> Result<Response, ResourceError> {
    m.resource.check_list_all(&ctx)?;
    let rows = m
        .resource
        .list_all(ctx, m.pool.clone())
        .await
        .map_err(|e| match e {
            ResourceError::NoResourceFound => e,
            _ => ResourceError::Database,
        })?;
    Ok(ok(rows).into_response())
}

pub(crate) async fn get_by_id<T: Model>(
    State(m): State<Arc<Mounted<T>>>,
    ctx: RequestContext,
    Path(id_str): Path<String>,
) -> Result<Response, ResourceError> {
    let id = parse_id(&id_str)?;
    let entity = m
        .resource
        .list_by_id(ctx, m.pool.clone(), id)
        .await
        .map_err(by_id_error)?;
    Ok(ok(entity).into_response())
}

pub(crate) async fn write_by_id<T: Model>(
    State(m): State<Arc<Mounted<T>>>,
    ctx: RequestContext,
    Path(id_str): Path<String>,
    body: Bytes,
) -> Result<StatusCode, ResourceError> {
    let Some(bind) = m.resource.write_binder() else {
        tracing::error!(resource = %m.resource.name(), "cannot write without a bind type, call write_bind_type");
        return Err(ResourceError::NoBindType);
    };
    let dto = bind(&body[..])?;
    let id = parse_id(&id_str)?;
    m.resource
        .write_by_id(ctx, m.pool.clone(), id, dto)
        .await
        .map_err(by_id_error)?;
    Ok(StatusCode::OK)
}

pub(crate) async fn create<T: Model>(
    State(m): State<Arc<Mounted<T>>>,
    ctx: RequestContext,
    body: Bytes,
) -> Result<StatusCode, ResourceError> {
    m.resource.check_create(&ctx)?;
    let Some(bind) = m.resource.create_binder() else {
        tracing::error!(resource = %m.resource.name(), "cannot create without a bind type, call create_bind_type");
        return Err(ResourceError::NoBindType);
    };
    let dto = bind(&body[..])?;
    m.resource.create(m.pool.clone(), dto).await?;
    Ok(StatusCode::OK)
}

pub(crate) async fn delete_by_id<T: Model>(
    State(m): State<Arc<Mounted<T>>>,
    ctx: RequestContext,
    Path(id_str): Path<String>,
) -> Result<StatusCode, ResourceError> {
    let id = parse_id(&id_str)?;
    m.resource
        .delete_by_id(ctx, m.pool.clone(), id)
        .await
        .map_err(by_id_error)?;
    Ok(StatusCode::OK)
}
