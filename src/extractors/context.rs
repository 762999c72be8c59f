//! Request context handed to resource hooks.

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, Extensions, HeaderMap, Method, Uri},
};
use std::convert::Infallible;

/// Owned snapshot of the request head: method, uri, headers and extensions.
/// Middleware can put authentication results into extensions for hooks to read.
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub extensions: Extensions,
}

impl RequestContext {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn extension<E: Send + Sync + 'static>(&self) -> Option<&E> {
        self.extensions.get::<E>()
    }
}

impl From<&Parts> for RequestContext {
    fn from(parts: &Parts) -> Self {
        Self {
            method: parts.method.clone(),
            uri: parts.uri.clone(),
            headers: parts.headers.clone(),
            extensions: parts.extensions.clone(),
        }
    }
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(RequestContext::from(&*parts))
    }
}
