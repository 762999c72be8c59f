//! Route providers: anything that adds routes to the application router.

use crate::error::Error;
use async_trait::async_trait;
use axum::Router;
use sqlx::PgPool;

/// Registered by the server in order. `db` is `None` when no DSN is configured.
#[async_trait]
pub trait Provider: Send + Sync {
    async fn register(&self, router: Router, db: Option<&PgPool>) -> Result<Router, Error>;
}

/// Plain route functions, e.g. `|r: Router| r.route("/", get(index))`.
#[async_trait]
impl<F> Provider for F
where
    F: Fn(Router) -> Router + Send + Sync,
{
    async fn register(&self, router: Router, _db: Option<&PgPool>) -> Result<Router, Error> {
        Ok(self(router))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;

    #[tokio::test]
    async fn closures_register_routes_without_database() {
        let provider = |r: Router| r.route("/ping", get(|| async { "pong" }));
        let router = provider.register(Router::new(), None).await;
        assert!(router.is_ok());
    }
}
