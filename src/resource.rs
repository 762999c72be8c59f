//! Generic REST resource: five CRUD routes for a [`Model`], configured through hooks.
//!
//! ```ignore
//! let notes = Resource::<Note>::new("notes")
//!     .create_bind_type::<NewNote>()
//!     .write_bind_type::<NoteChanges>()
//!     .can_delete_by_id(|ctx, note| ctx.header("x-user") == Some(note.owner.as_str()));
//! ```
//!
//! Mounted routes, relative to the resource name:
//!
//! | method | path    | operation    |
//! |--------|---------|--------------|
//! | GET    | `/`     | list all     |
//! | GET    | `/{id}` | get by id    |
//! | PUT    | `/{id}` | write by id  |
//! | POST   | `/`     | create       |
//! | DELETE | `/{id}` | delete by id |

use crate::error::{Error, ResourceError};
use crate::extractors::RequestContext;
use crate::migration::auto_migrate;
use crate::model::{Model, ModelSchema};
use crate::patch::patch_struct;
use crate::provider::Provider;
use crate::routes::resource_routes;
use crate::service::CrudService;
use async_trait::async_trait;
use axum::{
    extract::Request,
    response::IntoResponse,
    routing::Route,
    Router,
};
use futures::future::{BoxFuture, FutureExt};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use sqlx::PgPool;
use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use tower::{Layer, Service};

pub type Predicate = Arc<dyn Fn(&RequestContext) -> bool + Send + Sync>;
pub type EntityPredicate<T> = Arc<dyn Fn(&RequestContext, &T) -> bool + Send + Sync>;
pub type ListAllQuery<T> =
    Arc<dyn Fn(RequestContext, PgPool) -> BoxFuture<'static, Result<Vec<T>, ResourceError>> + Send + Sync>;
pub type ListByIdQuery<T> =
    Arc<dyn Fn(RequestContext, PgPool, i64) -> BoxFuture<'static, Result<T, ResourceError>> + Send + Sync>;
/// Receives the bound request DTO in its serde representation.
pub type WriteByIdQuery =
    Arc<dyn Fn(RequestContext, PgPool, i64, Value) -> BoxFuture<'static, Result<(), ResourceError>> + Send + Sync>;
pub type DeleteByIdQuery =
    Arc<dyn Fn(RequestContext, PgPool, i64) -> BoxFuture<'static, Result<(), ResourceError>> + Send + Sync>;

pub(crate) type Binder = Arc<dyn Fn(&[u8]) -> Result<Value, ResourceError> + Send + Sync>;
type RouterHook = Arc<dyn Fn(Router) -> Router + Send + Sync>;

pub struct Resource<T: Model> {
    name: String,

    on_register: Option<RouterHook>,

    can_list_all: Option<Predicate>,
    list_all_query: Option<ListAllQuery<T>>,

    can_list_by_id: Option<EntityPredicate<T>>,
    list_by_id_query: Option<ListByIdQuery<T>>,

    can_write_by_id: Option<EntityPredicate<T>>,
    write_binder: Option<Binder>,
    write_by_id_query: Option<WriteByIdQuery>,

    can_create: Option<Predicate>,
    create_binder: Option<Binder>,

    can_delete_by_id: Option<EntityPredicate<T>>,
    delete_by_id_query: Option<DeleteByIdQuery>,

    middlewares: Vec<RouterHook>,
}

impl<T: Model> Clone for Resource<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            on_register: self.on_register.clone(),
            can_list_all: self.can_list_all.clone(),
            list_all_query: self.list_all_query.clone(),
            can_list_by_id: self.can_list_by_id.clone(),
            list_by_id_query: self.list_by_id_query.clone(),
            can_write_by_id: self.can_write_by_id.clone(),
            write_binder: self.write_binder.clone(),
            write_by_id_query: self.write_by_id_query.clone(),
            can_create: self.can_create.clone(),
            create_binder: self.create_binder.clone(),
            can_delete_by_id: self.can_delete_by_id.clone(),
            delete_by_id_query: self.delete_by_id_query.clone(),
            middlewares: self.middlewares.clone(),
        }
    }
}

impl<T: Model> Resource<T> {
    /// `name` is the route prefix; a leading `/` is added when missing.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let name = if name.starts_with('/') { name } else { format!("/{}", name) };
        Self {
            name,
            on_register: None,
            can_list_all: None,
            list_all_query: None,
            can_list_by_id: None,
            list_by_id_query: None,
            can_write_by_id: None,
            write_binder: None,
            write_by_id_query: None,
            can_create: None,
            create_binder: None,
            can_delete_by_id: None,
            delete_by_id_query: None,
            middlewares: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Called with the application router before the resource mounts its routes.
    pub fn on_register<F>(mut self, f: F) -> Self
    where
        F: Fn(Router) -> Router + Send + Sync + 'static,
    {
        self.on_register = Some(Arc::new(f));
        self
    }

    /// Tower layer wrapped around all five resource routes. Layers apply in call order,
    /// the last one outermost.
    pub fn middleware<L>(mut self, layer: L) -> Self
    where
        L: Layer<Route> + Clone + Send + Sync + 'static,
        L::Service: Service<Request> + Clone + Send + Sync + 'static,
        <L::Service as Service<Request>>::Response: IntoResponse + 'static,
        <L::Service as Service<Request>>::Error: Into<Infallible> + 'static,
        <L::Service as Service<Request>>::Future: Send + 'static,
    {
        self.middlewares
            .push(Arc::new(move |router: Router| router.route_layer(layer.clone())));
        self
    }

    pub fn can_list_all<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&RequestContext) -> bool + Send + Sync + 'static,
    {
        self.can_list_all = Some(Arc::new(predicate));
        self
    }

    /// Checked against the loaded entity by the default get-by-id query.
    pub fn can_list_by_id<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&RequestContext, &T) -> bool + Send + Sync + 'static,
    {
        self.can_list_by_id = Some(Arc::new(predicate));
        self
    }

    /// Checked against the loaded entity by the default write-by-id query.
    pub fn can_write_by_id<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&RequestContext, &T) -> bool + Send + Sync + 'static,
    {
        self.can_write_by_id = Some(Arc::new(predicate));
        self
    }

    pub fn can_create<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&RequestContext) -> bool + Send + Sync + 'static,
    {
        self.can_create = Some(Arc::new(predicate));
        self
    }

    /// Checked against the loaded entity by the default delete-by-id query.
    pub fn can_delete_by_id<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&RequestContext, &T) -> bool + Send + Sync + 'static,
    {
        self.can_delete_by_id = Some(Arc::new(predicate));
        self
    }

    pub fn override_list_all_query<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(RequestContext, PgPool) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<T>, ResourceError>> + Send + 'static,
    {
        self.list_all_query = Some(Arc::new(move |ctx, pool| f(ctx, pool).boxed()));
        self
    }

    /// Replaces the default lookup, including its `can_list_by_id` check.
    pub fn override_list_by_id_query<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(RequestContext, PgPool, i64) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ResourceError>> + Send + 'static,
    {
        self.list_by_id_query = Some(Arc::new(move |ctx, pool, id| f(ctx, pool, id).boxed()));
        self
    }

    /// Replaces the default load-check-patch-save, including its `can_write_by_id` check.
    pub fn override_write_by_id_query<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(RequestContext, PgPool, i64, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ResourceError>> + Send + 'static,
    {
        self.write_by_id_query = Some(Arc::new(move |ctx, pool, id, dto| f(ctx, pool, id, dto).boxed()));
        self
    }

    /// Replaces the default load-check-delete, including its `can_delete_by_id` check.
    pub fn override_delete_by_id_query<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(RequestContext, PgPool, i64) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ResourceError>> + Send + 'static,
    {
        self.delete_by_id_query = Some(Arc::new(move |ctx, pool, id| f(ctx, pool, id).boxed()));
        self
    }

    /// DTO the write-by-id body is bound to, typically a struct of optional fields.
    pub fn write_bind_type<D>(mut self) -> Self
    where
        D: DeserializeOwned + Serialize + 'static,
    {
        self.write_binder = Some(binder::<D>());
        self
    }

    /// DTO the create body is bound to.
    pub fn create_bind_type<D>(mut self) -> Self
    where
        D: DeserializeOwned + Serialize + 'static,
    {
        self.create_binder = Some(binder::<D>());
        self
    }

    /// The resource's routes bound to `pool`, with the resource's middlewares applied.
    /// Paths are absolute (prefixed with the resource name).
    pub fn routes(&self, pool: PgPool) -> Router {
        let mounted = Arc::new(Mounted {
            resource: self.clone(),
            pool,
        });
        let mut router = resource_routes(&self.name, mounted);
        for apply in &self.middlewares {
            router = apply(router);
        }
        router
    }

    pub(crate) fn check_list_all(&self, ctx: &RequestContext) -> Result<(), ResourceError> {
        check(self.can_list_all.as_ref().map_or(true, |p| p(ctx)))
    }

    pub(crate) fn check_create(&self, ctx: &RequestContext) -> Result<(), ResourceError> {
        check(self.can_create.as_ref().map_or(true, |p| p(ctx)))
    }

    pub(crate) fn write_binder(&self) -> Option<&Binder> {
        self.write_binder.as_ref()
    }

    pub(crate) fn create_binder(&self) -> Option<&Binder> {
        self.create_binder.as_ref()
    }

    pub(crate) async fn list_all(&self, ctx: RequestContext, pool: PgPool) -> Result<Vec<T>, ResourceError> {
        if let Some(q) = &self.list_all_query {
            return q(ctx, pool).await;
        }
        Ok(CrudService::list::<T>(&pool).await?)
    }

    pub(crate) async fn list_by_id(&self, ctx: RequestContext, pool: PgPool, id: i64) -> Result<T, ResourceError> {
        if let Some(q) = &self.list_by_id_query {
            return q(ctx, pool, id).await;
        }
        self.default_list_by_id(&ctx, &pool, id).await
    }

    async fn default_list_by_id(&self, ctx: &RequestContext, rows: &dyn Rows<T>, id: i64) -> Result<T, ResourceError> {
        let entity = load(rows, id).await?;
        check_entity(self.can_list_by_id.as_ref(), ctx, &entity)?;
        Ok(entity)
    }

    pub(crate) async fn write_by_id(
        &self,
        ctx: RequestContext,
        pool: PgPool,
        id: i64,
        dto: Value,
    ) -> Result<(), ResourceError> {
        if let Some(q) = &self.write_by_id_query {
            return q(ctx, pool, id, dto).await;
        }
        self.default_write_by_id(&ctx, &pool, id, &dto).await
    }

    async fn default_write_by_id(
        &self,
        ctx: &RequestContext,
        rows: &dyn Rows<T>,
        id: i64,
        dto: &Value,
    ) -> Result<(), ResourceError> {
        let mut entity = load(rows, id).await?;
        check_entity(self.can_write_by_id.as_ref(), ctx, &entity)?;
        patch_struct(&mut entity, dto).map_err(|e| {
            tracing::error!(error = %e, resource = %self.name, "patching failed");
            ResourceError::InvalidData
        })?;
        rows.save(id, &entity).await?;
        Ok(())
    }

    pub(crate) async fn create(&self, pool: PgPool, dto: Value) -> Result<(), ResourceError> {
        let mut model = T::default();
        patch_struct(&mut model, &dto).map_err(|e| {
            tracing::error!(error = %e, resource = %self.name, "patching failed");
            ResourceError::InvalidData
        })?;
        CrudService::create(&pool, &model).await.map_err(|e| {
            tracing::error!(error = %e, resource = %self.name, "create failed");
            ResourceError::Database
        })?;
        Ok(())
    }

    pub(crate) async fn delete_by_id(&self, ctx: RequestContext, pool: PgPool, id: i64) -> Result<(), ResourceError> {
        if let Some(q) = &self.delete_by_id_query {
            return q(ctx, pool, id).await;
        }
        self.default_delete_by_id(&ctx, &pool, id).await
    }

    async fn default_delete_by_id(&self, ctx: &RequestContext, rows: &dyn Rows<T>, id: i64) -> Result<(), ResourceError> {
        let entity = load(rows, id).await?;
        check_entity(self.can_delete_by_id.as_ref(), ctx, &entity)?;
        match rows.delete(id).await? {
            0 => Err(ResourceError::NoResourceFound),
            _ => Ok(()),
        }
    }
}

/// A resource bound to its pool; the state behind its handlers.
pub(crate) struct Mounted<T: Model> {
    pub resource: Resource<T>,
    pub pool: PgPool,
}

#[async_trait]
impl<T: Model> Provider for Resource<T> {
    async fn register(&self, router: Router, db: Option<&PgPool>) -> Result<Router, Error> {
        let router = match &self.on_register {
            Some(hook) => hook(router),
            None => router,
        };
        let pool = db.ok_or_else(|| Error::DatabaseRequired(self.name.clone()))?;

        tracing::info!(resource = %self.name, "initialized resource");
        if let Err(e) = auto_migrate(pool, &ModelSchema::of::<T>()).await {
            tracing::error!(error = %e, model = std::any::type_name::<T>(), "unable to migrate model");
        }
        Ok(router.merge(self.routes(pool.clone())))
    }
}

fn check(allowed: bool) -> Result<(), ResourceError> {
    if allowed {
        Ok(())
    } else {
        Err(ResourceError::NoResourceAccess)
    }
}

fn check_entity<T>(predicate: Option<&EntityPredicate<T>>, ctx: &RequestContext, entity: &T) -> Result<(), ResourceError> {
    check(predicate.map_or(true, |p| p(ctx, entity)))
}

/// Row access used by the default by-id queries. Existence is checked
/// before any predicate, so a missing row is 404 whoever asks.
#[async_trait]
pub(crate) trait Rows<T: Model>: Send + Sync {
    async fn read(&self, id: i64) -> Result<Option<T>, sqlx::Error>;
    async fn save(&self, id: i64, entity: &T) -> Result<(), sqlx::Error>;
    async fn delete(&self, id: i64) -> Result<u64, sqlx::Error>;
}

#[async_trait]
impl<T: Model> Rows<T> for PgPool {
    async fn read(&self, id: i64) -> Result<Option<T>, sqlx::Error> {
        CrudService::read::<T>(self, id).await
    }

    async fn save(&self, id: i64, entity: &T) -> Result<(), sqlx::Error> {
        CrudService::save(self, id, entity).await.map(|_| ())
    }

    async fn delete(&self, id: i64) -> Result<u64, sqlx::Error> {
        CrudService::delete::<T>(self, id).await
    }
}

async fn load<T: Model>(rows: &dyn Rows<T>, id: i64) -> Result<T, ResourceError> {
    rows.read(id).await?.ok_or(ResourceError::NoResourceFound)
}

/// Binds a request body to `D` and hands it on in its serde representation.
/// An empty body binds as `{}`.
fn binder<D>() -> Binder
where
    D: DeserializeOwned + Serialize + 'static,
{
    Arc::new(|body: &[u8]| {
        let bound: Result<D, _> = if body.iter().all(u8::is_ascii_whitespace) {
            serde_json::from_slice(b"{}")
        } else {
            serde_json::from_slice(body)
        };
        let bound = bound.map_err(|e| {
            tracing::error!(error = %e, "binding failed");
            ResourceError::InvalidData
        })?;
        serde_json::to_value(bound).map_err(|_| ResourceError::InvalidData)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
    struct Item {
        id: i64,
        label: String,
    }

    impl Model for Item {
        const TABLE: &'static str = "items";
        fn columns() -> Vec<crate::model::Column> {
            vec![crate::model::Column::new("label", "TEXT")]
        }
    }

    #[derive(Serialize, Deserialize)]
    struct NewItem {
        label: String,
    }

    #[test]
    fn name_gets_leading_slash() {
        assert_eq!(Resource::<Item>::new("items").name(), "/items");
        assert_eq!(Resource::<Item>::new("/items").name(), "/items");
    }

    #[test]
    fn predicates_default_to_allowed() {
        let r = Resource::<Item>::new("items");
        let ctx = RequestContext::default();
        assert!(r.check_list_all(&ctx).is_ok());
        assert!(r.check_create(&ctx).is_ok());

        let r = r.can_list_all(|_| false).can_create(|c| c.header("x-admin").is_some());
        assert_eq!(r.check_list_all(&ctx), Err(ResourceError::NoResourceAccess));
        assert_eq!(r.check_create(&ctx), Err(ResourceError::NoResourceAccess));
    }

    #[test]
    fn binder_validates_dto_shape() {
        let bind = binder::<NewItem>();
        assert_eq!(bind(&br#"{"label":"x","extra":1}"#[..]).unwrap(), json!({"label": "x"}));
        assert_eq!(bind(&b"{\"label\": 5}"[..]), Err(ResourceError::InvalidData));
        assert_eq!(bind(&b"not json"[..]), Err(ResourceError::InvalidData));
        // missing required field in an empty body
        assert_eq!(bind(&b""[..]), Err(ResourceError::InvalidData));
    }

    #[test]
    fn binder_treats_empty_body_as_empty_object() {
        #[derive(Serialize, Deserialize)]
        struct Changes {
            label: Option<String>,
        }
        let bind = binder::<Changes>();
        assert_eq!(bind(&b"  "[..]).unwrap(), json!({"label": null}));
    }

    #[test]
    fn bind_types_are_optional() {
        let r = Resource::<Item>::new("items");
        assert!(r.write_binder().is_none());
        assert!(r.create_binder().is_none());
        let r = r.create_bind_type::<NewItem>().write_bind_type::<NewItem>();
        assert!(r.write_binder().is_some());
        assert!(r.create_binder().is_some());
    }

    #[tokio::test]
    async fn overrides_replace_default_queries() {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();
        let r = Resource::<Item>::new("items")
            .override_list_all_query(|_, _| async { Err(ResourceError::Database) })
            .override_list_by_id_query(|_, _, id| async move { Ok(Item { id, label: "stub".into() }) });

        let all = r.list_all(RequestContext::default(), pool.clone()).await;
        assert_eq!(all.unwrap_err(), ResourceError::Database);

        let one = r.list_by_id(RequestContext::default(), pool, 12).await.unwrap();
        assert_eq!(one.id, 12);
        assert_eq!(one.label, "stub");
    }

    #[tokio::test]
    async fn create_rejects_dto_that_does_not_fit_model() {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();
        let r = Resource::<Item>::new("items");
        let err = r.create(pool, json!({"label": 5})).await.unwrap_err();
        assert_eq!(err, ResourceError::InvalidData);
    }

    #[derive(Default)]
    struct MemoryRows(std::sync::Mutex<std::collections::BTreeMap<i64, Item>>);

    impl MemoryRows {
        fn with(items: &[(i64, &str)]) -> Self {
            let rows = MemoryRows::default();
            for (id, label) in items {
                rows.0.lock().unwrap().insert(*id, Item { id: *id, label: label.to_string() });
            }
            rows
        }

        fn get(&self, id: i64) -> Option<Item> {
            self.0.lock().unwrap().get(&id).cloned()
        }
    }

    #[async_trait]
    impl Rows<Item> for MemoryRows {
        async fn read(&self, id: i64) -> Result<Option<Item>, sqlx::Error> {
            Ok(self.get(id))
        }

        async fn save(&self, id: i64, entity: &Item) -> Result<(), sqlx::Error> {
            self.0.lock().unwrap().insert(id, entity.clone());
            Ok(())
        }

        async fn delete(&self, id: i64) -> Result<u64, sqlx::Error> {
            Ok(self.0.lock().unwrap().remove(&id).map_or(0, |_| 1))
        }
    }

    /// Items are labelled with their owner.
    fn owned_items() -> Resource<Item> {
        let is_owner = |ctx: &RequestContext, item: &Item| ctx.header("x-user") == Some(item.label.as_str());
        Resource::<Item>::new("items")
            .can_list_by_id(is_owner)
            .can_write_by_id(is_owner)
            .can_delete_by_id(is_owner)
    }

    fn as_user(user: &str) -> RequestContext {
        let mut ctx = RequestContext::default();
        ctx.headers.insert("x-user", user.parse().unwrap());
        ctx
    }

    #[tokio::test]
    async fn get_by_id_checks_existence_then_access() {
        let rows = MemoryRows::with(&[(1, "ann")]);
        let r = owned_items();

        let item = r.default_list_by_id(&as_user("ann"), &rows, 1).await.unwrap();
        assert_eq!(item, Item { id: 1, label: "ann".into() });
        assert_eq!(
            r.default_list_by_id(&as_user("bob"), &rows, 1).await,
            Err(ResourceError::NoResourceAccess)
        );
        // missing rows are 404 even for callers the predicate would reject
        assert_eq!(
            r.default_list_by_id(&as_user("bob"), &rows, 2).await,
            Err(ResourceError::NoResourceFound)
        );
    }

    #[tokio::test]
    async fn write_by_id_patches_and_saves_for_allowed_callers() {
        let rows = MemoryRows::with(&[(1, "ann")]);
        let r = owned_items();

        assert_eq!(
            r.default_write_by_id(&as_user("bob"), &rows, 1, &json!({"label": "bob"})).await,
            Err(ResourceError::NoResourceAccess)
        );
        assert_eq!(rows.get(1).unwrap().label, "ann");

        assert_eq!(
            r.default_write_by_id(&as_user("ann"), &rows, 9, &json!({"label": "x"})).await,
            Err(ResourceError::NoResourceFound)
        );

        assert_eq!(
            r.default_write_by_id(&as_user("ann"), &rows, 1, &json!({"label": 5})).await,
            Err(ResourceError::InvalidData)
        );
        assert_eq!(rows.get(1).unwrap().label, "ann");

        r.default_write_by_id(&as_user("ann"), &rows, 1, &json!({"id": 7, "label": "ann2"}))
            .await
            .unwrap();
        assert_eq!(rows.get(1), Some(Item { id: 1, label: "ann2".into() }));
    }

    #[tokio::test]
    async fn delete_by_id_removes_once() {
        let rows = MemoryRows::with(&[(1, "ann")]);
        let r = owned_items();

        assert_eq!(
            r.default_delete_by_id(&as_user("bob"), &rows, 1).await,
            Err(ResourceError::NoResourceAccess)
        );
        assert!(rows.get(1).is_some());

        r.default_delete_by_id(&as_user("ann"), &rows, 1).await.unwrap();
        assert!(rows.get(1).is_none());
        assert_eq!(
            r.default_delete_by_id(&as_user("ann"), &rows, 1).await,
            Err(ResourceError::NoResourceFound)
        );
    }

    #[tokio::test]
    async fn by_id_defaults_allow_everyone_without_predicates() {
        let rows = MemoryRows::with(&[(3, "ann")]);
        let r = Resource::<Item>::new("items");
        let ctx = RequestContext::default();
        assert!(r.default_list_by_id(&ctx, &rows, 3).await.is_ok());
        assert!(r.default_write_by_id(&ctx, &rows, 3, &json!({})).await.is_ok());
        assert!(r.default_delete_by_id(&ctx, &rows, 3).await.is_ok());
    }
}
