//! Example consumer: a notes service with a generated REST resource and a rendered index page.
//!
//! Run from repo root: `DATABASE_URL=postgres://localhost/notes HTTP_PORT=3000 TEMPLATE_DIR=example_consumer/www cargo run -p example-consumer`

use axum::{response::Html, routing::get, Extension, Router};
use chrono::{DateTime, Utc};
use minimal::{Column, Config, CrudService, Error, Model, Provider, RequestContext, Resource, Server, Templates};
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Serialize, Deserialize, sqlx::FromRow)]
struct Note {
    id: i64,
    title: String,
    body: String,
    owner: String,
    created_at: Option<DateTime<Utc>>,
}

impl Model for Note {
    const TABLE: &'static str = "notes";

    fn columns() -> Vec<Column> {
        vec![
            Column::new("title", "TEXT").not_null().default("''"),
            Column::new("body", "TEXT").not_null().default("''"),
            Column::new("owner", "TEXT").not_null().default("''"),
            Column::new("created_at", "TIMESTAMPTZ").default("NOW()"),
        ]
    }
}

#[derive(Serialize, Deserialize)]
struct NewNote {
    title: String,
    #[serde(default)]
    body: String,
    owner: String,
}

#[derive(Serialize, Deserialize)]
struct NoteChanges {
    title: Option<String>,
    body: Option<String>,
}

fn is_owner(ctx: &RequestContext, note: &Note) -> bool {
    ctx.header("x-user") == Some(note.owner.as_str())
}

async fn index(
    Extension(templates): Extension<Templates>,
    Extension(pool): Extension<sqlx::PgPool>,
) -> Result<Html<String>, Error> {
    let notes = CrudService::list::<Note>(&pool).await?;
    templates.render("index.html", minijinja::context! { title => "Notes", notes })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;

    let notes = Resource::<Note>::new("notes")
        .create_bind_type::<NewNote>()
        .write_bind_type::<NoteChanges>()
        .can_create(|ctx| ctx.header("x-user").is_some())
        .can_write_by_id(is_owner)
        .can_delete_by_id(is_owner)
        .on_register(|router: Router| {
            tracing::info!("mounting notes index page");
            router.route("/", get(index))
        });

    let app = Server::new(config, vec![Box::new(notes) as Box<dyn Provider>], vec![])
        .build()
        .await?;
    let app = match app.pool().cloned() {
        Some(pool) => app.with_router(|router| router.layer(Extension(pool))),
        None => app,
    };
    app.serve().await?;
    Ok(())
}
