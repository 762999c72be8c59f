//! Template rendering for handlers. Installed on the router as `Extension<Templates>`.
//!
//! ```ignore
//! async fn index(Extension(t): Extension<Templates>) -> Result<Html<String>, Error> {
//!     t.render("index.html", context! { title => "Home" })
//! }
//! ```

use crate::error::Error;
use axum::response::Html;
use minijinja::{path_loader, Environment};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

#[derive(Clone)]
pub struct Templates {
    env: Arc<Environment<'static>>,
}

impl Templates {
    /// Templates are loaded lazily by name, relative to `dir`.
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        let mut env = Environment::new();
        env.set_loader(path_loader(dir.as_ref()));
        Self { env: Arc::new(env) }
    }

    pub fn render<S: Serialize>(&self, name: &str, ctx: S) -> Result<Html<String>, Error> {
        let template = self.env.get_template(name)?;
        Ok(Html(template.render(ctx)?))
    }
}
