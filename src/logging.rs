//! Global tracing subscriber setup.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "minimal=info,tower_http=info";

/// Install the global subscriber: readable lines with file and line when
/// `friendly`, JSON lines otherwise. `RUST_LOG` overrides the default filter.
/// Only the first call installs anything.
pub fn init(friendly: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = if friendly {
        builder
            .with_target(false)
            .with_file(true)
            .with_line_number(true)
            .try_init()
    } else {
        builder.json().with_current_span(true).try_init()
    };
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
