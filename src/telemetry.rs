//! Tracing setup for the service.
//!
//! - LOG_LEVEL holds filter directives, e.g. "debug" or
//!   "info,generation=debug,history=debug,tower_http=info".
//! - LOG_FORMAT picks the output: "pretty" (default), "compact" or "json".
//!
//! Log targets used across the crate: `exaprep_backend` (server lifecycle),
//! `generation` (model calls and outcomes), `history` (persistence).

use tracing_subscriber::EnvFilter;

const DEFAULT_DIRECTIVES: &str = "info,exaprep_backend=debug,generation=debug,history=info,tower_http=info,axum=info";

pub fn init_tracing() {
    let filter = EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    // Each format yields a different builder type, so init inside each arm.
    match std::env::var("LOG_FORMAT").as_deref() {
        Ok("json") => builder.json().init(),
        Ok("compact") => builder.compact().init(),
        _ => builder.init(),
    }
}
