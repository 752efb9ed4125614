//! HTTP guard service for the Quill access engine
//!
//! Exposes access decisions and serialized role reassignment over HTTP.
//! Callers authenticate with an HS256 bearer token; requests without a
//! valid token proceed as anonymous and are denied wherever a permission
//! is required.

pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use config::ServerConfig;
pub use error::{ApiError, Result};
pub use routes::{create_metrics_router, create_router};
pub use state::AppState;
