//! Axum HTTP API server.
//!
//! Accepts video uploads, registers jobs, and answers status queries.

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
