//! Axum HTTP API server.
//!
//! This crate provides:
//! - The summary trigger/poll/delete surface, with the per-video admission
//!   and staleness guard embedded in the trigger handler
//! - Translate-on-demand and chat endpoints
//! - Bearer-token auth, rate limiting, security headers, Prometheus metrics

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
