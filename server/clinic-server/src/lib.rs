//! Clinic Engine Server - scheduling, billing and clinical records API
//!
//! This library provides the HTTP surface of a dermatology and podiatry clinic:
//! accounts and JWT authentication, doctor schedules, the appointment lifecycle,
//! treatments, payments, clinical records and informed consent.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod server;
pub mod services;
pub mod types;
pub mod validation;

// Re-export commonly used types
pub use config::ClinicConfig;
pub use error::*;
pub use server::ClinicServer;

use std::time::Duration;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Create the main application router with all routes and middleware
pub fn create_app(server: ClinicServer) -> Router {
    let config = server.get_config();
    let cors = middleware::create_cors_layer(&config.cors.allowed_origins);
    let timeout = Duration::from_secs(config.server.request_timeout);

    routes::create_routes()
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(TimeoutLayer::new(timeout))
                .layer(from_fn(middleware::request_timing_middleware))
                .layer(from_fn_with_state(server.clone(), middleware::audit_logging_middleware)),
        )
        .with_state(server)
}
