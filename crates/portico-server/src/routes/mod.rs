//! HTTP routes.

pub mod auth;
pub mod health;

pub use auth::{
    DebugResponse, LoginRequest, LoginResponse, OkResponse, PermissionCheck, auth_routes,
    debug_handler, login_handler, logout_handler, refresh_handler,
};
pub use health::{HealthResponse, health_routes};
