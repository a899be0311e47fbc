//! HTTP gateway in front of the file relay service.
//!
//! Exposes a small REST surface (upload, download, ls, rm) that proxies to
//! the streaming gRPC file service, authenticating every request against
//! an external auth service.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
