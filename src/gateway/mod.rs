//! Gateway (gatekeeper)
//!
//! Public entry point: API key check, query validation, forwarding to the
//! router.

mod auth;
mod client;
mod http;
mod service;
mod validate;

pub use auth::ApiKeyAuth;
pub use client::{HttpRouterClient, RouterClient};
pub use http::{GatewayServer, API_KEY_HEADER};
pub use service::Gateway;
pub use validate::{QueryValidator, Rejection, DEFAULT_BLOCKED_PATTERNS};
