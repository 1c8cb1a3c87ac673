//! Router (internal proxy)
//!
//! Classifies queries, sends writes to the primary and reads wherever the
//! active strategy says, and executes them.

mod context;
mod executor;
mod http;
mod service;

pub use context::{ActiveStrategy, Route, RoutingContext};
pub use executor::{MySqlExecutor, QueryExecutor, QueryOutcome};
pub use http::RouterServer;
pub use service::QueryRouter;
