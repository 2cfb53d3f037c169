//! API Module
//!
//! HTTP handlers and routing for the cache node.
//!
//! # Endpoints
//! - `PUT /keys/:key` - Store the raw body (`?ttl_ms=N&condition=nx|xx`)
//! - `GET /keys/:key` - Fetch the raw payload
//! - `HEAD /keys/:key` - Existence probe
//! - `DELETE /keys/:key` - Delete a key
//! - `GET /stats` - Node statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
