//! Models Module
//!
//! Request and response types for the cache node HTTP API.

mod requests;
mod responses;

pub use requests::{SetParams, MAX_KEY_LENGTH, MAX_VALUE_SIZE};
pub use responses::{DeleteResponse, HealthResponse, SetResponse, StatsResponse};
