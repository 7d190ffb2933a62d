//! Mediaflow API Library
//!
//! HTTP glue over the upload engine: route table, handlers, error rendering
//! and application setup. The binary in `main.rs` only loads configuration
//! and serves the router built here.

pub mod constants;
pub mod error;
mod handlers;
pub mod setup;
pub mod state;
pub mod telemetry;

pub use error::{ErrorResponse, HttpAppError};
pub use state::AppState;
