//! Mediaflow Core Library
//!
//! Domain models, error types, configuration, filename normalization and the
//! persistence/observer seams shared by every mediaflow crate.

pub mod config;
pub mod error;
pub mod filename;
pub mod hooks;
pub mod models;
pub mod repository;

pub use config::{Config, EngineConfig, MediaflowConfig, ServerConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use filename::normalize_filename;
pub use hooks::ReadyObserver;
pub use repository::{InMemoryMediaRepository, MediaRepository};
