//! Mediaflow Database Layer
//!
//! PostgreSQL implementation of the media repository. The schema lives in the
//! workspace `migrations/` directory and is applied by the API at startup.

pub mod db;

pub use db::PgMediaRepository;
