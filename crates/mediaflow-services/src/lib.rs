//! Mediaflow Services Layer
//!
//! Orchestration on top of storage and processing: the upload engine that
//! drives basic and multipart uploads to a ready record, the record
//! lifecycle (persistence at every transition plus on-ready observers), the
//! default metadata observer and the staging cleanup timer. HTTP handling
//! stays in `mediaflow-api`.

pub mod cleanup;
pub mod engine;
pub mod lifecycle;
pub mod metadata_observer;

pub use cleanup::StagingCleanupService;
pub use engine::{BasicUploadRequest, MediaEngine, MultipartInitiation, UploadPayload};
pub use lifecycle::RecordLifecycle;
pub use metadata_observer::MetadataObserver;

pub use mediaflow_processing::{MediaTagExtractor, MediaTools, SystemCommandRunner};
pub use mediaflow_storage::{StagedPart, UploadSessionStore};
