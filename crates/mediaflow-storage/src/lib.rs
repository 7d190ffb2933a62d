//! Mediaflow Storage Library
//!
//! Filesystem side of the upload engine: multipart session staging, ordered
//! assembly of staged parts, the staging sweep and the upload root where
//! finished media is published.
//!
//! # Layout
//!
//! Under the temporary directory:
//!
//! - `staging/{key}/{session_id}/{part_number}`: staged chunks
//! - `assembled/{session_id}/{key}`: assembled output, namespaced per session
//!
//! Under the upload directory, published media lives at `{prefix}/{filename}`.
//! Keys and session ids are single path segments and must not contain `..`,
//! separators or a leading `/`.

pub mod assembler;
pub mod error;
pub mod fs;
pub mod keys;
pub mod local;
pub mod session;

pub use assembler::UploadAssembler;
pub use error::{StorageError, StorageResult};
pub use local::LocalMediaStore;
pub use session::{StagedPart, StagingLayout, SweepReport, UploadSessionStore, MAX_PART_NUMBER};
