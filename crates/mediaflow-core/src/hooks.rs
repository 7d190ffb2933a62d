//! On-ready observers
//!
//! Observers are registered explicitly when the engine is built and run in
//! registration order every time a record reaches `ready`. The first error
//! stops the remaining observers and is returned to whoever triggered the
//! transition.

use async_trait::async_trait;

use crate::error::AppError;
use crate::models::MediaRecord;

#[async_trait]
pub trait ReadyObserver: Send + Sync {
    /// Name used in logs and in `AppError::Observer`.
    fn name(&self) -> &str;

    async fn on_ready(&self, record: &MediaRecord) -> Result<(), AppError>;
}
