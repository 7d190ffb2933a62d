pub mod media;
pub mod metadata;
pub mod multipart;
pub mod structural;

pub use media::*;
pub use metadata::*;
pub use multipart::*;
pub use structural::*;
