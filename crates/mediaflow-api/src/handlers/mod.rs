pub mod health;
pub mod media;
pub mod multipart;
pub mod upload;
