//! Route prefixes and S3-compatible header names.

/// Administrative media routes.
pub const ADMIN_MEDIA_PREFIX: &str = "/admin/media";

pub const HEADER_FILE_TITLE: &str = "x-file-title";
pub const HEADER_FILE_DESCRIPTION: &str = "x-file-description";
pub const HEADER_FILE_TYPE: &str = "x-file-type";
