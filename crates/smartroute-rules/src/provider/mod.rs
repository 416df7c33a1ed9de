//! Subscription providers.
//!
//! Only local files are supported; downloading and refresh scheduling
//! belong to the host application.

pub mod file;

pub use file::FileProvider;
