//! Profile QA Adapters - external adapters for profile-qa.
//!
//! This crate provides adapters for:
//! - Reading photo bytes from the filesystem
//! - Downloading and caching classifier weights

pub mod fs;
pub mod models;

pub use fs::{FsByteSource, HEADER_PREFIX};
pub use models::{default_models_dir, ModelInfo, ModelStore, ProgressCallback, MODELS};
