//! S3 object storage client.
//!
//! This crate provides:
//! - Single and bulk uploads
//! - Download, list, delete, existence checks
//! - Presigned URL generation

pub mod client;
pub mod error;

pub use client::{S3Client, S3Config};
pub use error::{StorageError, StorageResult};
