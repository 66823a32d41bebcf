//! Content moderation gateway.
//!
//! This crate provides:
//! - An asynchronous Rekognition video-moderation client with bounded polling
//! - Verdict types shared with the processing pipeline

pub mod client;
pub mod error;
pub mod verdict;

pub use client::{ModerationClient, ModerationConfig};
pub use error::{ModerationError, ModerationResult};
pub use verdict::{ModerationLabel, ModerationVerdict};
