//! Firestore REST job record store.
//!
//! This crate provides:
//! - A lean Firestore REST client (document CRUD + field-filter queries)
//! - OAuth token caching with a refresh margin
//! - The typed `VideoJobRepository`

pub mod client;
pub mod error;
pub mod job_repo;
pub mod types;

pub use client::{FirestoreClient, FirestoreConfig};
pub use error::{FirestoreError, FirestoreResult};
pub use job_repo::VideoJobRepository;
pub use types::{Document, FromFirestoreValue, StructuredQuery, ToFirestoreValue, Value};
