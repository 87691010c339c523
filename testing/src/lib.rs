//! # Conference Testing
//!
//! In-memory collaborators and fixtures for testing the conference core:
//!
//! - [`InMemoryStore`]: versioned store with atomic commits and conflict
//!   injection
//! - [`InMemoryCache`]: HashMap-backed cache with failure injection
//! - [`RecordingJobQueue`]: captures enqueued jobs, optionally failing
//! - [`fixtures`]: identities, drafts and entities
//!
//! The in-memory backends also serve the `memory` backend of the server
//! binary in development.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Locks only panic if a test already panicked

pub mod cache;
pub mod fixtures;
pub mod queue;
pub mod store;

pub use cache::InMemoryCache;
pub use queue::RecordingJobQueue;
pub use store::InMemoryStore;
