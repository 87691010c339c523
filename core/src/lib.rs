//! # Conference Core
//!
//! Domain types, validation and collaborator traits for a conference
//! management backend.
//!
//! The core keeps three invariants under concurrent access:
//!
//! - `0 <= seats_available <= max_attendees` for every conference
//! - a profile attends a conference iff it holds one seat in it
//! - no two speakers share a normalized name
//!
//! It also compiles loosely-typed filter criteria into a [`query::QueryPlan`]
//! that a query engine limited to one inequality field can execute.
//!
//! ## Modules
//!
//! - [`types`]: identifiers and entities
//! - [`version`]: record versions for optimistic concurrency
//! - [`draft`]: caller input for new conferences and sessions
//! - [`query`]: the query compiler
//! - [`store`], [`cache`], [`jobs`]: collaborator traits
//! - [`error`]: the error taxonomy
//!
//! Orchestration (ledger, catalog, background jobs) lives in
//! `conference-runtime`.

pub mod cache;
pub mod draft;
pub mod error;
pub mod jobs;
pub mod query;
pub mod store;
pub mod types;
pub mod version;

pub use error::{ConferenceError, ConflictReason, EntityKind, Result};
