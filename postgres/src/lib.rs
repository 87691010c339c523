//! `PostgreSQL` store for the conference core.
//!
//! [`PostgresStore`] implements [`ConferenceStore`] over an `sqlx` pool:
//!
//! - one table per record kind, each with a `version` column
//! - sessions reference their conference through an indexed foreign key
//! - speakers are keyed by normalized name and inserted with
//!   `ON CONFLICT DO NOTHING`, so concurrent first mentions create one row
//! - conference queries are translated from a compiled plan with bound
//!   parameters only
//!
//! The schema lives in `migrations/` and is applied by
//! [`PostgresStore::migrate`].
//!
//! [`ConferenceStore`]: conference_core::store::ConferenceStore

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod query;
mod rows;
mod store;

pub use store::{DEFAULT_MAX_CONNECTIONS, PostgresStore};
