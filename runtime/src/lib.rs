//! # Conference Runtime
//!
//! Orchestration on top of `conference-core`:
//!
//! - [`ledger::CapacityLedger`]: atomic registration and wishlist operations
//!   with optimistic concurrency and bounded retry
//! - [`catalog::Catalog`]: conference and session creation, speaker
//!   resolution, and the read paths
//! - [`featured::SpeakerAggregator`]: featured-speaker summaries
//! - [`announcements::AnnouncementPublisher`]: the "nearly sold out"
//!   announcement
//! - [`worker`]: background job execution and scheduling
//! - [`retry`] and [`metrics`]: shared infrastructure
//!
//! Every component is built from `Arc<dyn ...>` collaborators, so the same
//! code runs against the in-memory backends in `conference-testing` and the
//! production backends in `conference-postgres` / `conference-redis`.

pub mod announcements;
pub mod catalog;
pub mod featured;
pub mod ledger;
pub mod metrics;
pub mod retry;
pub mod worker;

pub use announcements::AnnouncementPublisher;
pub use catalog::Catalog;
pub use featured::SpeakerAggregator;
pub use ledger::CapacityLedger;
pub use retry::RetryPolicy;
pub use worker::{AnnouncementScheduler, JobRunner, JobWorker};
