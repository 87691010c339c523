//! # Conference Server
//!
//! Process wiring for the conference core: configuration from the
//! environment, backend selection, and the background job worker and
//! announcement scheduler.

pub mod app;
pub mod config;

pub use app::{Backends, ConferenceApp, Running};
pub use config::{Backend, Config};
