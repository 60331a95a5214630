//! foreman - dependency-aware agent task coordination.
//!
//! The crate schedules interdependent tasks across a pool of named agents,
//! picking a resource configuration per task from a fixed catalog, driving
//! execution under a concurrency cap, and learning from outcomes so later
//! runs allocate better.

pub mod allocation;
pub mod config;
pub mod core;
pub mod error;
pub mod knowledge;
pub mod metrics;
pub mod orchestration;
pub mod report;

pub use config::Config;
pub use error::{Error, Result};
