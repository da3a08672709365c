//! Test support for the rowan workspace.
//!
//! Provides a deterministic clock with nanosecond-resolution virtual time
//! and builders for stored-request fixtures shared across the store,
//! delivery, and API test suites.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod time;

pub use time::TestClock;
