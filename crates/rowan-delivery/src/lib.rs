//! Outbound delivery engine for scheduled requests.
//!
//! A single dispatcher scans the store for due requests and hands each one
//! to a fixed pool of workers through a rendezvous handshake: an idle
//! worker queues a reply slot, and the dispatcher reserves the slot, then
//! persists the record's in-flight flag, then sends the record. Workers
//! issue the outbound HTTP call and either delete the record on success or
//! reschedule it through the retry policy.
//!
//! ```text
//! ┌────────────┐  next(2·W)  ┌────────────┐ rendezvous ┌──────────┐
//! │  Request   │────────────▶│ Dispatcher │◀──ready────│ Worker N │
//! │   Store    │◀────────────│ (1 task)   │───record──▶│ (W tasks)│
//! └────────────┘  put(claim) └────────────┘            └──────────┘
//!       ▲                                                    │
//!       └──── delete (200) / reschedule (retry) ◀────────────┘
//! ```
//!
//! Correctness hinges on two orderings: a worker is reserved before a
//! record is claimed, so at most `worker_count` records are in-flight at
//! any instant; and the claim flag is persisted before the handoff, so a
//! later dispatcher pass can never select a record a worker already owns.
//! A crash between claim and completion is healed by the store's startup
//! recovery.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod dispatcher;
pub mod error;
pub mod retry;
pub mod worker;

pub use client::{ClientConfig, DeliveryClient};
pub use dispatcher::{DeliveryEngine, EngineConfig};
pub use error::{DeliveryError, Result};
// Re-exported so configuration code can name the base URL type without
// depending on the HTTP client crate directly.
pub use reqwest::Url;
pub use retry::BackoffSchedule;

/// Default number of concurrent delivery workers.
pub const DEFAULT_WORKER_COUNT: usize = 10;
