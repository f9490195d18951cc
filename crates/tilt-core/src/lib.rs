//! # tilt-core
//!
//! Connection hub and broadcast/eviction engine for tilt-relay.
//!
//! - **StateStore** - Latest orientation sample per producer
//! - **ConsumerRegistry** - Connected consumers and their outbound feeds
//! - **Hub** - Ingests samples and broadcasts the aggregate to consumers
//! - **Eviction** - Background removal of producers that went quiet
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐  ingest  ┌─────────────┐  broadcast  ┌──────────────────┐
//! │ Producer │─────────▶│     Hub     │────────────▶│ ConsumerRegistry │
//! └──────────┘          └─────────────┘             └──────────────────┘
//!                          │       ▲
//!                          ▼       │ evict_stale
//!                   ┌────────────┐ │
//!                   │ StateStore │ └── eviction loop
//!                   └────────────┘
//! ```

pub mod clock;
pub mod eviction;
pub mod hub;
pub mod metrics;
pub mod registry;
pub mod store;

pub use clock::{Clock, ManualClock, SecondOfMinute, SystemClock};
pub use eviction::{run_eviction_loop, spawn_eviction_task, DEFAULT_EVICTION_INTERVAL};
pub use hub::{BroadcastReport, Hub, HubConfig, HubStats, DEFAULT_EVICTION_THRESHOLD_SECS};
pub use registry::{ConsumerFeed, ConsumerHandle, ConsumerId, ConsumerRegistry, SendError};
pub use store::{OrientationSample, Snapshot, StateStore};
