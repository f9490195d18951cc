//! # tilt-server
//!
//! WebSocket relay between orientation producers and visualization
//! consumers.
//!
//! | Path | Description |
//! |------|-------------|
//! | `/ws/web` | Producers push `{"ID", "username", "beta", "gamma"}` updates |
//! | `/ws/unity` | Consumers receive the full aggregate on every update |
//! | `/health` | Liveness and producer/consumer counts |
//!
//! Endpoint paths, eviction timing and limits come from [`config::Config`].

pub mod config;
pub mod handlers;
pub mod metrics;
pub mod session;

pub use config::Config;
pub use handlers::{router, run_server, serve, AppState};
