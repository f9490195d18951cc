//! The hub ties producer state to connected consumers.
//!
//! Every accepted producer sample and every new consumer triggers a
//! broadcast of the whole aggregate to every consumer.

use crate::clock::{Clock, SecondOfMinute, SystemClock};
use crate::metrics;
use crate::registry::{ConsumerHandle, ConsumerId, ConsumerRegistry};
use crate::store::{OrientationSample, StateStore};
use std::sync::Arc;
use tilt_protocol::{codec, ProducerUpdate};
use tracing::{debug, error, info, trace, warn};

/// Default eviction age threshold in seconds.
pub const DEFAULT_EVICTION_THRESHOLD_SECS: u8 = 10;

/// Hub configuration.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Producers older than this many seconds are evicted.
    pub eviction_threshold_secs: u8,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            eviction_threshold_secs: DEFAULT_EVICTION_THRESHOLD_SECS,
        }
    }
}

/// Outcome of one broadcast.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Consumers a send was attempted to.
    pub recipients: usize,
    /// Consumers the payload was published to.
    pub delivered: usize,
    /// Consumers deregistered because the send failed.
    pub dropped: Vec<ConsumerId>,
    /// Size of the encoded aggregate.
    pub payload_bytes: usize,
}

/// Hub statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubStats {
    /// Producers currently held in the store.
    pub producers: usize,
    /// Consumers currently registered.
    pub consumers: usize,
}

/// Shared producer state and consumer set.
///
/// Built once at startup and shared by every session as `Arc<Hub>`.
pub struct Hub {
    store: StateStore,
    consumers: ConsumerRegistry,
    clock: Arc<dyn Clock>,
    config: HubConfig,
}

impl Hub {
    /// Create a hub with default configuration and the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(HubConfig::default())
    }

    /// Create a hub with custom configuration and the system clock.
    #[must_use]
    pub fn with_config(config: HubConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a hub with a custom clock.
    #[must_use]
    pub fn with_clock(config: HubConfig, clock: Arc<dyn Clock>) -> Self {
        info!("Creating hub with config: {:?}", config);
        Self {
            store: StateStore::new(),
            consumers: ConsumerRegistry::new(),
            clock,
            config,
        }
    }

    /// Producer state.
    #[must_use]
    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Connected consumers.
    #[must_use]
    pub fn consumers(&self) -> &ConsumerRegistry {
        &self.consumers
    }

    /// Hub configuration.
    #[must_use]
    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Current second-of-minute according to the hub's clock.
    #[must_use]
    pub fn now(&self) -> SecondOfMinute {
        self.clock.second_of_minute()
    }

    /// Get hub statistics.
    #[must_use]
    pub fn stats(&self) -> HubStats {
        HubStats {
            producers: self.store.len(),
            consumers: self.consumers.len(),
        }
    }

    /// Record a producer update and broadcast the new state.
    ///
    /// The sample is stamped with the hub's clock.
    pub fn ingest(&self, update: ProducerUpdate) -> BroadcastReport {
        let ProducerUpdate {
            id,
            username,
            beta,
            gamma,
        } = update;
        let sample = OrientationSample::new(username, beta, gamma, self.now());

        if self.store.put(id.as_str(), sample) {
            debug!(producer = %id, "New producer");
            metrics::set_producers_active(self.store.len());
        }
        metrics::record_sample();

        self.broadcast()
    }

    /// Register a consumer and send it the current state.
    pub fn attach_consumer(&self, handle: ConsumerHandle) -> BroadcastReport {
        let id = handle.id();
        if self.consumers.add(handle) {
            debug!(consumer = %id, "Consumer attached");
            metrics::set_consumers_active(self.consumers.len());
        }
        self.broadcast()
    }

    /// Deregister a consumer.
    ///
    /// Returns `true` only for the call that removed it.
    pub fn detach_consumer(&self, id: ConsumerId) -> bool {
        let removed = self.consumers.remove(id);
        if removed {
            debug!(consumer = %id, "Consumer detached");
            metrics::set_consumers_active(self.consumers.len());
        }
        removed
    }

    /// Push the current aggregate to every consumer.
    ///
    /// A consumer that has not written the previous aggregate yet only ever
    /// sees the newest one. Consumers whose session has ended are
    /// deregistered. Failures never abort the broadcast and are never
    /// returned as errors.
    pub fn broadcast(&self) -> BroadcastReport {
        let aggregate = self.store.snapshot().to_aggregate();
        let payload = match codec::encode_aggregate(&aggregate) {
            Ok(payload) => payload,
            Err(e) => {
                error!(error = %e, "Failed to encode aggregate");
                metrics::record_error("encode");
                return BroadcastReport::default();
            }
        };
        trace!(payload = %payload, "Sending aggregate");

        let mut report = BroadcastReport {
            payload_bytes: payload.len(),
            ..BroadcastReport::default()
        };

        self.consumers.for_each(|handle| {
            report.recipients += 1;
            match handle.send(Arc::clone(&payload)) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!(consumer = %handle.id(), error = %e, "Dropping consumer");
                    if self.consumers.remove(handle.id()) {
                        metrics::record_consumer_dropped(e.as_str());
                    }
                    report.dropped.push(handle.id());
                }
            }
        });

        if !report.dropped.is_empty() {
            metrics::set_consumers_active(self.consumers.len());
        }
        metrics::record_broadcast(report.recipients, report.delivered, report.payload_bytes);

        debug!(
            producers = aggregate.len(),
            recipients = report.recipients,
            delivered = report.delivered,
            dropped = report.dropped.len(),
            "Broadcast"
        );

        report
    }

    /// Evict producers older than the configured threshold.
    ///
    /// Returns the evicted producer ids.
    pub fn evict_stale(&self) -> Vec<String> {
        let now = self.now();
        let evicted = self
            .store
            .evict_stale(now, self.config.eviction_threshold_secs);

        if !evicted.is_empty() {
            for id in &evicted {
                debug!(producer = %id, "Evicted stale producer");
            }
            metrics::record_evictions(evicted.len());
            metrics::set_producers_active(self.store.len());
        }

        evicted
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}
