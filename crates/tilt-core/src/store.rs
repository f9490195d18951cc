//! Latest orientation per producer.
//!
//! The store keeps exactly one sample per producer id. Entries are never
//! removed when a producer disconnects; they age out through
//! [`StateStore::evict_stale`].

use crate::clock::SecondOfMinute;
use dashmap::DashMap;
use std::collections::BTreeMap;
use tilt_protocol::{aggregate_key, Aggregate, DeviceOrientation};
use tracing::trace;

/// The latest reading from one producer.
#[derive(Debug, Clone, PartialEq)]
pub struct OrientationSample {
    /// Free-text label, not used as a key.
    pub display_name: String,
    /// Forward/back tilt in degrees.
    pub forward_back_tilt: f64,
    /// Left/right tilt in degrees.
    pub left_right_tilt: f64,
    /// When the server recorded this sample.
    pub last_update: SecondOfMinute,
}

impl OrientationSample {
    /// Create a new sample.
    #[must_use]
    pub fn new(
        display_name: impl Into<String>,
        forward_back_tilt: f64,
        left_right_tilt: f64,
        last_update: SecondOfMinute,
    ) -> Self {
        Self {
            display_name: display_name.into(),
            forward_back_tilt,
            left_right_tilt,
            last_update,
        }
    }

    /// Seconds since this sample was recorded, as seen at `now`.
    #[must_use]
    pub fn age(&self, now: SecondOfMinute) -> u8 {
        now.since(self.last_update)
    }

    /// Convert to the consumer wire representation.
    #[must_use]
    pub fn to_device_orientation(&self) -> DeviceOrientation {
        DeviceOrientation {
            username: self.display_name.clone(),
            fb_tilt: self.forward_back_tilt,
            lr_tilt: self.left_right_tilt,
            last_update: self.last_update.get(),
        }
    }
}

/// A point-in-time copy of the store, ordered by producer id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    entries: BTreeMap<String, OrientationSample>,
}

impl Snapshot {
    /// Number of producers in the snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the snapshot is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get the sample for a producer.
    #[must_use]
    pub fn get(&self, producer_id: &str) -> Option<&OrientationSample> {
        self.entries.get(producer_id)
    }

    /// Iterate over `(producer_id, sample)` pairs in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &OrientationSample)> {
        self.entries.iter().map(|(id, sample)| (id.as_str(), sample))
    }

    /// Build the consumer aggregate.
    ///
    /// Producers whose id is not an integer are left out. When several ids
    /// parse to the same integer (`"1"` and `"01"`), the smallest raw id wins.
    #[must_use]
    pub fn to_aggregate(&self) -> Aggregate {
        let mut aggregate = Aggregate::new();
        for (id, sample) in &self.entries {
            match aggregate_key(id) {
                Some(key) => {
                    aggregate
                        .entry(key)
                        .or_insert_with(|| sample.to_device_orientation());
                }
                None => trace!(producer = %id, "Skipping non-numeric producer id"),
            }
        }
        aggregate
    }
}

/// Concurrent map from producer id to its latest sample.
#[derive(Debug, Default)]
pub struct StateStore {
    entries: DashMap<String, OrientationSample>,
}

impl StateStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the sample for a producer.
    ///
    /// Returns `true` if the producer was not present before.
    pub fn put(&self, producer_id: impl Into<String>, sample: OrientationSample) -> bool {
        self.entries.insert(producer_id.into(), sample).is_none()
    }

    /// Remove a producer. Removing an absent producer is a no-op.
    pub fn remove(&self, producer_id: &str) -> Option<OrientationSample> {
        self.entries.remove(producer_id).map(|(_, sample)| sample)
    }

    /// Get a copy of the sample for a producer.
    #[must_use]
    pub fn get(&self, producer_id: &str) -> Option<OrientationSample> {
        self.entries.get(producer_id).map(|e| e.value().clone())
    }

    /// Check if a producer is present.
    #[must_use]
    pub fn contains(&self, producer_id: &str) -> bool {
        self.entries.contains_key(producer_id)
    }

    /// Number of producers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy out every entry.
    ///
    /// Concurrent writers are not blocked for the whole copy, only per
    /// shard, so the snapshot may mix entries from before and after a
    /// concurrent `put`. Each individual entry is always whole.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            entries: self
                .entries
                .iter()
                .map(|e| (e.key().clone(), e.value().clone()))
                .collect(),
        }
    }

    /// Remove every producer whose sample is older than `threshold_secs`.
    ///
    /// Age is measured modulo one minute from `now`. An entry is removed
    /// only if its age is strictly greater than the threshold. Returns the
    /// removed ids.
    pub fn evict_stale(&self, now: SecondOfMinute, threshold_secs: u8) -> Vec<String> {
        let mut evicted = Vec::new();
        self.entries.retain(|id, sample| {
            if sample.age(now) > threshold_secs {
                evicted.push(id.clone());
                false
            } else {
                true
            }
        });
        evicted
    }
}
