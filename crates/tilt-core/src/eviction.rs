//! Periodic removal of producers that stopped reporting.

use crate::hub::Hub;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Default time between eviction scans.
pub const DEFAULT_EVICTION_INTERVAL: Duration = Duration::from_secs(10);

const MIN_EVICTION_INTERVAL: Duration = Duration::from_millis(1);

/// Spawn the eviction loop on the current runtime.
///
/// The loop runs until `shutdown` is cancelled.
pub fn spawn_eviction_task(
    hub: Arc<Hub>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(run_eviction_loop(hub, interval, shutdown))
}

/// Scan the hub every `interval` and evict stale producers.
///
/// The first scan happens one full interval after the loop starts.
pub async fn run_eviction_loop(hub: Arc<Hub>, interval: Duration, shutdown: CancellationToken) {
    let period = interval.max(MIN_EVICTION_INTERVAL);
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        interval_ms = period.as_millis() as u64,
        threshold_secs = hub.config().eviction_threshold_secs,
        "Eviction loop started"
    );

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                let evicted = hub.evict_stale();
                debug!(
                    evicted = evicted.len(),
                    remaining = hub.store().len(),
                    "Eviction scan"
                );
            }
        }
    }

    info!("Eviction loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{ManualClock, SecondOfMinute};
    use crate::hub::HubConfig;
    use tilt_protocol::ProducerUpdate;

    fn sec(s: u8) -> SecondOfMinute {
        SecondOfMinute::new(s).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_scan_after_one_interval() {
        let clock = Arc::new(ManualClock::new(sec(0)));
        let hub = Arc::new(Hub::with_clock(HubConfig::default(), clock.clone()));
        hub.ingest(ProducerUpdate::new("1", "a", 0.0, 0.0));
        clock.set(sec(30));

        let token = CancellationToken::new();
        let handle = spawn_eviction_task(Arc::clone(&hub), Duration::from_secs(10), token.clone());

        time::sleep(Duration::from_secs(5)).await;
        assert_eq!(hub.store().len(), 1);

        time::sleep(Duration::from_secs(6)).await;
        assert!(hub.store().is_empty());

        token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_producers_survive_scans() {
        let clock = Arc::new(ManualClock::new(sec(55)));
        let hub = Arc::new(Hub::with_clock(HubConfig::default(), clock.clone()));
        hub.ingest(ProducerUpdate::new("1", "a", 0.0, 0.0));

        let token = CancellationToken::new();
        let handle = spawn_eviction_task(Arc::clone(&hub), Duration::from_secs(10), token.clone());

        for _ in 0..3 {
            clock.advance(10);
            hub.ingest(ProducerUpdate::new("1", "a", 0.0, 0.0));
            time::sleep(Duration::from_secs(10)).await;
            assert!(hub.store().contains("1"));
        }

        token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_cancel_stops_loop() {
        let hub = Arc::new(Hub::new());
        let token = CancellationToken::new();
        let handle = spawn_eviction_task(hub, Duration::from_secs(3600), token.clone());

        token.cancel();
        time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("eviction loop did not stop")
            .unwrap();
    }
}
