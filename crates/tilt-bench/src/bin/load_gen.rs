//! End-to-end load generator for tilt-relay.
//!
//! Connects N producers sending orientation updates as fast as they can and
//! one consumer counting the aggregates it receives.

use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tilt_protocol::{codec, ProducerUpdate};
use tokio::sync::Barrier;
use tokio_tungstenite::{connect_async, tungstenite::Message};

const PRODUCER_URL: &str = "ws://127.0.0.1:8080/ws/web";
const CONSUMER_URL: &str = "ws://127.0.0.1:8080/ws/unity";
const WARMUP_SECS: u64 = 2;
const BENCH_SECS: u64 = 10;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().collect();
    let num_producers = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(16);

    println!("tilt-relay load generator");
    println!("Make sure the server is running: cargo run --release --bin tilt-relay");
    println!();

    run_load(num_producers).await;
}

async fn run_load(num_producers: usize) {
    println!("Producers: {}", num_producers);
    println!("Warmup: {}s, Measurement: {}s", WARMUP_SECS, BENCH_SECS);
    println!();

    let sent = Arc::new(AtomicU64::new(0));
    let received = Arc::new(AtomicU64::new(0));
    let largest = Arc::new(AtomicU64::new(0));
    let barrier = Arc::new(Barrier::new(num_producers + 2));

    let mut handles = Vec::new();

    {
        let received = Arc::clone(&received);
        let largest = Arc::clone(&largest);
        let barrier = Arc::clone(&barrier);
        handles.push(tokio::spawn(async move {
            if let Err(e) = run_consumer(received, largest, barrier).await {
                eprintln!("Consumer error: {}", e);
            }
        }));
    }

    for producer_id in 0..num_producers {
        let sent = Arc::clone(&sent);
        let barrier = Arc::clone(&barrier);
        handles.push(tokio::spawn(async move {
            if let Err(e) = run_producer(producer_id, sent, barrier).await {
                eprintln!("Producer {} error: {}", producer_id, e);
            }
        }));
    }

    barrier.wait().await;
    println!("All clients connected");

    println!("Warming up for {}s...", WARMUP_SECS);
    tokio::time::sleep(Duration::from_secs(WARMUP_SECS)).await;

    sent.store(0, Ordering::SeqCst);
    received.store(0, Ordering::SeqCst);
    let start = Instant::now();

    println!("Measuring for {}s...", BENCH_SECS);
    tokio::time::sleep(Duration::from_secs(BENCH_SECS)).await;

    let elapsed = start.elapsed().as_secs_f64();
    let total_sent = sent.load(Ordering::SeqCst);
    let total_received = received.load(Ordering::SeqCst);

    println!();
    println!("Results");
    println!("  Duration:          {:>10.2}s", elapsed);
    println!("  Updates sent:      {:>10}", total_sent);
    println!("  Updates/s:         {:>10.0}", total_sent as f64 / elapsed);
    println!("  Aggregates recv:   {:>10}", total_received);
    println!("  Aggregates/s:      {:>10.0}", total_received as f64 / elapsed);
    println!("  Largest aggregate: {:>10} producers", largest.load(Ordering::SeqCst));

    for handle in handles {
        handle.abort();
    }
}

async fn run_consumer(
    received: Arc<AtomicU64>,
    largest: Arc<AtomicU64>,
    barrier: Arc<Barrier>,
) -> Result<(), BoxError> {
    let (ws, _) = connect_async(CONSUMER_URL).await?;
    let (_sender, mut receiver) = ws.split();

    barrier.wait().await;

    while let Some(msg) = receiver.next().await {
        if let Message::Text(text) = msg? {
            let aggregate = codec::decode_aggregate(text.as_bytes())?;
            received.fetch_add(1, Ordering::Relaxed);
            largest.fetch_max(aggregate.len() as u64, Ordering::Relaxed);
        }
    }
    Ok(())
}

async fn run_producer(
    producer_id: usize,
    sent: Arc<AtomicU64>,
    barrier: Arc<Barrier>,
) -> Result<(), BoxError> {
    let (mut ws, _) = connect_async(PRODUCER_URL).await?;

    barrier.wait().await;

    let id = producer_id.to_string();
    let username = format!("load-{}", producer_id);
    let mut step = 0u64;
    loop {
        let angle = (step % 360) as f64;
        let update = ProducerUpdate::new(
            id.as_str(),
            username.as_str(),
            angle - 180.0,
            angle / 4.0 - 45.0,
        );
        let json = codec::encode_update(&update)?;
        ws.send(Message::Text(json)).await?;
        sent.fetch_add(1, Ordering::Relaxed);
        step += 1;
        // Let the consumer task keep up.
        tokio::task::yield_now().await;
    }
}
