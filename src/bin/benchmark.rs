//! Concurrent writer benchmark
//!
//! Run with: cargo run --bin benchmark --release -- --threads 100 --transactions 100 --size 10
//!
//! Every writer task owns one aggregate and appends `transactions` batches of
//! `size` events to the `benchmark` stream type.

use std::time::Instant;

use anyhow::Context;
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use typed_event_store::event_store::StorageBackend;
use typed_event_store::{db, AggregateIdentifier, Config, DomainEvent, EventStore};
use typed_event_store::{MemoryStorage, PostgresStorage};

const STREAM_TYPE: &str = "benchmark";

#[derive(Debug, Clone, Copy)]
struct BenchmarkArgs {
    threads: usize,
    transactions: usize,
    size: usize,
    postgres: bool,
    verify: bool,
}

fn parse_args() -> anyhow::Result<BenchmarkArgs> {
    let args: Vec<String> = std::env::args().collect();

    let number = |flag: &str, default: usize| -> anyhow::Result<usize> {
        match args.iter().position(|a| a == flag).and_then(|i| args.get(i + 1)) {
            Some(value) => value
                .parse()
                .with_context(|| format!("{} expects a number, got {:?}", flag, value)),
            None => Ok(default),
        }
    };

    let backend = args
        .iter()
        .position(|a| a == "--backend")
        .and_then(|i| args.get(i + 1))
        .map(String::as_str);

    let postgres = match backend {
        None => std::env::var("DATABASE_URL").is_ok(),
        Some("memory") => false,
        Some("postgres") => true,
        Some(other) => anyhow::bail!("unknown backend {:?} (memory|postgres)", other),
    };

    Ok(BenchmarkArgs {
        threads: number("--threads", 100)?,
        transactions: number("--transactions", 100)?,
        size: number("--size", 10)?,
        postgres,
        verify: args.iter().any(|a| a == "--verify"),
    })
}

/// Filter used when `RUST_LOG` is unset
const DEFAULT_LOG_FILTER: &str = "typed_event_store=info";

/// Initialize tracing/logging
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn run<B: StorageBackend>(store: EventStore<B>, args: BenchmarkArgs) -> anyhow::Result<()> {
    let start = Instant::now();

    let writers: Vec<_> = (0..args.threads)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move {
                let aggregate = AggregateIdentifier::from(uuid::Uuid::new_v4());
                let mut sequence = 0i64;

                for _ in 0..args.transactions {
                    let batch: Vec<DomainEvent> = (0..args.size)
                        .map(|_| {
                            let event = DomainEvent::new(
                                aggregate.clone(),
                                sequence,
                                json!({"type": "StubDomainEvent", "sequence": sequence}),
                            );
                            sequence += 1;
                            event
                        })
                        .collect();
                    store.append_events(STREAM_TYPE, &batch).await?;
                }

                Ok::<_, typed_event_store::EventStoreError>(aggregate)
            })
        })
        .collect();

    let mut aggregates = Vec::with_capacity(writers.len());
    for writer in writers {
        aggregates.push(writer.await??);
    }

    let elapsed = start.elapsed();
    let total = args.threads * args.transactions * args.size;
    let rate = total as f64 / elapsed.as_secs_f64();

    println!("\n=== Benchmark Results ===");
    println!(
        "{} writers concurrently wrote {} * {} events each",
        args.threads, args.transactions, args.size
    );
    println!("Total events: {}", total);
    println!("Time: {:.2}s", elapsed.as_secs_f64());
    println!("Rate: {:.0} events/sec", rate);

    if args.verify {
        let expected = args.transactions * args.size;
        for aggregate in &aggregates {
            let events = store.load_events(STREAM_TYPE, aggregate).await?;
            anyhow::ensure!(
                events.len() == expected,
                "aggregate {} has {} events, expected {}",
                aggregate,
                events.len(),
                expected
            );
            anyhow::ensure!(
                events.windows(2).all(|w| w[0].sequence_number < w[1].sequence_number),
                "aggregate {} read back out of order",
                aggregate
            );
        }
        println!("Verified {} aggregates", aggregates.len());
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = Config::from_env()?;
    let args = parse_args()?;

    if args.postgres {
        let pool = db::connect(&config).await?;
        let store = EventStore::with_options(PostgresStorage::new(pool.clone()), config.store_options());
        println!("Backend: postgres");
        run(store, args).await?;

        let tables = db::list_event_tables(&pool, &config.table_prefix).await?;
        println!("Event tables: {}", tables.join(", "));
        pool.close().await;
    } else {
        let store = EventStore::with_options(MemoryStorage::new(), config.store_options());
        println!("Backend: memory");
        run(store, args).await?;
    }

    Ok(())
}
