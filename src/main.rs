use shardrank::config::RunConfig;
use shardrank::coordinator::barrier::{HttpCoordinator, IterationBarrier};
use shardrank::coordinator::reconcile::supervise_until_complete;
use shardrank::graph::partition::{FanoutOutcome, Partitioner};
use shardrank::graph::types::{PageId, RankRecord};
use shardrank::node::build_node;
use shardrank::store::object::{HttpObjectStore, MemoryObjectStore};
use shardrank::store::rank::{HttpRankStore, MemoryRankStore, RankStore};
use shardrank::worker::invoker::{HttpInvoker, LocalInvoker};
use shardrank::worker::runner::{self, WorkerContext};

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage(&args[0]);
        std::process::exit(1);
    }

    match args[1].as_str() {
        "serve" => serve(&args).await,
        "run" => run(&args).await,
        other => {
            eprintln!("Unknown command: {}", other);
            print_usage(&args[0]);
            std::process::exit(1);
        }
    }
}

fn print_usage(program: &str) {
    eprintln!("Usage:");
    eprintln!(
        "  {} run --relations <file.json> [--config <file.json>] [--end-iter N] \
         [--damping D] [--shard-size K] [--top N] [--node <http://addr>]",
        program
    );
    eprintln!("  {} serve --bind <addr:port>", program);
}

/// Hosts the shared state and accepts invocations. Remote drivers point
/// `run --node` at this address.
async fn serve(args: &[String]) -> anyhow::Result<()> {
    let mut bind_addr: Option<SocketAddr> = None;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--bind" => {
                bind_addr = Some(args[i + 1].parse()?);
                i += 2;
            }
            _ => {
                i += 1;
            }
        }
    }

    let bind_addr = bind_addr.expect("--bind is required");
    let node = build_node();

    tracing::info!("Node listening on {}", bind_addr);
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, node.router).await?;

    Ok(())
}

/// Drives a full run: partition, fan out, supervise to completion, report
/// the top ranks. Runs in-process unless `--node` points at a serve node.
async fn run(args: &[String]) -> anyhow::Result<()> {
    let mut relations_path: Option<String> = None;
    let mut config = RunConfig::default();
    let mut node_url: Option<String> = None;
    let mut top = 10usize;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--relations" => {
                relations_path = Some(args[i + 1].clone());
                i += 2;
            }
            "--config" => {
                config = RunConfig::from_file(&args[i + 1])?;
                i += 2;
            }
            "--end-iter" => {
                config.end_iter = args[i + 1].parse()?;
                i += 2;
            }
            "--damping" => {
                config.damping = args[i + 1].parse()?;
                i += 2;
            }
            "--shard-size" => {
                config.target_shard_size = args[i + 1].parse()?;
                i += 2;
            }
            "--top" => {
                top = args[i + 1].parse()?;
                i += 2;
            }
            "--node" => {
                node_url = Some(args[i + 1].trim_end_matches('/').to_string());
                i += 2;
            }
            _ => {
                i += 1;
            }
        }
    }

    let relations_path = relations_path.expect("--relations is required");
    config.validate()?;

    let raw = std::fs::read_to_string(&relations_path)?;
    let relations: BTreeMap<PageId, Vec<PageId>> = serde_json::from_str(&raw)?;
    tracing::info!(
        "Loaded {} pages from {}",
        relations.len(),
        relations_path
    );

    let records = match node_url {
        Some(url) => run_against_node(&url, config, relations).await?,
        None => run_in_process(config, relations).await?,
    };

    report_top_ranks(records, top);
    Ok(())
}

/// Single-process mode: memory-backed stores, the in-process barrier, and a
/// channel-backed invoker feeding the dispatch loop.
async fn run_in_process(
    config: RunConfig,
    relations: BTreeMap<PageId, Vec<PageId>>,
) -> anyhow::Result<Vec<RankRecord>> {
    let rank_store = Arc::new(MemoryRankStore::new());
    let object_store = Arc::new(MemoryObjectStore::new());
    let barrier = Arc::new(IterationBarrier::new(0));
    let pages: Vec<PageId> = relations.keys().cloned().collect();

    let (invoker, rx) = LocalInvoker::new();
    let invoker = Arc::new(invoker);
    let ctx = WorkerContext::new(
        rank_store.clone(),
        object_store.clone(),
        barrier.clone(),
        invoker.clone(),
    );
    runner::spawn_dispatcher(ctx, rx);

    let partitioner = Partitioner::new(
        object_store,
        rank_store.clone(),
        barrier.clone(),
        invoker.clone(),
        config,
    );

    let outcome = partitioner.run(relations).await?;
    log_submission_failures(&outcome);

    supervise_until_complete(
        &*barrier,
        &*invoker,
        &outcome.payloads,
        outcome.plan.end_iter,
        Duration::from_secs(5),
    )
    .await?;
    tracing::info!("Run {} complete", outcome.run_id);

    collect_ranks(&*rank_store, &pages).await
}

/// Remote mode: every interface is the HTTP-backed implementation pointed at
/// one serve node.
async fn run_against_node(
    url: &str,
    config: RunConfig,
    relations: BTreeMap<PageId, Vec<PageId>>,
) -> anyhow::Result<Vec<RankRecord>> {
    let object_store = Arc::new(HttpObjectStore::new(url));
    let rank_store = Arc::new(HttpRankStore::new(url));
    let coordinator = Arc::new(HttpCoordinator::new(url));
    let invoker = Arc::new(HttpInvoker::new(url));
    let pages: Vec<PageId> = relations.keys().cloned().collect();

    let partitioner = Partitioner::new(
        object_store,
        rank_store.clone(),
        coordinator.clone(),
        invoker.clone(),
        config,
    );

    let outcome = partitioner.run(relations).await?;
    log_submission_failures(&outcome);

    supervise_until_complete(
        &*coordinator,
        &*invoker,
        &outcome.payloads,
        outcome.plan.end_iter,
        Duration::from_secs(5),
    )
    .await?;
    tracing::info!("Run {} complete on node {}", outcome.run_id, url);

    collect_ranks(&*rank_store, &pages).await
}

fn log_submission_failures(outcome: &FanoutOutcome) {
    for (shard, reason) in &outcome.submission_failures {
        tracing::error!(
            "Shard {} was not submitted at fan-out ({}); supervision will re-invoke it",
            shard,
            reason
        );
    }
}

async fn collect_ranks<S: RankStore>(
    store: &S,
    pages: &[PageId],
) -> anyhow::Result<Vec<RankRecord>> {
    let mut records = Vec::with_capacity(pages.len());
    for page in pages {
        match store.get(page).await? {
            Some(record) => records.push(record),
            None => tracing::warn!("No final record for page {}", page),
        }
    }
    Ok(records)
}

fn report_top_ranks(mut records: Vec<RankRecord>, top: usize) {
    records.sort_by(|a, b| b.rank.total_cmp(&a.rank));
    let total: f64 = records.iter().map(|r| r.rank).sum();

    println!("Total rank mass: {:.6}", total);
    println!("Top {} pages:", top.min(records.len()));
    for record in records.iter().take(top) {
        println!(
            "  {:<24} rank {:.6} (iteration {}, weight {})",
            record.page.to_string(),
            record.rank,
            record.iteration,
            record.weight
        );
    }
}
