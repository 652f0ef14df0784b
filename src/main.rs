use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use airq::AirQualityAnalyzer;
use airq::cluster::{api, DistributedReducer};
use airq::cluster::group::CollectiveGroup;
use airq::config::Config;
use airq::manager::SystemProfile;
use airq::reducer::{ExecutionModel, TimedReduction};
use airq::report;
use airq::server::AirQualityServer;

#[derive(Parser, Clone, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// JSON config file (scoring weights, dataset, sweep plan, addresses)
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    /// Record table to analyse instead of the built-in sample hours
    #[clap(long, global = true)]
    dataset: Option<PathBuf>,

    #[clap(subcommand)]
    command: Mode,
}

#[derive(Subcommand, Clone, Debug)]
enum Mode {
    /// Run the reduction once per worker count and report timings
    Sweep {
        /// Comma-separated worker counts, e.g. 1,2,4
        #[clap(long, value_delimiter = ',')]
        threads: Vec<usize>,

        #[clap(long, value_enum, default_value = "shared")]
        model: Model,
    },

    /// Join a distributed process group as one rank
    Node {
        #[clap(long)]
        rank: usize,

        #[clap(long)]
        size: usize,

        /// Coordinator address; defaults to the config's coordinator_addr
        #[clap(long)]
        coordinator: Option<String>,

        /// Host the coordinator on this port (normally on rank 0)
        #[clap(long)]
        host_port: Option<u16>,

        #[clap(long, default_value = "0")]
        round: u64,
    },

    /// Serve reductions over TCP for airq-cli
    Serve {
        #[clap(long)]
        addr: Option<String>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
enum Model {
    Sequential,
    Shared,
    Distributed,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let profile = SystemProfile::detect();

    println!("--- [airq Resource Manager] ---");
    println!("Detected Cores: {}", profile.logical_cores);
    println!("Runtime Threads: {}", profile.worker_threads);
    println!("Default Sweep: {:?}", profile.sweep_plan());
    println!("-------------------------------");

    tokio::runtime::Builder::new_multi_thread()
    .worker_threads(profile.worker_threads)
    .enable_all()
    .build()?
    .block_on(async_main(profile))
}

async fn async_main(profile: SystemProfile) -> Result<(), Box<dyn std::error::Error>> {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info,airq=info");
    }
    tracing_subscriber::fmt()
    .with_target(false)
    .with_level(true)
    .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if args.dataset.is_some() {
        config.dataset = args.dataset.clone();
    }
    let analyzer = AirQualityAnalyzer::from_config(&config)?;

    match args.command {
        Mode::Sweep { threads, model } => {
            let plan = if !threads.is_empty() {
                threads
            } else if !config.sweep.is_empty() {
                config.sweep.clone()
            } else {
                profile.sweep_plan()
            };
            run_sweep(&analyzer, model, &plan).await
        }
        Mode::Node { rank, size, coordinator, host_port, round } => {
            let coordinator = coordinator.unwrap_or_else(|| config.coordinator_addr.clone());
            run_node(&analyzer, rank, size, coordinator, host_port, round).await
        }
        Mode::Serve { addr } => {
            let addr = addr.unwrap_or_else(|| config.server_addr.clone());
            let server = AirQualityServer::new(analyzer);
            println!("airq server listening on {}", addr);

            tokio::select! {
                res = server.run(&addr) => res?,
                _ = tokio::signal::ctrl_c() => println!("Shutting down."),
            }
            Ok(())
        }
    }
}

async fn run_sweep(analyzer: &AirQualityAnalyzer, model: Model, plan: &[usize]) -> Result<(), Box<dyn std::error::Error>> {
    println!("PERFORMANCE TEST - {} WORKER COUNTS", plan.len());
    println!("=========================================");

    for (i, &workers) in plan.iter().enumerate() {
        println!("\n\nTEST {}: {} WORKER(S)", i + 1, workers);
        println!("-----------------------------------------");

        let run = match model {
            Model::Sequential => analyzer.reduce(ExecutionModel::Sequential, workers)?,
            Model::Shared => {
                let analyzer = analyzer.clone();
                tokio::task::spawn_blocking(move || analyzer.reduce(ExecutionModel::SharedMemory, workers)).await??
            }
            Model::Distributed => analyzer.reduce_distributed(workers).await?,
        };
        print_run(analyzer, model, &run);
    }

    println!("\n\n=========================================");
    Ok(())
}

fn print_run(analyzer: &AirQualityAnalyzer, model: Model, run: &TimedReduction) {
    let r = &run.result;
    println!("\n========== AIR QUALITY ANALYSIS ({:?}) ==========", model);
    println!("Scoring Formula: {}", analyzer.scoring().formula());
    println!("Number of Workers: {}", run.workers);
    println!("Execution Time: {:.6} seconds", run.elapsed.as_secs_f64());
    println!("Total Records Processed: {} hours\n", analyzer.records().len());
    print!("{}", report::extreme("BEST AIR QUALITY (LOWEST SCORE)", r.best(), analyzer.records().get(r.best_index)));
    println!();
    print!("{}", report::extreme("WORST AIR QUALITY (HIGHEST SCORE)", r.worst(), analyzer.records().get(r.worst_index)));
    println!("\n=================================================");
}

async fn run_node(
    analyzer: &AirQualityAnalyzer,
    rank: usize,
    size: usize,
    coordinator: String,
    host_port: Option<u16>,
    round: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(port) = host_port {
        let group = Arc::new(CollectiveGroup::new(size));
        let (addr, server) = api::bind_collective_api(group, SocketAddr::from(([0, 0, 0, 0], port)))?;
        tokio::spawn(server);
        println!("Collective coordinator listening on {}", addr);
    }

    let member = DistributedReducer::new(rank, size, coordinator)?;
    println!("--- airq Node {} of {} ---", member.rank(), member.size());

    let start = std::time::Instant::now();
    let result = member
    .reduce(analyzer.records().clone(), Arc::new(*analyzer.scoring()), round)
    .await?;
    let run = TimedReduction { result, workers: member.size(), elapsed: start.elapsed() };

    // Every rank holds the result; only rank 0 reports it.
    if member.rank() == 0 {
        print_run(analyzer, Model::Distributed, &run);
    }

    // The coordinator must stay up until every rank has read its reply.
    if host_port.is_some() {
        println!("Coordinator stays up for late ranks; press Ctrl+C to exit.");
        tokio::signal::ctrl_c().await?;
        println!("Shutting down.");
    }
    Ok(())
}
