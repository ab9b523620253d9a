//! Learning Flows command line host
//!
//! Every subcommand plays one screen: it creates a lifecycle owner, drives it
//! through create/start, renders the component's state to stdout and
//! destroys the screen at the end.

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use frontend::actors::flattening::{self, FlattenMode};
use frontend::actors::{
    ConnectivityDomain, ConnectivityObserver, Countdown, Counter, Dinner, ScriptedConnectivity,
    Squares, TcpProbeConnectivity,
};
use frontend::config::{load_config, render_config};
use frontend::dataflow::{DispatchPolicy, LifecycleOwner};
use shared::AppConfig;
use std::convert::Infallible;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "learning-flows")]
#[command(about = "Reactive value streams and dispatch policies, one screen at a time")]
struct Cli {
    /// Config file (defaults to .learning-flows.toml in the working directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Press the increment button a few times
    Counter {
        #[arg(long, default_value = "3")]
        clicks: u32,
    },
    /// Count down and summarize the run
    Countdown,
    /// Square numbers into a shared flow watched by two slow collectors
    Squares {
        /// Extra numbers to square after the initial one
        numbers: Vec<i64>,
    },
    /// Serve dinner to a slow eater
    Dinner {
        /// Overrides the configured dispatch policy
        #[arg(long, value_enum)]
        policy: Option<PolicyArg>,
    },
    /// Expand recipe ids into recipe steps
    Flatten {
        #[arg(long, value_enum, default_value_t)]
        mode: FlattenMode,
    },
    /// Watch connectivity changes
    Connectivity {
        /// TCP endpoint to probe; without one a scripted flaky network is used
        #[arg(long)]
        probe: Option<String>,

        #[arg(long, default_value = "10")]
        seconds: u64,
    },
    /// Print the effective configuration as TOML
    PrintConfig,
}

#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
    Sequential,
    Buffered,
    Conflated,
    Latest,
}

impl PolicyArg {
    fn into_policy(self) -> DispatchPolicy {
        match self {
            PolicyArg::Sequential => DispatchPolicy::Sequential,
            PolicyArg::Buffered => DispatchPolicy::buffered(),
            PolicyArg::Conflated => DispatchPolicy::Conflated,
            PolicyArg::Latest => DispatchPolicy::LatestOnly,
        }
    }
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Commands::Counter { clicks } => counter_screen(clicks).await,
        Commands::Countdown => countdown_screen(&config).await,
        Commands::Squares { numbers } => squares_screen(&config, &numbers).await,
        Commands::Dinner { policy } => {
            let policy = policy.map_or(config.dispatch.policy, PolicyArg::into_policy);
            dinner_screen(&config, policy).await
        }
        Commands::Flatten { mode } => {
            let steps = flattening::collect_recipe_steps(mode).await;
            println!("{mode}: {steps:?}");
            Ok(())
        }
        Commands::Connectivity { probe, seconds } => {
            connectivity_screen(&config, probe, Duration::from_secs(seconds)).await
        }
        Commands::PrintConfig => {
            print!("{}", render_config(&config)?);
            Ok(())
        }
    }
}

fn open_screen(name: &str) -> LifecycleOwner {
    let owner = LifecycleOwner::new(name);
    owner.on_create();
    owner.on_start();
    owner.on_resume();
    owner
}

fn close_screen(owner: &LifecycleOwner) {
    owner.on_pause();
    owner.on_stop();
    owner.on_destroy();
}

async fn counter_screen(clicks: u32) -> anyhow::Result<()> {
    let owner = open_screen("counter");
    let counter = Counter::new(owner.lifecycle_scope());

    let count = counter.count();
    owner.collect_latest_lifecycle_flow(
        move || count.subscribe(),
        |count| async move {
            println!("count: {count}");
            Ok::<_, Infallible>(())
        },
    );

    for _ in 0..clicks {
        counter.increment_clicked_relay.send(());
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    counter
        .count()
        .wait_for(|count| *count == i64::from(clicks))
        .await
        .context("counter stopped before reaching the click count")?;

    close_screen(&owner);
    Ok(())
}

async fn countdown_screen(config: &AppConfig) -> anyhow::Result<()> {
    let owner = open_screen("countdown");
    let countdown = Countdown::new(owner.lifecycle_scope(), &config.countdown);

    let time = countdown.time();
    owner.collect_latest_lifecycle_flow(
        move || time.subscribe(),
        |time| async move {
            println!("time: {time}");
            Ok::<_, Infallible>(())
        },
    );

    countdown.start_countdown().join().await?;
    if let Some(summary) = countdown.summary().get() {
        println!(
            "even ticks: {}, sum: {}, sum from -15: {}",
            summary.even_count, summary.sum, summary.sum_with_offset
        );
    }

    close_screen(&owner);
    Ok(())
}

async fn squares_screen(config: &AppConfig, numbers: &[i64]) -> anyhow::Result<()> {
    let owner = open_screen("squares");
    let squares = Squares::new(owner.lifecycle_scope(), &config.shared_flow);
    for number in numbers {
        squares.square_number(*number)?;
    }

    let expected = squares.expected_collected();
    let collected = squares
        .collected()
        .wait_for(|seen| seen.len() >= expected)
        .await
        .context("collectors stopped early")?;
    for seen in collected {
        println!("{:?} collector: {}", seen.collector, seen.value);
    }
    println!("replay cache: {:?}", squares.squares().replay_cache());

    close_screen(&owner);
    Ok(())
}

async fn dinner_screen(config: &AppConfig, policy: DispatchPolicy) -> anyhow::Result<()> {
    let dinner = Dinner::new(&config.dinner);
    let report = dinner.serve(policy).await;

    println!("dinner served {}", report.policy);
    for event in &report.events {
        println!("{event}");
    }
    println!(
        "eaten: {:?} in {} ms ({} dropped, {} abandoned)",
        report.finished_dishes(),
        report.total_ms(),
        report.stats.dropped,
        report.stats.cancelled
    );
    Ok(())
}

async fn connectivity_screen(
    config: &AppConfig,
    probe: Option<String>,
    duration: Duration,
) -> anyhow::Result<()> {
    let observer: Box<dyn ConnectivityObserver> =
        match probe.or_else(|| config.connectivity.probe_addr.clone()) {
            Some(addr) => {
                log::info!("probing {addr}");
                Box::new(TcpProbeConnectivity::new(addr, &config.connectivity))
            }
            None => Box::new(ScriptedConnectivity::flaky_network()),
        };

    let owner = open_screen("connectivity");
    let domain = ConnectivityDomain::new(owner.lifecycle_scope(), observer.as_ref());

    let status = domain.status();
    owner.collect_lifecycle_flow(
        config.dispatch.policy,
        move || status.subscribe(),
        |status| async move {
            println!("connectivity: {status}");
            Ok::<_, Infallible>(())
        },
    );

    tokio::time::sleep(duration).await;
    close_screen(&owner);
    Ok(())
}
