//! # ProofPulse — social proof engine runner
//!
//! Runs the engine headless and logs what a UI would show.
//!
//! Usage:
//!   proofpulse                                  # Defaults, offline backend
//!   proofpulse --backend-url http://api:8080    # Reconcile against a real backend
//!   proofpulse --run-for 60 --seed 7            # Reproducible one-minute run

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use proofpulse_core::{EngineConfigPatch, ProofPulseConfig};
use proofpulse_engine::{
    HttpBackend, OfflineBackend, ProofEngine, SnapshotStore, StateChange, StatsBackend,
    TestimonialQuery,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "proofpulse",
    version,
    about = "📣 ProofPulse — real-time social proof engine"
)]
struct Cli {
    /// Config file (default: ~/.proofpulse/config.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Stats backend base URL (overrides config)
    #[arg(long)]
    backend_url: Option<String>,

    /// Stop after N seconds (0 = run until Ctrl-C)
    #[arg(long, default_value = "0")]
    run_for: u64,

    /// RNG seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn expand_path(p: &str) -> String {
    shellexpand::tilde(p).to_string()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "proofpulse=debug,proofpulse_engine=debug"
    } else {
        "proofpulse=info,proofpulse_engine=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    let mut config = match &cli.config {
        Some(path) => ProofPulseConfig::load_from(Path::new(&expand_path(path)))?,
        None => ProofPulseConfig::load()?,
    };
    if let Some(url) = &cli.backend_url {
        config.backend.base_url = url.clone();
    }

    let backend: Arc<dyn StatsBackend> = if config.backend.base_url.is_empty() {
        tracing::info!("📴 No backend configured — stats are simulated only");
        Arc::new(OfflineBackend)
    } else {
        Arc::new(HttpBackend::from_config(&config.backend)?)
    };

    let mut builder =
        ProofEngine::builder(backend).leaderboard_limit(config.backend.leaderboard_limit);
    if let Some(seed) = cli.seed {
        builder = builder.seed(seed);
    }
    if config.snapshot.enabled {
        let path = expand_path(&config.snapshot.resolved_path().to_string_lossy());
        builder = builder.snapshot_store(SnapshotStore::new(Path::new(&path)));
    }
    let engine = builder.build();

    let observer = engine.downgrade();
    let _proofs = engine.subscribe(move |change| {
        if !matches!(change, StateChange::Promoted { .. }) {
            return;
        }
        let Some(engine) = observer.upgrade() else {
            return;
        };
        if let Some(item) = engine.current_proof() {
            tracing::info!(
                "{} {} — {} [{}]",
                item.icon,
                item.title,
                item.description,
                item.priority
            );
        }
    });
    let _stats = engine.subscribe_to_stats(|stats| {
        tracing::debug!(
            "📊 {} active · {} signups today · {} workflows · {}h saved",
            stats.active_users,
            stats.signups_today,
            stats.workflows_run,
            stats.time_saved
        );
    });

    let featured = engine.testimonials(&TestimonialQuery {
        featured: Some(true),
        limit: Some(1),
    });
    if let Some(t) = featured.first() {
        tracing::info!("💬 \"{}\" — {}, {}", t.content, t.author.name, t.author.company);
    }

    engine.initialize(EngineConfigPatch::from(config.engine.clone()))?;
    println!("📣 ProofPulse v{}", env!("CARGO_PKG_VERSION"));

    if cli.run_for > 0 {
        tokio::select! {
            _ = tokio::time::sleep(std::time::Duration::from_secs(cli.run_for)) => {}
            _ = tokio::signal::ctrl_c() => {}
        }
    } else {
        tokio::signal::ctrl_c().await?;
    }

    let status = engine.status();
    engine.destroy();
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}
