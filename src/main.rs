// Copyright (c) 2025 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use anyhow::Result;
use tracing::{info, warn};

use pollution_bench::assign::AssignmentPolicy;
use pollution_bench::config::AppConfig;
use pollution_bench::server;

fn main() -> Result<()> {
    let config = AppConfig::from_env()?;
    config.validate_all()?;

    // RUST_LOG wins over the configured level when both are set
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.observability.log_level)),
        )
        .init();

    print!("\x1b[1m\x1b[97m");
    println!("Pollution Bench - deliberately pollutable state service");
    print!("\x1b[0m");
    println!("(c) 2025 Bountyy Oy");
    println!();

    info!("Pollution Bench v{} - Starting", env!("CARGO_PKG_VERSION"));

    if config.store.assignment_policy == AssignmentPolicy::Unsafe {
        warn!("Unsafe assignment policy configured; this process is a live pollution target");
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(num_cpus::get())
        .thread_name("bench-worker")
        .enable_all()
        .build()?;

    info!(
        "[SUCCESS] Tokio runtime initialized with {} worker threads",
        num_cpus::get()
    );

    runtime.block_on(server::serve(config))?;

    Ok(())
}
