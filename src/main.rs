mod args;
mod artifacts;
mod client;
mod config;
mod dispatcher;
mod keys;
mod operations;
mod recipient;
mod types;

use anyhow::{Context, Result};
use args::{Cli, Commands};
use clap::Parser;
use client::{AlloyChainClient, check_connection};
use config::BatchConfig;
use dispatcher::Dispatcher;
use dotenv::dotenv;
use keys::KeyFile;
use rand::{SeedableRng, rngs::StdRng};
use std::fs::File;
use std::io::Write;
use std::time::Instant;
use tracing::{error, info};
use types::{OperationKind, OperationStatus, RunReport};

#[tokio::main]
async fn main() -> Result<()> {
    // Pick up RPC, TOKEN_ADDRESS, ... from a local .env if present
    dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Start(args) => {
            let config = BatchConfig::from_args(&args).context("Invalid configuration")?;
            info!(
                "Dispatching {} cycles with token {}",
                config.tx_count,
                config.token_address.to_checksum(None)
            );

            let client = AlloyChainClient::new(config.rpc_url.clone());
            let version = match check_connection(&client).await {
                Ok(version) => version,
                Err(e) => {
                    error!("Could not connect to RPC at {}: {}", config.rpc_url, e);
                    std::process::exit(1);
                }
            };
            info!("Connected to network: {}", version);

            let mut rng = match config.seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            let keys = KeyFile::new(&config.keys_path);

            let start_time = Instant::now();
            let report = match Dispatcher::new(&client, &keys, &config)
                .run(&mut rng)
                .await
            {
                Ok(report) => report,
                Err(aborted) => {
                    error!("Fatal error: {}", aborted.error);
                    print_summary(&aborted.report);
                    return Ok(());
                }
            };

            info!(
                "All cycles completed in {}ms",
                start_time.elapsed().as_millis()
            );
            print_summary(&report);
        }

        Commands::GenerateEnv { output } => {
            let mut file = File::create(&output)
                .context(format!("Failed to create env file at {:?}", output))?;
            file.write_all(config::SAMPLE_ENV.as_bytes())?;

            info!("Sample env file generated at {:?}", output);
            info!("Please edit the file with your actual configuration before starting.");
        }
    }

    Ok(())
}

fn status_label(status: Option<&OperationStatus>) -> &'static str {
    match status {
        Some(OperationStatus::Submitted(_)) => "SENT",
        Some(OperationStatus::Deployed { .. }) => "DEPLOYED",
        Some(OperationStatus::Failed(_)) => "FAILED",
        Some(OperationStatus::Skipped) | None => "SKIPPED",
    }
}

fn print_summary(report: &RunReport) {
    println!("\n{:-^100}", " RESULTS SUMMARY ");
    println!(
        "{:<5} {:<44} {:<44} {:<12} {:<10} {:<10} {:<10} {:<10}",
        "No.", "Sender", "Recipient", "Amount", "Native", "Deploy", "Write", "Token"
    );
    println!("{:-^100}", "");

    for cycle in &report.cycles {
        println!(
            "{:<5} {:<44} {:<44} {:<12} {:<10} {:<10} {:<10} {:<10}",
            cycle.cycle,
            cycle.sender.to_string(),
            cycle.recipient.to_string(),
            cycle.amount.to_string(),
            status_label(cycle.status_of(OperationKind::NativeTransfer)),
            status_label(cycle.status_of(OperationKind::Deploy)),
            status_label(cycle.status_of(OperationKind::ContractWrite)),
            status_label(cycle.status_of(OperationKind::TokenTransfer)),
        );
        for op in &cycle.operations {
            if let OperationStatus::Failed(err) = &op.status {
                println!("    {} error details: {}", op.kind, err);
            }
        }
    }

    // Print summary statistics
    println!("\n{:-^100}", " STATISTICS ");
    println!("Cycles executed: {}", report.executed);
    println!("Passes over key list: {}", report.passes);
    println!("Skipped keys: {}", report.skipped_keys);
    for kind in OperationKind::ALL {
        let statuses = report.cycles.iter().filter_map(|c| c.status_of(kind));
        let (mut ok, mut failed, mut skipped) = (0, 0, 0);
        for status in statuses {
            if status.is_success() {
                ok += 1;
            } else if *status == OperationStatus::Skipped {
                skipped += 1;
            } else {
                failed += 1;
            }
        }
        println!(
            "{:<15} ok: {:<5} failed: {:<5} skipped: {:<5}",
            kind.to_string(),
            ok,
            failed,
            skipped
        );
    }
}
