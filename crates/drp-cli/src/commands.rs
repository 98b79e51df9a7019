use colored::Colorize;

use drp_crypto::Keychain;

use crate::cli::*;
use crate::config::SimulationConfig;
use crate::simulation::{self, SimulationReport};

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Keygen(args) => cmd_keygen(args, cli.format),
        Command::Simulate(args) => cmd_simulate(args, cli.format).await,
    }
}

fn parse_seed(hex_seed: &str) -> anyhow::Result<[u8; 32]> {
    let bytes = hex::decode(hex_seed)?;
    bytes
        .try_into()
        .map_err(|b: Vec<u8>| anyhow::anyhow!("seed must be 32 bytes, got {}", b.len()))
}

fn cmd_keygen(args: KeygenArgs, format: OutputFormat) -> anyhow::Result<()> {
    let keychain = match &args.seed {
        Some(seed) => Keychain::from_seed(parse_seed(seed)?)?,
        None => Keychain::generate()?,
    };
    let credential = keychain.public_credential();
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&credential)?),
        OutputFormat::Text => {
            println!("{} Generated keychain", "✓".green().bold());
            println!("  Ed25519: {}", credential.ed25519_public_key.cyan());
            println!("  BLS:     {}", credential.bls_public_key.cyan());
        }
    }
    Ok(())
}

async fn cmd_simulate(args: SimulateArgs, format: OutputFormat) -> anyhow::Result<()> {
    let config = SimulationConfig::from_args(&args)?;
    let report = simulation::run(config.clone()).await?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print_report(&config, &report),
    }
    anyhow::ensure!(report.converged, "replicas diverged");
    Ok(())
}

fn print_report(config: &SimulationConfig, report: &SimulationReport) {
    println!(
        "Simulated {} peers x {} ops (seed {}) at {} in {} ms",
        config.peers.to_string().bold(),
        config.ops.to_string().bold(),
        config.seed,
        report.started_at.format("%Y-%m-%d %H:%M:%S"),
        report.elapsed_ms
    );
    for peer in &report.peers {
        let tip = peer
            .frontier
            .iter()
            .map(|h| h[..8].to_string())
            .collect::<Vec<_>>()
            .join(",");
        print!(
            "  {}  vertices {}  frontier [{}]  deferred {}",
            peer.peer.to_string().yellow(),
            peer.vertices,
            tip.dimmed(),
            peer.deferred
        );
        if config.finality {
            print!("  finalized {}", peer.finalized);
        }
        println!();
    }
    if let Some(first) = report.peers.first() {
        println!("  values: {:?}", first.values);
    }
    if report.converged {
        println!("{} All replicas converged", "✓".green().bold());
    } else {
        println!("{} Replicas diverged", "✗".red().bold());
    }
}
