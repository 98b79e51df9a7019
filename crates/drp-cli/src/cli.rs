use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "drp",
    about = "DRP: replicated objects over a signed operation hashgraph",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Generate a keychain and print its public credential
    Keygen(KeygenArgs),
    /// Run peers concurrently against one object and check they converge
    Simulate(SimulateArgs),
}

#[derive(Args)]
pub struct KeygenArgs {
    /// 32-byte seed as 64 hex characters; random when omitted
    #[arg(long)]
    pub seed: Option<String>,
}

#[derive(Args)]
pub struct SimulateArgs {
    /// TOML simulation config; flags override its values
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub peers: Option<usize>,
    /// Operations per peer
    #[arg(long)]
    pub ops: Option<usize>,
    #[arg(long)]
    pub seed: Option<u64>,
    /// Sign and gossip finality attestations after convergence
    #[arg(long)]
    pub finality: bool,
}
