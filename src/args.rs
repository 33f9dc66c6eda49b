use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author = "Vladislav Dyachenko")]
#[command(version = "0.1.0")]
#[command(about = "EVM batch transaction dispatcher")]
#[command(
    long_about = "Sends, for every private key in a key list, a native transfer, a contract \
    deployment, a follow-up contract write and a token transfer to a recipient sampled from \
    the latest block, until the requested number of cycles has been attempted."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start dispatching transaction cycles
    Start(StartArgs),

    /// Generate a sample .env file
    GenerateEnv {
        /// Path to output env file
        #[arg(short, long, default_value = ".env")]
        output: PathBuf,
    },
}

#[derive(Args, Debug, Clone)]
pub struct StartArgs {
    /// JSON-RPC endpoint of the chain
    #[arg(long, env = "RPC")]
    pub rpc: String,

    /// ERC-20 token contract used for token transfers
    #[arg(long, env = "TOKEN_ADDRESS")]
    pub token_address: String,

    /// Lower bound of the sampled transfer amount
    #[arg(long, env = "AMOUNTMIN")]
    pub amount_min: f64,

    /// Upper bound of the sampled transfer amount
    #[arg(long, env = "AMOUNTMAX")]
    pub amount_max: f64,

    /// Number of key cycles to attempt
    #[arg(long, env = "TX_COUNT")]
    pub tx_count: u64,

    /// Newline-delimited private key list, re-read on every pass
    #[arg(short, long, env = "KEYS_FILE", default_value = "pvkeylist.txt")]
    pub keys: PathBuf,

    /// ERC-20 interface description
    #[arg(long, default_value = "artifacts/erc20_abi.json")]
    pub erc20_abi: PathBuf,

    /// Storage contract interface description
    #[arg(long, default_value = "artifacts/simple_storage_abi.json")]
    pub storage_abi: PathBuf,

    /// Storage contract deployment bytecode (hex)
    #[arg(long, default_value = "artifacts/simple_storage_bytecode.txt")]
    pub storage_bytecode: PathBuf,

    /// Delay in seconds between two cycles
    #[arg(long, default_value = "5")]
    pub pacing_secs: u64,

    /// Timeout in seconds for the deployment receipt
    #[arg(long, default_value = "120")]
    pub receipt_timeout_secs: u64,

    /// Max fee per gas, in gwei
    #[arg(long, default_value = "3")]
    pub max_fee_gwei: u64,

    /// Max priority fee per gas, in gwei
    #[arg(long, default_value = "1")]
    pub priority_fee_gwei: u64,

    /// Abort after this many consecutive passes without progress
    #[arg(long, env = "MAX_IDLE_PASSES")]
    pub max_idle_passes: Option<u32>,

    /// Seed for recipient, amount and argument sampling
    #[arg(long, env = "SEED")]
    pub seed: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_args_from_flags() {
        let cli = Cli::try_parse_from([
            "evm-batch-dispatcher",
            "start",
            "--rpc",
            "http://localhost:8545",
            "--token-address",
            "0x5FbDB2315678afecb367f032d93F642f64180aa3",
            "--amount-min",
            "0.01",
            "--amount-max",
            "0.02",
            "--tx-count",
            "3",
        ])
        .unwrap();

        let Commands::Start(args) = cli.command else {
            panic!("expected start command");
        };
        assert_eq!(args.tx_count, 3);
        assert_eq!(args.pacing_secs, 5);
        assert_eq!(args.max_fee_gwei, 3);
        assert_eq!(args.priority_fee_gwei, 1);
        assert_eq!(args.keys, PathBuf::from("pvkeylist.txt"));
        assert!(args.max_idle_passes.is_none());
    }

    #[test]
    fn help_carries_author_and_version() {
        let command = <Cli as clap::CommandFactory>::command();
        assert_eq!(command.get_author(), Some("Vladislav Dyachenko"));
        assert_eq!(command.get_version(), Some("0.1.0"));
    }

    #[test]
    fn generate_env_default_output() {
        let cli = Cli::try_parse_from(["evm-batch-dispatcher", "generate-env"]).unwrap();
        match cli.command {
            Commands::GenerateEnv { output } => assert_eq!(output, PathBuf::from(".env")),
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
