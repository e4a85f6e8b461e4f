// Shielded pool command line
// Trusted setup, an in-memory demo and inspection of a persisted pool log

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use shielded_pool::{
    client::TransactionRequest,
    format_units, parse_units, prepare_transaction,
    zkp::trusted_setup::TrustedSetup,
    Address, Arity, AssetCustodian, Groth16ProofSystem, InMemoryCustodian, Keypair, Note, PoolConfig, PoolHandle,
    PoolStore, ShieldedPool, SledPoolStore, TOKEN_DECIMALS,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(name = "shielded-pool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate Groth16 keys for both circuit arities
    Setup {
        /// Merkle tree height the circuits are built for
        #[arg(long, default_value = "5")]
        height: usize,
        /// Output directory for keys and the setup transcript
        #[arg(short, long, default_value = "./keys")]
        keys_dir: PathBuf,
    },
    /// Deposit through the bridge and withdraw part of it, in memory
    Demo {
        #[arg(long, default_value = "5")]
        height: usize,
        /// Deposit amount in tokens
        #[arg(long, default_value = "0.1")]
        deposit: String,
        /// Withdrawal amount in tokens
        #[arg(long, default_value = "0.08")]
        withdraw: String,
    },
    /// Replay a persisted pool log and print its state
    Inspect {
        /// Data directory of the pool log
        #[arg(short, long, default_value = "./data")]
        data_dir: PathBuf,
        /// Pool config file; defaults plus environment otherwise
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Setup { height, keys_dir } => run_setup(height, keys_dir).await,
        Commands::Demo { height, deposit, withdraw } => run_demo(height, &deposit, &withdraw).await,
        Commands::Inspect { data_dir, config } => inspect_pool(data_dir, config).await,
    }
}

async fn run_setup(height: usize, keys_dir: PathBuf) -> Result<()> {
    let setup = TrustedSetup::new(&keys_dir, height);
    let (_, transcript) = setup
        .run(&mut rand::rngs::OsRng)
        .await
        .context("trusted setup failed")?;

    println!("✅ Keys generated at: {}", keys_dir.display());
    for circuit in &transcript.circuits {
        println!("   {} vk hash: {}", circuit.circuit_id, circuit.verifying_key_hash);
    }
    Ok(())
}

async fn run_demo(height: usize, deposit: &str, withdraw: &str) -> Result<()> {
    let deposit_amount = parse_units(deposit, TOKEN_DECIMALS)?;
    let withdraw_amount = parse_units(withdraw, TOKEN_DECIMALS)?;
    let change_amount = deposit_amount
        .checked_sub(withdraw_amount)
        .context("withdrawal exceeds deposit")?;

    let mut config = PoolConfig::from_env()?;
    config.tree_height = height;
    config.validate()?;
    let relay = config.bridge.relay;
    let asset = config.bridge.asset;
    let pool_account = config.pool_account;

    info!("⚙️  Generating demo keys for height {}", height);
    let (keys, _) = TrustedSetup::generate(height, &[Arity::Small], &mut rand::rngs::OsRng)?;
    let prover = Arc::new(Groth16ProofSystem::new(keys));

    let mut custodian = InMemoryCustodian::new();
    custodian.mint(&relay, deposit_amount);
    let pool = ShieldedPool::new(config, prover.clone(), custodian)?;
    let handle = PoolHandle::new(pool);

    // Deposit through the bridge
    let alice = Keypair::generate();
    let deposit_note = Note::new(deposit_amount, alice.public_key());
    let snapshot = handle.snapshot().await;
    let prepared = prepare_transaction(
        &snapshot,
        prover.as_ref(),
        TransactionRequest::new().output(deposit_note.clone()),
    )?;
    handle
        .with_pool(|pool| pool.custodian_mut().transfer(&relay, &pool_account, deposit_amount))
        .await?;
    let applied = handle
        .on_external_deposit(relay, asset, deposit_amount, prepared.bridge_payload()?)
        .await?;
    println!("📥 Deposited {} at leaf {}", format_units(deposit_amount, TOKEN_DECIMALS), applied.first_index);

    // Withdraw part of it, keeping the change shielded
    let recipient = Address::from_hex("0xDeaD00000000000000000000000000000000BEEf")?;
    let snapshot = handle.snapshot().await;
    let prepared = prepare_transaction(
        &snapshot,
        prover.as_ref(),
        TransactionRequest::new()
            .spend(deposit_note, &alice)
            .output(Note::new(change_amount, alice.public_key()))
            .recipient(recipient),
    )?;
    let applied = handle.transact(prepared.transaction).await?;
    println!("📤 Withdrew {} to {}, change at leaf {}", withdraw, recipient, applied.first_index);

    let (recipient_balance, pool_balance) = handle
        .with_pool(|pool| (pool.custodian().balance_of(&recipient), pool.pool_balance()))
        .await;
    println!("💰 Recipient balance: {}", format_units(recipient_balance, TOKEN_DECIMALS));
    println!("🏦 Pool balance: {}", format_units(pool_balance, TOKEN_DECIMALS));
    println!("🌳 Root: {}", handle.root().await);
    Ok(())
}

async fn inspect_pool(data_dir: PathBuf, config: Option<PathBuf>) -> Result<()> {
    let config = match config {
        Some(path) => PoolConfig::load(path)?,
        None => PoolConfig::from_env()?,
    };
    if !data_dir.exists() {
        anyhow::bail!("data directory not found: {}", data_dir.display());
    }

    let store = SledPoolStore::new(&data_dir)?;
    let state = store.replay_state(&config).await?;

    println!("🔍 Shielded pool inspector");
    println!("📁 Data directory: {}", data_dir.display());
    println!("   Applied transactions: {}", state.sequence);
    println!("   Leaves: {} / {}", state.tree.len(), state.tree.capacity());
    println!("   Spent nullifiers: {}", state.nullifiers.len());
    println!("   Root: {}", state.tree.root());
    Ok(())
}
