use alloy::primitives::Address;
use bid_reconciler::report::write_run_outputs;
use bid_reconciler::{BidReconciler, ReconcileConfig};
use clap::{Args, Parser, Subcommand};
use eyre::Result;
use finale_core::parse_address;
use finale_core::snapshot::load_snapshot;
use finale_indexer::engine::DEFAULT_LOG_CHUNK_SIZE;
use finale_indexer::{FinaleIndexer, IndexedContracts};
use finale_sdk::chain_reader::AlloyChainReader;
use finale_sdk::throttle::BatchThrottle;
use finale_sdk::token_metadata::TokenMetadataCache;
use finale_sdk::{create_provider, DatabaseLocation};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Re-verify a bid snapshot against the Market contract and write the report
    VerifyBids(VerifyBidsArgs),
    /// Load a bid snapshot into the store
    ImportSnapshot(ImportSnapshotArgs),
    /// Read auctions by id from the Auction House and store the live ones
    SyncAuctions(SyncAuctionsArgs),
    /// Back-fill Market and Auction House events into the store
    Index(IndexArgs),
    /// Flag an auction as settled
    MarkSettled(MarkSettledArgs),
}

#[derive(Args, Debug, Clone)]
struct ChainArgs {
    /// Ethereum RPC URL, http(s) or ws(s)
    #[arg(long, env)]
    evm_rpc_url: String,

    /// Zora Market contract address
    #[arg(long, env, value_parser = address_arg, default_value = "0xE5BFAB544ecA83849c53464F85B7164375Bdaac1")]
    market_address: Address,

    /// Zora Auction House contract address
    #[arg(long, env, value_parser = address_arg, default_value = "0xE468cE99444174Bd3bBBEd09209577d25D1ad673")]
    auction_house_address: Address,
}

#[derive(Args, Debug, Clone)]
struct StoreArgs {
    /// Database location, one of "memory" or a path to a directory
    #[arg(long, env)]
    database_location: DatabaseLocation,
}

#[derive(Args, Debug, Clone)]
struct VerifyBidsArgs {
    #[command(flatten)]
    chain: ChainArgs,

    /// Snapshot file (JSON array of bids)
    #[arg(long, env)]
    snapshot: PathBuf,

    /// Directory the active bid list and the report are written to
    #[arg(long, env, default_value = ".")]
    output_dir: PathBuf,

    /// Bid lookups issued concurrently per batch
    #[arg(long, env, default_value_t = BatchThrottle::DEFAULT_BID_CHECK_BATCH_SIZE)]
    bid_batch_size: usize,

    /// Pause between bid lookup batches in milliseconds
    #[arg(long, env, default_value = "1500")]
    bid_batch_pause_ms: u64,

    /// Token metadata lookups issued concurrently per batch
    #[arg(long, env, default_value_t = BatchThrottle::DEFAULT_METADATA_BATCH_SIZE)]
    metadata_batch_size: usize,

    /// Pause between token metadata batches in milliseconds
    #[arg(long, env, default_value = "2000")]
    metadata_batch_pause_ms: u64,

    /// Timeout for a single bid lookup in seconds
    #[arg(long, env, default_value = "30")]
    call_timeout_secs: u64,
}

#[derive(Args, Debug, Clone)]
struct ImportSnapshotArgs {
    #[command(flatten)]
    store: StoreArgs,

    /// Snapshot file (JSON array of bids)
    #[arg(long, env)]
    snapshot: PathBuf,
}

#[derive(Args, Debug, Clone)]
struct SyncAuctionsArgs {
    #[command(flatten)]
    chain: ChainArgs,

    #[command(flatten)]
    store: StoreArgs,

    /// First auction id to read
    #[arg(long, default_value = "0")]
    from_id: u64,

    /// Last auction id to read, inclusive
    #[arg(long)]
    to_id: u64,

    /// Auction reads issued concurrently per batch
    #[arg(long, env, default_value_t = BatchThrottle::DEFAULT_BID_CHECK_BATCH_SIZE)]
    batch_size: usize,

    /// Pause between batches in milliseconds
    #[arg(long, env, default_value = "1500")]
    batch_pause_ms: u64,
}

#[derive(Args, Debug, Clone)]
struct IndexArgs {
    #[command(flatten)]
    chain: ChainArgs,

    #[command(flatten)]
    store: StoreArgs,

    /// Zora Media contract address, bids are attributed to it
    #[arg(long, env, value_parser = address_arg, default_value = "0xabEFBc9fD2F806065b4f3C237d4b59D9A97Bcac7")]
    media_address: Address,

    /// Block to start from on a fresh store
    #[arg(long, env)]
    from_block: u64,

    /// Block range covered by a single eth_getLogs call
    #[arg(long, env, default_value_t = DEFAULT_LOG_CHUNK_SIZE)]
    log_chunk_size: u64,
}

#[derive(Args, Debug, Clone)]
struct MarkSettledArgs {
    #[command(flatten)]
    store: StoreArgs,

    /// Auction id to flag
    #[arg(long)]
    auction_id: u64,
}

fn address_arg(input: &str) -> std::result::Result<Address, String> {
    parse_address(input).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::VerifyBids(args) => verify_bids(args).await,
        Commands::ImportSnapshot(args) => import_snapshot(args).await,
        Commands::SyncAuctions(args) => sync_auctions(args).await,
        Commands::Index(args) => index(args).await,
        Commands::MarkSettled(args) => mark_settled(args).await,
    }
}

async fn chain_reader(chain: &ChainArgs) -> Result<AlloyChainReader> {
    let provider = create_provider(&chain.evm_rpc_url).await?;
    Ok(AlloyChainReader::new(
        provider,
        chain.market_address,
        chain.auction_house_address,
    ))
}

async fn open_store(store: &StoreArgs) -> Result<FinaleIndexer> {
    FinaleIndexer::open(&store.database_location, Arc::new(TokenMetadataCache::new())).await
}

async fn verify_bids(args: VerifyBidsArgs) -> Result<()> {
    let bids = load_snapshot(&args.snapshot)?;
    info!(bids = bids.len(), path = %args.snapshot.display(), "Loaded snapshot");

    let reader = chain_reader(&args.chain).await?;
    let config = ReconcileConfig {
        market_address: args.chain.market_address,
        bid_checks: BatchThrottle::new(
            args.bid_batch_size,
            Duration::from_millis(args.bid_batch_pause_ms),
        ),
        metadata_lookups: BatchThrottle::new(
            args.metadata_batch_size,
            Duration::from_millis(args.metadata_batch_pause_ms),
        ),
        call_timeout: Duration::from_secs(args.call_timeout_secs),
    };
    let reconciler = BidReconciler::new(
        Arc::new(reader),
        Arc::new(TokenMetadataCache::new()),
        config,
    );

    let source_file = args.snapshot.display().to_string();
    let outcome = reconciler.reconcile(&bids, &source_file).await;
    let paths = write_run_outputs(
        &args.output_dir,
        outcome.started_at,
        &outcome.active_bids,
        &outcome.report,
    )?;

    let summary = &outcome.report.summary;
    info!(
        total = summary.total_bids,
        active = summary.active_bids,
        inactive = summary.inactive_bids,
        errors = summary.error_bids,
        final_active = summary.final_active_bids,
        success_rate = %summary.success_rate,
        "Verification complete"
    );
    info!("Active bids written to {}", paths.active_bids.display());
    info!("Report written to {}", paths.report.display());
    Ok(())
}

async fn import_snapshot(args: ImportSnapshotArgs) -> Result<()> {
    let bids = load_snapshot(&args.snapshot)?;
    let indexer = open_store(&args.store).await?;
    let imported = indexer.import_snapshot(&bids).await?;
    info!(imported, path = %args.snapshot.display(), "Snapshot imported");
    Ok(())
}

async fn sync_auctions(args: SyncAuctionsArgs) -> Result<()> {
    if args.to_id < args.from_id {
        return Err(eyre::eyre!(
            "--to-id ({}) must not be lower than --from-id ({})",
            args.to_id,
            args.from_id
        ));
    }
    let reader = chain_reader(&args.chain).await?;
    let indexer = open_store(&args.store).await?;
    let throttle = BatchThrottle::new(args.batch_size, Duration::from_millis(args.batch_pause_ms));
    indexer
        .sync_auctions(&reader, args.from_id, args.to_id, &throttle)
        .await?;
    Ok(())
}

async fn index(args: IndexArgs) -> Result<()> {
    let provider = create_provider(&args.chain.evm_rpc_url).await?;
    let reader = AlloyChainReader::new(
        provider.clone(),
        args.chain.market_address,
        args.chain.auction_house_address,
    );
    let indexer = open_store(&args.store).await?;
    let contracts = IndexedContracts {
        market: args.chain.market_address,
        auction_house: args.chain.auction_house_address,
        media: args.media_address,
    };

    let summary = indexer
        .backfill(
            &provider,
            &reader,
            contracts,
            args.from_block,
            args.log_chunk_size,
        )
        .await?;
    info!(
        from_block = summary.from_block,
        to_block = summary.to_block,
        logs = summary.logs_processed,
        "Back-fill complete"
    );
    Ok(())
}

async fn mark_settled(args: MarkSettledArgs) -> Result<()> {
    let indexer = open_store(&args.store).await?;
    if !indexer.mark_auction_settled(args.auction_id).await? {
        return Err(eyre::eyre!("Auction {} is not in the store", args.auction_id));
    }
    Ok(())
}
