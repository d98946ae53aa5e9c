use clap::Parser;
use eyre::Result;

use finale_indexer_server::FinaleIndexerServer;
use finale_indexer_server::ServerConfig;
use finale_sdk::handle_background_thread_result;
use tokio::task::JoinSet;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let config = ServerConfig::parse();
    let mut join_set = JoinSet::new();
    let _server = FinaleIndexerServer::start(config, &mut join_set).await?;
    handle_background_thread_result(join_set.join_next().await)
}
