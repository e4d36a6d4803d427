//! Tachi payment gateway binary.
//!
//! # Usage
//!
//! ```bash
//! # All configuration comes from the environment (a .env file is honored)
//! BASE_RPC_URL=https://mainnet.base.org \
//! PAYMENT_PROCESSOR_ADDRESS=0x… USDC_ADDRESS=0x… CRAWL_NFT_ADDRESS=0x… \
//! PROOF_OF_CRAWL_LEDGER_ADDRESS=0x… PUBLISHER_ADDRESS=0x… \
//! CRAWL_TOKEN_ID=7 PRICE_USDC=0.001 WORKER_PRIVATE_KEY=0x… \
//! ORIGIN_URL=https://publisher.example cargo run -p tachi-gateway --release
//! ```
//!
//! `RUST_LOG` controls log filtering (default `info`; `ENABLE_LOGGING=true`
//! raises the default to `debug`).

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use alloy_network::EthereumWallet;
use alloy_provider::ProviderBuilder;
use dotenvy::dotenv;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use tachi::{Kvs, MemoryKvs};
use tachi_evm::{ChainReader, CrawlLedger, LedgerClient, RpcChainClient};
use tachi_gateway::kvs_redis::RedisKvs;
use tachi_gateway::{Gateway, GatewayConfig, heartbeat, router};

/// How long shutdown waits for in-flight crawl-log submissions.
const DRAIN_BUDGET: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() {
    dotenv().ok();

    let default_level = if matches!(
        std::env::var("ENABLE_LOGGING").as_deref(),
        Ok("true" | "1" | "yes")
    ) {
        "debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    if let Err(e) = run().await {
        tracing::error!("gateway failed: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize rustls crypto provider (ring)
    rustls::crypto::CryptoProvider::install_default(rustls::crypto::ring::default_provider())
        .map_err(|_| "failed to install rustls crypto provider")?;

    let config = GatewayConfig::from_env()?;
    tracing::info!(
        chain_id = config.chain_id,
        price = %config.price,
        publisher = %config.publisher,
        environment = %config.environment,
        origin = config.origin_url.as_ref().map_or("(built-in stub)", url::Url::as_str),
        "loaded configuration"
    );
    if config.sentry_dsn.is_some() {
        tracing::info!("error reporting DSN configured; events route through the log stream");
    }

    let kvs: Arc<dyn Kvs> = match &config.redis_url {
        Some(url) => {
            let redis = RedisKvs::connect(url).await?;
            tracing::info!("using shared Redis key-value store");
            Arc::new(redis)
        }
        None => {
            tracing::warn!(
                "REDIS_URL not set; replay protection is limited to this single instance"
            );
            Arc::new(MemoryKvs::new())
        }
    };

    let read_provider = ProviderBuilder::new().connect_http(config.rpc_url.clone());
    let chain: Arc<dyn ChainReader> = Arc::new(RpcChainClient::new(read_provider));

    let signer_address = config.signer.address();
    let wallet = EthereumWallet::from(config.signer.clone());
    let ledger_provider = ProviderBuilder::new()
        .wallet(wallet)
        .connect_http(config.rpc_url.clone());
    let ledger: Arc<dyn CrawlLedger> = Arc::new(LedgerClient::new(
        ledger_provider,
        signer_address,
        config.proof_of_crawl_ledger,
    ));
    tracing::info!(signer = %signer_address, ledger = %config.proof_of_crawl_ledger, "crawl ledger ready");

    let addr = SocketAddr::new(config.host, config.port);
    let gateway = Arc::new(Gateway::new(config, kvs, chain, ledger)?);

    let shutdown = CancellationToken::new();
    if let Some(url) = gateway.config().heartbeat_url.clone() {
        heartbeat::spawn(url, reqwest::Client::new(), shutdown.clone());
    }

    let app = router(Arc::clone(&gateway));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("gateway listening on http://{addr}");

    let signal_token = shutdown.clone();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown_signal().await;
        signal_token.cancel();
    })
    .await?;

    tracing::info!("draining in-flight crawl logs");
    gateway.crawl_logger().shutdown(DRAIN_BUDGET).await;
    tracing::info!("gateway shut down gracefully");
    Ok(())
}

/// Waits for Ctrl-C or SIGTERM (Unix) to initiate graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => tracing::info!("received Ctrl-C, shutting down..."),
            _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down..."),
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.expect("failed to listen for Ctrl-C");
        tracing::info!("received Ctrl-C, shutting down...");
    }
}
