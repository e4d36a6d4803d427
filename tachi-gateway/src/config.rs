//! Gateway configuration.
//!
//! Everything is environment-driven (`.env` values are loaded by `main`
//! before this runs) and frozen into an immutable [`GatewayConfig`] for the
//! process lifetime. The USDC price is converted from its human decimal form
//! to integer base units exactly once, here; the hot path only ever compares
//! integers.
//!
//! # Required variables
//!
//! `BASE_RPC_URL`, `PAYMENT_PROCESSOR_ADDRESS`,
//! `PROOF_OF_CRAWL_LEDGER_ADDRESS`, `USDC_ADDRESS`, `CRAWL_NFT_ADDRESS`,
//! `PUBLISHER_ADDRESS`, `CRAWL_TOKEN_ID`, `PRICE_USDC`, `WORKER_PRIVATE_KEY`
//!
//! # Optional variables
//!
//! `CHAIN_ID` (default 8453), `RATE_LIMIT_REQUESTS` (default 100),
//! `MAX_REQUEST_SIZE` (default 1 MiB), `ENVIRONMENT` (default development),
//! `ENABLE_LOGGING` (default false), `ORIGIN_URL` (default built-in stub),
//! `REDIS_URL` (default in-process store), `CRAWLER_PATTERNS`
//! (comma-separated regexes), `SENTRY_DSN`, `BETTER_UPTIME_HEARTBEAT_URL`,
//! `HOST` (default 0.0.0.0), `PORT` (default 8080)

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use alloy_primitives::{Address, U256};
use alloy_signer_local::PrivateKeySigner;
use tachi::UsdcAmount;
use url::Url;

/// Deployment environment tag. Production responses never leak internal
/// error detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Local or staging deployments; verbose error bodies.
    Development,
    /// Live deployments; generic 500 bodies.
    Production,
}

impl Environment {
    /// Whether this is a production deployment.
    #[must_use]
    pub const fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }

    /// The tag as reported by the health endpoints.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }
}

impl FromStr for Environment {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("production") {
            Ok(Self::Production)
        } else {
            Ok(Self::Development)
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable configuration bundle built once at startup.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// JSON-RPC endpoint of the settlement chain.
    pub rpc_url: Url,
    /// Numeric EVM chain id (8453 = Base mainnet, 84532 = Base Sepolia).
    pub chain_id: u64,
    /// `PaymentProcessor` contract; the required transfer recipient.
    pub payment_processor: Address,
    /// `ProofOfCrawlLedger` contract; crawl logs go here.
    pub proof_of_crawl_ledger: Address,
    /// USDC token contract.
    pub usdc: Address,
    /// `CrawlNFT` publisher license contract.
    pub crawl_nft: Address,
    /// The publisher's own address.
    pub publisher: Address,
    /// The publisher's license token id.
    pub crawl_token_id: U256,
    /// Price per crawl, held in both decimal and base-unit form.
    pub price: UsdcAmount,
    /// Signer for `logCrawl` submissions.
    pub signer: PrivateKeySigner,
    /// Requests allowed per IP per 60 s window.
    pub rate_limit_requests: u32,
    /// Largest accepted request body, in bytes.
    pub max_request_size: u64,
    /// Deployment environment tag.
    pub environment: Environment,
    /// Raise default log verbosity to debug.
    pub enable_logging: bool,
    /// Publisher origin to proxy to; `None` serves the built-in stub.
    pub origin_url: Option<Url>,
    /// Redis connection string; `None` selects the in-process store.
    pub redis_url: Option<String>,
    /// Replacement crawler User-Agent patterns, if configured.
    pub crawler_patterns: Option<Vec<String>>,
    /// Error-reporting DSN, surfaced to the observability channel.
    pub sentry_dsn: Option<String>,
    /// Uptime heartbeat to ping while healthy.
    pub heartbeat_url: Option<Url>,
    /// Bind address.
    pub host: IpAddr,
    /// Bind port.
    pub port: u16,
}

/// Why configuration loading failed. Startup aborts on any of these.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required variable is absent or empty.
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    /// A variable is present but unparseable.
    #[error("invalid value for {name}: {reason}")]
    Invalid {
        /// Variable name.
        name: &'static str,
        /// What was wrong with it.
        reason: String,
    },
}

impl GatewayConfig {
    /// Builds the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// [`ConfigError`] naming the first variable that is missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let price_raw = required("PRICE_USDC")?;
        let price: UsdcAmount = price_raw
            .parse()
            .map_err(|e| invalid("PRICE_USDC", format!("{e}")))?;

        let signer: PrivateKeySigner = required("WORKER_PRIVATE_KEY")?
            .parse()
            .map_err(|_| invalid("WORKER_PRIVATE_KEY", "not a valid private key".to_owned()))?;

        let crawler_patterns = optional("CRAWLER_PATTERNS").map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_owned)
                .collect::<Vec<_>>()
        });

        Ok(Self {
            rpc_url: parse_required("BASE_RPC_URL")?,
            chain_id: parse_optional("CHAIN_ID")?.unwrap_or(8453),
            payment_processor: parse_required("PAYMENT_PROCESSOR_ADDRESS")?,
            proof_of_crawl_ledger: parse_required("PROOF_OF_CRAWL_LEDGER_ADDRESS")?,
            usdc: parse_required("USDC_ADDRESS")?,
            crawl_nft: parse_required("CRAWL_NFT_ADDRESS")?,
            publisher: parse_required("PUBLISHER_ADDRESS")?,
            crawl_token_id: parse_required("CRAWL_TOKEN_ID")?,
            price,
            signer,
            rate_limit_requests: parse_optional("RATE_LIMIT_REQUESTS")?.unwrap_or(100),
            max_request_size: parse_optional("MAX_REQUEST_SIZE")?.unwrap_or(1_048_576),
            environment: parse_optional("ENVIRONMENT")?.unwrap_or(Environment::Development),
            enable_logging: optional("ENABLE_LOGGING")
                .is_some_and(|v| matches!(v.as_str(), "true" | "1" | "yes")),
            origin_url: parse_optional("ORIGIN_URL")?,
            redis_url: optional("REDIS_URL"),
            crawler_patterns,
            sentry_dsn: optional("SENTRY_DSN"),
            heartbeat_url: parse_optional("BETTER_UPTIME_HEARTBEAT_URL")?,
            host: parse_optional("HOST")?.unwrap_or(IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED)),
            port: parse_optional("PORT")?.unwrap_or(8080),
        })
    }

    /// Price in base units as an [`U256`] for on-chain comparisons.
    #[must_use]
    pub fn price_base_units(&self) -> U256 {
        U256::from(self.price.base_units())
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value.trim().to_owned()),
        _ => Err(ConfigError::Missing(name)),
    }
}

fn optional(name: &'static str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

fn invalid(name: &'static str, reason: String) -> ConfigError {
    ConfigError::Invalid { name, reason }
}

fn parse_required<T>(name: &'static str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    required(name)?
        .parse()
        .map_err(|e: T::Err| invalid(name, e.to_string()))
}

fn parse_optional<T>(name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    optional(name)
        .map(|raw| raw.parse().map_err(|e: T::Err| invalid(name, e.to_string())))
        .transpose()
}
