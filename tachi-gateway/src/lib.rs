#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Tachi edge payment gateway.
//!
//! A reverse proxy that stands in front of a publisher origin, detects AI
//! crawlers by User-Agent, demands an on-chain USDC micropayment via HTTP
//! 402, verifies the presented transaction hash against the chain, guards
//! against replays, logs successful crawls on-chain asynchronously, and
//! streams the origin's response back to the crawler.
//!
//! # Modules
//!
//! - [`admission`] — method/size validation and CORS preflight
//! - [`challenge`] — 402 challenge construction and error mapping
//! - [`config`] — environment-driven configuration
//! - [`error`] — the gateway error taxonomy
//! - [`handlers`] — the request pipeline and health endpoints
//! - [`heartbeat`] — optional uptime pings
//! - [`kvs_redis`] — Redis-backed shared store
//! - [`logger`] — fire-and-forget crawl logging
//! - [`proxy`] — streaming origin proxy
//! - [`rate_limit`] — per-IP fixed-window limiting
//! - [`replay`] — transaction-hash replay protection
//! - [`verify`] — payment verification pipeline

pub mod admission;
pub mod challenge;
pub mod config;
pub mod error;
pub mod handlers;
pub mod heartbeat;
pub mod kvs_redis;
pub mod logger;
pub mod proxy;
pub mod rate_limit;
pub mod replay;
pub mod verify;

pub use config::{ConfigError, Environment, GatewayConfig};
pub use error::GatewayError;
pub use handlers::{Gateway, GatewayState, router};
