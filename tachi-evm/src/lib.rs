#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! EVM chain I/O for the Tachi pay-per-crawl gateway.
//!
//! The gateway touches the chain in exactly two places, both modeled here as
//! small capabilities so tests can substitute in-memory fakes:
//!
//! - [`chain::ChainReader`] — read side: transaction receipts (payment
//!   verification) and the latest block number (health probing).
//! - [`ledger::CrawlLedger`] — write side: signed
//!   `ProofOfCrawlLedger.logCrawl` submissions recording successful crawls.
//!
//! [`receipt`] holds the receipt wire types and the USDC `Transfer` log scan
//! that turns a receipt into payment evidence.

pub mod chain;
pub mod ledger;
pub mod receipt;

pub use chain::{ChainError, ChainReader, RpcChainClient};
pub use ledger::{CrawlLedger, CrawlLogJob, LedgerClient};
pub use receipt::{ReceiptLog, TransferEvidence, TxReceipt, scan_transfer};
