#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Core types for the Tachi pay-per-crawl protocol.
//!
//! Tachi lets content publishers monetize access by AI crawlers: a gateway in
//! front of the publisher origin demands an on-chain USDC micropayment via
//! HTTP 402 before serving protected content. This crate provides the
//! protocol-level building blocks shared by the gateway and by tooling; it
//! performs no I/O of its own.
//!
//! # Modules
//!
//! - [`amount`] - USDC amounts: human decimal strings and 6-decimal base units
//! - [`challenge`] - JSON body of the HTTP 402 payment challenge
//! - [`classifier`] - User-Agent classification of AI crawler traffic
//! - [`headers`] - x402 wire header names
//! - [`kvs`] - Key-value store capability with TTL and atomic insert
//! - [`networks`] - Well-known EVM network names
//! - [`proof`] - Payment proofs presented by crawlers (transaction hashes)

pub mod amount;
pub mod challenge;
pub mod classifier;
pub mod headers;
pub mod kvs;
pub mod networks;
pub mod proof;

pub use amount::UsdcAmount;
pub use classifier::CrawlerClassifier;
pub use kvs::{Kvs, KvsError, MemoryKvs};
pub use proof::{PaymentProof, ProofError, TxHash};
