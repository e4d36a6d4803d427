//! Write-side chain access: the proof-of-crawl ledger.
//!
//! After a paid crawl is served, the gateway records it on-chain by calling
//! `ProofOfCrawlLedger.logCrawl(tokenId, crawler, userAgent, timestamp)`
//! with its own signer. [`LedgerClient`] performs one submission attempt
//! under a 15 s budget; retry pacing lives with the background worker that
//! owns the job queue. The account nonce is re-read from pending state
//! before every attempt so a retry never reuses a nonce burned by a
//! concurrent submission.

use std::time::Duration;

use alloy_primitives::{Address, B256, Bytes, U256};
use alloy_provider::Provider;
use alloy_rpc_types_eth::TransactionRequest;
use alloy_sol_types::{SolCall, sol};
use async_trait::async_trait;

use crate::chain::ChainError;

sol! {
    /// `ProofOfCrawlLedger.logCrawl` — records one paid crawl.
    function logCrawl(uint256 tokenId, address crawler, string userAgent, uint256 timestamp);
}

/// Budget for one submission attempt, from send to mined receipt.
const SUBMIT_TIMEOUT: Duration = Duration::from_secs(15);

/// One crawl to be recorded on-chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlLogJob {
    /// The publisher's license token id.
    pub token_id: U256,
    /// The paying crawler, as derived from the on-chain transfer.
    pub crawler: Address,
    /// The crawler's User-Agent string.
    pub user_agent: String,
    /// Unix seconds at which the crawl was served.
    pub timestamp: u64,
}

/// Capability for recording crawls on the proof-of-crawl ledger.
#[async_trait]
pub trait CrawlLedger: Send + Sync {
    /// Submits one `logCrawl` transaction and waits for it to mine.
    ///
    /// Returns the transaction hash on success.
    async fn log_crawl(&self, job: &CrawlLogJob) -> Result<B256, ChainError>;
}

/// Signer-backed [`CrawlLedger`] over an alloy wallet provider.
#[derive(Debug, Clone)]
pub struct LedgerClient<P> {
    provider: P,
    signer_address: Address,
    ledger_address: Address,
}

impl<P> LedgerClient<P>
where
    P: Provider + Send + Sync,
{
    /// Creates a client submitting from `signer_address` (which must be a
    /// signer of the provider's wallet) to the ledger contract.
    pub const fn new(provider: P, signer_address: Address, ledger_address: Address) -> Self {
        Self {
            provider,
            signer_address,
            ledger_address,
        }
    }

    async fn submit(&self, job: &CrawlLogJob) -> Result<B256, ChainError> {
        // Fresh pending-state nonce per attempt; see module docs.
        let nonce = self
            .provider
            .get_transaction_count(self.signer_address)
            .pending()
            .await
            .map_err(|e| ChainError::Rpc(format!("nonce refresh: {e}")))?;

        let call = logCrawlCall {
            tokenId: job.token_id,
            crawler: job.crawler,
            userAgent: job.user_agent.clone(),
            timestamp: U256::from(job.timestamp),
        };
        let calldata = Bytes::from(call.abi_encode());

        let mut tx = TransactionRequest::default()
            .from(self.signer_address)
            .to(self.ledger_address)
            .input(calldata.into());
        tx.nonce = Some(nonce);

        let pending = self
            .provider
            .send_transaction(tx)
            .await
            .map_err(|e| ChainError::Rpc(format!("logCrawl send: {e}")))?;

        let receipt = pending
            .get_receipt()
            .await
            .map_err(|e| ChainError::Rpc(format!("logCrawl receipt: {e}")))?;

        if receipt.status() {
            Ok(receipt.transaction_hash)
        } else {
            Err(ChainError::Reverted(receipt.transaction_hash))
        }
    }
}

#[async_trait]
impl<P> CrawlLedger for LedgerClient<P>
where
    P: Provider + Send + Sync,
{
    async fn log_crawl(&self, job: &CrawlLogJob) -> Result<B256, ChainError> {
        match tokio::time::timeout(SUBMIT_TIMEOUT, self.submit(job)).await {
            Ok(result) => result,
            Err(_) => Err(ChainError::Timeout(SUBMIT_TIMEOUT)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    #[test]
    fn test_log_crawl_calldata_layout() {
        let call = logCrawlCall {
            tokenId: U256::from(7u64),
            crawler: address!("0x1111111111111111111111111111111111111111"),
            userAgent: "GPTBot/1.0".to_owned(),
            timestamp: U256::from(1_700_000_000u64),
        };
        let encoded = call.abi_encode();
        // 4-byte selector + 4 head words + offset-encoded string tail.
        assert_eq!(&encoded[..4], logCrawlCall::SELECTOR.as_slice());
        assert!(encoded.len() > 4 + 4 * 32);

        let decoded = logCrawlCall::abi_decode(&encoded).unwrap();
        assert_eq!(decoded.userAgent, "GPTBot/1.0");
        assert_eq!(decoded.tokenId, U256::from(7u64));
    }
}
