//! Read-side chain access.
//!
//! [`ChainReader`] is the capability the payment verifier and the health
//! probe consume. The real implementation, [`RpcChainClient`], talks
//! JSON-RPC through an alloy provider and retries transient failures within
//! the request: up to 3 attempts with exponential backoff under a 5 s
//! deadline. Exhaustion maps to `503 Service Unavailable` at the gateway,
//! not to a payment rejection — an unreachable RPC says nothing about the
//! proof. All awaits are plain, so dropping the request future cancels any
//! in-flight RPC call cleanly.

use std::borrow::Cow;
use std::time::Duration;

use alloy_primitives::B256;
use alloy_provider::Provider;
use async_trait::async_trait;

use crate::receipt::TxReceipt;

/// Attempts per receipt fetch before giving up.
const RECEIPT_ATTEMPTS: u32 = 3;

/// Backoff before the second and third attempt.
const RECEIPT_BACKOFF: [Duration; 2] = [Duration::from_millis(250), Duration::from_millis(500)];

/// Overall deadline across all attempts of one receipt fetch.
const RECEIPT_DEADLINE: Duration = Duration::from_secs(5);

/// Errors from chain I/O.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    /// All retries were exhausted or the deadline elapsed; the chain state
    /// is unknown.
    #[error("rpc unavailable: {0}")]
    Unavailable(String),
    /// A single RPC call failed.
    #[error("rpc request failed: {0}")]
    Rpc(String),
    /// A chain operation exceeded its time budget.
    #[error("chain operation timed out after {0:?}")]
    Timeout(Duration),
    /// A submitted transaction was mined but reverted.
    #[error("transaction reverted on-chain: {0}")]
    Reverted(B256),
}

/// Read-only chain operations the gateway depends on.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Fetches the receipt of a mined transaction, `None` if unknown.
    async fn transaction_receipt(&self, tx_hash: B256) -> Result<Option<TxReceipt>, ChainError>;

    /// Latest block number observed by the RPC node.
    async fn block_number(&self) -> Result<u64, ChainError>;
}

/// JSON-RPC [`ChainReader`] over an alloy [`Provider`].
#[derive(Debug, Clone)]
pub struct RpcChainClient<P> {
    provider: P,
}

impl<P> RpcChainClient<P>
where
    P: Provider + Send + Sync,
{
    /// Wraps an existing provider.
    pub const fn new(provider: P) -> Self {
        Self { provider }
    }

    async fn fetch_receipt(&self, tx_hash: B256) -> Result<Option<TxReceipt>, ChainError> {
        self.provider
            .raw_request::<_, Option<TxReceipt>>(
                Cow::Borrowed("eth_getTransactionReceipt"),
                (tx_hash,),
            )
            .await
            .map_err(|e| ChainError::Rpc(e.to_string()))
    }

    async fn fetch_receipt_with_retry(
        &self,
        tx_hash: B256,
    ) -> Result<Option<TxReceipt>, ChainError> {
        let mut last_error = None;
        for attempt in 0..RECEIPT_ATTEMPTS {
            if attempt > 0 {
                let backoff = RECEIPT_BACKOFF[(attempt - 1) as usize % RECEIPT_BACKOFF.len()];
                tokio::time::sleep(backoff).await;
            }
            match self.fetch_receipt(tx_hash).await {
                Ok(receipt) => return Ok(receipt),
                Err(error) => {
                    tracing::warn!(
                        tx = %tx_hash,
                        attempt = attempt + 1,
                        %error,
                        "receipt fetch failed"
                    );
                    last_error = Some(error);
                }
            }
        }
        Err(ChainError::Unavailable(
            last_error.map_or_else(|| "no attempts made".to_owned(), |e| e.to_string()),
        ))
    }
}

#[async_trait]
impl<P> ChainReader for RpcChainClient<P>
where
    P: Provider + Send + Sync,
{
    async fn transaction_receipt(&self, tx_hash: B256) -> Result<Option<TxReceipt>, ChainError> {
        match tokio::time::timeout(RECEIPT_DEADLINE, self.fetch_receipt_with_retry(tx_hash)).await
        {
            Ok(result) => result,
            Err(_) => Err(ChainError::Unavailable(format!(
                "receipt fetch deadline of {RECEIPT_DEADLINE:?} elapsed"
            ))),
        }
    }

    async fn block_number(&self) -> Result<u64, ChainError> {
        self.provider
            .get_block_number()
            .await
            .map_err(|e| ChainError::Rpc(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_provider::ProviderBuilder;
    use serde_json::{Value, json};
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

    /// Echoes the caller's JSON-RPC id around a fixed `result`.
    struct RpcResult(Value);

    impl Respond for RpcResult {
        fn respond(&self, request: &Request) -> ResponseTemplate {
            let body: Value = serde_json::from_slice(&request.body).unwrap_or(Value::Null);
            let id = body.get("id").cloned().unwrap_or(json!(0));
            ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": self.0,
            }))
        }
    }

    fn client_for(server: &MockServer) -> RpcChainClient<impl Provider> {
        let provider = ProviderBuilder::new().connect_http(server.uri().parse().unwrap());
        RpcChainClient::new(provider)
    }

    #[tokio::test]
    async fn test_receipt_fetch_decodes_result() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .and(body_partial_json(json!({"method": "eth_getTransactionReceipt"})))
            .respond_with(RpcResult(json!({
                "transactionHash": "0xabababababababababababababababababababababababababababababababab",
                "blockNumber": "0x10",
                "status": "0x1",
                "logs": []
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let receipt = client
            .transaction_receipt(B256::repeat_byte(0xab))
            .await
            .unwrap()
            .unwrap();
        assert!(receipt.succeeded());
        assert_eq!(receipt.block_number.map(|n| n.to::<u64>()), Some(16));
    }

    #[tokio::test]
    async fn test_missing_receipt_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(RpcResult(Value::Null))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let receipt = client
            .transaction_receipt(B256::repeat_byte(0x01))
            .await
            .unwrap();
        assert!(receipt.is_none());
    }

    #[tokio::test]
    async fn test_retries_then_reports_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let error = client
            .transaction_receipt(B256::repeat_byte(0x02))
            .await
            .unwrap_err();
        assert!(matches!(error, ChainError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_block_number() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .and(body_partial_json(json!({"method": "eth_blockNumber"})))
            .respond_with(RpcResult(json!("0x4d2")))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert_eq!(client.block_number().await.unwrap(), 1234);
    }
}
