//! JSON body of the HTTP 402 payment challenge.
//!
//! Every 402 the gateway emits carries the same machine-recoverable
//! structure: an error code, a human message, the full payment terms, and
//! step-by-step instructions. Crawler SDKs parse `payment` (or the matching
//! `x402-*` headers) to construct the USDC transfer, then retry with the
//! transaction hash as proof.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

/// Body of a 402 Payment Required response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeBody {
    /// Machine-readable error code, e.g. `payment_required`.
    pub error: String,
    /// Human-readable explanation.
    pub message: String,
    /// Terms the crawler must satisfy.
    pub payment: PaymentTerms,
    /// Recovery instructions for operators reading the body by hand.
    pub instructions: Vec<String>,
}

/// Payment terms embedded in the challenge body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentTerms {
    /// Price as a human decimal USDC string, e.g. `"0.001"`.
    pub amount: String,
    /// Always `USDC`.
    pub currency: String,
    /// Conventional network name, e.g. `base`.
    pub network: String,
    /// Numeric EVM chain id.
    pub chain_id: u64,
    /// The `PaymentProcessor` contract the transfer must go to.
    pub recipient: Address,
    /// The USDC token contract to transfer through.
    pub token_address: Address,
    /// The publisher license contract.
    #[serde(rename = "crawlNFTAddress")]
    pub crawl_nft_address: Address,
    /// The publisher license token id.
    pub token_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_field_names() {
        let terms = PaymentTerms {
            amount: "0.001".to_owned(),
            currency: "USDC".to_owned(),
            network: "base".to_owned(),
            chain_id: 8453,
            recipient: Address::ZERO,
            token_address: Address::ZERO,
            crawl_nft_address: Address::ZERO,
            token_id: "7".to_owned(),
        };
        let json = serde_json::to_value(&terms).unwrap();
        assert_eq!(json["chainId"], 8453);
        assert_eq!(json["tokenId"], "7");
        assert!(json.get("crawlNFTAddress").is_some());
        assert!(json.get("tokenAddress").is_some());
        assert!(json.get("crawl_nft_address").is_none());
    }
}
