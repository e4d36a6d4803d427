//! Payment verification.
//!
//! Turns a parsed [`PaymentProof`] into a [`VerifiedPayment`] or a tagged
//! rejection, in this order:
//!
//! 1. hash shape — already enforced by parsing, so a malformed hash never
//!    reaches the RPC;
//! 2. replay pre-check against the KVS;
//! 3. receipt fetch (retried inside the chain client, 5 s budget);
//! 4. receipt status;
//! 5. USDC `Transfer` log scan for recipient and amount;
//! 6. advisory cross-check of the client-declared amount.
//!
//! The payer address and amount always come from the on-chain log. The
//! declared amount can only *fail* a proof on mismatch, never qualify one.

use std::sync::Arc;

use alloy_primitives::{Address, U256};
use tachi::{PaymentProof, TxHash};
use tachi_evm::{ChainReader, scan_transfer};

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::replay::ReplayGuard;

/// A proof that survived verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifiedPayment {
    /// The consumed transaction hash.
    pub tx_hash: TxHash,
    /// The payer, derived from the transfer's `from` topic.
    pub payer: Address,
    /// Transferred amount in USDC base units.
    pub amount_base_units: U256,
    /// Block the payment was mined in.
    pub block_number: Option<u64>,
}

/// Verifies payment proofs against the chain and the replay store.
pub struct PaymentVerifier {
    chain: Arc<dyn ChainReader>,
    usdc: Address,
    payment_processor: Address,
    price_base_units: U256,
}

impl std::fmt::Debug for PaymentVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentVerifier")
            .field("usdc", &self.usdc)
            .field("payment_processor", &self.payment_processor)
            .field("price_base_units", &self.price_base_units)
            .finish_non_exhaustive()
    }
}

impl PaymentVerifier {
    /// Creates a verifier bound to the configured contracts and price.
    #[must_use]
    pub fn new(chain: Arc<dyn ChainReader>, config: &GatewayConfig) -> Self {
        Self {
            chain,
            usdc: config.usdc,
            payment_processor: config.payment_processor,
            price_base_units: config.price_base_units(),
        }
    }

    /// Runs the verification pipeline for one proof.
    ///
    /// Verification is idempotent and read-only: it does not consume the
    /// hash. The caller consumes it through the [`ReplayGuard`] before
    /// writing any 2xx.
    ///
    /// # Errors
    ///
    /// The tagged rejection per the module docs; RPC exhaustion surfaces as
    /// [`GatewayError::UpstreamUnavailable`], not as a payment rejection.
    pub async fn verify(
        &self,
        proof: &PaymentProof,
        replay: &ReplayGuard,
    ) -> Result<VerifiedPayment, GatewayError> {
        if replay.is_consumed(&proof.tx_hash).await? {
            return Err(GatewayError::Replay);
        }

        let receipt = self
            .chain
            .transaction_receipt(proof.tx_hash.as_b256())
            .await?
            .ok_or(GatewayError::NotFound)?;

        if !receipt.succeeded() {
            return Err(GatewayError::TxFailed);
        }

        let evidence = scan_transfer(
            &receipt,
            self.usdc,
            self.payment_processor,
            self.price_base_units,
        )
        .ok_or(GatewayError::InsufficientOrWrongRecipient)?;

        if let Some(declared) = proof.declared_amount {
            if declared != evidence.amount {
                return Err(GatewayError::MalformedProof(format!(
                    "declared amount {declared} does not match on-chain transfer {}",
                    evidence.amount
                )));
            }
        }

        Ok(VerifiedPayment {
            tx_hash: proof.tx_hash,
            payer: evidence.payer,
            amount_base_units: evidence.amount,
            block_number: evidence.block_number,
        })
    }
}
