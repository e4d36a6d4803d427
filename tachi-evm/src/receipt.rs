//! Transaction-receipt wire types and the USDC `Transfer` log scan.
//!
//! Receipts are fetched over raw JSON-RPC and decoded with crate-local types
//! so the verifier controls exactly which fields it trusts. A receipt proves
//! a payment iff it carries an ERC-20 `Transfer` log emitted by the
//! configured USDC contract, addressed to the configured payment processor,
//! for at least the configured price. The payer identity always comes from
//! the log's `from` topic, never from anything the client sent.

use alloy_primitives::{Address, B256, Bytes, U64, U256};
use alloy_sol_types::{SolEvent, sol};
use serde::{Deserialize, Serialize};

sol! {
    /// ERC-20 `Transfer(address,address,uint256)`.
    event Transfer(address indexed from, address indexed to, uint256 value);
}

/// Keccak-256 of `Transfer(address,address,uint256)`, topic 0 of every
/// ERC-20 transfer log.
pub const TRANSFER_EVENT_TOPIC: B256 = Transfer::SIGNATURE_HASH;

/// A transaction receipt as returned by `eth_getTransactionReceipt`.
///
/// Only the fields the gateway reads are decoded; everything else in the
/// RPC response is ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReceipt {
    /// Hash of the transaction this receipt belongs to.
    pub transaction_hash: B256,
    /// Post-Byzantium execution status: `0x1` success, `0x0` reverted.
    #[serde(default)]
    pub status: Option<U64>,
    /// Block the transaction was mined in.
    #[serde(default)]
    pub block_number: Option<U64>,
    /// Logs emitted during execution, in order.
    #[serde(default)]
    pub logs: Vec<ReceiptLog>,
}

impl TxReceipt {
    /// Whether the transaction executed successfully.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.status == Some(U64::from(1))
    }
}

/// A single log entry of a receipt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptLog {
    /// Contract that emitted the log.
    pub address: Address,
    /// Indexed topics; `topics[0]` is the event signature hash.
    #[serde(default)]
    pub topics: Vec<B256>,
    /// ABI-encoded non-indexed event data.
    #[serde(default)]
    pub data: Bytes,
}

/// Payment evidence extracted from a receipt's `Transfer` log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferEvidence {
    /// Address the USDC was transferred from; the paying crawler.
    pub payer: Address,
    /// Transferred amount in USDC base units.
    pub amount: U256,
    /// Block the payment was mined in.
    pub block_number: Option<u64>,
}

/// Scans a receipt for a `Transfer` log proving payment.
///
/// The first log satisfying all of the following yields the evidence:
///
/// - emitted by `token` (the USDC contract),
/// - `topics[0]` is the `Transfer` signature hash,
/// - the `to` topic decodes to `recipient` (the payment processor),
/// - the `value` word decodes to at least `min_amount`.
///
/// Address comparisons operate on decoded 20-byte values, so hex casing on
/// the wire is irrelevant. Logs with a malformed topic list or a data word
/// that is not exactly 32 bytes are skipped rather than rejected: foreign
/// logs in the same transaction must not be able to poison verification.
#[must_use]
pub fn scan_transfer(
    receipt: &TxReceipt,
    token: Address,
    recipient: Address,
    min_amount: U256,
) -> Option<TransferEvidence> {
    receipt.logs.iter().find_map(|log| {
        if log.address != token {
            return None;
        }
        let [signature, from, to] = log.topics.as_slice() else {
            return None;
        };
        if *signature != TRANSFER_EVENT_TOPIC {
            return None;
        }
        if Address::from_word(*to) != recipient {
            return None;
        }
        if log.data.len() != 32 {
            return None;
        }
        let amount = U256::from_be_slice(&log.data);
        if amount < min_amount {
            return None;
        }
        Some(TransferEvidence {
            payer: Address::from_word(*from),
            amount,
            block_number: receipt.block_number.map(|n| n.to::<u64>()),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, b256};

    const USDC: Address = address!("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913");
    const PROCESSOR: Address = address!("0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA");
    const PAYER: Address = address!("0x1111111111111111111111111111111111111111");

    fn transfer_log(token: Address, to: Address, amount: u64) -> ReceiptLog {
        ReceiptLog {
            address: token,
            topics: vec![
                TRANSFER_EVENT_TOPIC,
                PAYER.into_word(),
                to.into_word(),
            ],
            data: Bytes::from(U256::from(amount).to_be_bytes::<32>().to_vec()),
        }
    }

    fn receipt_with(logs: Vec<ReceiptLog>) -> TxReceipt {
        TxReceipt {
            transaction_hash: B256::repeat_byte(0xab),
            status: Some(U64::from(1)),
            block_number: Some(U64::from(1234)),
            logs,
        }
    }

    #[test]
    fn test_signature_hash_matches_wire_constant() {
        assert_eq!(
            TRANSFER_EVENT_TOPIC,
            b256!("0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef")
        );
    }

    #[test]
    fn test_scan_finds_matching_transfer() {
        let receipt = receipt_with(vec![transfer_log(USDC, PROCESSOR, 1000)]);
        let evidence = scan_transfer(&receipt, USDC, PROCESSOR, U256::from(1000)).unwrap();
        assert_eq!(evidence.payer, PAYER);
        assert_eq!(evidence.amount, U256::from(1000));
        assert_eq!(evidence.block_number, Some(1234));
    }

    #[test]
    fn test_scan_amount_boundary() {
        let receipt = receipt_with(vec![transfer_log(USDC, PROCESSOR, 999)]);
        assert!(scan_transfer(&receipt, USDC, PROCESSOR, U256::from(1000)).is_none());

        let receipt = receipt_with(vec![transfer_log(USDC, PROCESSOR, 1000)]);
        assert!(scan_transfer(&receipt, USDC, PROCESSOR, U256::from(1000)).is_some());
    }

    #[test]
    fn test_scan_rejects_wrong_recipient() {
        let other = address!("0xBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB");
        let receipt = receipt_with(vec![transfer_log(USDC, other, 5000)]);
        assert!(scan_transfer(&receipt, USDC, PROCESSOR, U256::from(1000)).is_none());
    }

    #[test]
    fn test_scan_rejects_wrong_token_contract() {
        let other_token = address!("0x2222222222222222222222222222222222222222");
        let receipt = receipt_with(vec![transfer_log(other_token, PROCESSOR, 5000)]);
        assert!(scan_transfer(&receipt, USDC, PROCESSOR, U256::from(1000)).is_none());
    }

    #[test]
    fn test_scan_ignores_non_transfer_topic() {
        let mut log = transfer_log(USDC, PROCESSOR, 5000);
        log.topics[0] = B256::repeat_byte(0x99);
        let receipt = receipt_with(vec![log]);
        assert!(scan_transfer(&receipt, USDC, PROCESSOR, U256::from(1000)).is_none());
    }

    #[test]
    fn test_scan_ignores_malformed_logs_and_keeps_searching() {
        let mut truncated = transfer_log(USDC, PROCESSOR, 5000);
        truncated.topics.pop();
        let mut fat_data = transfer_log(USDC, PROCESSOR, 5000);
        fat_data.data = Bytes::from(vec![0u8; 64]);
        let good = transfer_log(USDC, PROCESSOR, 1000);
        let receipt = receipt_with(vec![truncated, fat_data, good]);
        let evidence = scan_transfer(&receipt, USDC, PROCESSOR, U256::from(1000)).unwrap();
        assert_eq!(evidence.amount, U256::from(1000));
    }

    #[test]
    fn test_scan_takes_first_match() {
        let first = transfer_log(USDC, PROCESSOR, 1000);
        let second = transfer_log(USDC, PROCESSOR, 9999);
        let receipt = receipt_with(vec![first, second]);
        let evidence = scan_transfer(&receipt, USDC, PROCESSOR, U256::from(1000)).unwrap();
        assert_eq!(evidence.amount, U256::from(1000));
    }

    #[test]
    fn test_receipt_deserializes_from_rpc_json() {
        let json = serde_json::json!({
            "transactionHash": "0xabababababababababababababababababababababababababababababababab",
            "transactionIndex": "0x1",
            "blockHash": "0xcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcd",
            "blockNumber": "0x4d2",
            "status": "0x1",
            "gasUsed": "0x5208",
            "logs": [{
                "address": "0x833589fcd6edb6e08f4c7c32d4f71b54bda02913",
                "topics": [
                    "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef",
                    "0x0000000000000000000000001111111111111111111111111111111111111111",
                    "0x000000000000000000000000aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"
                ],
                "data": "0x00000000000000000000000000000000000000000000000000000000000003e8",
                "logIndex": "0x0",
                "removed": false
            }]
        });
        let receipt: TxReceipt = serde_json::from_value(json).unwrap();
        assert!(receipt.succeeded());
        assert_eq!(receipt.block_number, Some(U64::from(1234)));
        let evidence = scan_transfer(&receipt, USDC, PROCESSOR, U256::from(1000)).unwrap();
        assert_eq!(evidence.amount, U256::from(1000));
        assert_eq!(evidence.payer, PAYER);
    }

    #[test]
    fn test_failed_receipt() {
        let receipt = TxReceipt {
            transaction_hash: B256::ZERO,
            status: Some(U64::ZERO),
            block_number: None,
            logs: vec![],
        };
        assert!(!receipt.succeeded());
    }
}
