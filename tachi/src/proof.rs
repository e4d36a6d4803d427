//! Payment proofs presented by crawlers.
//!
//! A proof is the hash of an on-chain USDC transfer, presented either as
//! `Authorization: Bearer 0x<64 hex>` or as
//! `X-402-Payment: 0x<64 hex>,<amount>` where the optional amount is the
//! transfer value in base units. The declared amount is advisory: the
//! on-chain log value is authoritative and the claim is only cross-checked
//! for equality after verification.

use std::fmt;
use std::str::FromStr;

use alloy_primitives::{B256, U256, hex};
use serde::Serialize;

/// A well-formed transaction hash: `0x` followed by exactly 64 hex digits.
///
/// Stored as raw bytes; [`fmt::Display`] renders the canonical lowercase
/// `0x`-prefixed form, which is also the form used in KVS keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TxHash(B256);

impl TxHash {
    /// Returns the raw 32-byte hash.
    #[must_use]
    pub const fn as_b256(&self) -> B256 {
        self.0
    }

    /// Returns the replay-guard KVS key for this hash (`tx:0x…`).
    #[must_use]
    pub fn kvs_key(&self) -> String {
        format!("tx:{self}")
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl FromStr for TxHash {
    type Err = ProofError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("0x").ok_or(ProofError::MalformedHash)?;
        if digits.len() != 64 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ProofError::MalformedHash);
        }
        let bytes: [u8; 32] = hex::decode(digits)
            .map_err(|_| ProofError::MalformedHash)?
            .try_into()
            .map_err(|_| ProofError::MalformedHash)?;
        Ok(Self(B256::from(bytes)))
    }
}

/// A parsed payment proof: the claimed transaction hash plus the optional
/// client-declared amount in base units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentProof {
    /// Hash of the USDC transfer transaction.
    pub tx_hash: TxHash,
    /// Advisory transfer amount in base units, from `X-402-Payment`.
    pub declared_amount: Option<U256>,
}

impl PaymentProof {
    /// Parses an `Authorization` header value of the form `Bearer 0x<64 hex>`.
    ///
    /// # Errors
    ///
    /// [`ProofError::MalformedScheme`] if the value is not a Bearer
    /// credential, [`ProofError::MalformedHash`] if the token is not a
    /// well-formed transaction hash.
    pub fn from_bearer(value: &str) -> Result<Self, ProofError> {
        let token = value
            .strip_prefix("Bearer ")
            .ok_or(ProofError::MalformedScheme)?
            .trim();
        Ok(Self {
            tx_hash: token.parse()?,
            declared_amount: None,
        })
    }

    /// Parses an `X-402-Payment` header value: `0x<64 hex>` optionally
    /// followed by `,<amount>` with the amount in base units.
    ///
    /// # Errors
    ///
    /// [`ProofError::MalformedHash`] or [`ProofError::MalformedAmount`] on a
    /// value that does not match the wire format.
    pub fn from_x402_payment(value: &str) -> Result<Self, ProofError> {
        let (hash, amount) = match value.split_once(',') {
            Some((hash, amount)) => (hash.trim(), Some(amount.trim())),
            None => (value.trim(), None),
        };
        let declared_amount = amount
            .map(|raw| {
                if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(ProofError::MalformedAmount);
                }
                U256::from_str_radix(raw, 10).map_err(|_| ProofError::MalformedAmount)
            })
            .transpose()?;
        Ok(Self {
            tx_hash: hash.parse()?,
            declared_amount,
        })
    }

    /// Extracts a proof from the request headers, preferring `Authorization`.
    ///
    /// Returns `Ok(None)` when neither proof header is present; the caller
    /// decides whether that means a challenge or a passthrough.
    ///
    /// # Errors
    ///
    /// Propagates the parse error of whichever header was present.
    pub fn from_headers(
        authorization: Option<&str>,
        x402_payment: Option<&str>,
    ) -> Result<Option<Self>, ProofError> {
        match (authorization, x402_payment) {
            (Some(auth), _) => Self::from_bearer(auth).map(Some),
            (None, Some(payment)) => Self::from_x402_payment(payment).map(Some),
            (None, None) => Ok(None),
        }
    }
}

/// Why a presented proof could not be parsed. All variants map to a 402 with
/// the `MalformedProof` error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ProofError {
    /// The transaction hash is not `0x` + 64 hex digits.
    #[error("transaction hash must be 0x followed by 64 hex characters")]
    MalformedHash,
    /// The `Authorization` header does not carry a Bearer credential.
    #[error("authorization scheme must be Bearer")]
    MalformedScheme,
    /// The declared amount is not a base-unit decimal integer.
    #[error("declared amount must be an integer amount of base units")]
    MalformedAmount,
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH: &str = "0x0a56dd6940e523e3fa8ecf7e99aab13a8b8b01b344d6ebeb9c554b4bc4bd1eab";

    #[test]
    fn test_tx_hash_roundtrip() {
        let hash: TxHash = HASH.parse().unwrap();
        assert_eq!(hash.to_string(), HASH);
        assert_eq!(hash.kvs_key(), format!("tx:{HASH}"));
    }

    #[test]
    fn test_tx_hash_normalizes_case() {
        let upper = HASH.to_uppercase().replace("0X", "0x");
        let hash: TxHash = upper.parse().unwrap();
        assert_eq!(hash.to_string(), HASH);
    }

    #[test]
    fn test_tx_hash_rejects_short_input() {
        assert_eq!("0xDEAD".parse::<TxHash>(), Err(ProofError::MalformedHash));
        assert_eq!(
            HASH[..65].parse::<TxHash>(),
            Err(ProofError::MalformedHash)
        );
    }

    #[test]
    fn test_tx_hash_rejects_missing_prefix() {
        let bare = &HASH[2..];
        assert_eq!(bare.parse::<TxHash>(), Err(ProofError::MalformedHash));
    }

    #[test]
    fn test_tx_hash_rejects_non_hex() {
        let wrong = format!("0x{}", "zz".repeat(32));
        assert_eq!(wrong.parse::<TxHash>(), Err(ProofError::MalformedHash));
    }

    #[test]
    fn test_bearer_parse() {
        let proof = PaymentProof::from_bearer(&format!("Bearer {HASH}")).unwrap();
        assert_eq!(proof.tx_hash.to_string(), HASH);
        assert_eq!(proof.declared_amount, None);
    }

    #[test]
    fn test_bearer_rejects_other_schemes() {
        assert_eq!(
            PaymentProof::from_bearer(&format!("Basic {HASH}")),
            Err(ProofError::MalformedScheme)
        );
    }

    #[test]
    fn test_x402_payment_with_amount() {
        let proof = PaymentProof::from_x402_payment(&format!("{HASH},1000")).unwrap();
        assert_eq!(proof.declared_amount, Some(U256::from(1000u64)));
    }

    #[test]
    fn test_x402_payment_without_amount() {
        let proof = PaymentProof::from_x402_payment(HASH).unwrap();
        assert_eq!(proof.declared_amount, None);
    }

    #[test]
    fn test_x402_payment_rejects_bad_amount() {
        assert_eq!(
            PaymentProof::from_x402_payment(&format!("{HASH},0.001")),
            Err(ProofError::MalformedAmount)
        );
        assert_eq!(
            PaymentProof::from_x402_payment(&format!("{HASH},")),
            Err(ProofError::MalformedAmount)
        );
    }

    #[test]
    fn test_from_headers_prefers_authorization() {
        let other = format!("{},999", HASH.replace('a', "b"));
        let proof =
            PaymentProof::from_headers(Some(&format!("Bearer {HASH}")), Some(&other)).unwrap();
        assert_eq!(proof.unwrap().tx_hash.to_string(), HASH);
    }

    #[test]
    fn test_from_headers_absent() {
        assert_eq!(PaymentProof::from_headers(None, None), Ok(None));
    }
}
