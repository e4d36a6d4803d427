//! Gateway error taxonomy.
//!
//! Every way a request can terminate early is a [`GatewayError`] variant;
//! the response mapping lives with the challenger so 402s can carry the full
//! payment challenge. Verification failures are data, not exceptions: the
//! verifier returns the tagged variant and the handler pattern-matches.

use axum::http::StatusCode;
use tachi::ProofError;
use tachi::kvs::KvsError;
use tachi_evm::ChainError;

/// Terminal request outcomes other than a successful proxy pass.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Malformed request surface (disallowed method, bad headers).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Declared request body exceeds the configured maximum.
    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge {
        /// The configured `MAX_REQUEST_SIZE`.
        limit: u64,
    },

    /// Per-IP request budget for the current window is spent.
    #[error("rate limit exceeded")]
    RateLimited {
        /// Requests allowed per window.
        limit: u32,
        /// Seconds until the window resets.
        retry_after: u64,
    },

    /// An identified crawler presented no payment proof.
    #[error("payment required")]
    MissingProof,

    /// A proof header was present but unparseable.
    #[error("malformed payment proof: {0}")]
    MalformedProof(String),

    /// The transaction hash was already consumed.
    #[error("payment transaction already used")]
    Replay,

    /// No receipt exists for the claimed hash.
    #[error("payment transaction not found")]
    NotFound,

    /// The claimed transaction was mined but reverted.
    #[error("payment transaction failed on-chain")]
    TxFailed,

    /// No qualifying USDC transfer to the payment processor.
    #[error("payment insufficient or sent to the wrong recipient")]
    InsufficientOrWrongRecipient,

    /// Chain RPC or KVS unreachable after retries.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The publisher origin could not be reached or answered garbage.
    #[error("origin proxy error: {0}")]
    Proxy(String),

    /// Anything unexpected.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// The HTTP status this error maps to.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::MissingProof
            | Self::MalformedProof(_)
            | Self::Replay
            | Self::NotFound
            | Self::TxFailed
            | Self::InsufficientOrWrongRecipient => StatusCode::PAYMENT_REQUIRED,
            Self::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Proxy(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable error code for response bodies.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::PayloadTooLarge { .. } => "payload_too_large",
            Self::RateLimited { .. } => "rate_limited",
            Self::MissingProof => "payment_required",
            Self::MalformedProof(_) => "malformed_proof",
            Self::Replay => "payment_replay",
            Self::NotFound => "payment_not_found",
            Self::TxFailed => "payment_tx_failed",
            Self::InsufficientOrWrongRecipient => "payment_invalid",
            Self::UpstreamUnavailable(_) => "upstream_unavailable",
            Self::Proxy(_) => "origin_unreachable",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Whether the response should carry the payment challenge body.
    #[must_use]
    pub const fn is_payment_error(&self) -> bool {
        matches!(
            self,
            Self::MissingProof
                | Self::MalformedProof(_)
                | Self::Replay
                | Self::NotFound
                | Self::TxFailed
                | Self::InsufficientOrWrongRecipient
        )
    }
}

impl From<ProofError> for GatewayError {
    fn from(error: ProofError) -> Self {
        Self::MalformedProof(error.to_string())
    }
}

impl From<ChainError> for GatewayError {
    fn from(error: ChainError) -> Self {
        Self::UpstreamUnavailable(error.to_string())
    }
}

impl From<KvsError> for GatewayError {
    fn from(error: KvsError) -> Self {
        Self::UpstreamUnavailable(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(GatewayError::MissingProof.status(), StatusCode::PAYMENT_REQUIRED);
        assert_eq!(GatewayError::Replay.status(), StatusCode::PAYMENT_REQUIRED);
        assert_eq!(
            GatewayError::UpstreamUnavailable(String::new()).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            GatewayError::Proxy(String::new()).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            GatewayError::RateLimited { limit: 100, retry_after: 30 }.status(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[test]
    fn test_payment_errors_carry_challenge() {
        assert!(GatewayError::MissingProof.is_payment_error());
        assert!(GatewayError::MalformedProof(String::new()).is_payment_error());
        assert!(GatewayError::Replay.is_payment_error());
        assert!(!GatewayError::Proxy(String::new()).is_payment_error());
        assert!(!GatewayError::BadRequest(String::new()).is_payment_error());
    }
}
