//! The HTTP 402 payment challenge and error response mapping.
//!
//! Every 402 carries the same machine-recoverable structure — the JSON
//! challenge body plus the lowercase `x402-*` header set — regardless of
//! which verification step rejected the proof, so crawler SDKs can always
//! recover mechanically. Non-payment errors get plain `{error, message}`
//! bodies; in production the 500 body is generic.

use axum::Json;
use axum::body::Body;
use axum::http::header::{CONTENT_TYPE, RETRY_AFTER};
use axum::http::{Response, StatusCode};
use axum::response::IntoResponse;
use serde_json::json;
use tachi::challenge::{ChallengeBody, PaymentTerms};
use tachi::headers::{
    RATE_LIMIT_LIMIT_HEADER, RATE_LIMIT_REMAINING_HEADER, X402_CHAIN_ID_HEADER,
    X402_CONTRACT_HEADER, X402_CRAWL_NFT_HEADER, X402_CURRENCY_HEADER, X402_PRICE_HEADER,
    X402_RECIPIENT_HEADER, X402_TOKEN_ID_HEADER,
};
use tachi::networks::network_label;

use crate::admission::CORS_HEADERS;
use crate::config::GatewayConfig;
use crate::error::GatewayError;

/// Builds payment challenges and maps [`GatewayError`] to responses.
///
/// All config-derived values are rendered once at construction; the hot path
/// only clones strings.
#[derive(Debug, Clone)]
pub struct Challenger {
    terms: PaymentTerms,
    price_base_units: String,
    chain_id: String,
    recipient: String,
    usdc: String,
    crawl_nft: String,
    token_id: String,
    production: bool,
}

impl Challenger {
    /// Renders the challenge surface from the gateway configuration.
    #[must_use]
    pub fn new(config: &GatewayConfig) -> Self {
        let terms = PaymentTerms {
            amount: config.price.to_string(),
            currency: "USDC".to_owned(),
            network: network_label(config.chain_id),
            chain_id: config.chain_id,
            recipient: config.payment_processor,
            token_address: config.usdc,
            crawl_nft_address: config.crawl_nft,
            token_id: config.crawl_token_id.to_string(),
        };
        Self {
            terms,
            price_base_units: config.price.base_units().to_string(),
            chain_id: config.chain_id.to_string(),
            recipient: format!("{:#x}", config.payment_processor),
            usdc: format!("{:#x}", config.usdc),
            crawl_nft: format!("{:#x}", config.crawl_nft),
            token_id: config.crawl_token_id.to_string(),
            production: config.environment.is_production(),
        }
    }

    /// Builds the 402 response for the given error code and message.
    #[must_use]
    pub fn challenge_response(&self, code: &str, message: &str) -> Response<Body> {
        let body = ChallengeBody {
            error: code.to_owned(),
            message: message.to_owned(),
            payment: self.terms.clone(),
            instructions: vec![
                format!(
                    "Transfer {} USDC ({} base units) to {} via the USDC contract {} on {} (chain id {}).",
                    self.terms.amount,
                    self.price_base_units,
                    self.recipient,
                    self.usdc,
                    self.terms.network,
                    self.chain_id,
                ),
                "Retry with the transaction hash: Authorization: Bearer <txHash>".to_owned(),
                "Or: X-402-Payment: <txHash>,<amountBaseUnits>".to_owned(),
            ],
        };

        let mut builder = Response::builder()
            .status(StatusCode::PAYMENT_REQUIRED)
            .header(X402_PRICE_HEADER, &self.price_base_units)
            .header(X402_CURRENCY_HEADER, "USDC")
            .header(X402_CHAIN_ID_HEADER, &self.chain_id)
            .header(X402_RECIPIENT_HEADER, &self.recipient)
            .header(X402_CONTRACT_HEADER, &self.usdc)
            .header(X402_CRAWL_NFT_HEADER, &self.crawl_nft)
            .header(X402_TOKEN_ID_HEADER, &self.token_id)
            .header(CONTENT_TYPE, "application/json");
        for (name, value) in CORS_HEADERS {
            builder = builder.header(name, value);
        }
        builder
            .body(Body::from(
                serde_json::to_vec(&body).unwrap_or_default(),
            ))
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
    }

    /// Maps any terminal error to its client-visible response.
    #[must_use]
    pub fn error_response(&self, error: &GatewayError) -> Response<Body> {
        if error.is_payment_error() {
            return self.challenge_response(error.code(), &error.to_string());
        }

        match error {
            GatewayError::RateLimited { limit, retry_after } => {
                let body = json!({
                    "error": error.code(),
                    "message": error.to_string(),
                });
                let response = Response::builder()
                    .status(StatusCode::TOO_MANY_REQUESTS)
                    .header(RATE_LIMIT_LIMIT_HEADER, limit.to_string())
                    .header(RATE_LIMIT_REMAINING_HEADER, "0")
                    .header(RETRY_AFTER, retry_after.to_string())
                    .header(CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()));
                response.unwrap_or_else(|_| StatusCode::TOO_MANY_REQUESTS.into_response())
            }
            _ => {
                let message = if self.production
                    && matches!(error, GatewayError::Internal(_))
                {
                    "internal error".to_owned()
                } else {
                    error.to_string()
                };
                let body = json!({ "error": error.code(), "message": message });
                (error.status(), Json(body)).into_response()
            }
        }
    }
}
