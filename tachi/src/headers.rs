//! Wire header names for the x402 payment-challenge protocol.
//!
//! Challenge headers are emitted lowercase on 402 responses so crawler SDKs
//! can parse them byte-for-byte. Proof headers are consumed case-insensitively
//! as usual for HTTP.

/// Alternate payment proof header (client → gateway): `<txhash>,<amount>`.
pub const X402_PAYMENT_HEADER: &str = "x-402-payment";

/// Price in USDC base units, integer as decimal string.
pub const X402_PRICE_HEADER: &str = "x402-price";

/// Currency code; always `USDC`.
pub const X402_CURRENCY_HEADER: &str = "x402-currency";

/// Numeric EVM chain id of the settlement network.
pub const X402_CHAIN_ID_HEADER: &str = "x402-chain-id";

/// Address the payment must be sent to (the `PaymentProcessor` contract).
pub const X402_RECIPIENT_HEADER: &str = "x402-recipient";

/// Address of the USDC token contract.
pub const X402_CONTRACT_HEADER: &str = "x402-contract";

/// Address of the publisher license (`CrawlNFT`) contract.
pub const X402_CRAWL_NFT_HEADER: &str = "x402-crawl-nft";

/// Publisher license token id.
pub const X402_TOKEN_ID_HEADER: &str = "x402-token-id";

/// Rate-limit ceiling for the current window.
pub const RATE_LIMIT_LIMIT_HEADER: &str = "x-ratelimit-limit";

/// Requests remaining in the current window.
pub const RATE_LIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";
