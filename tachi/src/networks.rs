//! Well-known EVM network names.
//!
//! Challenge bodies carry a human-readable network name next to the numeric
//! chain id so crawler operators can sanity-check where they are paying.

/// Returns the conventional name for a chain id, if the network is known.
#[must_use]
pub const fn network_name(chain_id: u64) -> Option<&'static str> {
    match chain_id {
        1 => Some("ethereum"),
        8453 => Some("base"),
        84532 => Some("base-sepolia"),
        10 => Some("optimism"),
        137 => Some("polygon"),
        42161 => Some("arbitrum-one"),
        _ => None,
    }
}

/// Like [`network_name`], falling back to the CAIP-2 style `eip155:<id>`.
#[must_use]
pub fn network_label(chain_id: u64) -> String {
    network_name(chain_id).map_or_else(|| format!("eip155:{chain_id}"), str::to_owned)
}
