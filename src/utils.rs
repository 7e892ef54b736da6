//! Utility functions for identifiers

use bech32::Bech32m;
use uuid7::uuid7;

/// Human-readable prefix carried by batch identifiers.
pub const BATCH_HRP: &str = "batch_";

// construct a time-ordered id for a batch of pre-generated lines, encoded using bech32
pub fn new_batch_id() -> anyhow::Result<String> {
    let hrp = bech32::Hrp::parse(BATCH_HRP)?;
    let encode = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())?;
    Ok(encode)
}
