//! Identifier generation.

use rand::rngs::OsRng;
use rand::RngCore;

/// Generate a collision-resistant identifier: 32 lowercase hex characters
/// from 16 bytes of OS randomness. No timestamp or counter component.
pub fn new_id() -> String {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
