// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Canonical fingerprint of a handle → cleartext map.
//!
//! # Hash Input Structure
//! ```text
//! entry count (u64 LE)
//! ↓
//! For each entry (ascending handle order):
//!   bincode((handle bytes, cleartext big-endian bytes))
//! ```
//!
//! Two maps with the same contents hash identically regardless of insertion
//! order.

use num_bigint::BigUint;

use crate::error::{KernelError, KernelResult};
use crate::types::Handle;

pub fn store_digest<'a, I>(entries: I) -> KernelResult<[u8; 32]>
where
    I: IntoIterator<Item = (&'a Handle, &'a BigUint)>,
{
    let mut sorted: Vec<(&Handle, &BigUint)> = entries.into_iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let config = bincode::config::standard();
    let mut hasher = blake3::Hasher::new();
    hasher.update(&(sorted.len() as u64).to_le_bytes());
    for (handle, value) in sorted {
        let entry = (*handle.as_bytes(), value.to_bytes_be());
        let bytes = bincode::serde::encode_to_vec(&entry, config)
            .map_err(|e| KernelError::Serialization(e.to_string()))?;
        hasher.update(&bytes);
    }
    Ok(*hasher.finalize().as_bytes())
}
