// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Arbitrary-precision cleartexts.

use alloy_primitives::U256;
use num_bigint::BigUint;
use num_traits::One;

pub type Cleartext = BigUint;

/// `2^bits`
pub fn modulus(bits: u32) -> BigUint {
    BigUint::one() << bits
}

/// `2^bits - 1`
pub fn mask(bits: u32) -> BigUint {
    modulus(bits) - BigUint::one()
}

/// Reduces `value` into `[0, 2^bits)`.
pub fn reduce(value: &BigUint, bits: u32) -> BigUint {
    value & mask(bits)
}

pub fn from_u256(value: &U256) -> BigUint {
    BigUint::from_bytes_be(&value.to_be_bytes::<32>())
}

pub fn from_be_bytes(bytes: &[u8]) -> BigUint {
    BigUint::from_bytes_be(bytes)
}

/// Big-endian encoding left-padded to `len` bytes. Values wider than `len`
/// keep their low-order bytes.
pub fn to_be_padded(value: &BigUint, len: usize) -> Vec<u8> {
    let raw = value.to_bytes_be();
    let mut out = vec![0u8; len];
    if raw.len() >= len {
        out.copy_from_slice(&raw[raw.len() - len..]);
    } else {
        out[len - raw.len()..].copy_from_slice(&raw);
    }
    out
}
