// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Input proof decoding.
//!
//! An input proof is the concatenation of one blob per value:
//!
//! ```text
//! [tag: 1][value: byte_size, big-endian][noise: 32][zero pad up to a 20-byte slot]
//! ```
//!
//! Values up to 160 bits occupy a fixed 53-byte stride, so value `i` starts at
//! `1 + 53 * i`. An `ebytes256` value is read from bytes `[1, 257)`.

use std::io::{Cursor, Read};

use byteorder::ReadBytesExt;
use num_bigint::BigUint;

use crate::config::INPUT_SLOT_STRIDE;
use crate::error::{KernelError, KernelResult};
use crate::types::cleartext::reduce;
use crate::types::{FheType, Handle};

/// Recovers the cleartext a verified-input handle refers to.
pub fn decode_input_value(handle: &Handle, input_proof: &[u8]) -> KernelResult<BigUint> {
    let ty = handle.fhe_type()?;
    let start = match ty {
        FheType::Bytes256 => 0,
        _ => handle.input_index() as usize * INPUT_SLOT_STRIDE,
    };

    let mut cursor = Cursor::new(input_proof);
    cursor.set_position(start as u64);

    let tag = cursor.read_u8().map_err(|_| {
        KernelError::MalformedInputProof(format!("no slot at offset {} ({} bytes)", start, input_proof.len()))
    })?;
    if tag != ty.tag() {
        return Err(KernelError::MalformedInputProof(format!(
            "slot at offset {} is tagged {}, handle expects {}",
            start,
            tag,
            ty
        )));
    }

    let mut value = vec![0u8; ty.byte_size()];
    cursor.read_exact(&mut value).map_err(|_| {
        KernelError::MalformedInputProof(format!("{} value truncated at offset {}", ty, start + 1))
    })?;

    Ok(reduce(&BigUint::from_bytes_be(&value), ty.bit_width()))
}
