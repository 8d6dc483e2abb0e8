// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Handle derivation.
//!
//! A handle is `keccak256(packed preimage)` with its last two bytes replaced
//! by `(result type tag, version)`. Preimages use Solidity packed encoding so
//! the executor contract and the mock derive the same bytes:
//!
//! ```text
//! binary        uint8 op | uint256 lhs | uint256 rhs | bytes1 scalar
//! binary bytes  uint8 op | uint256 lhs | bytes rhs   | bytes1 scalar
//! unary         uint8 op | uint256 ct
//! typed         uint8 op | uint256 value | bytes1 toType
//! typed bytes   uint8 op | bytes value   | bytes1 toType
//! select        uint8 op | uint256 control | uint256 ifTrue | uint256 ifFalse
//! rand          uint8 op | bytes1 randType | uint256 counter
//! rand bounded  uint8 op | uint256 bound | bytes1 randType | uint256 counter
//! ```

use alloy_primitives::{keccak256, B256, U256};

use crate::config::{HANDLE_TYPE_OFFSET, HANDLE_VERSION};
use crate::error::{KernelError, KernelResult};
use crate::operator::Operator;
use crate::types::{FheType, Handle};

/// Operand encoding for one operator invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlePreimage {
    Binary { lhs: U256, rhs: U256, scalar: u8 },
    BinaryBytes { lhs: U256, rhs: Vec<u8>, scalar: u8 },
    Unary { ct: U256 },
    Typed { value: U256, to_type: u8 },
    TypedBytes { value: Vec<u8>, to_type: u8 },
    Select { control: U256, if_true: U256, if_false: U256 },
    Rand { rand_type: u8, counter: U256 },
    RandBounded { upper_bound: U256, rand_type: u8, counter: U256 },
}

impl HandlePreimage {
    /// Packed serialization, prefixed by the operator discriminant.
    pub fn pack(&self, op: Operator) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + 3 * 32 + 1);
        out.push(op.discriminant());
        match self {
            HandlePreimage::Binary { lhs, rhs, scalar } => {
                out.extend_from_slice(&lhs.to_be_bytes::<32>());
                out.extend_from_slice(&rhs.to_be_bytes::<32>());
                out.push(*scalar);
            }
            HandlePreimage::BinaryBytes { lhs, rhs, scalar } => {
                out.extend_from_slice(&lhs.to_be_bytes::<32>());
                out.extend_from_slice(rhs);
                out.push(*scalar);
            }
            HandlePreimage::Unary { ct } => {
                out.extend_from_slice(&ct.to_be_bytes::<32>());
            }
            HandlePreimage::Typed { value, to_type } => {
                out.extend_from_slice(&value.to_be_bytes::<32>());
                out.push(*to_type);
            }
            HandlePreimage::TypedBytes { value, to_type } => {
                out.extend_from_slice(value);
                out.push(*to_type);
            }
            HandlePreimage::Select { control, if_true, if_false } => {
                out.extend_from_slice(&control.to_be_bytes::<32>());
                out.extend_from_slice(&if_true.to_be_bytes::<32>());
                out.extend_from_slice(&if_false.to_be_bytes::<32>());
            }
            HandlePreimage::Rand { rand_type, counter } => {
                out.push(*rand_type);
                out.extend_from_slice(&counter.to_be_bytes::<32>());
            }
            HandlePreimage::RandBounded { upper_bound, rand_type, counter } => {
                out.extend_from_slice(&upper_bound.to_be_bytes::<32>());
                out.push(*rand_type);
                out.extend_from_slice(&counter.to_be_bytes::<32>());
            }
        }
        out
    }
}

/// Derives the handle of `op` applied to `preimage`, typed as `result_type`.
pub fn encode(op: Operator, result_type: FheType, preimage: &HandlePreimage) -> Handle {
    with_type(keccak256(preimage.pack(op)), result_type)
}

/// Overwrites the trailing `(type, version)` bytes of a 32-byte digest.
pub fn with_type(digest: B256, result_type: FheType) -> Handle {
    let mut bytes = digest.0;
    bytes[HANDLE_TYPE_OFFSET] = result_type.tag();
    bytes[HANDLE_TYPE_OFFSET + 1] = HANDLE_VERSION;
    Handle::from_bytes(bytes)
}

pub fn decode_type(handle: &Handle) -> KernelResult<FheType> {
    handle.fhe_type()
}

pub fn decode_type_hex(handle: &str) -> KernelResult<FheType> {
    Handle::from_hex(handle)?.fhe_type()
}

/// Resolves a declared `bytes1` type argument.
pub fn declared_type(tag: u8) -> KernelResult<FheType> {
    FheType::from_u8(tag).ok_or(KernelError::InvalidType(tag))
}
