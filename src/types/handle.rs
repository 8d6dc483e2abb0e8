// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Content-addressed ciphertext handles.
//!
//! Layout (32 bytes, big-endian):
//! ```text
//! [0..29)  hash prefix
//! [29]     input index (verified inputs only, otherwise hash)
//! [30]     type tag
//! [31]     version
//! ```

use alloy_primitives::{B256, U256};
use serde::{Serialize, Deserialize};

use crate::config::{HANDLE_INDEX_OFFSET, HANDLE_TYPE_OFFSET};
use crate::error::{KernelError, KernelResult};
use crate::types::FheType;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Handle(pub B256);

impl Handle {
    pub const LEN: usize = 32;

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Handle(B256::from(bytes))
    }

    pub fn from_u256(value: U256) -> Self {
        Handle(B256::from(value.to_be_bytes::<32>()))
    }

    /// Parses a hex handle. Shorter inputs are left-padded, matching handles
    /// that travelled through an integer representation.
    pub fn from_hex(s: &str) -> KernelResult<Self> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        if digits.len() > 64 {
            return Err(KernelError::InvalidHandle(format!("{} hex digits", digits.len())));
        }
        let padded = format!("{:0>64}", digits);
        let raw = hex::decode(&padded).map_err(|e| KernelError::InvalidHandle(e.to_string()))?;
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&raw);
        Ok(Self::from_bytes(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0 .0
    }

    pub fn to_u256(&self) -> U256 {
        U256::from_be_bytes(self.0 .0)
    }

    pub fn type_tag(&self) -> u8 {
        self.0[HANDLE_TYPE_OFFSET]
    }

    pub fn input_index(&self) -> u8 {
        self.0[HANDLE_INDEX_OFFSET]
    }

    pub fn version(&self) -> u8 {
        self.0[Self::LEN - 1]
    }

    pub fn fhe_type(&self) -> KernelResult<FheType> {
        let tag = self.type_tag();
        FheType::from_u8(tag)
            .ok_or_else(|| KernelError::InvalidHandle(format!("{} has type tag {}", self, tag)))
    }
}

impl From<U256> for Handle {
    fn from(value: U256) -> Self {
        Self::from_u256(value)
    }
}

impl From<B256> for Handle {
    fn from(value: B256) -> Self {
        Handle(value)
    }
}

impl From<Handle> for U256 {
    fn from(handle: Handle) -> Self {
        handle.to_u256()
    }
}

impl core::fmt::Display for Handle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "0x{}", hex::encode(self.as_bytes()))
    }
}

impl core::fmt::Debug for Handle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Handle({})", self)
    }
}
