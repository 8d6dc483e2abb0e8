// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Encrypted value types and their cleartext widths.

use serde::{Serialize, Deserialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum FheType {
    Bool = 0,
    Uint4 = 1,
    Uint8 = 2,
    Uint16 = 3,
    Uint32 = 4,
    Uint64 = 5,
    Uint128 = 6,
    Address = 7,
    Uint256 = 8,
    Bytes64 = 9,
    Bytes128 = 10,
    Bytes256 = 11,
}

impl FheType {
    pub const ALL: [FheType; 12] = [
        FheType::Bool,
        FheType::Uint4,
        FheType::Uint8,
        FheType::Uint16,
        FheType::Uint32,
        FheType::Uint64,
        FheType::Uint128,
        FheType::Address,
        FheType::Uint256,
        FheType::Bytes64,
        FheType::Bytes128,
        FheType::Bytes256,
    ];

    pub fn from_u8(v: u8) -> Option<Self> {
        Self::ALL.get(v as usize).copied()
    }

    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Cleartext width in bits. Every stored cleartext lies in `[0, 2^bit_width)`.
    pub fn bit_width(self) -> u32 {
        match self {
            FheType::Bool => 1,
            FheType::Uint4 => 4,
            FheType::Uint8 => 8,
            FheType::Uint16 => 16,
            FheType::Uint32 => 32,
            FheType::Uint64 => 64,
            FheType::Uint128 => 128,
            FheType::Address => 160,
            FheType::Uint256 => 256,
            FheType::Bytes64 => 512,
            FheType::Bytes128 => 1024,
            FheType::Bytes256 => 2048,
        }
    }

    /// Size of the big-endian value inside an input proof slot.
    pub fn byte_size(self) -> usize {
        match self {
            FheType::Bool | FheType::Uint4 | FheType::Uint8 => 1,
            FheType::Uint16 => 2,
            FheType::Uint32 => 4,
            FheType::Uint64 => 8,
            FheType::Uint128 => 16,
            FheType::Address => 20,
            FheType::Uint256 => 32,
            FheType::Bytes64 => 64,
            FheType::Bytes128 => 128,
            FheType::Bytes256 => 256,
        }
    }

    /// Bits charged against the packing budget of an encrypted input.
    /// Booleans occupy two bits in the input ciphertext list.
    pub fn packed_bits(self) -> u32 {
        match self {
            FheType::Bool => 2,
            other => other.bit_width(),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FheType::Bool => "ebool",
            FheType::Uint4 => "euint4",
            FheType::Uint8 => "euint8",
            FheType::Uint16 => "euint16",
            FheType::Uint32 => "euint32",
            FheType::Uint64 => "euint64",
            FheType::Uint128 => "euint128",
            FheType::Address => "eaddress",
            FheType::Uint256 => "euint256",
            FheType::Bytes64 => "ebytes64",
            FheType::Bytes128 => "ebytes128",
            FheType::Bytes256 => "ebytes256",
        }
    }
}

impl core::fmt::Display for FheType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}
