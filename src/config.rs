// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Configuration constants.

/// Version byte written at the end of every handle.
pub const HANDLE_VERSION: u8 = 0;

/// Byte offset of the type tag inside a handle.
pub const HANDLE_TYPE_OFFSET: usize = 30;

/// Byte offset of the input index inside a verified-input handle.
pub const HANDLE_INDEX_OFFSET: usize = 29;

/// Width in bytes of the value slot used for packed small inputs.
pub const INPUT_SLOT_BYTES: usize = 20;

/// Random padding appended to every input value to simulate encryption noise.
pub const INPUT_NOISE_BYTES: usize = 32;

/// Stride between packed small inputs: tag byte + slot + noise.
pub const INPUT_SLOT_STRIDE: usize = 1 + INPUT_SLOT_BYTES + INPUT_NOISE_BYTES;

/// Maximum number of values in one encrypted input.
pub const MAX_INPUT_VALUES: usize = 12;

/// Maximum total packed bit width of one encrypted input.
pub const MAX_INPUT_BITS: u32 = 2048;

/// Scalar-operand marker carried in the `bytes1 scalarByte` argument.
pub const SCALAR_FLAG: u8 = 0x01;
