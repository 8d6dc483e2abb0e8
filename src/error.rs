// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Error types.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KernelError {
    /// Handle is malformed or carries an unknown type tag.
    #[error("invalid handle: {0}")]
    InvalidHandle(String),
    /// A declared type argument (`toType`, `randType`) is not a known tag.
    #[error("invalid type tag {0}")]
    InvalidType(u8),
    /// Selector is not part of the executor interface.
    #[error("unknown operator selector 0x{}", hex::encode(.0))]
    UnknownOperator([u8; 4]),
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
    #[error("abi decode failed: {0}")]
    AbiDecode(String),
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    #[error("value out of range for {ty}: {value}")]
    ValueOutOfRange { ty: &'static str, value: String },
    #[error("too many values in encrypted input (max {max})")]
    TooManyValues { max: usize },
    #[error("encrypted input exceeds {max} bits (requested {requested})")]
    TooMuchData { max: u32, requested: u32 },
    #[error("malformed input proof: {0}")]
    MalformedInputProof(String),
    #[error("malformed trace: {0}")]
    MalformedTrace(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type KernelResult<T> = core::result::Result<T, KernelError>;
