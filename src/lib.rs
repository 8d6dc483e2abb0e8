// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.

//! fhemock-kernel: deterministic handle derivation and cleartext semantics
//! for a mock FHE coprocessor.
//!
//! Everything in this crate is synchronous and free of I/O. The async
//! session layer (store, trace scanner, ledger clients) lives in `fhemock-node`.

pub mod config;
pub mod error;
pub mod types;
pub mod operator;
pub mod codec;
pub mod abi;
pub mod ops;
pub mod proof;
pub mod input;
pub mod trace;
pub mod digest;

pub use error::{KernelError, KernelResult};
pub use types::{Cleartext, FheType, Handle};
pub use operator::Operator;
pub use abi::OperationCall;

#[cfg(test)]
pub mod tests;
