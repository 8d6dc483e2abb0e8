// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Client-side encrypted input builder.
//!
//! Produces mock ciphertexts in the layout [`crate::proof::decode_input_value`]
//! reads back, together with the handles a `verifyCiphertext` call declares.

use alloy_primitives::{keccak256, Address, Bytes, B256};
use num_bigint::BigUint;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::abi::OperationCall;
use crate::config::{
    HANDLE_INDEX_OFFSET, HANDLE_TYPE_OFFSET, HANDLE_VERSION, INPUT_NOISE_BYTES, INPUT_SLOT_BYTES,
    MAX_INPUT_BITS, MAX_INPUT_VALUES,
};
use crate::error::{KernelError, KernelResult};
use crate::types::cleartext::{mask, to_be_padded};
use crate::types::{FheType, Handle};

/// Output of [`EncryptedInput::encrypt`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedPayload {
    pub handles: Vec<Handle>,
    pub input_proof: Bytes,
    pub contract: Address,
    pub caller: Address,
}

impl EncryptedPayload {
    /// The `verifyCiphertext` call a contract issues for value `index`.
    pub fn verify_call(&self, index: usize) -> Option<OperationCall> {
        let handle = *self.handles.get(index)?;
        Some(OperationCall::VerifyCiphertext {
            input_handle: handle,
            caller: self.caller,
            contract: self.contract,
            input_proof: self.input_proof.clone(),
            input_type: handle.type_tag(),
        })
    }
}

/// Accumulates typed plaintexts for one encrypted input.
#[derive(Clone, Debug)]
pub struct EncryptedInput {
    contract: Address,
    caller: Address,
    values: Vec<(FheType, BigUint)>,
    bits: u32,
}

fn parse_address(s: &str) -> KernelResult<Address> {
    s.parse::<Address>()
        .map_err(|e| KernelError::InvalidAddress(format!("{}: {}", s, e)))
}

/// Builder entry point taking textual addresses.
pub fn create_encrypted_input(contract: &str, caller: &str) -> KernelResult<EncryptedInput> {
    Ok(EncryptedInput::new(parse_address(contract)?, parse_address(caller)?))
}

impl EncryptedInput {
    pub fn new(contract: Address, caller: Address) -> Self {
        Self { contract, caller, values: Vec::new(), bits: 0 }
    }

    pub fn contract(&self) -> Address {
        self.contract
    }

    pub fn caller(&self) -> Address {
        self.caller
    }

    fn push(&mut self, ty: FheType, value: BigUint) -> KernelResult<&mut Self> {
        if value > mask(ty.bit_width()) {
            return Err(KernelError::ValueOutOfRange { ty: ty.name(), value: value.to_string() });
        }
        if self.values.len() >= MAX_INPUT_VALUES {
            return Err(KernelError::TooManyValues { max: MAX_INPUT_VALUES });
        }
        let requested = self.bits + ty.packed_bits();
        if requested > MAX_INPUT_BITS {
            return Err(KernelError::TooMuchData { max: MAX_INPUT_BITS, requested });
        }
        self.bits = requested;
        self.values.push((ty, value));
        Ok(self)
    }

    pub fn add_bool(&mut self, value: bool) -> KernelResult<&mut Self> {
        self.push(FheType::Bool, BigUint::from(value as u8))
    }

    pub fn add4(&mut self, value: impl Into<BigUint>) -> KernelResult<&mut Self> {
        self.push(FheType::Uint4, value.into())
    }

    pub fn add8(&mut self, value: impl Into<BigUint>) -> KernelResult<&mut Self> {
        self.push(FheType::Uint8, value.into())
    }

    pub fn add16(&mut self, value: impl Into<BigUint>) -> KernelResult<&mut Self> {
        self.push(FheType::Uint16, value.into())
    }

    pub fn add32(&mut self, value: impl Into<BigUint>) -> KernelResult<&mut Self> {
        self.push(FheType::Uint32, value.into())
    }

    pub fn add64(&mut self, value: impl Into<BigUint>) -> KernelResult<&mut Self> {
        self.push(FheType::Uint64, value.into())
    }

    pub fn add128(&mut self, value: impl Into<BigUint>) -> KernelResult<&mut Self> {
        self.push(FheType::Uint128, value.into())
    }

    pub fn add_address(&mut self, value: &str) -> KernelResult<&mut Self> {
        let address = parse_address(value)?;
        self.push(FheType::Address, BigUint::from_bytes_be(address.as_slice()))
    }

    /// Adds a 256-byte blob, interpreted as a big-endian integer.
    pub fn add_bytes256(&mut self, value: &[u8]) -> KernelResult<&mut Self> {
        if value.len() > FheType::Bytes256.byte_size() {
            return Err(KernelError::ValueOutOfRange {
                ty: FheType::Bytes256.name(),
                value: format!("{} bytes", value.len()),
            });
        }
        self.push(FheType::Bytes256, BigUint::from_bytes_be(value))
    }

    pub fn values(&self) -> Vec<BigUint> {
        self.values.iter().map(|(_, v)| v.clone()).collect()
    }

    pub fn types(&self) -> Vec<FheType> {
        self.values.iter().map(|(ty, _)| *ty).collect()
    }

    pub fn reset(&mut self) -> &mut Self {
        self.values.clear();
        self.bits = 0;
        self
    }

    pub fn encrypt(&self) -> EncryptedPayload {
        self.encrypt_with_rng(&mut rand::rng())
    }

    pub fn encrypt_with_rng<R: RngCore + ?Sized>(&self, rng: &mut R) -> EncryptedPayload {
        let mut proof = Vec::new();
        for (ty, value) in &self.values {
            proof.push(ty.tag());
            proof.extend_from_slice(&to_be_padded(value, ty.byte_size()));
            let mut noise = [0u8; INPUT_NOISE_BYTES];
            rng.fill_bytes(&mut noise);
            proof.extend_from_slice(&noise);
            if ty.byte_size() < INPUT_SLOT_BYTES {
                proof.resize(proof.len() + INPUT_SLOT_BYTES - ty.byte_size(), 0);
            }
        }

        let payload_hash = keccak256(&proof);
        let handles = self
            .values
            .iter()
            .enumerate()
            .map(|(i, (ty, _))| input_handle(payload_hash, i as u8, *ty))
            .collect();

        EncryptedPayload {
            handles,
            input_proof: Bytes::from(proof),
            contract: self.contract,
            caller: self.caller,
        }
    }
}

/// `keccak256(payload_hash || index)` stamped with `(index, type, version)`.
fn input_handle(payload_hash: B256, index: u8, ty: FheType) -> Handle {
    let mut preimage = [0u8; 33];
    preimage[..32].copy_from_slice(payload_hash.as_slice());
    preimage[32] = index;
    let mut bytes = keccak256(preimage).0;
    bytes[HANDLE_INDEX_OFFSET] = index;
    bytes[HANDLE_TYPE_OFFSET] = ty.tag();
    bytes[HANDLE_TYPE_OFFSET + 1] = HANDLE_VERSION;
    Handle::from_bytes(bytes)
}
