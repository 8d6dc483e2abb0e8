// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Resolves operands of a decoded executor call and computes its result.

use alloy_primitives::U256;
use fhemock_kernel::abi::OperationCall;
use fhemock_kernel::codec::{self, declared_type, HandlePreimage};
use fhemock_kernel::config::SCALAR_FLAG;
use fhemock_kernel::operator::Operator;
use fhemock_kernel::ops;
use fhemock_kernel::proof::decode_input_value;
use fhemock_kernel::types::cleartext::{from_be_bytes, from_u256, reduce};
use fhemock_kernel::types::{FheType, Handle};
use fhemock_kernel::KernelError;
use num_bigint::BigUint;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;

use crate::errors::EngineError;
use crate::store::HandleStore;

/// Result of one executor call, ready to be stored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Evaluation {
    pub operator: Operator,
    pub handle: Handle,
    pub cleartext: BigUint,
    /// Random results overwrite whatever a reverted draw left behind.
    pub replace: bool,
}

pub struct OperationEvaluator {
    rng: StdRng,
}

impl OperationEvaluator {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self { rng }
    }

    /// Evaluates `call`. Operands are read from `store` without retry: within a
    /// flush every operand was written by an earlier call.
    pub async fn evaluate(
        &mut self,
        call: &OperationCall,
        store: &HandleStore,
        random_counter: &mut u64,
    ) -> Result<Evaluation, EngineError> {
        let operator = call.operator();
        let (handle, cleartext) = match call {
            OperationCall::Binary { op, lhs, rhs, scalar_byte } => {
                let (lhs_handle, lhs_value) = resolve(store, *lhs).await?;
                let lhs_type = lhs_handle.fhe_type()?;
                let rhs_value = if *scalar_byte == SCALAR_FLAG {
                    from_u256(rhs)
                } else {
                    resolve(store, *rhs).await?.1
                };
                let value = ops::binary(*op, &lhs_value, &rhs_value, lhs_type.bit_width())?;
                let result_type = if op.is_comparison() { FheType::Bool } else { lhs_type };
                let preimage = HandlePreimage::Binary { lhs: *lhs, rhs: *rhs, scalar: *scalar_byte };
                (codec::encode(*op, result_type, &preimage), value)
            }
            OperationCall::BinaryBytes { op, lhs, rhs, scalar_byte } => {
                if *scalar_byte != SCALAR_FLAG {
                    return Err(KernelError::InvalidOperation(format!(
                        "{} with a bytes operand must be scalar",
                        op
                    ))
                    .into());
                }
                let (lhs_handle, lhs_value) = resolve(store, *lhs).await?;
                let width = lhs_handle.fhe_type()?.bit_width();
                let value = ops::binary(*op, &lhs_value, &from_be_bytes(rhs), width)?;
                let preimage = HandlePreimage::BinaryBytes {
                    lhs: *lhs,
                    rhs: rhs.to_vec(),
                    scalar: *scalar_byte,
                };
                (codec::encode(*op, FheType::Bool, &preimage), value)
            }
            OperationCall::Unary { op, ct } => {
                let (ct_handle, value) = resolve(store, *ct).await?;
                let ty = ct_handle.fhe_type()?;
                let value = match op {
                    Operator::Neg => ops::neg(&value, ty.bit_width()),
                    Operator::Not => ops::not(&value, ty.bit_width()),
                    other => {
                        return Err(KernelError::InvalidOperation(format!("{} is not unary", other)).into())
                    }
                };
                (codec::encode(*op, ty, &HandlePreimage::Unary { ct: *ct }), value)
            }
            OperationCall::VerifyCiphertext { input_handle, input_proof, input_type, .. } => {
                if *input_type != input_handle.type_tag() {
                    tracing::debug!(
                        "verifyCiphertext declares type {} for handle {}, using the handle",
                        input_type,
                        input_handle
                    );
                }
                let value = decode_input_value(input_handle, input_proof)?;
                (*input_handle, value)
            }
            OperationCall::Cast { ct, to_type } => {
                let to = declared_type(*to_type)?;
                let (_, value) = resolve(store, *ct).await?;
                let preimage = HandlePreimage::Typed { value: *ct, to_type: *to_type };
                (codec::encode(Operator::Cast, to, &preimage), ops::cast(&value, to.bit_width()))
            }
            OperationCall::TrivialEncrypt { plaintext, to_type } => {
                let to = declared_type(*to_type)?;
                let value = reduce(&from_u256(plaintext), to.bit_width());
                let preimage = HandlePreimage::Typed { value: *plaintext, to_type: *to_type };
                (codec::encode(Operator::TrivialEncrypt, to, &preimage), value)
            }
            OperationCall::TrivialEncryptBytes { plaintext, to_type } => {
                let to = declared_type(*to_type)?;
                let value = reduce(&from_be_bytes(plaintext), to.bit_width());
                let preimage = HandlePreimage::TypedBytes { value: plaintext.to_vec(), to_type: *to_type };
                (codec::encode(Operator::TrivialEncrypt, to, &preimage), value)
            }
            OperationCall::IfThenElse { control, if_true, if_false } => {
                let (_, control_value) = resolve(store, *control).await?;
                let (true_handle, true_value) = resolve(store, *if_true).await?;
                let (false_handle, false_value) = resolve(store, *if_false).await?;
                let taken = if control_value == BigUint::from(1u8) { true_handle } else { false_handle };
                let value = ops::select(&control_value, true_value, false_value);
                let preimage = HandlePreimage::Select {
                    control: *control,
                    if_true: *if_true,
                    if_false: *if_false,
                };
                (codec::encode(Operator::IfThenElse, taken.fhe_type()?, &preimage), value)
            }
            OperationCall::Rand { rand_type } => {
                let ty = declared_type(*rand_type)?;
                let value = ops::random_bits(&mut self.rng, ty.bit_width() as u64);
                let preimage = HandlePreimage::Rand { rand_type: *rand_type, counter: U256::from(*random_counter) };
                *random_counter += 1;
                (codec::encode(Operator::Rand, ty, &preimage), value)
            }
            OperationCall::RandBounded { upper_bound, rand_type } => {
                let ty = declared_type(*rand_type)?;
                let bits = ops::bounded_bits(&from_u256(upper_bound));
                let value = reduce(&ops::random_bits(&mut self.rng, bits), ty.bit_width());
                let preimage = HandlePreimage::RandBounded {
                    upper_bound: *upper_bound,
                    rand_type: *rand_type,
                    counter: U256::from(*random_counter),
                };
                *random_counter += 1;
                (codec::encode(Operator::RandBounded, ty, &preimage), value)
            }
        };
        Ok(Evaluation { operator, handle, cleartext, replace: operator.is_random() })
    }
}

async fn resolve(store: &HandleStore, word: U256) -> Result<(Handle, BigUint), EngineError> {
    let handle = Handle::from(word);
    match store.get(&handle).await {
        Some(value) => Ok((handle, value)),
        None => Err(EngineError::HandleNotFound(handle)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::RetryPolicy;
    use fhemock_kernel::input::EncryptedInput;
    use alloy_primitives::Address;

    async fn seeded(store: &HandleStore, value: u64, ty: FheType) -> U256 {
        let preimage = HandlePreimage::Typed { value: U256::from(value), to_type: ty.tag() };
        let handle = codec::encode(Operator::TrivialEncrypt, ty, &preimage);
        store.insert(handle, BigUint::from(value), false).await;
        handle.to_u256()
    }

    #[tokio::test]
    async fn test_add_and_compare() {
        let store = HandleStore::new(RetryPolicy::default());
        let mut eval = OperationEvaluator::new(Some(1));
        let mut counter = 0;
        let five = seeded(&store, 5, FheType::Uint8).await;
        let ten = seeded(&store, 10, FheType::Uint8).await;

        let add = OperationCall::Binary { op: Operator::Add, lhs: five, rhs: U256::from(3), scalar_byte: 1 };
        let out = eval.evaluate(&add, &store, &mut counter).await.unwrap();
        assert_eq!(out.cleartext, BigUint::from(8u8));
        assert_eq!(out.handle.fhe_type().unwrap(), FheType::Uint8);

        let lt = OperationCall::Binary { op: Operator::Lt, lhs: five, rhs: ten, scalar_byte: 0 };
        let out = eval.evaluate(&lt, &store, &mut counter).await.unwrap();
        assert_eq!(out.cleartext, BigUint::from(1u8));
        assert_eq!(out.handle.fhe_type().unwrap(), FheType::Bool);
        assert!(!out.replace);
    }

    #[tokio::test]
    async fn test_missing_operand() {
        let store = HandleStore::new(RetryPolicy::default());
        let mut eval = OperationEvaluator::new(Some(1));
        let call = OperationCall::Unary { op: Operator::Not, ct: U256::from(0x0200u64) };
        let err = eval.evaluate(&call, &store, &mut 0).await.unwrap_err();
        assert!(matches!(err, EngineError::HandleNotFound(_)));
    }

    #[tokio::test]
    async fn test_select_follows_branch_type() {
        let store = HandleStore::new(RetryPolicy::default());
        let mut eval = OperationEvaluator::new(Some(1));
        let yes = seeded(&store, 1, FheType::Bool).await;
        let no = seeded(&store, 0, FheType::Bool).await;
        let a = seeded(&store, 7, FheType::Uint16).await;
        let b = seeded(&store, 9, FheType::Uint32).await;

        let pick_a = OperationCall::IfThenElse { control: yes, if_true: a, if_false: b };
        let out = eval.evaluate(&pick_a, &store, &mut 0).await.unwrap();
        assert_eq!(out.cleartext, BigUint::from(7u8));
        assert_eq!(out.handle.fhe_type().unwrap(), FheType::Uint16);

        let pick_b = OperationCall::IfThenElse { control: no, if_true: a, if_false: b };
        let out = eval.evaluate(&pick_b, &store, &mut 0).await.unwrap();
        assert_eq!(out.cleartext, BigUint::from(9u8));
        assert_eq!(out.handle.fhe_type().unwrap(), FheType::Uint32);
    }

    #[tokio::test]
    async fn test_random_advances_counter() {
        let store = HandleStore::new(RetryPolicy::default());
        let mut eval = OperationEvaluator::new(Some(1));
        let mut counter = 4;
        let call = OperationCall::RandBounded { upper_bound: U256::from(16), rand_type: FheType::Uint8.tag() };
        let first = eval.evaluate(&call, &store, &mut counter).await.unwrap();
        let second = eval.evaluate(&call, &store, &mut counter).await.unwrap();
        assert_eq!(counter, 6);
        assert_ne!(first.handle, second.handle);
        assert!(first.replace);
        assert!(first.cleartext < BigUint::from(16u8));
    }

    #[tokio::test]
    async fn test_verify_reads_proof() {
        let store = HandleStore::new(RetryPolicy::default());
        let mut eval = OperationEvaluator::new(None);
        let mut input = EncryptedInput::new(Address::repeat_byte(1), Address::repeat_byte(2));
        input.add8(3u8).unwrap().add64(1u64 << 40).unwrap();
        let payload = input.encrypt();
        let call = payload.verify_call(1).unwrap();
        let out = eval.evaluate(&call, &store, &mut 0).await.unwrap();
        assert_eq!(out.handle, payload.handles[1]);
        assert_eq!(out.cleartext, BigUint::from(1u64 << 40));
    }

    #[tokio::test]
    async fn test_bad_declared_type() {
        let store = HandleStore::new(RetryPolicy::default());
        let mut eval = OperationEvaluator::new(Some(1));
        let call = OperationCall::TrivialEncrypt { plaintext: U256::from(1), to_type: 99 };
        let err = eval.evaluate(&call, &store, &mut 0).await.unwrap_err();
        assert!(matches!(err, EngineError::Kernel(KernelError::InvalidType(99))));
    }
}
