// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Executor contract ABI.
//!
//! Calldata captured from a trace is decoded once into an [`OperationCall`],
//! a closed enum the evaluator matches on exhaustively.

use std::sync::OnceLock;

use alloy_primitives::{Address, Bytes, FixedBytes, U256};
use alloy_sol_types::{sol, SolCall, SolInterface};
use rustc_hash::FxHashMap;

use crate::error::{KernelError, KernelResult};
use crate::operator::Operator;
use crate::types::Handle;

sol! {
    interface ITFHEExecutor {
        function fheAdd(uint256 lhs, uint256 rhs, bytes1 scalarByte) external returns (uint256 result);
        function fheSub(uint256 lhs, uint256 rhs, bytes1 scalarByte) external returns (uint256 result);
        function fheMul(uint256 lhs, uint256 rhs, bytes1 scalarByte) external returns (uint256 result);
        function fheDiv(uint256 lhs, uint256 rhs, bytes1 scalarByte) external returns (uint256 result);
        function fheRem(uint256 lhs, uint256 rhs, bytes1 scalarByte) external returns (uint256 result);
        function fheBitAnd(uint256 lhs, uint256 rhs, bytes1 scalarByte) external returns (uint256 result);
        function fheBitOr(uint256 lhs, uint256 rhs, bytes1 scalarByte) external returns (uint256 result);
        function fheBitXor(uint256 lhs, uint256 rhs, bytes1 scalarByte) external returns (uint256 result);
        function fheShl(uint256 lhs, uint256 rhs, bytes1 scalarByte) external returns (uint256 result);
        function fheShr(uint256 lhs, uint256 rhs, bytes1 scalarByte) external returns (uint256 result);
        function fheRotl(uint256 lhs, uint256 rhs, bytes1 scalarByte) external returns (uint256 result);
        function fheRotr(uint256 lhs, uint256 rhs, bytes1 scalarByte) external returns (uint256 result);
        function fheEq(uint256 lhs, uint256 rhs, bytes1 scalarByte) external returns (uint256 result);
        function fheNe(uint256 lhs, uint256 rhs, bytes1 scalarByte) external returns (uint256 result);
        function fheGe(uint256 lhs, uint256 rhs, bytes1 scalarByte) external returns (uint256 result);
        function fheGt(uint256 lhs, uint256 rhs, bytes1 scalarByte) external returns (uint256 result);
        function fheLe(uint256 lhs, uint256 rhs, bytes1 scalarByte) external returns (uint256 result);
        function fheLt(uint256 lhs, uint256 rhs, bytes1 scalarByte) external returns (uint256 result);
        function fheMin(uint256 lhs, uint256 rhs, bytes1 scalarByte) external returns (uint256 result);
        function fheMax(uint256 lhs, uint256 rhs, bytes1 scalarByte) external returns (uint256 result);
        function fheNeg(uint256 ct) external returns (uint256 result);
        function fheNot(uint256 ct) external returns (uint256 result);
        function verifyCiphertext(bytes32 inputHandle, address callerAddress, address contractAddress, bytes calldata inputProof, bytes1 inputType) external returns (uint256 result);
        function cast(uint256 ct, bytes1 toType) external returns (uint256 result);
        function trivialEncrypt(uint256 pt, bytes1 toType) external returns (uint256 result);
        function fheIfThenElse(uint256 control, uint256 ifTrue, uint256 ifFalse) external returns (uint256 result);
        function fheRand(bytes1 randType) external returns (uint256 result);
        function fheRandBounded(uint256 upperBound, bytes1 randType) external returns (uint256 result);
    }

    // Byte-array overloads used by the ebytes types.
    interface ITFHEExecutorBytes {
        function fheEq(uint256 lhs, bytes calldata rhs, bytes1 scalarByte) external returns (uint256 result);
        function fheNe(uint256 lhs, bytes calldata rhs, bytes1 scalarByte) external returns (uint256 result);
        function trivialEncrypt(bytes calldata pt, bytes1 toType) external returns (uint256 result);
    }
}

use ITFHEExecutor::ITFHEExecutorCalls as Calls;
use ITFHEExecutorBytes::ITFHEExecutorBytesCalls as BytesCalls;

/// A decoded executor invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OperationCall {
    Binary { op: Operator, lhs: U256, rhs: U256, scalar_byte: u8 },
    BinaryBytes { op: Operator, lhs: U256, rhs: Bytes, scalar_byte: u8 },
    Unary { op: Operator, ct: U256 },
    VerifyCiphertext {
        input_handle: Handle,
        caller: Address,
        contract: Address,
        input_proof: Bytes,
        input_type: u8,
    },
    Cast { ct: U256, to_type: u8 },
    TrivialEncrypt { plaintext: U256, to_type: u8 },
    TrivialEncryptBytes { plaintext: Bytes, to_type: u8 },
    IfThenElse { control: U256, if_true: U256, if_false: U256 },
    Rand { rand_type: u8 },
    RandBounded { upper_bound: U256, rand_type: u8 },
}

impl OperationCall {
    pub fn operator(&self) -> Operator {
        match self {
            OperationCall::Binary { op, .. }
            | OperationCall::BinaryBytes { op, .. }
            | OperationCall::Unary { op, .. } => *op,
            OperationCall::VerifyCiphertext { .. } => Operator::VerifyCiphertext,
            OperationCall::Cast { .. } => Operator::Cast,
            OperationCall::TrivialEncrypt { .. } | OperationCall::TrivialEncryptBytes { .. } => {
                Operator::TrivialEncrypt
            }
            OperationCall::IfThenElse { .. } => Operator::IfThenElse,
            OperationCall::Rand { .. } => Operator::Rand,
            OperationCall::RandBounded { .. } => Operator::RandBounded,
        }
    }

    /// ABI-encodes the call as the executor would receive it.
    pub fn abi_encode(&self) -> KernelResult<Vec<u8>> {
        use ITFHEExecutor as E;
        let calldata = match self {
            OperationCall::Binary { op, lhs, rhs, scalar_byte } => {
                let (lhs, rhs, scalar) = (*lhs, *rhs, FixedBytes([*scalar_byte]));
                match op {
                    Operator::Add => E::fheAddCall { lhs, rhs, scalarByte: scalar }.abi_encode(),
                    Operator::Sub => E::fheSubCall { lhs, rhs, scalarByte: scalar }.abi_encode(),
                    Operator::Mul => E::fheMulCall { lhs, rhs, scalarByte: scalar }.abi_encode(),
                    Operator::Div => E::fheDivCall { lhs, rhs, scalarByte: scalar }.abi_encode(),
                    Operator::Rem => E::fheRemCall { lhs, rhs, scalarByte: scalar }.abi_encode(),
                    Operator::BitAnd => E::fheBitAndCall { lhs, rhs, scalarByte: scalar }.abi_encode(),
                    Operator::BitOr => E::fheBitOrCall { lhs, rhs, scalarByte: scalar }.abi_encode(),
                    Operator::BitXor => E::fheBitXorCall { lhs, rhs, scalarByte: scalar }.abi_encode(),
                    Operator::Shl => E::fheShlCall { lhs, rhs, scalarByte: scalar }.abi_encode(),
                    Operator::Shr => E::fheShrCall { lhs, rhs, scalarByte: scalar }.abi_encode(),
                    Operator::Rotl => E::fheRotlCall { lhs, rhs, scalarByte: scalar }.abi_encode(),
                    Operator::Rotr => E::fheRotrCall { lhs, rhs, scalarByte: scalar }.abi_encode(),
                    Operator::Eq => E::fheEqCall { lhs, rhs, scalarByte: scalar }.abi_encode(),
                    Operator::Ne => E::fheNeCall { lhs, rhs, scalarByte: scalar }.abi_encode(),
                    Operator::Ge => E::fheGeCall { lhs, rhs, scalarByte: scalar }.abi_encode(),
                    Operator::Gt => E::fheGtCall { lhs, rhs, scalarByte: scalar }.abi_encode(),
                    Operator::Le => E::fheLeCall { lhs, rhs, scalarByte: scalar }.abi_encode(),
                    Operator::Lt => E::fheLtCall { lhs, rhs, scalarByte: scalar }.abi_encode(),
                    Operator::Min => E::fheMinCall { lhs, rhs, scalarByte: scalar }.abi_encode(),
                    Operator::Max => E::fheMaxCall { lhs, rhs, scalarByte: scalar }.abi_encode(),
                    other => {
                        return Err(KernelError::InvalidOperation(format!("{} is not a binary operator", other)))
                    }
                }
            }
            OperationCall::BinaryBytes { op, lhs, rhs, scalar_byte } => {
                let (lhs, rhs, scalar) = (*lhs, rhs.clone(), FixedBytes([*scalar_byte]));
                match op {
                    Operator::Eq => ITFHEExecutorBytes::fheEqCall { lhs, rhs, scalarByte: scalar }.abi_encode(),
                    Operator::Ne => ITFHEExecutorBytes::fheNeCall { lhs, rhs, scalarByte: scalar }.abi_encode(),
                    other => {
                        return Err(KernelError::InvalidOperation(format!("{} has no bytes overload", other)))
                    }
                }
            }
            OperationCall::Unary { op: Operator::Neg, ct } => E::fheNegCall { ct: *ct }.abi_encode(),
            OperationCall::Unary { op: Operator::Not, ct } => E::fheNotCall { ct: *ct }.abi_encode(),
            OperationCall::Unary { op, .. } => {
                return Err(KernelError::InvalidOperation(format!("{} is not a unary operator", op)))
            }
            OperationCall::VerifyCiphertext { input_handle, caller, contract, input_proof, input_type } => {
                E::verifyCiphertextCall {
                    inputHandle: input_handle.0,
                    callerAddress: *caller,
                    contractAddress: *contract,
                    inputProof: input_proof.clone(),
                    inputType: FixedBytes([*input_type]),
                }
                .abi_encode()
            }
            OperationCall::Cast { ct, to_type } => {
                E::castCall { ct: *ct, toType: FixedBytes([*to_type]) }.abi_encode()
            }
            OperationCall::TrivialEncrypt { plaintext, to_type } => {
                E::trivialEncryptCall { pt: *plaintext, toType: FixedBytes([*to_type]) }.abi_encode()
            }
            OperationCall::TrivialEncryptBytes { plaintext, to_type } => ITFHEExecutorBytes::trivialEncryptCall {
                pt: plaintext.clone(),
                toType: FixedBytes([*to_type]),
            }
            .abi_encode(),
            OperationCall::IfThenElse { control, if_true, if_false } => E::fheIfThenElseCall {
                control: *control,
                ifTrue: *if_true,
                ifFalse: *if_false,
            }
            .abi_encode(),
            OperationCall::Rand { rand_type } => {
                E::fheRandCall { randType: FixedBytes([*rand_type]) }.abi_encode()
            }
            OperationCall::RandBounded { upper_bound, rand_type } => E::fheRandBoundedCall {
                upperBound: *upper_bound,
                randType: FixedBytes([*rand_type]),
            }
            .abi_encode(),
        };
        Ok(calldata)
    }
}

static SELECTORS: OnceLock<FxHashMap<[u8; 4], Operator>> = OnceLock::new();

/// Selector → operator map, built on first use.
pub fn selector_map() -> &'static FxHashMap<[u8; 4], Operator> {
    SELECTORS.get_or_init(|| {
        use ITFHEExecutor as E;
        let entries: [([u8; 4], Operator); 31] = [
            (E::fheAddCall::SELECTOR, Operator::Add),
            (E::fheSubCall::SELECTOR, Operator::Sub),
            (E::fheMulCall::SELECTOR, Operator::Mul),
            (E::fheDivCall::SELECTOR, Operator::Div),
            (E::fheRemCall::SELECTOR, Operator::Rem),
            (E::fheBitAndCall::SELECTOR, Operator::BitAnd),
            (E::fheBitOrCall::SELECTOR, Operator::BitOr),
            (E::fheBitXorCall::SELECTOR, Operator::BitXor),
            (E::fheShlCall::SELECTOR, Operator::Shl),
            (E::fheShrCall::SELECTOR, Operator::Shr),
            (E::fheRotlCall::SELECTOR, Operator::Rotl),
            (E::fheRotrCall::SELECTOR, Operator::Rotr),
            (E::fheEqCall::SELECTOR, Operator::Eq),
            (E::fheNeCall::SELECTOR, Operator::Ne),
            (E::fheGeCall::SELECTOR, Operator::Ge),
            (E::fheGtCall::SELECTOR, Operator::Gt),
            (E::fheLeCall::SELECTOR, Operator::Le),
            (E::fheLtCall::SELECTOR, Operator::Lt),
            (E::fheMinCall::SELECTOR, Operator::Min),
            (E::fheMaxCall::SELECTOR, Operator::Max),
            (E::fheNegCall::SELECTOR, Operator::Neg),
            (E::fheNotCall::SELECTOR, Operator::Not),
            (E::verifyCiphertextCall::SELECTOR, Operator::VerifyCiphertext),
            (E::castCall::SELECTOR, Operator::Cast),
            (E::trivialEncryptCall::SELECTOR, Operator::TrivialEncrypt),
            (E::fheIfThenElseCall::SELECTOR, Operator::IfThenElse),
            (E::fheRandCall::SELECTOR, Operator::Rand),
            (E::fheRandBoundedCall::SELECTOR, Operator::RandBounded),
            (ITFHEExecutorBytes::fheEqCall::SELECTOR, Operator::Eq),
            (ITFHEExecutorBytes::fheNeCall::SELECTOR, Operator::Ne),
            (ITFHEExecutorBytes::trivialEncryptCall::SELECTOR, Operator::TrivialEncrypt),
        ];
        entries.into_iter().collect()
    })
}

pub fn operator_for_selector(selector: [u8; 4]) -> Option<Operator> {
    selector_map().get(&selector).copied()
}

/// Decodes executor calldata (selector + arguments).
pub fn decode_call(calldata: &[u8]) -> KernelResult<OperationCall> {
    if calldata.len() < 4 {
        return Err(KernelError::AbiDecode(format!("calldata is {} bytes", calldata.len())));
    }
    let selector = [calldata[0], calldata[1], calldata[2], calldata[3]];
    if operator_for_selector(selector).is_none() {
        return Err(KernelError::UnknownOperator(selector));
    }

    if Calls::valid_selector(selector) {
        let call = Calls::abi_decode(calldata).map_err(|e| KernelError::AbiDecode(e.to_string()))?;
        return Ok(from_executor_call(call));
    }

    let call = BytesCalls::abi_decode(calldata).map_err(|e| KernelError::AbiDecode(e.to_string()))?;
    Ok(match call {
        BytesCalls::fheEq(c) => OperationCall::BinaryBytes {
            op: Operator::Eq,
            lhs: c.lhs,
            rhs: c.rhs,
            scalar_byte: c.scalarByte[0],
        },
        BytesCalls::fheNe(c) => OperationCall::BinaryBytes {
            op: Operator::Ne,
            lhs: c.lhs,
            rhs: c.rhs,
            scalar_byte: c.scalarByte[0],
        },
        BytesCalls::trivialEncrypt(c) => OperationCall::TrivialEncryptBytes {
            plaintext: c.pt,
            to_type: c.toType[0],
        },
    })
}

fn binary(op: Operator, lhs: U256, rhs: U256, scalar: FixedBytes<1>) -> OperationCall {
    OperationCall::Binary { op, lhs, rhs, scalar_byte: scalar[0] }
}

fn from_executor_call(call: Calls) -> OperationCall {
    match call {
        Calls::fheAdd(c) => binary(Operator::Add, c.lhs, c.rhs, c.scalarByte),
        Calls::fheSub(c) => binary(Operator::Sub, c.lhs, c.rhs, c.scalarByte),
        Calls::fheMul(c) => binary(Operator::Mul, c.lhs, c.rhs, c.scalarByte),
        Calls::fheDiv(c) => binary(Operator::Div, c.lhs, c.rhs, c.scalarByte),
        Calls::fheRem(c) => binary(Operator::Rem, c.lhs, c.rhs, c.scalarByte),
        Calls::fheBitAnd(c) => binary(Operator::BitAnd, c.lhs, c.rhs, c.scalarByte),
        Calls::fheBitOr(c) => binary(Operator::BitOr, c.lhs, c.rhs, c.scalarByte),
        Calls::fheBitXor(c) => binary(Operator::BitXor, c.lhs, c.rhs, c.scalarByte),
        Calls::fheShl(c) => binary(Operator::Shl, c.lhs, c.rhs, c.scalarByte),
        Calls::fheShr(c) => binary(Operator::Shr, c.lhs, c.rhs, c.scalarByte),
        Calls::fheRotl(c) => binary(Operator::Rotl, c.lhs, c.rhs, c.scalarByte),
        Calls::fheRotr(c) => binary(Operator::Rotr, c.lhs, c.rhs, c.scalarByte),
        Calls::fheEq(c) => binary(Operator::Eq, c.lhs, c.rhs, c.scalarByte),
        Calls::fheNe(c) => binary(Operator::Ne, c.lhs, c.rhs, c.scalarByte),
        Calls::fheGe(c) => binary(Operator::Ge, c.lhs, c.rhs, c.scalarByte),
        Calls::fheGt(c) => binary(Operator::Gt, c.lhs, c.rhs, c.scalarByte),
        Calls::fheLe(c) => binary(Operator::Le, c.lhs, c.rhs, c.scalarByte),
        Calls::fheLt(c) => binary(Operator::Lt, c.lhs, c.rhs, c.scalarByte),
        Calls::fheMin(c) => binary(Operator::Min, c.lhs, c.rhs, c.scalarByte),
        Calls::fheMax(c) => binary(Operator::Max, c.lhs, c.rhs, c.scalarByte),
        Calls::fheNeg(c) => OperationCall::Unary { op: Operator::Neg, ct: c.ct },
        Calls::fheNot(c) => OperationCall::Unary { op: Operator::Not, ct: c.ct },
        Calls::verifyCiphertext(c) => OperationCall::VerifyCiphertext {
            input_handle: Handle::from(c.inputHandle),
            caller: c.callerAddress,
            contract: c.contractAddress,
            input_proof: c.inputProof,
            input_type: c.inputType[0],
        },
        Calls::cast(c) => OperationCall::Cast { ct: c.ct, to_type: c.toType[0] },
        Calls::trivialEncrypt(c) => OperationCall::TrivialEncrypt { plaintext: c.pt, to_type: c.toType[0] },
        Calls::fheIfThenElse(c) => OperationCall::IfThenElse {
            control: c.control,
            if_true: c.ifTrue,
            if_false: c.ifFalse,
        },
        Calls::fheRand(c) => OperationCall::Rand { rand_type: c.randType[0] },
        Calls::fheRandBounded(c) => OperationCall::RandBounded {
            upper_bound: c.upperBound,
            rand_type: c.randType[0],
        },
    }
}
