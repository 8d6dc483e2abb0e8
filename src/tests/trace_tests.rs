// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use alloy_primitives::{Address, U256};

use crate::abi::{decode_call, OperationCall};
use crate::error::KernelError;
use crate::operator::Operator;
use crate::trace::{ExecutionTrace, OpCode, TraceLog};

fn executor() -> Address {
    Address::repeat_byte(0x42)
}

#[test]
fn test_call_frame_roundtrip() {
    let call = OperationCall::Binary { op: Operator::Add, lhs: U256::from(5), rhs: U256::from(3), scalar_byte: 1 };
    let calldata = call.abi_encode().unwrap();
    let log = TraceLog::call_frame(executor(), &calldata, 2);

    assert_eq!(log.call_target(), Some(executor()));
    assert_eq!(log.call_input().unwrap(), calldata);
    assert_eq!(decode_call(&log.call_input().unwrap()).unwrap(), call);
}

#[test]
fn test_static_call_layout() {
    // gas, addr, argsOffset, argsSize, retOffset, retSize (top first)
    let mut log = TraceLog::call_frame(executor(), &[0xaa, 0xbb, 0xcc, 0xdd], 1);
    log.op = OpCode::StaticCall;
    log.stack = vec![
        U256::ZERO,
        U256::ZERO,
        U256::from(2),
        U256::from(1),
        U256::from_be_slice(executor().as_slice()),
        U256::from(100_000),
    ];
    assert_eq!(log.call_input().unwrap(), vec![0xbb, 0xcc]);
}

#[test]
fn test_args_outside_memory() {
    let mut log = TraceLog::call_frame(executor(), &[1, 2, 3], 1);
    let len = log.stack.len();
    log.stack[len - 5] = U256::from(64);
    assert!(matches!(log.call_input(), Err(KernelError::MalformedTrace(_))));
}

#[test]
fn test_short_stack() {
    let log = TraceLog { op: OpCode::Call, stack: vec![U256::ZERO; 3], memory: vec![], depth: 1 };
    assert!(matches!(log.call_args(), Err(KernelError::MalformedTrace(_))));
    assert_eq!(log.call_target(), Some(Address::ZERO));
}

#[test]
fn test_calls_to_filters_target() {
    let ours = OperationCall::Rand { rand_type: 2 }.abi_encode().unwrap();
    let theirs = OperationCall::Rand { rand_type: 3 }.abi_encode().unwrap();
    let trace = ExecutionTrace {
        failed: false,
        struct_logs: vec![
            TraceLog { op: OpCode::Other, stack: vec![], memory: vec![], depth: 1 },
            TraceLog::call_frame(Address::repeat_byte(0x01), &theirs, 1),
            TraceLog::call_frame(executor(), &ours, 2),
        ],
    };
    let found = trace.calldata_to(executor());
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].as_ref().unwrap(), &ours);
}
