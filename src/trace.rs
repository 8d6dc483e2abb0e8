// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Typed instruction-level execution traces.
//!
//! Stacks are stored bottom to top, as ledgers report them. Memory is a list
//! of 32-byte words.

use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

use crate::error::{KernelError, KernelResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OpCode {
    Call,
    CallCode,
    DelegateCall,
    StaticCall,
    #[serde(other)]
    Other,
}

impl OpCode {
    pub fn from_name(name: &str) -> Self {
        match name {
            "CALL" => OpCode::Call,
            "CALLCODE" => OpCode::CallCode,
            "DELEGATECALL" => OpCode::DelegateCall,
            "STATICCALL" => OpCode::StaticCall,
            _ => OpCode::Other,
        }
    }

    pub fn is_call(self) -> bool {
        !matches!(self, OpCode::Other)
    }

    /// Stack distance from the top of `(argsOffset, argsSize)`.
    fn args_slots(self) -> Option<(usize, usize)> {
        match self {
            OpCode::Call | OpCode::CallCode => Some((4, 5)),
            OpCode::DelegateCall | OpCode::StaticCall => Some((3, 4)),
            OpCode::Other => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceLog {
    pub op: OpCode,
    pub stack: Vec<U256>,
    pub memory: Vec<B256>,
    pub depth: u32,
}

impl TraceLog {
    /// A `CALL` step to `target` with `input` laid out at memory offset 0.
    pub fn call_frame(target: Address, input: &[u8], depth: u32) -> Self {
        let memory = input
            .chunks(32)
            .map(|chunk| {
                let mut word = [0u8; 32];
                word[..chunk.len()].copy_from_slice(chunk);
                B256::from(word)
            })
            .collect();
        let stack = vec![
            U256::ZERO,                   // retSize
            U256::ZERO,                   // retOffset
            U256::from(input.len()),      // argsSize
            U256::ZERO,                   // argsOffset
            U256::ZERO,                   // value
            U256::from_be_slice(target.as_slice()),
            U256::from(u64::MAX),         // gas
        ];
        Self { op: OpCode::Call, stack, memory, depth }
    }

    /// `n`-th element from the top, 1-based.
    fn peek(&self, n: usize) -> KernelResult<U256> {
        if n == 0 || n > self.stack.len() {
            return Err(KernelError::MalformedTrace(format!(
                "{:?} with stack depth {} has no slot top-{}",
                self.op,
                self.stack.len(),
                n
            )));
        }
        Ok(self.stack[self.stack.len() - n])
    }

    /// Target address of a call step.
    pub fn call_target(&self) -> Option<Address> {
        if !self.op.is_call() {
            return None;
        }
        let word = self.peek(2).ok()?;
        Some(Address::from_word(B256::from(word.to_be_bytes::<32>())))
    }

    /// `(argsOffset, argsSize)` of a call step.
    pub fn call_args(&self) -> KernelResult<(U256, U256)> {
        let (offset, size) = self
            .op
            .args_slots()
            .ok_or_else(|| KernelError::MalformedTrace(format!("{:?} is not a call", self.op)))?;
        Ok((self.peek(offset)?, self.peek(size)?))
    }

    /// Calldata the step passes to its target.
    pub fn call_input(&self) -> KernelResult<Vec<u8>> {
        let (offset, size) = self.call_args()?;
        read_memory(&self.memory, offset, size)
    }
}

fn to_index(value: U256, what: &str) -> KernelResult<usize> {
    let v = u64::try_from(value)
        .map_err(|_| KernelError::MalformedTrace(format!("{} {} does not fit", what, value)))?;
    usize::try_from(v).map_err(|_| KernelError::MalformedTrace(format!("{} {} does not fit", what, v)))
}

/// Copies `size` bytes starting at `offset` out of word-addressed memory.
pub fn read_memory(memory: &[B256], offset: U256, size: U256) -> KernelResult<Vec<u8>> {
    let offset = to_index(offset, "offset")?;
    let size = to_index(size, "size")?;
    let available = memory.len() * 32;
    let end = offset
        .checked_add(size)
        .filter(|end| *end <= available)
        .ok_or_else(|| {
            KernelError::MalformedTrace(format!(
                "read of {} bytes at {} exceeds {} bytes of memory",
                size, offset, available
            ))
        })?;

    let mut out = Vec::with_capacity(size);
    for pos in offset..end {
        out.push(memory[pos / 32][pos % 32]);
    }
    Ok(out)
}

/// Result of tracing one transaction.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionTrace {
    pub failed: bool,
    #[serde(rename = "structLogs")]
    pub struct_logs: Vec<TraceLog>,
}

impl ExecutionTrace {
    pub fn calls_to(&self, target: Address) -> impl Iterator<Item = &TraceLog> + '_ {
        self.struct_logs
            .iter()
            .filter(move |log| log.call_target() == Some(target))
    }

    /// Calldata of every call to `target`, in execution order.
    pub fn calldata_to(&self, target: Address) -> Vec<KernelResult<Vec<u8>>> {
        self.calls_to(target).map(TraceLog::call_input).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_names() {
        assert_eq!(OpCode::from_name("STATICCALL"), OpCode::StaticCall);
        assert_eq!(OpCode::from_name("SSTORE"), OpCode::Other);
        assert!(!OpCode::Other.is_call());
    }

    #[test]
    fn test_read_memory_spans_words() {
        let mut a = [0u8; 32];
        a[31] = 0xaa;
        let mut b = [0u8; 32];
        b[0] = 0xbb;
        let memory = vec![B256::from(a), B256::from(b)];
        let out = read_memory(&memory, U256::from(31), U256::from(2)).unwrap();
        assert_eq!(out, vec![0xaa, 0xbb]);
        assert!(read_memory(&memory, U256::from(40), U256::from(30)).is_err());
        assert!(read_memory(&memory, U256::MAX, U256::from(1)).is_err());
    }
}
