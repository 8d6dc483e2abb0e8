// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use alloy_primitives::{B256, U256};
use async_trait::async_trait;
use fhemock_kernel::trace::{ExecutionTrace, OpCode, TraceLog};
use fhemock_kernel::KernelError;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use super::Ledger;
use crate::errors::EngineError;

const METHOD_NOT_FOUND: i64 = -32601;

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize, Debug)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct RawBlock {
    transactions: Vec<B256>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTrace {
    #[serde(default)]
    failed: bool,
    #[serde(default)]
    struct_logs: Vec<RawStructLog>,
}

#[derive(Deserialize)]
struct RawStructLog {
    op: String,
    #[serde(default)]
    stack: Vec<String>,
    #[serde(default)]
    memory: Vec<String>,
    #[serde(default)]
    depth: u32,
}

enum RpcFailure {
    MethodNotFound,
    Other(EngineError),
}

/// JSON-RPC client for a development node.
#[derive(Debug)]
pub struct RpcLedger {
    url: String,
    client: Client,
    next_id: AtomicU64,
    introspection: AtomicBool,
}

impl RpcLedger {
    pub fn new(url: String) -> Self {
        Self::with_introspection(url, true)
    }

    pub fn with_introspection(url: String, introspection: bool) -> Self {
        Self {
            url,
            client: Client::new(),
            next_id: AtomicU64::new(1),
            introspection: AtomicBool::new(introspection),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn request<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, RpcFailure> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params });
        let resp = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| RpcFailure::Other(EngineError::Network(e.to_string())))?;

        if !resp.status().is_success() {
            return Err(RpcFailure::Other(EngineError::Network(format!(
                "{} request failed: {}",
                method,
                resp.status()
            ))));
        }

        let parsed: RpcResponse<T> = resp
            .json()
            .await
            .map_err(|e| RpcFailure::Other(EngineError::Network(format!("{}: {}", method, e))))?;
        match (parsed.result, parsed.error) {
            (_, Some(err)) if err.code == METHOD_NOT_FOUND => Err(RpcFailure::MethodNotFound),
            (_, Some(err)) => Err(RpcFailure::Other(EngineError::Network(format!(
                "{} returned {}: {}",
                method, err.code, err.message
            )))),
            (Some(result), None) => Ok(result),
            (None, None) => Err(RpcFailure::Other(EngineError::Network(format!("{} returned no result", method)))),
        }
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, EngineError> {
        match self.request(method, params).await {
            Ok(v) => Ok(v),
            Err(RpcFailure::MethodNotFound) => Err(EngineError::Network(format!("{} is not supported", method))),
            Err(RpcFailure::Other(e)) => Err(e),
        }
    }

    fn disable_introspection(&self, method: &str) {
        if self.introspection.swap(false, Ordering::Relaxed) {
            tracing::warn!("Ledger does not implement {}, scanning forward only", method);
        }
    }
}

fn parse_quantity(raw: &str) -> Result<u64, EngineError> {
    let digits = raw.strip_prefix("0x").unwrap_or(raw);
    u64::from_str_radix(digits, 16).map_err(|e| EngineError::Network(format!("bad quantity {:?}: {}", raw, e)))
}

/// Accepts a number, a hex quantity or an array whose first element is either.
fn marker_value(value: &Value) -> Result<u64, EngineError> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| EngineError::Network(format!("bad snapshot marker {}", n))),
        Value::String(s) => parse_quantity(s),
        Value::Array(items) => match items.first() {
            Some(first) => marker_value(first),
            None => Err(EngineError::Network("empty snapshot marker".to_string())),
        },
        other => Err(EngineError::Network(format!("bad snapshot marker {}", other))),
    }
}

fn parse_word(raw: &str) -> Result<U256, KernelError> {
    let digits = raw.strip_prefix("0x").unwrap_or(raw);
    U256::from_str_radix(digits, 16).map_err(|e| KernelError::MalformedTrace(format!("stack word {:?}: {}", raw, e)))
}

fn parse_memory_word(raw: &str) -> Result<B256, KernelError> {
    let digits = raw.strip_prefix("0x").unwrap_or(raw);
    let bytes = hex::decode(digits).map_err(|e| KernelError::MalformedTrace(format!("memory word: {}", e)))?;
    if bytes.len() != 32 {
        return Err(KernelError::MalformedTrace(format!("memory word of {} bytes", bytes.len())));
    }
    Ok(B256::from_slice(&bytes))
}

impl TryFrom<RawTrace> for ExecutionTrace {
    type Error = KernelError;

    fn try_from(raw: RawTrace) -> Result<Self, Self::Error> {
        let mut struct_logs = Vec::with_capacity(raw.struct_logs.len());
        for log in raw.struct_logs {
            let op = OpCode::from_name(&log.op);
            // Only call steps need their stack and memory.
            let (stack, memory) = if op.is_call() {
                let stack = log.stack.iter().map(|w| parse_word(w)).collect::<Result<_, _>>()?;
                let memory = log.memory.iter().map(|w| parse_memory_word(w)).collect::<Result<_, _>>()?;
                (stack, memory)
            } else {
                (Vec::new(), Vec::new())
            };
            struct_logs.push(TraceLog { op, stack, memory, depth: log.depth });
        }
        Ok(ExecutionTrace { failed: raw.failed, struct_logs })
    }
}

#[async_trait]
impl Ledger for RpcLedger {
    async fn block_number(&self) -> Result<u64, EngineError> {
        let raw: String = self.call("eth_blockNumber", json!([])).await?;
        parse_quantity(&raw)
    }

    async fn block_transactions(&self, height: u64) -> Result<Vec<B256>, EngineError> {
        let block: Option<RawBlock> = self
            .call("eth_getBlockByNumber", json!([format!("0x{:x}", height), false]))
            .await?;
        block
            .map(|b| b.transactions)
            .ok_or_else(|| EngineError::Network(format!("block {} not found", height)))
    }

    async fn trace_transaction(&self, tx: B256) -> Result<ExecutionTrace, EngineError> {
        let params = json!([tx, { "enableMemory": true, "disableStorage": true }]);
        let raw: RawTrace = self
            .call("debug_traceTransaction", params)
            .await
            .map_err(|e| EngineError::TraceFetchFailed { tx: tx.to_string(), reason: e.to_string() })?;
        Ok(ExecutionTrace::try_from(raw)?)
    }

    async fn snapshot_block(&self) -> Result<Option<u64>, EngineError> {
        if !self.introspection.load(Ordering::Relaxed) {
            return Ok(None);
        }
        match self.request::<Value>("get_lastBlockSnapshot", json!([])).await {
            Ok(value) => Ok(Some(marker_value(&value)?)),
            Err(RpcFailure::MethodNotFound) => {
                self.disable_introspection("get_lastBlockSnapshot");
                Ok(None)
            }
            Err(RpcFailure::Other(e)) => Err(e),
        }
    }

    async fn set_snapshot_block(&self, next_block: u64) -> Result<(), EngineError> {
        if !self.introspection.load(Ordering::Relaxed) {
            return Ok(());
        }
        match self.request::<Value>("set_lastBlockSnapshot", json!([next_block])).await {
            Ok(_) => Ok(()),
            Err(RpcFailure::MethodNotFound) => {
                self.disable_introspection("set_lastBlockSnapshot");
                Ok(())
            }
            Err(RpcFailure::Other(e)) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_trace_conversion() {
        let raw: RawTrace = serde_json::from_value(json!({
            "failed": false,
            "structLogs": [
                { "op": "PUSH1", "stack": ["zz"], "depth": 1 },
                {
                    "op": "STATICCALL",
                    "stack": ["0x0", "0x20", "0x4", "0x0", "0x42", "0xffff"],
                    "memory": ["aabbccdd00000000000000000000000000000000000000000000000000000000"],
                    "depth": 1
                }
            ]
        }))
        .unwrap();
        let trace = ExecutionTrace::try_from(raw).unwrap();
        assert_eq!(trace.struct_logs[0].op, OpCode::Other);
        assert_eq!(trace.struct_logs[1].call_input().unwrap(), vec![0xaa, 0xbb, 0xcc, 0xdd]);
    }

    #[test]
    fn test_bad_memory_word() {
        let raw = RawTrace {
            failed: false,
            struct_logs: vec![RawStructLog {
                op: "CALL".into(),
                stack: vec![],
                memory: vec!["abcd".into()],
                depth: 1,
            }],
        };
        assert!(matches!(ExecutionTrace::try_from(raw), Err(KernelError::MalformedTrace(_))));
    }

    #[test]
    fn test_marker_shapes() {
        assert_eq!(marker_value(&json!(7)).unwrap(), 7);
        assert_eq!(marker_value(&json!("0x10")).unwrap(), 16);
        assert_eq!(marker_value(&json!([3, 9])).unwrap(), 3);
        assert!(marker_value(&json!(null)).is_err());
    }
}
