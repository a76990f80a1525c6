//! JSON-RPC provider for EVM-compatible endpoints

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use futures::stream::{self, StreamExt, TryStreamExt};
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde_json::{json, Value};

use super::{FetchedBlock, LedgerProvider};
use crate::config::LedgerConfig;
use crate::domain::models::{Block, Trace, Transaction};
use crate::infrastructure::ledger::error::LedgerError;
use crate::utils::logging;

/// Concurrent per-transaction calls issued for one block
const PER_TX_CONCURRENCY: usize = 8;

/// JSON-RPC provider with keep-alive connection pooling
#[derive(Debug)]
pub struct JsonRpcProvider {
    endpoint: String,
    client: Client,
    fetch_receipts: bool,
    with_traces: bool,
    fallback_debug: bool,
    block_receipts_supported: AtomicBool,
    trace_block_supported: AtomicBool,
}

impl JsonRpcProvider {
    /// Create a new JSON-RPC provider
    pub fn new(config: &LedgerConfig) -> Result<Self, LedgerError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .pool_max_idle_per_host(100)
            .build()
            .map_err(|e| LedgerError::Config(e.to_string()))?;

        Ok(Self {
            endpoint: config.rpc_url.clone(),
            client,
            fetch_receipts: config.fetch_receipts,
            with_traces: config.with_traces,
            fallback_debug: config.fallback_debug,
            block_receipts_supported: AtomicBool::new(true),
            trace_block_supported: AtomicBool::new(true),
        })
    }

    /// Make a JSON-RPC call
    async fn rpc_call(&self, method: &str, params: Value) -> Result<Value, LedgerError> {
        let request_body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params
        });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| LedgerError::Network(format!("{}: {}", method, e)))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(LedgerError::RateLimited(method.to_string()));
        }
        if status.is_server_error() {
            return Err(LedgerError::Network(format!(
                "{} returned HTTP {}",
                method, status
            )));
        }

        let response_text = response
            .text()
            .await
            .map_err(|e| LedgerError::Network(format!("{}: {}", method, e)))?;

        if !status.is_success() {
            return Err(LedgerError::Rpc {
                code: i64::from(status.as_u16()),
                message: response_text,
            });
        }

        let response_json: Value = serde_json::from_str(&response_text)
            .map_err(|e| LedgerError::Parse(format!("{}: {}", method, e)))?;

        if let Some(error) = response_json.get("error").filter(|e| !e.is_null()) {
            let code = error.get("code").and_then(Value::as_i64).unwrap_or_default();
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            return Err(LedgerError::from_rpc(method, code, message));
        }

        response_json
            .get("result")
            .cloned()
            .ok_or_else(|| LedgerError::Parse(format!("No result in {} response", method)))
    }

    async fn block_json(&self, height: u64, full: bool) -> Result<Value, LedgerError> {
        let raw = self
            .rpc_call("eth_getBlockByNumber", json!([to_hex(height), full]))
            .await?;
        if raw.is_null() {
            return Err(LedgerError::BlockUnavailable(height));
        }
        Ok(raw)
    }

    /// Receipts keyed by transaction hash
    async fn receipts(
        &self,
        height: u64,
        transactions: &[Transaction],
    ) -> Result<HashMap<String, Value>, LedgerError> {
        if self.block_receipts_supported.load(Ordering::Relaxed) {
            match self
                .rpc_call("eth_getBlockReceipts", json!([to_hex(height)]))
                .await
            {
                Ok(Value::Array(items)) => {
                    return Ok(items
                        .into_iter()
                        .filter_map(|r| opt_str_field(&r, "transactionHash").map(|h| (h, r)))
                        .collect());
                }
                Ok(Value::Null) => return Err(LedgerError::BlockUnavailable(height)),
                Ok(_) => {
                    return Err(LedgerError::Parse(
                        "eth_getBlockReceipts result is not an array".to_string(),
                    ))
                }
                Err(LedgerError::Unsupported(_)) => {
                    self.block_receipts_supported.store(false, Ordering::Relaxed);
                    logging::log_warning(
                        "eth_getBlockReceipts not supported, falling back to per-transaction receipts",
                    );
                }
                Err(e) => return Err(e),
            }
        }

        let hashes: Vec<String> = transactions.iter().map(|tx| tx.hash.clone()).collect();
        let receipts: Vec<(String, Value)> = stream::iter(hashes)
            .map(|hash| async move {
                let receipt = self
                    .rpc_call("eth_getTransactionReceipt", json!([hash]))
                    .await?;
                Ok::<_, LedgerError>((hash, receipt))
            })
            .buffer_unordered(PER_TX_CONCURRENCY)
            .try_collect()
            .await?;

        Ok(receipts.into_iter().filter(|(_, r)| !r.is_null()).collect())
    }

    /// Value-carrying internal frames of every transaction in the block
    async fn traces(&self, height: u64, transactions: &[Transaction]) -> Result<Vec<Trace>, LedgerError> {
        if !self.with_traces || transactions.is_empty() {
            return Ok(Vec::new());
        }

        if self.trace_block_supported.load(Ordering::Relaxed) {
            match self.rpc_call("trace_block", json!([to_hex(height)])).await {
                Ok(raw) => return parse_block_traces(&raw),
                Err(LedgerError::Unsupported(_)) => {
                    self.trace_block_supported.store(false, Ordering::Relaxed);
                    logging::log_warning(&format!(
                        "trace_block not supported{}",
                        if self.fallback_debug {
                            ", falling back to debug_traceTransaction"
                        } else {
                            ", internal transfers disabled"
                        }
                    ));
                }
                Err(e) => return Err(e),
            }
        }

        if !self.fallback_debug {
            return Ok(Vec::new());
        }

        let hashes: Vec<String> = transactions.iter().map(|tx| tx.hash.clone()).collect();
        let per_tx: Vec<Vec<Trace>> = stream::iter(hashes)
            .map(|hash| async move {
                match self
                    .rpc_call(
                        "debug_traceTransaction",
                        json!([hash, { "tracer": "callTracer" }]),
                    )
                    .await
                {
                    Ok(frame) => parse_call_frames(&hash, &frame),
                    Err(e) if e.is_transient() => Err(e),
                    Err(e) => {
                        // untraceable transaction: no internal transfers
                        logging::log_debug(&format!("No trace for {}: {}", hash, e));
                        Ok(Vec::new())
                    }
                }
            })
            .buffered(PER_TX_CONCURRENCY)
            .try_collect()
            .await?;

        Ok(per_tx.into_iter().flatten().collect())
    }
}

#[async_trait]
impl LedgerProvider for JsonRpcProvider {
    fn provider_name(&self) -> String {
        "JSON-RPC".to_string()
    }

    async fn tip_height(&self) -> Result<u64, LedgerError> {
        let result = self.rpc_call("eth_blockNumber", json!([])).await?;
        parse_hex_u64(&result)
    }

    async fn block_hash(&self, height: u64) -> Result<String, LedgerError> {
        let raw = self.block_json(height, false).await?;
        str_field(&raw, "hash")
    }

    async fn fetch_block(&self, height: u64) -> Result<FetchedBlock, LedgerError> {
        let raw = self.block_json(height, true).await?;
        let (block, mut transactions) = parse_block(&raw)?;

        if self.fetch_receipts && !transactions.is_empty() {
            let receipts = self.receipts(height, &transactions).await?;
            for tx in transactions.iter_mut() {
                match receipts.get(&tx.hash) {
                    Some(receipt) => apply_receipt(tx, receipt)?,
                    None => return Err(LedgerError::BlockUnavailable(height)),
                }
            }
        }

        let traces = self.traces(height, &transactions).await?;

        Ok(FetchedBlock {
            block,
            transactions,
            traces,
        })
    }

    async fn block_timestamp(&self, height: u64) -> Result<DateTime<Utc>, LedgerError> {
        let raw = self.block_json(height, false).await?;
        parse_timestamp(field(&raw, "timestamp")?)
    }
}

fn to_hex(value: u64) -> String {
    format!("0x{:x}", value)
}

fn field<'a>(raw: &'a Value, key: &str) -> Result<&'a Value, LedgerError> {
    raw.get(key)
        .filter(|v| !v.is_null())
        .ok_or_else(|| LedgerError::Parse(format!("Missing field {}", key)))
}

fn str_field(raw: &Value, key: &str) -> Result<String, LedgerError> {
    field(raw, key)?
        .as_str()
        .map(str::to_lowercase)
        .ok_or_else(|| LedgerError::Parse(format!("Field {} is not a string", key)))
}

fn opt_str_field(raw: &Value, key: &str) -> Option<String> {
    raw.get(key).and_then(Value::as_str).map(str::to_lowercase)
}

fn parse_hex_u64(raw: &Value) -> Result<u64, LedgerError> {
    let text = raw
        .as_str()
        .ok_or_else(|| LedgerError::Parse(format!("Expected hex quantity, got {}", raw)))?;
    u64::from_str_radix(text.trim_start_matches("0x"), 16)
        .map_err(|e| LedgerError::Parse(format!("Invalid quantity {}: {}", text, e)))
}

/// Parses a hex quantity into an integral decimal
/// Hex quantity as a whole-number `Decimal`
///
/// `Decimal` holds 96-bit mantissas, so quantities above 2^96 - 1 (about
/// 7.9e28 base units) are rejected.
pub fn parse_hex_decimal(text: &str) -> Result<Decimal, LedgerError> {
    let digits = text.trim_start_matches("0x");
    if digits.is_empty() {
        return Ok(Decimal::ZERO);
    }
    let value = u128::from_str_radix(digits, 16)
        .map_err(|e| LedgerError::Parse(format!("Invalid quantity {}: {}", text, e)))?;
    let value = i128::try_from(value)
        .map_err(|_| LedgerError::Parse(format!("Quantity {} out of range", text)))?;
    Decimal::try_from_i128_with_scale(value, 0)
        .map_err(|e| LedgerError::Parse(format!("Quantity {} out of range: {}", text, e)))
}

/// Optional fee quantity; a malformed or oversized one is dropped so it
/// cannot fail the whole block
fn opt_decimal_field(raw: &Value, key: &str) -> Option<Decimal> {
    let text = raw.get(key).and_then(Value::as_str)?;
    match parse_hex_decimal(text) {
        Ok(value) => Some(value),
        Err(e) => {
            logging::log_warning(&format!("Ignoring {}: {}", key, e));
            None
        }
    }
}

fn parse_timestamp(raw: &Value) -> Result<DateTime<Utc>, LedgerError> {
    let seconds = parse_hex_u64(raw)?;
    i64::try_from(seconds)
        .ok()
        .and_then(|s| Utc.timestamp_opt(s, 0).single())
        .ok_or_else(|| LedgerError::Parse(format!("Invalid timestamp {}", seconds)))
}

fn parse_block(raw: &Value) -> Result<(Block, Vec<Transaction>), LedgerError> {
    let number = parse_hex_u64(field(raw, "number")?)?;
    let block = Block::new(
        number,
        str_field(raw, "hash")?,
        str_field(raw, "parentHash")?,
        parse_timestamp(field(raw, "timestamp")?)?,
    );

    let transactions = field(raw, "transactions")?
        .as_array()
        .ok_or_else(|| LedgerError::Parse("transactions is not an array".to_string()))?
        .iter()
        .map(|tx| parse_transaction(number, tx))
        .collect::<Result<Vec<_>, _>>()?;

    Ok((block, transactions))
}

fn parse_transaction(block_number: u64, raw: &Value) -> Result<Transaction, LedgerError> {
    if raw.is_string() {
        return Err(LedgerError::Parse(
            "Block was returned without full transaction objects".to_string(),
        ));
    }
    let block_number = match raw.get("blockNumber").filter(|v| !v.is_null()) {
        Some(n) => parse_hex_u64(n)?,
        None => block_number,
    };

    Ok(Transaction {
        hash: str_field(raw, "hash")?,
        block_number,
        from: str_field(raw, "from")?,
        to: opt_str_field(raw, "to"),
        value: parse_hex_decimal(field(raw, "value")?.as_str().unwrap_or("0x0"))?,
        success: None,
        gas_used: None,
        max_fee_per_gas: opt_decimal_field(raw, "maxFeePerGas"),
        max_priority_fee_per_gas: opt_decimal_field(raw, "maxPriorityFeePerGas"),
        created_contract: None,
    })
}

fn apply_receipt(tx: &mut Transaction, receipt: &Value) -> Result<(), LedgerError> {
    tx.success = match receipt.get("status").filter(|s| !s.is_null()) {
        Some(status) => Some(parse_hex_u64(status)? == 1),
        None => None,
    };
    tx.gas_used = match receipt.get("gasUsed").filter(|g| !g.is_null()) {
        Some(gas) => Some(parse_hex_u64(gas)?),
        None => None,
    };
    tx.created_contract = opt_str_field(receipt, "contractAddress");
    Ok(())
}

fn frame_failed(frame: &Value) -> bool {
    frame.get("error").map_or(false, |e| !e.is_null())
}

/// Parses a `trace_block` result (flat, depth-first ordered frames)
fn parse_block_traces(raw: &Value) -> Result<Vec<Trace>, LedgerError> {
    let items = match raw {
        Value::Null => return Ok(Vec::new()),
        Value::Array(items) => items,
        _ => return Err(LedgerError::Parse("trace_block result is not an array".to_string())),
    };

    let mut next_index: HashMap<String, u32> = HashMap::new();
    let mut failed_paths: HashMap<String, Vec<Vec<u64>>> = HashMap::new();
    let mut traces = Vec::new();

    for item in items {
        // block and uncle rewards carry no transaction
        let tx_hash = match opt_str_field(item, "transactionHash") {
            Some(hash) => hash,
            None => continue,
        };
        let path: Vec<u64> = item
            .get("traceAddress")
            .and_then(Value::as_array)
            .map(|a| a.iter().filter_map(Value::as_u64).collect())
            .unwrap_or_default();

        let failed = frame_failed(item);
        let failed_here = failed_paths.entry(tx_hash.clone()).or_default();
        let reverted = failed || failed_here.iter().any(|p| path.starts_with(p));
        if failed {
            failed_here.push(path.clone());
        }

        // the root frame repeats the transaction's own value
        if path.is_empty() {
            continue;
        }

        let counter = next_index.entry(tx_hash.clone()).or_insert(0);
        *counter += 1;
        let trace_index = *counter;

        let action = item.get("action").unwrap_or(&Value::Null);
        let kind = item.get("type").and_then(Value::as_str).unwrap_or("call");
        let (from, to, value) = match kind {
            "suicide" | "selfdestruct" => (
                opt_str_field(action, "address"),
                opt_str_field(action, "refundAddress"),
                action.get("balance"),
            ),
            "create" => (
                opt_str_field(action, "from"),
                item.get("result").and_then(|r| opt_str_field(r, "address")),
                action.get("value"),
            ),
            "reward" => continue,
            _ => {
                if action.get("callType").and_then(Value::as_str) == Some("delegatecall") {
                    continue;
                }
                (
                    opt_str_field(action, "from"),
                    opt_str_field(action, "to"),
                    action.get("value"),
                )
            }
        };

        let value = match value.and_then(Value::as_str) {
            Some(v) => parse_hex_decimal(v)?,
            None => Decimal::ZERO,
        };
        if value <= Decimal::ZERO {
            continue;
        }

        traces.push(Trace {
            tx_hash,
            trace_index,
            from: from.ok_or_else(|| LedgerError::Parse("Trace frame without sender".to_string()))?,
            to,
            value,
            reverted,
        });
    }

    Ok(traces)
}

/// Parses a `callTracer` result (nested frames) of one transaction
fn parse_call_frames(tx_hash: &str, root: &Value) -> Result<Vec<Trace>, LedgerError> {
    let mut traces = Vec::new();
    let mut next_index = 0u32;
    let root_failed = frame_failed(root);

    if let Some(calls) = root.get("calls").and_then(Value::as_array) {
        for call in calls {
            walk_call_frame(tx_hash, call, root_failed, &mut next_index, &mut traces)?;
        }
    }

    Ok(traces)
}

fn walk_call_frame(
    tx_hash: &str,
    frame: &Value,
    parent_reverted: bool,
    next_index: &mut u32,
    out: &mut Vec<Trace>,
) -> Result<(), LedgerError> {
    *next_index += 1;
    let trace_index = *next_index;
    let reverted = parent_reverted || frame_failed(frame);
    let kind = frame
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or("CALL")
        .to_uppercase();

    if kind != "DELEGATECALL" {
        let value = match frame.get("value").and_then(Value::as_str) {
            Some(v) => parse_hex_decimal(v)?,
            None => Decimal::ZERO,
        };
        if value > Decimal::ZERO {
            out.push(Trace {
                tx_hash: tx_hash.to_lowercase(),
                trace_index,
                from: str_field(frame, "from")?,
                to: opt_str_field(frame, "to"),
                value,
                reverted,
            });
        }
    }

    if let Some(calls) = frame.get("calls").and_then(Value::as_array) {
        for call in calls {
            walk_call_frame(tx_hash, call, reverted, next_index, out)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_quantities() {
        assert_eq!(parse_hex_decimal("0x0").unwrap(), Decimal::ZERO);
        assert_eq!(parse_hex_decimal("0x").unwrap(), Decimal::ZERO);
        assert_eq!(
            parse_hex_decimal("0xde0b6b3a7640000").unwrap(),
            Decimal::from(1_000_000_000_000_000_000u64)
        );
        assert!(parse_hex_decimal("0xzz").is_err());
    }

    #[test]
    fn parses_block_with_full_transactions() {
        let raw = json!({
            "number": "0x10",
            "hash": "0xAB",
            "parentHash": "0xaa",
            "timestamp": "0x65f00000",
            "transactions": [{
                "hash": "0xT1",
                "blockNumber": "0x10",
                "from": "0xA",
                "to": null,
                "value": "0x5",
                "maxFeePerGas": "0x3b9aca00"
            }]
        });
        let (block, txs) = parse_block(&raw).unwrap();
        assert_eq!(block.number, 16);
        assert_eq!(block.hash, "0xab");
        assert_eq!(txs[0].hash, "0xt1");
        assert_eq!(txs[0].to, None);
        assert_eq!(txs[0].value, Decimal::from(5));
        assert_eq!(txs[0].max_fee_per_gas, Some(Decimal::from(1_000_000_000u64)));
        assert_eq!(txs[0].success, None);
    }

    #[test]
    fn oversized_fee_is_dropped_but_oversized_value_fails() {
        let above_decimal = "0x1000000000000000000000000";
        assert!(parse_hex_decimal(above_decimal).is_err());

        let tx = json!({
            "hash": "0xT1",
            "from": "0xA",
            "to": "0xB",
            "value": "0x1",
            "maxFeePerGas": above_decimal,
            "maxPriorityFeePerGas": "0x2"
        });
        let parsed = parse_transaction(7, &tx).unwrap();
        assert_eq!(parsed.max_fee_per_gas, None);
        assert_eq!(parsed.max_priority_fee_per_gas, Some(Decimal::from(2)));

        let huge_value = json!({ "hash": "0xT2", "from": "0xA", "to": "0xB", "value": above_decimal });
        assert!(parse_transaction(7, &huge_value).is_err());
    }

    #[test]
    fn trace_block_skips_root_and_marks_reverted_subtrees() {
        let raw = json!([
            { "transactionHash": "0xt", "traceAddress": [], "type": "call",
              "action": { "from": "0xa", "to": "0xb", "value": "0x64", "callType": "call" } },
            { "transactionHash": "0xt", "traceAddress": [0], "type": "call",
              "action": { "from": "0xb", "to": "0xc", "value": "0xa", "callType": "call" } },
            { "transactionHash": "0xt", "traceAddress": [1], "type": "call", "error": "Reverted",
              "action": { "from": "0xb", "to": "0xd", "value": "0x0", "callType": "call" } },
            { "transactionHash": "0xt", "traceAddress": [1, 0], "type": "call",
              "action": { "from": "0xd", "to": "0xe", "value": "0x1", "callType": "call" } },
            { "transactionHash": "0xt", "traceAddress": [2], "type": "call",
              "action": { "from": "0xb", "to": "0xf", "value": "0x7", "callType": "delegatecall" } },
            { "transactionHash": null, "traceAddress": [], "type": "reward",
              "action": { "author": "0xm", "value": "0x1" } }
        ]);
        let traces = parse_block_traces(&raw).unwrap();
        assert_eq!(traces.len(), 2);
        assert_eq!(traces[0].trace_index, 1);
        assert_eq!(traces[0].value, Decimal::from(10));
        assert!(!traces[0].reverted);
        assert_eq!(traces[1].trace_index, 3);
        assert_eq!(traces[1].to.as_deref(), Some("0xe"));
        assert!(traces[1].reverted);
    }

    #[test]
    fn call_tracer_frames_are_walked_depth_first() {
        let raw = json!({
            "type": "CALL", "from": "0xa", "to": "0xb", "value": "0x64",
            "calls": [
                { "type": "CALL", "from": "0xb", "to": "0xc", "value": "0x2",
                  "calls": [ { "type": "CALL", "from": "0xc", "to": "0xd", "value": "0x1" } ] },
                { "type": "CALL", "from": "0xb", "to": "0xe", "value": "0x3", "error": "out of gas" }
            ]
        });
        let traces = parse_call_frames("0xT", &raw).unwrap();
        let indexes: Vec<u32> = traces.iter().map(|t| t.trace_index).collect();
        assert_eq!(indexes, vec![1, 2, 3]);
        assert_eq!(traces[0].tx_hash, "0xt");
        assert!(!traces[1].reverted);
        assert!(traces[2].reverted);
    }
}
