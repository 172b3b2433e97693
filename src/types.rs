use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::query_cache::QueryKey;

/// Accept a JSON string or number and keep it as a string.
///
/// The sequencer serializes nonces as strings in some schemas and as
/// integers in others.
fn de_string_or_number<'de, D>(d: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(d)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockRef {
    pub height: u64,
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub batch_height: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub block: Option<BlockRef>,
    #[serde(default)]
    pub status: Option<bool>,
    #[serde(default)]
    pub status_message: Option<String>,
    #[serde(default)]
    pub state_transitions: Option<Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub hash: String,
    #[serde(default)]
    pub method_id: String,
    #[serde(default)]
    pub sender: String,
    #[serde(default, deserialize_with = "de_string_or_number")]
    pub nonce: String,
    #[serde(default)]
    pub is_message: bool,
    #[serde(default)]
    pub execution_result: Option<ExecutionResult>,
}

impl Transaction {
    pub fn block_height(&self) -> Option<u64> {
        self.execution_result
            .as_ref()
            .and_then(|r| r.block.as_ref())
            .map(|b| b.height)
    }

    pub fn status(&self) -> Option<bool> {
        self.execution_result.as_ref().and_then(|r| r.status)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TxCount {
    #[serde(default)]
    pub transactions: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TxRef {
    pub hash: String,
    #[serde(default, deserialize_with = "de_string_or_number")]
    pub nonce: String,
    #[serde(default)]
    pub sender: String,
}

/// A transaction as embedded in a block listing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockTransaction {
    pub tx_hash: String,
    #[serde(default)]
    pub status: Option<bool>,
    #[serde(default)]
    pub events: Option<Value>,
    #[serde(default)]
    pub state_transitions: Option<Value>,
    #[serde(default)]
    pub tx: Option<TxRef>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub hash: String,
    pub height: u64,
    #[serde(default)]
    pub parent_hash: Option<String>,
    #[serde(default)]
    pub transactions_hash: Option<String>,
    #[serde(default)]
    pub batch_height: Option<u64>,
    #[serde(rename = "_count", default)]
    pub count: Option<TxCount>,
    #[serde(default)]
    pub transactions: Vec<BlockTransaction>,
}

impl Block {
    /// Number of transactions the backend counted with a successful status.
    pub fn successful_tx_count(&self) -> u64 {
        self.count.as_ref().map(|c| c.transactions).unwrap_or(0)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfo {
    pub block_height: u64,
    #[serde(default)]
    pub batch_height: Option<u64>,
}

// ----- response envelopes -----

#[derive(Clone, Debug, Deserialize)]
pub struct NodeInfoData {
    pub node: NodeInfo,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TransactionsData {
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AllCount {
    #[serde(rename = "_all", default)]
    pub all: u64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AggregateBlock {
    #[serde(rename = "_count")]
    pub count: Option<AllCount>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentBlocksData {
    #[serde(default)]
    pub blocks: Vec<Block>,
    #[serde(default)]
    pub aggregate_block: Option<AggregateBlock>,
}

#[derive(Debug, Clone)]
pub enum AppEvent {
    /// An observer published a new state for this key.
    QueryUpdated(QueryKey),
    Quit,
}
