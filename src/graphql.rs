//! GraphQL operations and the transport seam.
//!
//! Only the four operations the explorer needs are defined here. Requests are
//! plain `{operationName, query, variables}` POSTs; responses are the standard
//! `{data, errors}` envelope.

use crate::error::QueryError;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::OnceLock;
use std::time::Duration;

pub const GET_NODE_INFO: &str = r#"
query GetNodeInfo {
  node {
    blockHeight
    batchHeight
  }
}
"#;

pub const GET_LATEST_TRANSACTIONS: &str = r#"
query GetLatestTransactions($take: Int!, $skip: Int) {
  transactions(
    orderBy: [{ executionResult: { block: { height: desc } } }]
    take: $take
    skip: $skip
  ) {
    hash
    methodId
    sender
    nonce
    isMessage
    executionResult {
      block {
        height
        hash
        batchHeight
      }
      status
      stateTransitions
    }
  }
}
"#;

pub const GET_RECENT_BLOCKS: &str = r#"
query GetRecentBlocks($take: Int!, $skip: Int!) {
  blocks(take: $take, skip: $skip, orderBy: [{ height: desc }]) {
    hash
    height
    transactionsHash
    batchHeight
    parentHash
    _count {
      transactions(where: { status: { equals: true } })
    }
    transactions {
      txHash
      events
      status
      stateTransitions
      tx {
        hash
        nonce
        sender
      }
    }
  }
  aggregateBlock(take: $take, skip: $skip) {
    _count {
      _all
    }
  }
}
"#;

pub const SEARCH_TRANSACTIONS: &str = r#"
query SearchTransactions($where: TransactionWhereInput, $take: Int) {
  transactions(where: $where, take: $take) {
    hash
    sender
    methodId
    nonce
    isMessage
    executionResult {
      block {
        height
      }
      status
      statusMessage
      stateTransitions
    }
  }
}
"#;

/// A named query plus its variables, ready to send.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQlRequest {
    pub operation_name: &'static str,
    pub query: &'static str,
    pub variables: Value,
}

impl GraphQlRequest {
    pub fn node_info() -> Self {
        Self {
            operation_name: "GetNodeInfo",
            query: GET_NODE_INFO,
            variables: json!({}),
        }
    }

    pub fn latest_transactions(take: u32, skip: u32) -> Self {
        Self {
            operation_name: "GetLatestTransactions",
            query: GET_LATEST_TRANSACTIONS,
            variables: json!({ "take": take, "skip": skip }),
        }
    }

    pub fn recent_blocks(take: u32, skip: u32) -> Self {
        Self {
            operation_name: "GetRecentBlocks",
            query: GET_RECENT_BLOCKS,
            variables: json!({ "take": take, "skip": skip }),
        }
    }

    pub fn search_transactions(text: &str, take: u32) -> Self {
        Self {
            operation_name: "SearchTransactions",
            query: SEARCH_TRANSACTIONS,
            variables: json!({ "where": search_filter(text), "take": take }),
        }
    }
}

/// `where` input matching transactions whose hash or sender contains `text`.
pub fn search_filter(text: &str) -> Value {
    json!({
        "OR": [
            { "hash": { "contains": text } },
            { "sender": { "contains": text } }
        ]
    })
}

/// Executes a GraphQL request and returns the `data` member of the response.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: &GraphQlRequest) -> Result<Value, QueryError>;
}

/// Split a raw `{data, errors}` body into data or a `QueryError`.
pub fn extract_data(body: Value) -> Result<Value, QueryError> {
    if let Some(errors) = body.get("errors").and_then(|e| e.as_array()) {
        if !errors.is_empty() {
            let messages = errors
                .iter()
                .map(|e| {
                    e.get("message")
                        .and_then(|m| m.as_str())
                        .unwrap_or("graphql error")
                        .to_string()
                })
                .collect();
            return Err(QueryError::GraphQl(messages));
        }
    }
    match body.get("data") {
        Some(data) if !data.is_null() => Ok(data.clone()),
        _ => Err(QueryError::MissingData),
    }
}

static HTTP: OnceLock<reqwest::Client> = OnceLock::new();

fn http_client() -> Result<&'static reqwest::Client, QueryError> {
    if let Some(client) = HTTP.get() {
        return Ok(client);
    }
    let client = reqwest::Client::builder()
        .pool_max_idle_per_host(8)
        .tcp_nodelay(true)
        .build()?;
    Ok(HTTP.get_or_init(|| client))
}

/// HTTP transport against a single GraphQL endpoint.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    url: String,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: &GraphQlRequest) -> Result<Value, QueryError> {
        log::debug!("POST {} op={}", self.url, request.operation_name);

        let res = http_client()?
            .post(&self.url)
            .json(request)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            log::warn!("{} -> http {}", request.operation_name, status);
            return Err(QueryError::Http(status.as_u16()));
        }

        let body: Value = res.json().await?;
        extract_data(body)
    }
}
