//! Header strip with the node's current heights.

use crate::graphql::GraphQlRequest;
use crate::query::{QueryHandle, QueryOptions, QueryStatus};
use crate::query_cache::{QueryCache, QueryKey};
use crate::types::{AppEvent, NodeInfoData};
use tokio::sync::mpsc::UnboundedSender;

pub const ERROR_TEXT: &str = "Failed to load node status";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeLine {
    Loading,
    Failed,
    Heights { block: u64, batch: Option<u64> },
}

pub struct NodeStatus {
    handle: QueryHandle<NodeInfoData>,
}

impl NodeStatus {
    pub fn new(
        cache: &QueryCache,
        options: QueryOptions,
        notify: Option<UnboundedSender<AppEvent>>,
    ) -> Self {
        let handle = QueryHandle::spawn(
            cache,
            QueryKey::new(["node", "info"]),
            GraphQlRequest::node_info(),
            options,
            notify,
        );
        Self { handle }
    }

    pub fn refresh(&self) {
        self.handle.refetch();
    }

    pub fn line(&self) -> NodeLine {
        let state = self.handle.state();
        match (state.status, state.data) {
            (QueryStatus::Error, _) => NodeLine::Failed,
            (_, Some(d)) => NodeLine::Heights {
                block: d.node.block_height,
                batch: d.node.batch_height,
            },
            _ => NodeLine::Loading,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QueryError;
    use crate::graphql::Transport;
    use crate::query_cache::RetryPolicy;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;

    struct Fixed(Result<Value, QueryError>);

    #[async_trait]
    impl Transport for Fixed {
        async fn execute(&self, _request: &GraphQlRequest) -> Result<Value, QueryError> {
            self.0.clone()
        }
    }

    async fn line_for(reply: Result<Value, QueryError>) -> NodeLine {
        let cache = QueryCache::new(Arc::new(Fixed(reply)));
        let status = NodeStatus::new(&cache, QueryOptions::default().retry(RetryPolicy::none()), None);
        for _ in 0..100 {
            let line = status.line();
            if line != NodeLine::Loading {
                return line;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        status.line()
    }

    #[tokio::test]
    async fn shows_heights() {
        let line = line_for(Ok(json!({"node": {"blockHeight": 812, "batchHeight": 40}}))).await;
        assert_eq!(
            line,
            NodeLine::Heights {
                block: 812,
                batch: Some(40)
            }
        );
    }

    #[tokio::test]
    async fn failure_is_reported() {
        let line = line_for(Err(QueryError::Http(502))).await;
        assert_eq!(line, NodeLine::Failed);
    }
}
