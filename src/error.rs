use thiserror::Error;

/// Failure of a single GraphQL query.
///
/// Cloneable so a de-duplicated request can hand the same error to every
/// consumer that awaited it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("http {0}")]
    Http(u16),

    #[error("graphql error: {}", .0.join("; "))]
    GraphQl(Vec<String>),

    #[error("response carried neither data nor errors")]
    MissingData,

    #[error("unexpected response shape: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for QueryError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => QueryError::Http(status.as_u16()),
            None => QueryError::Transport(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for QueryError {
    fn from(e: serde_json::Error) -> Self {
        QueryError::Decode(e.to_string())
    }
}
