//! ProtoScope - terminal block explorer for a GraphQL sequencer
//!
//! The library holds everything but the terminal loop: the GraphQL
//! transport, a keyed query cache with polling observers, the list and
//! detail views, and the ratatui renderer.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --release -- --graphql-url http://localhost:8081/graphql
//! ```

// Data layer
pub mod error;
pub mod graphql;
pub mod query;
pub mod query_cache;
pub mod types;

// Configuration and theming
pub mod config;
pub mod theme;

// Views
pub mod block_list;
pub mod details;
pub mod json_tree;
pub mod node_status;
pub mod pagination;
pub mod search;
pub mod tx_list;

pub mod app;
pub mod ui;
pub mod util_text;

// System clipboard (no-op without the native feature)
pub mod clipboard;

// Re-export commonly used types
pub use app::{App, InputMode, Tab};
pub use config::Config;
pub use query_cache::{QueryCache, QueryKey};
pub use types::AppEvent;
