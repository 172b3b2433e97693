//! Transaction and block detail overlays.
//!
//! Both views are a cursor over selectable rows: copyable fields first, then
//! the rows of the state-transition tree. `activate` on a field yields the
//! text to copy; on a tree container it toggles expansion.

use crate::json_tree::{flatten, TreeRow, TreeState};
use crate::types::{Block, BlockTransaction, Transaction};
use crate::util_text::{format_method_id, shorten_hash, status_label, tx_kind_label};
use serde_json::{Map, Value};

pub const PENDING: &str = "Pending";
pub const UNKNOWN: &str = "Unknown";

#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    pub label: &'static str,
    pub value: String,
    /// Full text placed on the clipboard; `None` for fields not worth copying.
    pub copy: Option<String>,
}

impl Field {
    fn plain(label: &'static str, value: impl Into<String>) -> Self {
        Self {
            label,
            value: value.into(),
            copy: None,
        }
    }

    fn copyable(label: &'static str, value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            label,
            copy: Some(value.clone()),
            value,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DetailAction {
    Copy(String),
    Toggled,
}

pub fn tx_fields(tx: &Transaction) -> Vec<Field> {
    let exec = tx.execution_result.as_ref();
    let block = exec.and_then(|r| r.block.as_ref());

    let mut fields = vec![
        Field::copyable("Transaction Hash", &tx.hash),
        Field::copyable("From", &tx.sender),
        Field {
            label: "Method ID",
            value: format_method_id(&tx.method_id),
            copy: Some(tx.method_id.clone()),
        },
        Field::plain("Nonce", &tx.nonce),
        Field::plain("Type", tx_kind_label(tx.is_message)),
    ];

    match block {
        Some(b) => fields.push(Field::copyable("Block", b.height.to_string())),
        None => fields.push(Field::plain("Block", PENDING)),
    }
    if let Some(hash) = block.and_then(|b| b.hash.as_ref()) {
        fields.push(Field::copyable("Block Hash", hash));
    }
    if let Some(batch) = block.and_then(|b| b.batch_height) {
        fields.push(Field::plain("Batch Height", batch.to_string()));
    }

    let status = match tx.status() {
        Some(s) => status_label(Some(s)),
        None => UNKNOWN,
    };
    fields.push(Field::plain("Status", status));
    if let Some(msg) = exec.and_then(|r| r.status_message.as_ref()) {
        if !msg.is_empty() {
            fields.push(Field::copyable("Status Message", msg));
        }
    }
    fields
}

pub fn block_fields(block: &Block) -> Vec<Field> {
    let opt_hash = |label, h: &Option<String>| match h {
        Some(h) => Field::copyable(label, h),
        None => Field::plain(label, UNKNOWN),
    };
    vec![
        Field::plain("Height", block.height.to_string()),
        Field::copyable("Block Hash", &block.hash),
        opt_hash("Parent Hash", &block.parent_hash),
        opt_hash("Transactions Hash", &block.transactions_hash),
        Field::plain(
            "Batch Height",
            block
                .batch_height
                .map(|b| b.to_string())
                .unwrap_or_else(|| PENDING.to_string()),
        ),
        Field::plain("Transactions", block.transactions.len().to_string()),
        Field::plain("Successful", block.successful_tx_count().to_string()),
    ]
}

/// One row of the block's transaction tab.
#[derive(Clone, Debug, PartialEq)]
pub struct BlockTxRow {
    pub hash: String,
    pub sender: String,
    pub nonce: String,
    pub status: &'static str,
    pub status_value: Option<bool>,
}

impl From<&BlockTransaction> for BlockTxRow {
    fn from(t: &BlockTransaction) -> Self {
        let tx = t.tx.as_ref();
        Self {
            hash: t.tx_hash.clone(),
            sender: tx.map(|r| shorten_hash(&r.sender)).unwrap_or_default(),
            nonce: tx.map(|r| r.nonce.clone()).unwrap_or_default(),
            status: status_label(t.status),
            status_value: t.status,
        }
    }
}

/// State transitions of every transaction in a block, keyed by tx hash.
pub fn block_state_changes(block: &Block) -> Value {
    let map: Map<String, Value> = block
        .transactions
        .iter()
        .filter_map(|t| {
            t.state_transitions
                .as_ref()
                .map(|v| (t.tx_hash.clone(), v.clone()))
        })
        .collect();
    Value::Object(map)
}

/// Fields followed by tree rows, addressed by one cursor.
#[derive(Clone, Debug, Default)]
struct CursorList {
    cursor: usize,
    tree: TreeState,
}

impl CursorList {
    fn len(fields: &[Field], tree: &[TreeRow]) -> usize {
        fields.len() + tree.len()
    }

    fn down(&mut self, len: usize) {
        if self.cursor + 1 < len {
            self.cursor += 1;
        }
    }

    fn up(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    fn activate(&mut self, fields: &[Field], tree: &[TreeRow]) -> Option<DetailAction> {
        if let Some(f) = fields.get(self.cursor) {
            return f.copy.clone().map(DetailAction::Copy);
        }
        let row = tree.get(self.cursor - fields.len())?;
        if row.is_expandable() {
            self.tree.toggle(&row.path);
            Some(DetailAction::Toggled)
        } else {
            Some(DetailAction::Copy(match row.text.strip_prefix('"') {
                Some(s) => s.strip_suffix('"').unwrap_or(s).to_string(),
                None => row.text.clone(),
            }))
        }
    }
}

#[derive(Clone, Debug)]
pub struct TxDetail {
    tx: Transaction,
    fields: Vec<Field>,
    payload: Option<Value>,
    nav: CursorList,
}

impl TxDetail {
    pub fn new(tx: Transaction) -> Self {
        let fields = tx_fields(&tx);
        let payload = tx
            .execution_result
            .as_ref()
            .and_then(|r| r.state_transitions.clone());
        Self {
            tx,
            fields,
            payload,
            nav: CursorList::default(),
        }
    }

    pub fn tx(&self) -> &Transaction {
        &self.tx
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn tree_rows(&self) -> Vec<TreeRow> {
        self.payload
            .as_ref()
            .map(|v| flatten(v, &self.nav.tree))
            .unwrap_or_default()
    }

    pub fn cursor(&self) -> usize {
        self.nav.cursor
    }

    pub fn down(&mut self) {
        let len = CursorList::len(&self.fields, &self.tree_rows());
        self.nav.down(len);
    }

    pub fn up(&mut self) {
        self.nav.up();
    }

    pub fn activate(&mut self) -> Option<DetailAction> {
        let rows = self.tree_rows();
        self.nav.activate(&self.fields, &rows)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum BlockTab {
    #[default]
    Overview,
    Transactions,
    StateChanges,
}

impl BlockTab {
    pub const ALL: [BlockTab; 3] = [BlockTab::Overview, BlockTab::Transactions, BlockTab::StateChanges];

    pub fn title(&self, tx_count: usize) -> String {
        match self {
            BlockTab::Overview => "Overview".to_string(),
            BlockTab::Transactions => format!("Transactions ({tx_count})"),
            BlockTab::StateChanges => "State Changes".to_string(),
        }
    }

    fn next(self) -> Self {
        match self {
            BlockTab::Overview => BlockTab::Transactions,
            BlockTab::Transactions => BlockTab::StateChanges,
            BlockTab::StateChanges => BlockTab::Overview,
        }
    }
}

#[derive(Clone, Debug)]
pub struct BlockDetail {
    block: Block,
    tab: BlockTab,
    fields: Vec<Field>,
    tx_rows: Vec<BlockTxRow>,
    state_changes: Value,
    overview: CursorList,
    tx_cursor: usize,
    changes: CursorList,
}

impl BlockDetail {
    pub fn new(block: Block) -> Self {
        Self {
            fields: block_fields(&block),
            tx_rows: block.transactions.iter().map(BlockTxRow::from).collect(),
            state_changes: block_state_changes(&block),
            block,
            tab: BlockTab::default(),
            overview: CursorList::default(),
            tx_cursor: 0,
            changes: CursorList::default(),
        }
    }

    pub fn block(&self) -> &Block {
        &self.block
    }

    pub fn tab(&self) -> BlockTab {
        self.tab
    }

    pub fn next_tab(&mut self) {
        self.tab = self.tab.next();
    }

    pub fn set_tab(&mut self, tab: BlockTab) {
        self.tab = tab;
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn tx_rows(&self) -> &[BlockTxRow] {
        &self.tx_rows
    }

    pub fn has_state_changes(&self) -> bool {
        self.state_changes
            .as_object()
            .map(|m| !m.is_empty())
            .unwrap_or(false)
    }

    pub fn tree_rows(&self) -> Vec<TreeRow> {
        if !self.has_state_changes() {
            return Vec::new();
        }
        flatten(&self.state_changes, &self.changes.tree)
    }

    /// Cursor within the active tab.
    pub fn cursor(&self) -> usize {
        match self.tab {
            BlockTab::Overview => self.overview.cursor,
            BlockTab::Transactions => self.tx_cursor,
            BlockTab::StateChanges => self.changes.cursor,
        }
    }

    pub fn down(&mut self) {
        match self.tab {
            BlockTab::Overview => self.overview.down(self.fields.len()),
            BlockTab::Transactions => {
                if self.tx_cursor + 1 < self.tx_rows.len() {
                    self.tx_cursor += 1;
                }
            }
            BlockTab::StateChanges => {
                let len = self.tree_rows().len();
                self.changes.down(len);
            }
        }
    }

    pub fn up(&mut self) {
        match self.tab {
            BlockTab::Overview => self.overview.up(),
            BlockTab::Transactions => self.tx_cursor = self.tx_cursor.saturating_sub(1),
            BlockTab::StateChanges => self.changes.up(),
        }
    }

    pub fn activate(&mut self) -> Option<DetailAction> {
        match self.tab {
            BlockTab::Overview => self.overview.activate(&self.fields, &[]),
            BlockTab::Transactions => self
                .tx_rows
                .get(self.tx_cursor)
                .map(|r| DetailAction::Copy(r.hash.clone())),
            BlockTab::StateChanges => {
                let rows = self.tree_rows();
                self.changes.activate(&[], &rows)
            }
        }
    }
}

/// The overlay currently open over the lists.
#[derive(Clone, Debug)]
pub enum Detail {
    Tx(TxDetail),
    Block(BlockDetail),
}

impl Detail {
    pub fn up(&mut self) {
        match self {
            Detail::Tx(d) => d.up(),
            Detail::Block(d) => d.up(),
        }
    }

    pub fn down(&mut self) {
        match self {
            Detail::Tx(d) => d.down(),
            Detail::Block(d) => d.down(),
        }
    }

    pub fn activate(&mut self) -> Option<DetailAction> {
        match self {
            Detail::Tx(d) => d.activate(),
            Detail::Block(d) => d.activate(),
        }
    }

    pub fn next_tab(&mut self) {
        if let Detail::Block(d) = self {
            d.next_tab();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tx(v: Value) -> Transaction {
        serde_json::from_value(v).unwrap()
    }

    fn value_of<'a>(fields: &'a [Field], label: &str) -> &'a str {
        &fields.iter().find(|f| f.label == label).unwrap().value
    }

    #[test]
    fn unexecuted_tx_shows_pending_and_unknown() {
        let t = tx(json!({"hash": "0x01", "methodId": "0xabc", "sender": "B62q", "nonce": 3, "isMessage": false}));
        let fields = tx_fields(&t);
        assert_eq!(value_of(&fields, "Block"), PENDING);
        assert_eq!(value_of(&fields, "Status"), UNKNOWN);
        assert_eq!(value_of(&fields, "Method ID"), "ABC");
        assert_eq!(value_of(&fields, "Nonce"), "3");
        assert_eq!(value_of(&fields, "Type"), "Transaction");
    }

    #[test]
    fn executed_tx_shows_block_and_status() {
        let t = tx(json!({
            "hash": "0x01", "methodId": "0xabc", "sender": "B62q", "nonce": "3", "isMessage": true,
            "executionResult": {
                "block": {"height": 77, "hash": "0xblock"},
                "status": false,
                "statusMessage": "out of gas"
            }
        }));
        let fields = tx_fields(&t);
        assert_eq!(value_of(&fields, "Block"), "77");
        assert_eq!(value_of(&fields, "Block Hash"), "0xblock");
        assert_eq!(value_of(&fields, "Status"), "Failed");
        assert_eq!(value_of(&fields, "Status Message"), "out of gas");
        assert_eq!(value_of(&fields, "Type"), "Message");
    }

    #[test]
    fn activate_copies_full_method_id() {
        let t = tx(json!({"hash": "0x01", "methodId": "0xabc", "sender": "B62q", "nonce": "1"}));
        let mut d = TxDetail::new(t);
        assert_eq!(d.activate(), Some(DetailAction::Copy("0x01".into())));
        d.down();
        d.down();
        assert_eq!(d.activate(), Some(DetailAction::Copy("0xabc".into())));
        d.down();
        assert_eq!(d.activate(), None);
    }

    #[test]
    fn cursor_reaches_payload_tree() {
        let t = tx(json!({
            "hash": "0x01", "methodId": "0x1", "sender": "s", "nonce": "1",
            "executionResult": {"block": null, "status": true, "stateTransitions": {"balance": "10"}}
        }));
        let mut d = TxDetail::new(t);
        let n = d.fields().len();
        for _ in 0..n {
            d.down();
        }
        assert_eq!(d.cursor(), n);
        assert_eq!(d.activate(), Some(DetailAction::Toggled));
        assert_eq!(d.tree_rows().len(), 2);
        d.down();
        assert_eq!(d.activate(), Some(DetailAction::Copy("10".into())));
    }

    fn block() -> Block {
        serde_json::from_value(json!({
            "hash": "0xblockhash",
            "height": 12,
            "parentHash": "0xparent",
            "_count": {"transactions": 1},
            "transactions": [
                {"txHash": "0xt1", "status": true, "stateTransitions": [{"key": "a"}], "tx": {"hash": "0xt1", "nonce": 4, "sender": "B62qsenderaddress"}},
                {"txHash": "0xt2", "status": false}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn block_tabs() {
        let mut d = BlockDetail::new(block());
        assert_eq!(d.tab(), BlockTab::Overview);
        assert_eq!(value_of(d.fields(), "Transactions Hash"), UNKNOWN);
        assert_eq!(value_of(d.fields(), "Successful"), "1");
        assert_eq!(BlockTab::Transactions.title(d.tx_rows().len()), "Transactions (2)");

        d.next_tab();
        d.down();
        assert_eq!(d.activate(), Some(DetailAction::Copy("0xt2".into())));
        assert_eq!(d.tx_rows()[0].status, "Success");
        assert_eq!(d.tx_rows()[1].status, "Failed");

        d.next_tab();
        assert!(d.has_state_changes());
        assert_eq!(d.tree_rows().len(), 1);
        assert_eq!(d.activate(), Some(DetailAction::Toggled));
        assert_eq!(d.tree_rows().len(), 2);
    }

    #[test]
    fn block_without_state_changes() {
        let mut b = block();
        for t in &mut b.transactions {
            t.state_transitions = None;
        }
        let d = BlockDetail::new(b);
        assert!(!d.has_state_changes());
        assert!(d.tree_rows().is_empty());
    }
}
