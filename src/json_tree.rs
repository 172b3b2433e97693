//! Collapsible tree view for arbitrary JSON payloads.
//!
//! `flatten` walks the value and emits one row per visible node; containers
//! contribute their children only while their path is in the `TreeState`.
//! Paths are JSON-pointer style (`""` for the root, `/a/0` for `value.a[0]`).

use crate::theme::JsonPalette;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use serde_json::Value;
use std::collections::HashSet;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum JsonKind {
    String,
    Number,
    Boolean,
    Null,
    /// Field count
    Object(usize),
    /// Item count
    Array(usize),
}

impl JsonKind {
    pub fn classify(value: &Value) -> Self {
        match value {
            Value::String(_) => JsonKind::String,
            Value::Number(_) => JsonKind::Number,
            Value::Bool(_) => JsonKind::Boolean,
            Value::Null => JsonKind::Null,
            Value::Object(map) => JsonKind::Object(map.len()),
            Value::Array(items) => JsonKind::Array(items.len()),
        }
    }

    /// Non-empty object or array.
    pub fn is_expandable(&self) -> bool {
        matches!(self, JsonKind::Object(n) | JsonKind::Array(n) if *n > 0)
    }
}

/// Expanded node paths. Everything else is collapsed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TreeState {
    expanded: HashSet<String>,
}

impl TreeState {
    pub fn is_expanded(&self, path: &str) -> bool {
        self.expanded.contains(path)
    }

    pub fn toggle(&mut self, path: &str) {
        if !self.expanded.remove(path) {
            self.expanded.insert(path.to_string());
        }
    }

    pub fn collapse_all(&mut self) {
        self.expanded.clear();
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TreeRow {
    pub depth: usize,
    pub path: String,
    /// Field name or array index; `None` for the root.
    pub key: Option<String>,
    pub kind: JsonKind,
    pub expanded: bool,
    /// Leaf text or container summary.
    pub text: String,
}

impl TreeRow {
    pub fn is_expandable(&self) -> bool {
        self.kind.is_expandable()
    }
}

pub fn flatten(value: &Value, state: &TreeState) -> Vec<TreeRow> {
    let mut rows = Vec::new();
    walk(value, None, String::new(), 0, state, &mut rows);
    rows
}

fn walk(
    value: &Value,
    key: Option<String>,
    path: String,
    depth: usize,
    state: &TreeState,
    rows: &mut Vec<TreeRow>,
) {
    let kind = JsonKind::classify(value);
    let expanded = kind.is_expandable() && state.is_expanded(&path);

    rows.push(TreeRow {
        depth,
        path: path.clone(),
        key,
        kind,
        expanded,
        text: summary(value, kind),
    });

    if !expanded {
        return;
    }
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                let child = format!("{path}/{}", escape_token(k));
                walk(v, Some(k.clone()), child, depth + 1, state, rows);
            }
        }
        Value::Array(items) => {
            for (i, v) in items.iter().enumerate() {
                let child = format!("{path}/{i}");
                walk(v, Some(i.to_string()), child, depth + 1, state, rows);
            }
        }
        _ => {}
    }
}

fn summary(value: &Value, kind: JsonKind) -> String {
    match (value, kind) {
        (Value::String(s), _) => format!("\"{s}\""),
        (_, JsonKind::Object(0)) => "{}".to_string(),
        (_, JsonKind::Array(0)) => "[]".to_string(),
        (_, JsonKind::Object(1)) => "{1 field}".to_string(),
        (_, JsonKind::Object(n)) => format!("{{{n} fields}}"),
        (_, JsonKind::Array(1)) => "[1 item]".to_string(),
        (_, JsonKind::Array(n)) => format!("[{n} items]"),
        (other, _) => other.to_string(),
    }
}

fn escape_token(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}

pub fn render_rows(rows: &[TreeRow], palette: &JsonPalette) -> Vec<Line<'static>> {
    rows.iter().map(|row| render_row(row, palette)).collect()
}

fn render_row(row: &TreeRow, palette: &JsonPalette) -> Line<'static> {
    let structure = Style::default().fg(palette.structure);
    let mut spans = vec![Span::raw("  ".repeat(row.depth))];

    let marker = match (row.is_expandable(), row.expanded) {
        (true, true) => "▾ ",
        (true, false) => "▸ ",
        (false, _) => "  ",
    };
    spans.push(Span::styled(marker, structure));

    if let Some(key) = &row.key {
        spans.push(Span::styled(
            key.clone(),
            Style::default().fg(palette.key).add_modifier(Modifier::BOLD),
        ));
        spans.push(Span::styled(": ", structure));
    }

    let fg = match row.kind {
        JsonKind::String => palette.string,
        JsonKind::Number => palette.number,
        JsonKind::Boolean => palette.boolean,
        JsonKind::Null => palette.null,
        JsonKind::Object(_) | JsonKind::Array(_) => palette.structure,
    };
    spans.push(Span::styled(row.text.clone(), Style::default().fg(fg)));

    Line::from(spans)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theme::ColorScheme;
    use serde_json::json;

    #[test]
    fn classifies_every_kind() {
        assert_eq!(JsonKind::classify(&json!("a")), JsonKind::String);
        assert_eq!(JsonKind::classify(&json!(1.5)), JsonKind::Number);
        assert_eq!(JsonKind::classify(&json!(false)), JsonKind::Boolean);
        assert_eq!(JsonKind::classify(&json!(null)), JsonKind::Null);
        assert_eq!(JsonKind::classify(&json!({"a": 1, "b": 2})), JsonKind::Object(2));
        assert_eq!(JsonKind::classify(&json!([1])), JsonKind::Array(1));
    }

    #[test]
    fn collapsed_object_is_one_row() {
        let v = json!({"a": 1, "b": "x", "c": null});
        let rows = flatten(&v, &TreeState::default());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].text, "{3 fields}");
        assert!(!rows[0].expanded);
    }

    #[test]
    fn expanding_root_lists_fields() {
        let v = json!({"a": 1, "b": "x", "c": null});
        let mut state = TreeState::default();
        state.toggle("");
        let rows = flatten(&v, &state);
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[1].key.as_deref(), Some("a"));
        assert_eq!(rows[1].depth, 1);
        assert_eq!(rows[2].text, "\"x\"");
        assert_eq!(rows[3].kind, JsonKind::Null);

        state.toggle("");
        assert_eq!(flatten(&v, &state).len(), 1);
    }

    #[test]
    fn nested_paths_are_pointers() {
        let v = json!({"transfers": [{"to": "B62q"}], "a/b": true});
        let mut state = TreeState::default();
        state.toggle("");
        state.toggle("/transfers");
        state.toggle("/transfers/0");
        let rows = flatten(&v, &state);
        let paths: Vec<_> = rows.iter().map(|r| r.path.as_str()).collect();
        assert!(paths.contains(&"/transfers/0/to"));
        assert!(paths.contains(&"/a~1b"));
    }

    #[test]
    fn empty_containers_do_not_expand() {
        let v = json!({});
        let mut state = TreeState::default();
        state.toggle("");
        let rows = flatten(&v, &state);
        assert_eq!(rows.len(), 1);
        assert!(!rows[0].expanded);
        assert_eq!(rows[0].text, "{}");
    }

    #[test]
    fn render_marks_containers() {
        let v = json!({"k": [1, 2]});
        let mut state = TreeState::default();
        state.toggle("");
        let rows = flatten(&v, &state);
        let lines = render_rows(&rows, &ColorScheme::nord().json);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].spans.iter().any(|s| s.content == "▾ "));
        assert!(lines[1].spans.iter().any(|s| s.content == "[2 items]"));
    }
}
