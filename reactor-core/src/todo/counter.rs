//! `x-todo-counter`

use serde_json::Value;

use super::{is_completed, ITEMS};
use crate::component::{ComponentType, ReadSpec};
use crate::store::Record;

fn active_count(records: &[Record]) -> Value {
    Value::from(records.iter().filter(|record| !is_completed(record)).count())
}

/// The counter component type. Shows how many items are not completed.
///
/// It reads only the active count, so edits that leave the count alone are
/// cache hits.
pub fn counter() -> ComponentType {
    ComponentType::new("x-todo-counter", |cx| {
        let active = cx.derived("active").and_then(Value::as_u64).unwrap_or(0);
        let noun = if active == 1 { "item" } else { "items" };
        format!(r#"<span class="todo-count"><strong>{active}</strong> {noun} left</span>"#)
    })
    .reads(|_| vec![ReadSpec::derived("active", ITEMS, active_count)])
}
