//! Rendering
//!
//! Everything between a component's render function and the bytes pushed to
//! a client:
//!
//! - `markup`: a small HTML tree with tolerant parsing and serialization
//! - `patch`: serializable patch operations and their application
//! - `diff`: the keyed tree diff producing patches
//! - `cache`: per-component snapshots keyed by a render fingerprint
//!
//! Every component renders inside a root element named after its type that
//! carries its id and its JSON-encoded state. [`wrap_root`] builds it, and it
//! is the only place that markup is assembled by the core.

mod cache;
mod diff;
mod markup;
mod patch;

pub use cache::{fingerprint, CacheStats, Fingerprint, RenderCache, RenderOutcome, Snapshot};
pub use diff::diff;
pub use markup::{escape, parse, Element, Fragment, MarkupError, Node};
pub use patch::{NodePath, Patch, PatchError, PatchOp};

use crate::component::State;
use crate::error::Result;

/// Wrap rendered inner markup in the component root element.
pub fn wrap_root(type_name: &str, id: &str, state: &State, inner: &str) -> Result<String> {
    let state_json = serde_json::to_string(state)?;
    Ok(format!(
        r#"<{type_name} id="{id}" state="{state}">{inner}</{type_name}>"#,
        id = escape(id),
        state = escape(&state_json),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn root_carries_id_and_state() {
        let state = json!({"id": "x-todo-list-1", "showing": "all"})
            .as_object()
            .cloned()
            .unwrap();
        let markup = wrap_root("x-todo-list", "x-todo-list-1", &state, "<ul></ul>").unwrap();

        let tree = Fragment::parse(&markup).unwrap();
        let root = tree.root().unwrap();
        assert_eq!(root.tag(), "x-todo-list");
        assert_eq!(root.attr("id"), Some("x-todo-list-1"));

        let parsed: serde_json::Value = serde_json::from_str(root.attr("state").unwrap()).unwrap();
        assert_eq!(parsed, json!(state));
        assert_eq!(root.children().len(), 1);
    }
}
