//! `x-todo-list`

use serde_json::{json, Value};

use super::item::render_item;
use super::{is_completed, Filter, ITEMS};
use crate::component::{
    ChildView, ComponentType, EventContext, FieldsExt, MountContext, ReadSpec, RenderContext, State,
};
use crate::render::Node;
use crate::store::{Fields, Record};

fn filter_of(state: &State) -> Filter {
    state
        .str_field("showing")
        .and_then(|showing| showing.parse().ok())
        .unwrap_or_default()
}

fn render_list(cx: &RenderContext<'_>) -> String {
    let filter = filter_of(cx.state());
    let items = cx.collection(ITEMS);
    let all_completed = !items.is_empty() && items.iter().all(is_completed);

    let mut out = String::from(
        r#"<header class="header"><h1>todos</h1><input class="new-todo" name="new_item" placeholder="What needs to be done?" autofocus></header>"#,
    );

    out.push_str(&format!(
        r#"<section class="main"><input id="toggle-all" class="toggle-all" type="checkbox"{}><label for="toggle-all">Mark all as complete</label><ul class="todo-list">"#,
        if all_completed { " checked" } else { "" }
    ));
    for record in items {
        let hidden = !filter.shows(record);
        match cx.child(&record.id.to_string()).filter(|child| child.type_name == "x-todo-item") {
            Some(child) => out.push_str(&embedded_item(child, hidden)),
            None => out.push_str(&list_entry(record, hidden)),
        }
    }
    out.push_str("</ul></section>");

    out.push_str(r#"<footer class="footer"><ul class="filters">"#);
    for (option, label, href) in [
        (Filter::All, "All", "#/"),
        (Filter::Active, "Active", "#/active"),
        (Filter::Completed, "Completed", "#/completed"),
    ] {
        let selected = if option == filter { r#" class="selected""# } else { "" };
        out.push_str(&format!(r#"<li><a{selected} href="{href}" data-showing="{option}">{label}</a></li>"#));
    }
    out.push_str("</ul>");
    if items.iter().any(is_completed) {
        out.push_str(r#"<button class="clear-completed">Clear completed</button>"#);
    }
    out.push_str("</footer>");
    out
}

/// One item the client has not joined, in its non-editing form.
///
/// Keyed by `data-key` so the element never shares an id with a live
/// `x-todo-item` elsewhere on the page.
fn list_entry(record: &Record, hidden: bool) -> String {
    let class = if is_completed(record) { r#" class="completed""# } else { "" };
    format!(
        r#"<x-todo-item data-key="{id}"{class}>{li}</x-todo-item>"#,
        id = record.id,
        li = render_item(record, false, hidden),
    )
}

/// A joined item child, as last rendered by itself.
fn embedded_item(child: &ChildView, hidden: bool) -> String {
    match child.tree.root() {
        Some(root) if hidden => {
            let mut root = root.clone();
            root.set_attr("hidden", "");
            Node::Element(root).to_markup()
        }
        _ => child.markup.to_string(),
    }
}

/// The list component type.
pub fn list() -> ComponentType {
    ComponentType::new("x-todo-list", render_list)
        .mount(|cx: MountContext| async move {
            let filter: Filter = match cx.props.str_field("showing") {
                Some(showing) => showing.parse()?,
                None => Filter::All,
            };

            let mut state = cx.props;
            state.insert("showing".into(), json!(filter.as_str()));
            Ok(state)
        })
        .reads(|_| vec![ReadSpec::collection(ITEMS)])
        .on("add", |cx: EventContext| async move {
            let text = cx.payload.require_str("new_item")?.trim();
            if !text.is_empty() {
                let mut fields = Fields::new();
                fields.insert("text".into(), json!(text));
                fields.insert("completed".into(), json!(false));
                cx.store.create(ITEMS, fields).await?;
            }
            Ok(cx.state)
        })
        .on("show", |cx: EventContext| async move {
            let filter: Filter = cx.payload.require_str("showing")?.parse()?;
            let mut state = cx.state;
            state.insert("showing".into(), json!(filter.as_str()));
            Ok(state)
        })
        .on("clear_completed", |cx: EventContext| async move {
            for record in cx.store.list(ITEMS).await? {
                if is_completed(&record) {
                    cx.store.delete(ITEMS, record.id).await?;
                }
            }
            Ok(cx.state)
        })
        .on("toggle_all", |cx: EventContext| async move {
            let completed = cx.payload.require_bool("completed")?;
            for record in cx.store.list(ITEMS).await? {
                if is_completed(&record) != completed {
                    let mut fields = Fields::new();
                    fields.insert("completed".into(), Value::Bool(completed));
                    cx.store.update(ITEMS, record.id, fields).await?;
                }
            }
            Ok(cx.state)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::ReadSet;
    use crate::render::Fragment;
    use crate::store::{MemoryStore, Store};

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        for (text, completed) in [("Milk", false), ("Eggs", true)] {
            let fields = json!({"text": text, "completed": completed}).as_object().cloned().unwrap();
            store.create(ITEMS, fields).await.unwrap();
        }
        store
    }

    async fn render(store: &MemoryStore, showing: &str) -> Fragment {
        let state = json!({"id": "todos", "showing": showing}).as_object().cloned().unwrap();
        let reads = ReadSet::load(store, &[ReadSpec::collection(ITEMS)]).await.unwrap();
        let cx = RenderContext::new("x-todo-list", "todos", &state, &reads);
        Fragment::parse(&render_list(&cx)).unwrap()
    }

    #[tokio::test]
    async fn active_filter_hides_completed_items() {
        let store = seeded().await;
        let tree = render(&store, "active").await;

        assert_eq!(tree.select("x-todo-item").len(), 2);
        assert_eq!(tree.select("x-todo-item li.hidden").len(), 1);
        assert_eq!(tree.select("x-todo-item.completed").len(), 1);
        assert_eq!(tree.select("a.selected")[0].text_content(), "Active");
        assert_eq!(tree.select("button.clear-completed").len(), 1);
    }

    #[tokio::test]
    async fn entries_are_keyed_by_record_id_without_dom_ids() {
        let store = seeded().await;
        let tree = render(&store, "all").await;

        let keys: Vec<_> = tree.select("x-todo-item").iter().filter_map(|item| item.attr("data-key")).collect();
        assert_eq!(keys, vec!["1", "2"]);
        assert!(tree.select("x-todo-item").iter().all(|item| item.attr("id").is_none()));
        assert!(tree.select("li.hidden").is_empty());
    }

    #[tokio::test]
    async fn empty_list_has_no_clear_button() {
        let tree = render(&MemoryStore::new(), "all").await;

        assert!(tree.select("x-todo-item").is_empty());
        assert!(tree.select("button.clear-completed").is_empty());
        assert_eq!(tree.select("input.toggle-all")[0].attr("checked"), None);
    }
}
