//! `x-todo-item`

use serde_json::{json, Value};

use super::{is_completed, ITEMS};
use crate::component::{ComponentType, EventContext, FieldsExt, HandlerError, MountContext, ReadSpec, State};
use crate::render::escape;
use crate::store::{Fields, Record};

/// Inner markup of one item: the `li` with its view and, while editing, the
/// edit field.
pub(crate) fn render_item(record: &Record, editing: bool, hidden: bool) -> String {
    let completed = is_completed(record);
    let text = escape(record.str_field("text"));

    let classes: Vec<&str> = [
        (completed, "completed"),
        (editing, "editing"),
        (hidden, "hidden"),
    ]
    .into_iter()
    .filter_map(|(on, class)| on.then_some(class))
    .collect();
    let class_attr = if classes.is_empty() {
        String::new()
    } else {
        format!(r#" class="{}""#, classes.join(" "))
    };

    let mut out = format!(
        r#"<li{class_attr}><div class="view"><input class="toggle" type="checkbox"{checked}><label>{text}</label><button class="destroy"></button></div>"#,
        checked = if completed { " checked" } else { "" },
    );
    if editing {
        out.push_str(&format!(r#"<input class="edit" name="text" value="{text}">"#));
    }
    out.push_str("</li>");
    out
}

fn record_id(state: &State) -> Result<u64, HandlerError> {
    state.require_record_id("id")
}

fn text_fields(text: &str) -> Fields {
    let mut fields = Fields::new();
    fields.insert("text".into(), json!(text));
    fields
}

/// The item component type.
pub fn item() -> ComponentType {
    ComponentType::new("x-todo-item", |cx| {
        let editing = cx.state().bool_field("editing").unwrap_or(false);
        match cx.state().record_id("id").and_then(|id| cx.record(ITEMS, id)) {
            Some(record) => render_item(record, editing, false),
            None => String::new(),
        }
    })
    .mount(|cx: MountContext| async move {
        let id = cx.props.require_record_id("id")?;
        if cx.store.read(ITEMS, id).await?.is_none() {
            return Err(HandlerError::new(format!("no todo item {id}")));
        }

        let mut state = State::new();
        state.insert("id".into(), Value::String(id.to_string()));
        state.insert("editing".into(), json!(false));
        Ok(state)
    })
    .reads(|state| match state.record_id("id") {
        Some(id) => vec![ReadSpec::record(ITEMS, id)],
        None => Vec::new(),
    })
    .on("toggle_editing", |cx: EventContext| async move {
        let mut state = cx.state;
        let editing = state.bool_field("editing").unwrap_or(false);
        state.insert("editing".into(), json!(!editing));
        Ok(state)
    })
    .on("save", |cx: EventContext| async move {
        let id = record_id(&cx.state)?;
        let text = cx.payload.require_str("text")?.trim();
        if text.is_empty() {
            cx.store.delete(ITEMS, id).await?;
        } else {
            cx.store.update(ITEMS, id, text_fields(text)).await?;
        }

        let mut state = cx.state;
        state.insert("editing".into(), json!(false));
        Ok(state)
    })
    .on("completed", |cx: EventContext| async move {
        let id = record_id(&cx.state)?;
        let completed = cx.payload.require_bool("completed")?;

        let mut fields = Fields::new();
        fields.insert("completed".into(), json!(completed));
        cx.store.update(ITEMS, id, fields).await?;
        Ok(cx.state)
    })
    .on("destroy", |cx: EventContext| async move {
        let id = record_id(&cx.state)?;
        cx.store.delete(ITEMS, id).await?;
        Ok(cx.state)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::Fragment;

    fn record(text: &str, completed: bool) -> Record {
        let fields = json!({"text": text, "completed": completed}).as_object().cloned().unwrap();
        Record::new(1, fields)
    }

    #[test]
    fn plain_item() {
        let markup = render_item(&record("Milk", false), false, false);
        let tree = Fragment::parse(&markup).unwrap();
        let li = tree.root().unwrap();

        assert_eq!(li.attr("class"), None);
        assert_eq!(tree.select("label")[0].text_content(), "Milk");
        assert_eq!(tree.select("input.toggle")[0].attr("checked"), None);
        assert!(tree.select("input.edit").is_empty());
    }

    #[test]
    fn completed_editing_hidden_item() {
        let markup = render_item(&record("a < b", true), true, true);
        let tree = Fragment::parse(&markup).unwrap();
        let li = tree.root().unwrap();

        assert!(li.has_class("completed"));
        assert!(li.has_class("editing"));
        assert!(li.has_class("hidden"));
        assert_eq!(tree.select("input.toggle")[0].attr("checked"), Some(""));
        assert_eq!(tree.select("input.edit")[0].attr("value"), Some("a < b"));
        assert_eq!(tree.select("label")[0].text_content(), "a < b");
    }
}
