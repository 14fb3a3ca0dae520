//! TodoMVC reference components.
//!
//! Three component types over one store collection, `items`, whose records
//! carry `text` and `completed`:
//!
//! - `x-todo-list`: the input, the filtered list and the footer
//! - `x-todo-item`: one item, editable in place; its id is the record id
//! - `x-todo-counter`: the number of active items
//!
//! The components never talk to each other. An item saving its text writes the
//! record, and the list and counter re-render because they read `items`.

mod counter;
mod item;
mod list;

use std::fmt;
use std::str::FromStr;

use crate::component::{ComponentLibrary, HandlerError};
use crate::store::Record;

pub use counter::counter;
pub use item::item;
pub use list::list;

/// Store collection holding the todo items.
pub const ITEMS: &str = "items";

/// The built-in todo component library.
pub fn library() -> ComponentLibrary {
    ComponentLibrary::new().with(list()).with(item()).with(counter())
}

/// Which items the list shows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Filter {
    #[default]
    All,
    Active,
    Completed,
}

impl Filter {
    pub fn as_str(self) -> &'static str {
        match self {
            Filter::All => "all",
            Filter::Active => "active",
            Filter::Completed => "completed",
        }
    }

    pub fn shows(self, record: &Record) -> bool {
        match self {
            Filter::All => true,
            Filter::Active => !is_completed(record),
            Filter::Completed => is_completed(record),
        }
    }
}

impl FromStr for Filter {
    type Err = HandlerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Filter::All),
            "active" => Ok(Filter::Active),
            "completed" => Ok(Filter::Completed),
            other => Err(HandlerError::new(format!("unknown filter `{other}`"))),
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub(crate) fn is_completed(record: &Record) -> bool {
    record.bool_field("completed")
}
