//! Initial page rendering.
//!
//! The first HTTP response embeds the markup of the page's root components.
//! It is produced by joining each root into a throwaway runtime, so every
//! root's `state` attribute is byte-for-byte what a websocket join returns for
//! the same type, props and store contents.

use std::sync::Arc;

use crate::component::{ComponentLibrary, Props};
use crate::error::Result;
use crate::runtime::Runtime;
use crate::store::Store;

/// A root component of a page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageRoot {
    pub type_name: String,
    pub props: Props,
}

impl PageRoot {
    pub fn new(type_name: impl Into<String>, props: Props) -> Self {
        Self {
            type_name: type_name.into(),
            props,
        }
    }
}

/// Render `roots` in order and concatenate their markup.
pub async fn render_page(library: Arc<ComponentLibrary>, store: Arc<dyn Store>, roots: &[PageRoot]) -> Result<String> {
    let mut runtime = Runtime::new(library, store);
    let mut page = String::new();
    for root in roots {
        let (_, markup) = runtime.join(&root.type_name, root.props.clone(), None).await?;
        page.push_str(&markup);
    }
    Ok(page)
}
