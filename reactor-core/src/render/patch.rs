//! Patch Model
//!
//! A patch is an ordered list of operations that turns the markup last sent
//! for a component into its new markup. Paths are child-index lists starting
//! at the top level of the component's fragment and are valid at the moment
//! their operation is applied, so operations must run in order.
//!
//! The browser client applies patches to the live DOM. [`Patch::apply`] does
//! the same against a parsed [`Fragment`], which Rust-side clients and the
//! round-trip tests use.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use thiserror::Error;

use super::markup::{Fragment, MarkupError, Node};

/// Child-index path from the top of a fragment to a node.
pub type NodePath = SmallVec<[usize; 8]>;

/// Errors raised when a patch does not fit the tree it is applied to.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatchError {
    #[error("no node at path {path:?}")]
    InvalidPath { path: Vec<usize> },

    #[error("node at path {path:?} is not an element")]
    NotAnElement { path: Vec<usize> },

    #[error("node at path {path:?} is not text")]
    NotText { path: Vec<usize> },

    #[error("child index {index} out of range at path {path:?}")]
    IndexOutOfRange { path: Vec<usize>, index: usize },

    #[error(transparent)]
    Markup(#[from] MarkupError),
}

/// One patch operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PatchOp {
    /// Replace the whole component fragment.
    ReplaceAll { markup: String },

    /// Replace the node at `path`.
    Replace { path: NodePath, markup: String },

    /// Insert `markup` as child `index` of the element (or fragment) at `path`.
    Insert {
        path: NodePath,
        index: usize,
        markup: String,
    },

    /// Remove the node at `path`.
    Remove { path: NodePath },

    /// Move a child of the element (or fragment) at `path` from `from` to `to`.
    Move { path: NodePath, from: usize, to: usize },

    SetText { path: NodePath, text: String },

    SetAttribute {
        path: NodePath,
        name: String,
        value: String,
    },

    RemoveAttribute { path: NodePath, name: String },
}

/// An ordered list of operations for one component.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Patch(Vec<PatchOp>);

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    /// A patch that replaces everything with `markup`.
    pub fn replace_all(markup: impl Into<String>) -> Self {
        Self(vec![PatchOp::ReplaceAll {
            markup: markup.into(),
        }])
    }

    pub fn push(&mut self, op: PatchOp) {
        self.0.push(op);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn ops(&self) -> &[PatchOp] {
        &self.0
    }

    /// Apply every operation in order.
    ///
    /// On error the fragment may be partially patched.
    pub fn apply(&self, fragment: &mut Fragment) -> Result<(), PatchError> {
        for op in &self.0 {
            apply_op(fragment, op)?;
        }
        Ok(())
    }
}

impl From<Vec<PatchOp>> for Patch {
    fn from(ops: Vec<PatchOp>) -> Self {
        Self(ops)
    }
}

impl IntoIterator for Patch {
    type Item = PatchOp;
    type IntoIter = std::vec::IntoIter<PatchOp>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

fn apply_op(fragment: &mut Fragment, op: &PatchOp) -> Result<(), PatchError> {
    match op {
        PatchOp::ReplaceAll { markup } => {
            *fragment = Fragment::parse(markup)?;
        }
        PatchOp::Replace { path, markup } => {
            let (siblings, index) = slot_mut(fragment, path)?;
            let nodes = Fragment::parse(markup)?.children;
            siblings.splice(index..=index, nodes);
        }
        PatchOp::Insert { path, index, markup } => {
            let children = children_mut(fragment, path)?;
            if *index > children.len() {
                return Err(PatchError::IndexOutOfRange {
                    path: path.to_vec(),
                    index: *index,
                });
            }
            let nodes = Fragment::parse(markup)?.children;
            children.splice(*index..*index, nodes);
        }
        PatchOp::Remove { path } => {
            let (siblings, index) = slot_mut(fragment, path)?;
            siblings.remove(index);
        }
        PatchOp::Move { path, from, to } => {
            let children = children_mut(fragment, path)?;
            let out_of_range = |index: usize| PatchError::IndexOutOfRange {
                path: path.to_vec(),
                index,
            };
            if *from >= children.len() {
                return Err(out_of_range(*from));
            }
            let node = children.remove(*from);
            if *to > children.len() {
                return Err(out_of_range(*to));
            }
            children.insert(*to, node);
        }
        PatchOp::SetText { path, text } => match node_mut(fragment, path)? {
            Node::Text(current) => *current = text.clone(),
            _ => return Err(PatchError::NotText { path: path.to_vec() }),
        },
        PatchOp::SetAttribute { path, name, value } => match node_mut(fragment, path)? {
            Node::Element(element) => {
                element.attrs.insert(name.clone(), value.clone());
            }
            _ => return Err(PatchError::NotAnElement { path: path.to_vec() }),
        },
        PatchOp::RemoveAttribute { path, name } => match node_mut(fragment, path)? {
            Node::Element(element) => {
                element.attrs.shift_remove(name);
            }
            _ => return Err(PatchError::NotAnElement { path: path.to_vec() }),
        },
    }
    Ok(())
}

/// Child list of the element at `path`; the empty path is the fragment itself.
fn children_mut<'a>(fragment: &'a mut Fragment, path: &[usize]) -> Result<&'a mut Vec<Node>, PatchError> {
    let mut children = &mut fragment.children;
    for (depth, &index) in path.iter().enumerate() {
        match children.get_mut(index) {
            Some(Node::Element(element)) => children = &mut element.children,
            Some(_) => {
                return Err(PatchError::NotAnElement {
                    path: path[..=depth].to_vec(),
                })
            }
            None => {
                return Err(PatchError::InvalidPath {
                    path: path[..=depth].to_vec(),
                })
            }
        }
    }
    Ok(children)
}

/// Sibling list holding the node at `path`, and its index there.
fn slot_mut<'a>(fragment: &'a mut Fragment, path: &[usize]) -> Result<(&'a mut Vec<Node>, usize), PatchError> {
    let Some((&index, parent)) = path.split_last() else {
        return Err(PatchError::InvalidPath { path: Vec::new() });
    };
    let siblings = children_mut(fragment, parent)?;
    if index >= siblings.len() {
        return Err(PatchError::InvalidPath { path: path.to_vec() });
    }
    Ok((siblings, index))
}

fn node_mut<'a>(fragment: &'a mut Fragment, path: &[usize]) -> Result<&'a mut Node, PatchError> {
    let (siblings, index) = slot_mut(fragment, path)?;
    Ok(&mut siblings[index])
}
