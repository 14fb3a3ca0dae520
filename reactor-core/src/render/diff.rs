//! Diff Engine
//!
//! Computes a [`Patch`] between two markup trees of the same component.
//!
//! # Algorithm
//!
//! For each pair of matched nodes we compare attributes, text and children.
//! Children are matched in two passes:
//!
//! 1. Keyed: elements with an `id` (or, lacking one, a `data-key`) attribute
//!    match the old element with the same key and tag.
//! 2. Positional: remaining nodes match the next unused old node of the same
//!    kind (same tag for elements), scanning forward so ties go to position.
//!
//! The child list is then rewritten in three steps. Unmatched old children are
//! removed (highest index first). Matched children whose old indices form the
//! longest increasing subsequence stay put; the rest are moved, and unmatched
//! new children inserted, directly after their new predecessor. Finally each
//! matched pair is recursed into at its final index. Every path is valid when
//! its operation runs, so applying the patch in order reproduces the new tree.

use std::collections::HashMap;

use super::markup::{Fragment, Node};
use super::patch::{NodePath, Patch, PatchOp};

/// Diff `old` against `new`. No old tree means a full replace.
pub fn diff(old: Option<&Fragment>, new: &Fragment) -> Patch {
    let Some(old) = old else {
        return Patch::replace_all(new.to_markup());
    };

    let mut ops = Vec::new();
    let mut path = NodePath::new();
    diff_children(&old.children, &new.children, &mut path, &mut ops);
    Patch::from(ops)
}

fn same_kind(old: &Node, new: &Node) -> bool {
    match (old, new) {
        (Node::Element(a), Node::Element(b)) => a.tag == b.tag,
        (Node::Text(_), Node::Text(_)) => true,
        (Node::Comment(_), Node::Comment(_)) => true,
        _ => false,
    }
}

/// For each new child, the index of the old child it matches.
fn match_children(old: &[Node], new: &[Node]) -> Vec<Option<usize>> {
    let mut used = vec![false; old.len()];
    let mut matches = vec![None; new.len()];

    let mut keyed: HashMap<&str, usize> = HashMap::new();
    for (index, node) in old.iter().enumerate() {
        if let Some(key) = node.key() {
            keyed.entry(key).or_insert(index);
        }
    }

    for (slot, node) in matches.iter_mut().zip(new) {
        let Some(key) = node.key() else { continue };
        if let Some(&index) = keyed.get(key) {
            if !used[index] && same_kind(&old[index], node) {
                used[index] = true;
                *slot = Some(index);
            }
        }
    }

    let mut cursor = 0;
    for (slot, node) in matches.iter_mut().zip(new) {
        if slot.is_some() || node.key().is_some() {
            continue;
        }
        let candidate = (cursor..old.len())
            .find(|&index| !used[index] && old[index].key().is_none() && same_kind(&old[index], node));
        if let Some(index) = candidate {
            used[index] = true;
            *slot = Some(index);
            cursor = index + 1;
        }
    }

    matches
}

fn diff_children(old: &[Node], new: &[Node], path: &mut NodePath, ops: &mut Vec<PatchOp>) {
    let matches = match_children(old, new);

    let mut kept = vec![false; old.len()];
    for index in matches.iter().flatten() {
        kept[*index] = true;
    }

    for index in (0..old.len()).rev() {
        if !kept[index] {
            ops.push(PatchOp::Remove {
                path: child_path(path, index),
            });
        }
    }

    // Matched nodes on the longest increasing run of old indices keep their
    // place; every other node is moved or inserted right after its new
    // predecessor.
    let stable = longest_increasing(&matches);

    // Old indices (or `None` for inserted nodes) in their current order,
    // tagged with the new index they end up at.
    let mut current: Vec<(Option<usize>, usize)> = Vec::with_capacity(new.len());
    let mut placed = vec![usize::MAX; old.len()];
    for (new_index, matched) in matches.iter().enumerate() {
        if let Some(old_index) = matched {
            placed[*old_index] = new_index;
        }
    }
    current.extend((0..old.len()).filter(|&i| kept[i]).map(|i| (Some(i), placed[i])));

    for (index, (node, matched)) in new.iter().zip(&matches).enumerate() {
        if stable[index] {
            continue;
        }
        let after = match index {
            0 => None,
            _ => current.iter().position(|(_, at)| *at == index - 1),
        };
        match matched {
            Some(_) => {
                let Some(from) = current.iter().position(|(_, at)| *at == index) else {
                    continue;
                };
                let to = match after {
                    None => 0,
                    Some(prev) if from < prev => prev,
                    Some(prev) => prev + 1,
                };
                if from != to {
                    ops.push(PatchOp::Move {
                        path: path.clone(),
                        from,
                        to,
                    });
                    let entry = current.remove(from);
                    current.insert(to, entry);
                }
            }
            None => {
                let at = after.map_or(0, |prev| prev + 1);
                ops.push(PatchOp::Insert {
                    path: path.clone(),
                    index: at,
                    markup: node.to_markup(),
                });
                current.insert(at, (None, index));
            }
        }
    }

    for (index, (node, matched)) in new.iter().zip(&matches).enumerate() {
        if let Some(old_index) = matched {
            path.push(index);
            diff_node(&old[*old_index], node, path, ops);
            path.pop();
        }
    }
}

/// Mark the new positions whose old indices form a longest increasing
/// subsequence among the matched children.
fn longest_increasing(matches: &[Option<usize>]) -> Vec<bool> {
    // `tails[k]` is the new position ending the best run of length `k + 1`.
    let mut tails: Vec<usize> = Vec::new();
    let mut previous = vec![None; matches.len()];

    for (position, matched) in matches.iter().enumerate() {
        let Some(old_index) = *matched else { continue };
        let length = tails.partition_point(|&tail| matches[tail] < Some(old_index));
        if length > 0 {
            previous[position] = Some(tails[length - 1]);
        }
        if length == tails.len() {
            tails.push(position);
        } else {
            tails[length] = position;
        }
    }

    let mut stable = vec![false; matches.len()];
    let mut cursor = tails.last().copied();
    while let Some(position) = cursor {
        stable[position] = true;
        cursor = previous[position];
    }
    stable
}

fn diff_node(old: &Node, new: &Node, path: &mut NodePath, ops: &mut Vec<PatchOp>) {
    match (old, new) {
        (Node::Text(a), Node::Text(b)) => {
            if a != b {
                ops.push(PatchOp::SetText {
                    path: path.clone(),
                    text: b.clone(),
                });
            }
        }
        (Node::Element(a), Node::Element(b)) if a.tag == b.tag => {
            for name in a.attrs.keys() {
                if !b.attrs.contains_key(name) {
                    ops.push(PatchOp::RemoveAttribute {
                        path: path.clone(),
                        name: name.clone(),
                    });
                }
            }
            for (name, value) in &b.attrs {
                if a.attrs.get(name) != Some(value) {
                    ops.push(PatchOp::SetAttribute {
                        path: path.clone(),
                        name: name.clone(),
                        value: value.clone(),
                    });
                }
            }
            diff_children(&a.children, &b.children, path, ops);
        }
        _ => {
            if old != new {
                ops.push(PatchOp::Replace {
                    path: path.clone(),
                    markup: new.to_markup(),
                });
            }
        }
    }
}

fn child_path(parent: &NodePath, index: usize) -> NodePath {
    let mut path = parent.clone();
    path.push(index);
    path
}
