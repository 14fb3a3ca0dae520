//! Render Cache
//!
//! Each live component owns at most one cached snapshot: the markup it last
//! rendered, keyed by a fingerprint of its type, state and declared reads.
//!
//! # How the Cache Works
//!
//! 1. Before rendering, the caller computes the fingerprint.
//!
//! 2. If the entry for the component has the same fingerprint, the snapshot is
//!    returned as a hit and the render function is not invoked.
//!
//! 3. Otherwise the render function runs and the outcome carries both the
//!    previous snapshot (if any) and the new one, so the diff engine can
//!    compute a patch.
//!
//! 4. Outcomes are computed with [`RenderCache::peek`] and stored with
//!    [`RenderCache::commit`]. A dispatch that fails between the two leaves the
//!    cache exactly as it was.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::Hasher;
use std::sync::Arc;

use serde::Serialize;

use super::diff::diff;
use super::markup::Fragment;
use super::patch::Patch;
use crate::component::{ComponentId, State};
use crate::error::Result;

/// 64-bit cache key for a render.
pub type Fingerprint = u64;

/// Fingerprint of a render input: hash of the MessagePack encoding of
/// `(type, state, reads)`.
pub fn fingerprint<R: Serialize>(type_name: &str, state: &State, reads: &R) -> Result<Fingerprint> {
    let bytes = rmp_serde::to_vec(&(type_name, state, reads))?;
    let mut hasher = DefaultHasher::new();
    hasher.write(&bytes);
    Ok(hasher.finish())
}

/// An immutable rendered snapshot.
#[derive(Debug, Clone)]
pub struct Snapshot {
    fingerprint: Fingerprint,
    markup: Arc<str>,
    tree: Arc<Fragment>,
}

impl Snapshot {
    /// Parse `markup` into a snapshot.
    pub fn new(fingerprint: Fingerprint, markup: String) -> Result<Self> {
        let tree = Fragment::parse(&markup)?;
        Ok(Self {
            fingerprint,
            markup: markup.into(),
            tree: Arc::new(tree),
        })
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    pub fn markup(&self) -> &Arc<str> {
        &self.markup
    }

    pub fn tree(&self) -> &Fragment {
        &self.tree
    }

    pub(crate) fn shared_tree(&self) -> Arc<Fragment> {
        Arc::clone(&self.tree)
    }
}

/// Result of a cache lookup.
#[derive(Debug, Clone)]
pub enum RenderOutcome {
    /// Fingerprint unchanged; nothing was rendered.
    Hit(Snapshot),

    /// The render function ran.
    Miss {
        previous: Option<Snapshot>,
        current: Snapshot,
    },
}

impl RenderOutcome {
    pub fn is_hit(&self) -> bool {
        matches!(self, RenderOutcome::Hit(_))
    }

    /// The snapshot that is current after this outcome.
    pub fn snapshot(&self) -> &Snapshot {
        match self {
            RenderOutcome::Hit(snapshot) => snapshot,
            RenderOutcome::Miss { current, .. } => current,
        }
    }

    /// Patch from the previous snapshot to the current one.
    ///
    /// `None` for hits and for misses whose markup did not change.
    pub fn patch(&self) -> Option<Patch> {
        match self {
            RenderOutcome::Hit(_) => None,
            RenderOutcome::Miss { previous, current } => {
                let patch = diff(previous.as_ref().map(Snapshot::tree), current.tree());
                (!patch.is_empty()).then_some(patch)
            }
        }
    }
}

/// Hit and miss counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Per-session render cache with one entry per component.
#[derive(Debug, Default)]
pub struct RenderCache {
    entries: HashMap<ComponentId, Snapshot>,
    stats: CacheStats,
}

impl RenderCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up `id` at `fingerprint`, rendering on a miss. Does not store.
    pub fn peek<F>(&mut self, id: &str, fingerprint: Fingerprint, render: F) -> Result<RenderOutcome>
    where
        F: FnOnce() -> Result<String>,
    {
        let previous = self.entries.get(id).cloned();
        if let Some(snapshot) = previous.as_ref().filter(|s| s.fingerprint == fingerprint) {
            self.stats.hits += 1;
            return Ok(RenderOutcome::Hit(snapshot.clone()));
        }

        let current = Snapshot::new(fingerprint, render()?)?;
        self.stats.misses += 1;
        Ok(RenderOutcome::Miss { previous, current })
    }

    /// Store the snapshot of a miss, replacing the previous entry.
    pub fn commit(&mut self, id: &str, outcome: &RenderOutcome) {
        if let RenderOutcome::Miss { current, .. } = outcome {
            self.entries.insert(id.to_string(), current.clone());
        }
    }

    pub fn get(&self, id: &str) -> Option<&Snapshot> {
        self.entries.get(id)
    }

    pub fn evict(&mut self, id: &str) -> Option<Snapshot> {
        self.entries.remove(id)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
