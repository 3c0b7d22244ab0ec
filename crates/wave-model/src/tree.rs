//! Validated blip tree for one wave
//!
//! The tree enforces the structural invariants the renderer and the
//! navigator rely on:
//! - Blip ids are unique
//! - Every parent reference resolves inside the wave
//! - Parent chains never loop
//!
//! Soft-deleted blips stay in the tree (their ids may still appear in push
//! events) but are skipped by every traversal, together with their subtrees.

use crate::blip::{Blip, InlineChild};
use crate::error::ModelError;
use crate::ids::{BlipId, WaveId};
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};

/// Blip tree of a single wave
#[derive(Debug, Clone, Default)]
pub struct WaveTree {
    wave_id: WaveId,
    /// Blips in creation order
    blips: IndexMap<BlipId, Blip>,
    /// Child ids per parent, in creation order
    children: HashMap<BlipId, Vec<BlipId>>,
    /// Root ids in creation order
    roots: Vec<BlipId>,
}

impl WaveTree {
    /// Build and validate a tree
    ///
    /// # Errors
    /// - `ModelError::DuplicateBlip` if two blips share an id
    /// - `ModelError::ForeignBlip` if a blip belongs to another wave
    /// - `ModelError::UnknownParent` if a parent id does not resolve
    /// - `ModelError::Cycle` if a parent chain loops
    pub fn new(wave_id: WaveId, blips: Vec<Blip>) -> Result<Self, ModelError> {
        let mut map = IndexMap::with_capacity(blips.len());
        for blip in blips {
            if blip.wave_id != wave_id {
                return Err(ModelError::ForeignBlip {
                    blip: blip.id.clone(),
                    expected: wave_id,
                    actual: blip.wave_id,
                });
            }
            if map.contains_key(&blip.id) {
                return Err(ModelError::DuplicateBlip(blip.id));
            }
            map.insert(blip.id.clone(), blip);
        }

        let mut children: HashMap<BlipId, Vec<BlipId>> = HashMap::new();
        let mut roots = Vec::new();
        for blip in map.values() {
            match &blip.parent_id {
                Some(parent) if !map.contains_key(parent) => {
                    return Err(ModelError::UnknownParent {
                        blip: blip.id.clone(),
                        parent: parent.clone(),
                    });
                }
                Some(parent) => children.entry(parent.clone()).or_default().push(blip.id.clone()),
                None => roots.push(blip.id.clone()),
            }
        }

        let tree = Self {
            wave_id,
            blips: map,
            children,
            roots,
        };
        tree.check_acyclic()?;
        Ok(tree)
    }

    fn check_acyclic(&self) -> Result<(), ModelError> {
        let mut settled: HashSet<&BlipId> = HashSet::new();
        for id in self.blips.keys() {
            let mut chain: HashSet<&BlipId> = HashSet::new();
            let mut cursor = Some(id);
            while let Some(current) = cursor {
                if settled.contains(current) {
                    break;
                }
                if !chain.insert(current) {
                    return Err(ModelError::Cycle(current.clone()));
                }
                cursor = self.blips.get(current).and_then(|b| b.parent_id.as_ref());
            }
            settled.extend(chain);
        }
        Ok(())
    }

    /// Owning wave
    #[inline]
    #[must_use]
    pub fn wave_id(&self) -> &WaveId {
        &self.wave_id
    }

    /// Number of blips, deleted ones included
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.blips.len()
    }

    /// Whether the tree has no blips
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blips.is_empty()
    }

    /// Look up a blip, deleted or not
    #[inline]
    #[must_use]
    pub fn get(&self, id: &BlipId) -> Option<&Blip> {
        self.blips.get(id)
    }

    /// Whether the blip exists and neither it nor an ancestor is deleted
    #[must_use]
    pub fn is_visible(&self, id: &BlipId) -> bool {
        let mut cursor = self.blips.get(id);
        while let Some(blip) = cursor {
            if blip.deleted {
                return false;
            }
            cursor = blip.parent_id.as_ref().and_then(|p| self.blips.get(p));
        }
        self.blips.contains_key(id)
    }

    /// Live root blips
    pub fn roots(&self) -> impl Iterator<Item = &Blip> + '_ {
        self.roots
            .iter()
            .filter_map(move |id| self.blips.get(id))
            .filter(|b| !b.deleted)
    }

    /// Live children of a blip, inline and list alike
    pub fn children(&self, id: &BlipId) -> impl Iterator<Item = &Blip> + '_ {
        self.children
            .get(id)
            .into_iter()
            .flatten()
            .filter_map(move |child| self.blips.get(child))
            .filter(|b| !b.deleted)
    }

    /// Live children rendered as ordinary list replies
    pub fn list_children(&self, id: &BlipId) -> impl Iterator<Item = &Blip> + '_ {
        self.children(id).filter(|b| !b.is_inline())
    }

    /// Live inline-anchored children, with read state resolved by `is_read`
    pub fn inline_children<F>(&self, id: &BlipId, is_read: F) -> Vec<InlineChild>
    where
        F: Fn(&BlipId) -> bool,
    {
        self.children(id)
            .filter_map(|b| {
                b.anchor_position
                    .map(|anchor| InlineChild::new(b.id.clone(), anchor, is_read(&b.id)))
            })
            .collect()
    }

    /// Whether the blip has any live list replies
    #[must_use]
    pub fn has_list_children(&self, id: &BlipId) -> bool {
        self.list_children(id).next().is_some()
    }

    /// Parent of a blip
    #[must_use]
    pub fn parent(&self, id: &BlipId) -> Option<&Blip> {
        self.blips
            .get(id)
            .and_then(|b| b.parent_id.as_ref())
            .and_then(|p| self.blips.get(p))
    }

    /// Live blips in document order
    ///
    /// A parent precedes its children; inline children follow their parent
    /// sorted by anchor, list children follow in creation order.
    #[must_use]
    pub fn document_order(&self) -> Vec<BlipId> {
        let mut out = Vec::with_capacity(self.blips.len());
        let mut stack: Vec<&BlipId> = self.roots().map(|b| &b.id).collect();
        stack.reverse();
        while let Some(id) = stack.pop() {
            out.push(id.clone());
            let mut inline: Vec<&Blip> = self.children(id).filter(|b| b.is_inline()).collect();
            inline.sort_by_key(|b| b.anchor_position);
            let next: Vec<&BlipId> = inline
                .into_iter()
                .chain(self.list_children(id))
                .map(|b| &b.id)
                .collect();
            stack.extend(next.into_iter().rev());
        }
        out
    }

    /// Insert or replace a blip, revalidating the tree
    ///
    /// # Errors
    /// Same as [`WaveTree::new`]; the tree is left unchanged on error.
    pub fn upsert(&mut self, blip: Blip) -> Result<(), ModelError> {
        let mut blips: Vec<Blip> = self.blips.values().cloned().collect();
        match blips.iter_mut().find(|b| b.id == blip.id) {
            Some(slot) => *slot = blip,
            None => blips.push(blip),
        }
        *self = Self::new(self.wave_id.clone(), blips)?;
        Ok(())
    }

    /// Soft-delete a blip; returns whether it was live
    pub fn soft_delete(&mut self, id: &BlipId) -> bool {
        match self.blips.get_mut(id) {
            Some(blip) if !blip.deleted => {
                blip.deleted = true;
                blip.deleted_at = Some(chrono::Utc::now());
                true
            }
            _ => false,
        }
    }

    /// All live blip ids, creation order
    pub fn live_ids(&self) -> impl Iterator<Item = &BlipId> + '_ {
        self.blips.keys().filter(move |id| self.is_visible(id))
    }
}
