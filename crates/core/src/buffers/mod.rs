//! Preset-scoped frame slots shared by every branch of the tree.

use std::collections::HashMap;

use crate::blend::{blend_into, BlendMode};
use crate::surface::Surface;
use crate::Result;

/// Persistent frames addressed by integer id, shared by every component of
/// the loaded preset.
///
/// Slots are created on first save and live until [`NamedBufferStore::clear`]
/// is called on preset unload. Ids are not namespaced per subtree.
#[derive(Debug, Default)]
pub struct NamedBufferStore {
    slots: HashMap<u32, Surface>,
}

impl NamedBufferStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn contains(&self, id: u32) -> bool {
        self.slots.contains_key(&id)
    }

    pub fn get(&self, id: u32) -> Option<&Surface> {
        self.slots.get(&id)
    }

    /// Merges `frame` into slot `id`. A missing slot, or one left at an old
    /// canvas resolution, is (re)allocated black first.
    pub fn save(&mut self, id: u32, mode: BlendMode, frame: &Surface) -> Result<()> {
        let (width, height) = frame.dimensions();
        let slot = self
            .slots
            .entry(id)
            .or_insert_with(|| Surface::new(width, height));
        if slot.dimensions() != frame.dimensions() {
            tracing::debug!(id, width, height, "reallocating named buffer after resize");
            *slot = Surface::new(width, height);
        }
        blend_into(mode, frame, slot)
    }

    /// Merges slot `id` into `frame`. Returns `false`, leaving `frame`
    /// untouched, when the slot was never saved or predates a resize.
    pub fn restore(&self, id: u32, mode: BlendMode, frame: &mut Surface) -> Result<bool> {
        match self.slots.get(&id) {
            Some(slot) if slot.dimensions() == frame.dimensions() => {
                blend_into(mode, slot, frame)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Drops every slot.
    pub fn clear(&mut self) {
        if !self.slots.is_empty() {
            tracing::debug!(slots = self.slots.len(), "releasing named buffers");
        }
        self.slots.clear();
    }
}
