//! Slot-indexed texture store owned by a puppet.

use crate::ids::TextureSlot;
use crate::texture::{SharedTexture, Texture};

#[derive(Debug, Default, Clone)]
pub struct TextureCache {
    textures: Vec<SharedTexture>,
}

impl TextureCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a texture, returning its slot.
    pub fn push(&mut self, texture: Texture) -> TextureSlot {
        self.textures.push(texture.into_shared());
        TextureSlot(self.textures.len() as u32 - 1)
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    pub fn get(&self, slot: TextureSlot) -> Option<&SharedTexture> {
        self.textures.get(slot.0 as usize)
    }

    pub fn textures(&self) -> &[SharedTexture] {
        &self.textures
    }

    pub fn iter(&self) -> impl Iterator<Item = (TextureSlot, &SharedTexture)> {
        self.textures
            .iter()
            .enumerate()
            .map(|(i, t)| (TextureSlot(i as u32), t))
    }

    /// Drop every texture whose slot is not marked in `referenced` and compact the rest.
    ///
    /// Returns the remapping from old slot index to new slot (None for pruned slots).
    /// Slots beyond `referenced.len()` count as unreferenced.
    pub fn prune(&mut self, referenced: &[bool]) -> Vec<Option<TextureSlot>> {
        let mut remap = Vec::with_capacity(self.textures.len());
        let mut kept = Vec::with_capacity(self.textures.len());
        for (i, tex) in self.textures.drain(..).enumerate() {
            if referenced.get(i).copied().unwrap_or(false) {
                remap.push(Some(TextureSlot(kept.len() as u32)));
                kept.push(tex);
            } else {
                remap.push(None);
            }
        }
        let pruned = remap.iter().filter(|r| r.is_none()).count();
        if pruned > 0 {
            log::debug!("pruned {pruned} unreferenced textures, {} left", kept.len());
        }
        self.textures = kept;
        remap
    }
}
