//! Shared engine state for one runtime instance.
//!
//! The `World` is attached to its runtime's Lua state as application data, so
//! engine API callbacks reach it through the VM they are called from. It is
//! plain data; behaviour instances live in the VM registry.

use std::collections::BTreeMap;

use sbx_core::input::InputTracker;
use sbx_core::map::MapModel;
use sbx_core::sprite::{Palette, SpriteStore};
use sbx_core::text::TextOverlays;
use sbx_core::units::Units;
use sbx_render::FrameView;

use crate::snapshot::Snapshot;

/// A sound play requested by a script, drained by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoundPlay {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Default)]
pub struct SoundBank {
    sources: BTreeMap<String, String>,
    queued: Vec<SoundPlay>,
}

impl SoundBank {
    /// Register or replace a named source.
    pub fn add(&mut self, name: &str, url: &str) {
        self.sources.insert(name.to_string(), url.to_string());
    }

    /// Queue a play of `name`. Returns false for an unknown name.
    pub fn play(&mut self, name: &str) -> bool {
        let Some(url) = self.sources.get(name) else {
            return false;
        };
        self.queued.push(SoundPlay {
            name: name.to_string(),
            url: url.clone(),
        });
        true
    }

    pub fn drain(&mut self) -> Vec<SoundPlay> {
        std::mem::take(&mut self.queued)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

pub struct World {
    pub units: Units,
    pub palette: Palette,
    pub sprites: SpriteStore,
    /// Behaviour source per object index.
    pub codes: Vec<String>,
    pub map: MapModel,
    pub texts: TextOverlays,
    pub sounds: SoundBank,
    pub input: InputTracker,
}

impl World {
    /// Builds the initial state of a run. The snapshot is copied, so editing
    /// it afterwards never reaches a running game.
    pub fn from_snapshot(snapshot: &Snapshot, units: Units) -> Self {
        Self {
            units,
            palette: snapshot.colors.clone(),
            sprites: SpriteStore::new(
                snapshot.object_sprites.clone(),
                snapshot.tile_sprites.clone(),
            ),
            codes: snapshot.codes.clone(),
            map: MapModel::new(snapshot.tiles.clone(), snapshot.objects.iter().copied()),
            texts: TextOverlays::new(),
            sounds: SoundBank::default(),
            input: InputTracker::new(),
        }
    }

    pub fn object_count(&self) -> usize {
        self.sprites.object_sprites.len()
    }

    pub fn frame_view(&self) -> FrameView<'_> {
        FrameView {
            units: &self.units,
            palette: &self.palette,
            sprites: &self.sprites,
            map: &self.map,
            texts: &self.texts,
        }
    }
}
