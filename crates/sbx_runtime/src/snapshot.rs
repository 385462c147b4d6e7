//! Project snapshot: the editor-side data a run is started from.
//!
//! Wire format (JSON, camelCase):
//!
//! ```json
//! { "colors": [...], "codes": [...], "objectSprites": [[...]],
//!   "tileSprites": [[...]], "objects": [{"objectIndex":0,"x":0,"y":0}],
//!   "tiles": [...] }
//! ```
//!
//! Every field is required; a snapshot missing one is rejected before the
//! runtime is built.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use sbx_core::map::{Placement, TileMap, EMPTY_TILE};
use sbx_core::sprite::{Palette, Sprite};
use sbx_core::units::Units;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

pub const DEFAULT_COLORS: [&str; 4] = ["#dfdfdf", "#9f9f9f", "#606060", "#202020"];
pub const DEFAULT_OBJECT_COUNT: usize = 4;
pub const DEFAULT_TILE_COUNT: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub colors: Palette,
    pub codes: Vec<String>,
    pub object_sprites: Vec<Sprite>,
    pub tile_sprites: Vec<Sprite>,
    pub objects: Vec<Placement>,
    pub tiles: TileMap,
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to read snapshot {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse snapshot: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid snapshot: {0}")]
    Invalid(String),
}

impl Snapshot {
    pub fn from_json(raw: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Checks the snapshot against `units`: sprite sizes, palette and tile
    /// references, one behaviour source per object, placements on known
    /// objects.
    pub fn validate(&self, units: &Units) -> Result<(), SnapshotError> {
        units.validate().map_err(SnapshotError::Invalid)?;
        let side = units.sprite_squares as usize;
        let palette_len = self.colors.len();

        if self.codes.len() != self.object_sprites.len() {
            return Err(SnapshotError::Invalid(format!(
                "{} behaviour sources for {} object sprites",
                self.codes.len(),
                self.object_sprites.len()
            )));
        }
        for (index, sprite) in self.object_sprites.iter().enumerate() {
            sprite
                .validate(side, palette_len)
                .map_err(|e| SnapshotError::Invalid(format!("object sprite {index}: {e}")))?;
        }
        for (index, sprite) in self.tile_sprites.iter().enumerate() {
            sprite
                .validate(side, palette_len)
                .map_err(|e| SnapshotError::Invalid(format!("tile sprite {index}: {e}")))?;
        }
        self.tiles
            .validate(units.map_sprites as usize, self.tile_sprites.len())
            .map_err(|e| SnapshotError::Invalid(format!("tiles: {e}")))?;

        for (slot, placement) in self.objects.iter().enumerate() {
            if placement.object_index >= self.object_sprites.len() {
                return Err(SnapshotError::Invalid(format!(
                    "placement {slot} uses object {} but only {} exist",
                    placement.object_index,
                    self.object_sprites.len()
                )));
            }
            if !placement.position().is_finite() {
                return Err(SnapshotError::Invalid(format!(
                    "placement {slot} has a non-finite position"
                )));
            }
        }
        if self.colors.is_empty() {
            log::warn!("Snapshot palette is empty; every sprite will draw transparent");
        }
        Ok(())
    }
}

pub fn load_snapshot_from_path(path: &Path, units: &Units) -> Result<Snapshot, SnapshotError> {
    let raw = fs::read_to_string(path).map_err(|source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let snapshot = Snapshot::from_json(&raw)?;
    snapshot.validate(units)?;
    Ok(snapshot)
}

pub fn save_snapshot_to_path(snapshot: &Snapshot, path: &Path) -> Result<(), String> {
    let json = snapshot.to_json().map_err(|e| e.to_string())?;
    fs::write(path, json).map_err(|e| format!("Failed to write snapshot {}: {e}", path.display()))
}

/// Light ground with a dark square in the middle.
pub fn default_object_sprite(side: usize) -> Sprite {
    let (low, high) = (side / 4, side - side / 4);
    let cells = (0..side * side)
        .map(|index| {
            let (x, y) = (index % side, index / side);
            if (low..high).contains(&x) && (low..high).contains(&y) {
                3
            } else {
                0
            }
        })
        .collect();
    Sprite::from_cells(cells)
}

pub fn default_code(object_index: usize) -> String {
    format!(
        "-- Object {object_index}\n\
         local Object{object_index} = GameObject:extend()\n\
         \n\
         function Object{object_index}:init()\n\
         \x20 -- runs before objects constructed\n\
         end\n\
         \n\
         function Object{object_index}:start()\n\
         \x20 -- runs after all objects constructed\n\
         end\n\
         \n\
         function Object{object_index}:update()\n\
         \x20 -- runs once every frame\n\
         end\n\
         \n\
         return Object{object_index}\n"
    )
}

/// A fresh project: default palette, default object sprites and skeleton
/// behaviours, blank tiles and an empty map.
pub fn default_project(units: &Units) -> Snapshot {
    let side = units.sprite_squares as usize;
    Snapshot {
        colors: Palette::new(DEFAULT_COLORS.iter().map(|c| c.to_string()).collect()),
        codes: (0..DEFAULT_OBJECT_COUNT).map(default_code).collect(),
        object_sprites: vec![default_object_sprite(side); DEFAULT_OBJECT_COUNT],
        tile_sprites: vec![Sprite::blank(side); DEFAULT_TILE_COUNT],
        objects: Vec::new(),
        tiles: TileMap::filled(units.map_sprites as usize, EMPTY_TILE),
    }
}

/// Polls a snapshot file for edits. A newer mtime alone is not enough: the
/// content digest must differ too, so touching or re-saving an unchanged
/// file does not restart the game.
pub struct SnapshotWatcher {
    path: PathBuf,
    last_seen_modified: Option<SystemTime>,
    last_digest: Option<[u8; 32]>,
}

impl SnapshotWatcher {
    pub fn new(path: PathBuf) -> Self {
        let last_seen_modified = modified_time(&path);
        let last_digest = file_digest(&path);
        Self {
            path,
            last_seen_modified,
            last_digest,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn should_reload(&mut self) -> bool {
        let current = modified_time(&self.path);
        let newer = match (self.last_seen_modified, current) {
            (Some(old), Some(now)) => now > old,
            (None, Some(_)) => true,
            _ => false,
        };
        if !newer {
            return false;
        }
        self.last_seen_modified = current;

        let digest = file_digest(&self.path);
        if digest == self.last_digest {
            log::debug!("Snapshot {} touched but unchanged", self.path.display());
            return false;
        }
        self.last_digest = digest;
        true
    }
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).ok()?.modified().ok()
}

fn file_digest(path: &Path) -> Option<[u8; 32]> {
    let bytes = fs::read(path).ok()?;
    Some(Sha256::digest(&bytes).into())
}
