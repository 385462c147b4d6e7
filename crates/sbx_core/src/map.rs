//! Map model: a fixed tile grid (the background) plus the ordered list of live
//! entity placements drawn on top of it.
//!
//! Placement order is draw order and update order. Entities are only ever
//! appended (spawn) or removed; removal keeps the relative order of the rest.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::sprite::square_side;

pub type TileIndex = i32;

/// Tile value for "no tile here"; nothing is drawn for it.
pub const EMPTY_TILE: TileIndex = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub u64);

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which object an entity is and where it stands, in squares.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    #[serde(alias = "object")]
    pub object_index: usize,
    pub x: f32,
    pub y: f32,
}

impl Placement {
    pub fn new(object_index: usize, x: f32, y: f32) -> Self {
        Self { object_index, x, y }
    }

    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    pub fn set_position(&mut self, position: Vec2) {
        self.x = position.x;
        self.y = position.y;
    }

    pub fn translate(&mut self, delta: Vec2) {
        self.set_position(self.position() + delta);
    }
}

/// Row-major grid of tile sprite indices, `side * side` long.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TileMap {
    tiles: Vec<TileIndex>,
}

impl TileMap {
    pub fn new(tiles: Vec<TileIndex>) -> Self {
        Self { tiles }
    }

    pub fn filled(side: usize, tile: TileIndex) -> Self {
        Self {
            tiles: vec![tile; side * side],
        }
    }

    pub fn tiles(&self) -> &[TileIndex] {
        &self.tiles
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn side(&self) -> usize {
        square_side(self.tiles.len()).unwrap_or(0)
    }

    fn slot(&self, x: i64, y: i64) -> Option<usize> {
        let side = self.side() as i64;
        if x < 0 || y < 0 || x >= side || y >= side {
            return None;
        }
        Some((y * side + x) as usize)
    }

    pub fn get(&self, x: i64, y: i64) -> Option<TileIndex> {
        self.slot(x, y).map(|slot| self.tiles[slot])
    }

    /// Overwrite one tile. Returns the previous value, or `None` when
    /// `(x, y)` is off the map (nothing is written).
    pub fn set(&mut self, x: i64, y: i64, tile: TileIndex) -> Option<TileIndex> {
        let slot = self.slot(x, y)?;
        Some(std::mem::replace(&mut self.tiles[slot], tile))
    }

    pub fn validate(&self, map_sprites: usize, tile_sprite_count: usize) -> Result<(), String> {
        if self.tiles.len() != map_sprites * map_sprites {
            return Err(format!(
                "tile map has {} entries, expected {}x{} = {}",
                self.tiles.len(),
                map_sprites,
                map_sprites,
                map_sprites * map_sprites
            ));
        }
        for (slot, &tile) in self.tiles.iter().enumerate() {
            if !is_valid_tile(tile, tile_sprite_count) {
                return Err(format!(
                    "tile {slot} references tile sprite {tile} but only {tile_sprite_count} exist"
                ));
            }
        }
        Ok(())
    }
}

pub fn is_valid_tile(tile: TileIndex, tile_sprite_count: usize) -> bool {
    tile == EMPTY_TILE || usize::try_from(tile).is_ok_and(|index| index < tile_sprite_count)
}

/// A live placement with the identity scripts use to address it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Entity {
    pub id: EntityId,
    pub placement: Placement,
}

#[derive(Debug, Clone, Default)]
pub struct MapModel {
    pub tiles: TileMap,
    entities: Vec<Entity>,
    next_id: u64,
}

impl MapModel {
    pub fn new(tiles: TileMap, placements: impl IntoIterator<Item = Placement>) -> Self {
        let mut map = Self {
            tiles,
            entities: Vec::new(),
            next_id: 0,
        };
        for placement in placements {
            map.spawn(placement);
        }
        map
    }

    /// Append a placement at the end of the draw/update order.
    pub fn spawn(&mut self, placement: Placement) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        self.entities.push(Entity { id, placement });
        id
    }

    pub fn remove(&mut self, id: EntityId) -> Option<Entity> {
        let position = self.position_of(id)?;
        Some(self.entities.remove(position))
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.iter().find(|entity| entity.id == id)
    }

    pub fn placement_mut(&mut self, id: EntityId) -> Option<&mut Placement> {
        self.entities
            .iter_mut()
            .find(|entity| entity.id == id)
            .map(|entity| &mut entity.placement)
    }

    /// Index of `id` in placement order.
    pub fn position_of(&self, id: EntityId) -> Option<usize> {
        self.entities.iter().position(|entity| entity.id == id)
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn ids(&self) -> Vec<EntityId> {
        self.entities.iter().map(|entity| entity.id).collect()
    }

    pub fn placements(&self) -> Vec<Placement> {
        self.entities.iter().map(|entity| entity.placement).collect()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
