//! Palette-indexed sprites and the store that holds every object and tile skin.
//!
//! Sprites reference palette *indices*, not colours. Reordering or removing a
//! palette entry silently re-colours every sprite that used the shifted
//! indices; the palette is only ever replaced wholesale.

use serde::{Deserialize, Serialize};

/// A palette index, or [`TRANSPARENT`].
pub type ColorIndex = i32;

pub const TRANSPARENT: ColorIndex = -1;

/// Square grid of `side * side` cells, stored row-major.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sprite {
    cells: Vec<ColorIndex>,
}

impl Sprite {
    pub fn from_cells(cells: Vec<ColorIndex>) -> Self {
        Self { cells }
    }

    pub fn blank(side: usize) -> Self {
        Self::filled(side, TRANSPARENT)
    }

    pub fn filled(side: usize, color: ColorIndex) -> Self {
        Self {
            cells: vec![color; side * side],
        }
    }

    pub fn cells(&self) -> &[ColorIndex] {
        &self.cells
    }

    pub fn into_cells(self) -> Vec<ColorIndex> {
        self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<ColorIndex> {
        self.cells.get(index).copied()
    }

    /// Side length derived from the cell count; 0 when the count is not a
    /// perfect square.
    pub fn side(&self) -> usize {
        square_side(self.cells.len()).unwrap_or(0)
    }

    pub fn validate(&self, side: usize, palette_len: usize) -> Result<(), String> {
        if self.cells.len() != side * side {
            return Err(format!(
                "sprite has {} cells, expected {}x{} = {}",
                self.cells.len(),
                side,
                side,
                side * side
            ));
        }
        for (index, &cell) in self.cells.iter().enumerate() {
            if !is_paintable(cell, palette_len) {
                return Err(format!(
                    "cell {index} references colour {cell} but the palette has {palette_len} entries"
                ));
            }
        }
        Ok(())
    }
}

/// True for [`TRANSPARENT`] and for indices inside a palette of
/// `palette_len` entries.
pub fn is_paintable(color: ColorIndex, palette_len: usize) -> bool {
    color == TRANSPARENT || usize::try_from(color).is_ok_and(|slot| slot < palette_len)
}

/// Exact integer square root, `None` if `len` is not a perfect square.
pub fn square_side(len: usize) -> Option<usize> {
    let side = (len as f64).sqrt().round() as usize;
    (side * side == len).then_some(side)
}

/// Ordered CSS colour strings addressed by [`ColorIndex`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Palette {
    colors: Vec<String>,
}

impl Palette {
    pub fn new(colors: Vec<String>) -> Self {
        Self { colors }
    }

    pub fn colors(&self) -> &[String] {
        &self.colors
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Colour for `index`; `None` for transparent or out-of-range indices.
    pub fn get(&self, index: ColorIndex) -> Option<&str> {
        let slot = usize::try_from(index).ok()?;
        self.colors.get(slot).map(String::as_str)
    }
}

/// Which sprite an editor tool is working on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpriteRef {
    Object(usize),
    Tile(usize),
}

/// Object and tile sprites. Sprites are replaced whole, never patched, so a
/// previously handed-out `Sprite` stays valid for undo and redraw.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpriteStore {
    pub object_sprites: Vec<Sprite>,
    pub tile_sprites: Vec<Sprite>,
}

impl SpriteStore {
    pub fn new(object_sprites: Vec<Sprite>, tile_sprites: Vec<Sprite>) -> Self {
        Self {
            object_sprites,
            tile_sprites,
        }
    }

    pub fn get(&self, sprite: SpriteRef) -> Option<&Sprite> {
        match sprite {
            SpriteRef::Object(index) => self.object_sprites.get(index),
            SpriteRef::Tile(index) => self.tile_sprites.get(index),
        }
    }

    /// Swap in a new version of `sprite`, returning the old one.
    pub fn replace(&mut self, sprite: SpriteRef, next: Sprite) -> Result<Sprite, String> {
        let slot = match sprite {
            SpriteRef::Object(index) => self.object_sprites.get_mut(index),
            SpriteRef::Tile(index) => self.tile_sprites.get_mut(index),
        };
        let slot = slot.ok_or_else(|| format!("no sprite at {sprite:?}"))?;
        Ok(std::mem::replace(slot, next))
    }
}
