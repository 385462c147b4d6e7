//! The three coordinate systems the runtime mixes:
//!
//!   * **pixels** -- canvas pixels (`mapPixels` wide),
//!   * **squares** -- sprite cells; entity placements live here,
//!   * **tiles** -- whole sprites on the map grid (`mapSprites` wide).
//!
//! One tile is `spriteSquares` squares; one square is `squarePixels` pixels.

use glam::Vec2;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Units {
    #[serde(default = "default_map_pixels")]
    pub map_pixels: u32,
    #[serde(default = "default_map_sprites")]
    pub map_sprites: u32,
    #[serde(default = "default_sprite_squares")]
    pub sprite_squares: u32,
}

impl Default for Units {
    fn default() -> Self {
        Self {
            map_pixels: default_map_pixels(),
            map_sprites: default_map_sprites(),
            sprite_squares: default_sprite_squares(),
        }
    }
}

impl Units {
    pub fn sprite_pixels(&self) -> u32 {
        round_div(self.map_pixels, self.map_sprites)
    }

    pub fn square_pixels(&self) -> u32 {
        round_div(self.sprite_pixels(), self.sprite_squares)
    }

    pub fn map_squares(&self) -> u32 {
        self.map_sprites * self.sprite_squares
    }

    /// Cell count of one sprite (`S*S`).
    pub fn sprite_cells(&self) -> usize {
        let side = self.sprite_squares as usize;
        side * side
    }

    /// Cell count of the tile map (`mapSprites²`).
    pub fn tile_count(&self) -> usize {
        let side = self.map_sprites as usize;
        side * side
    }

    pub fn squares_to_pixels(&self, squares: Vec2) -> Vec2 {
        squares * self.square_pixels() as f32
    }

    pub fn pixels_to_squares(&self, pixels: Vec2) -> Vec2 {
        pixels / self.square_pixels() as f32
    }

    pub fn tiles_to_squares(&self, tiles: Vec2) -> Vec2 {
        tiles * self.sprite_squares as f32
    }

    pub fn squares_to_tiles(&self, squares: Vec2) -> Vec2 {
        squares / self.sprite_squares as f32
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.map_sprites == 0 || self.sprite_squares == 0 {
            return Err("Units validation failed: mapSprites and spriteSquares must be > 0".to_string());
        }
        if self.square_pixels() == 0 {
            return Err(format!(
                "Units validation failed: {}px map with {} sprites of {} squares leaves no pixels per square",
                self.map_pixels, self.map_sprites, self.sprite_squares
            ));
        }
        Ok(())
    }
}

fn round_div(numerator: u32, denominator: u32) -> u32 {
    if denominator == 0 {
        return 0;
    }
    (numerator as f64 / denominator as f64).round() as u32
}

const fn default_map_pixels() -> u32 {
    256
}

const fn default_map_sprites() -> u32 {
    16
}

const fn default_sprite_squares() -> u32 {
    8
}
