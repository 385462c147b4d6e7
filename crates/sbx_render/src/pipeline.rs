//! Frame composition: tiles, then entities in placement order, then text.
//!
//! The renderer only reads world state. Draw order is fixed, so the same
//! world always produces the same sequence of canvas calls.

use glam::Vec2;
use sbx_core::map::{MapModel, EMPTY_TILE};
use sbx_core::sprite::{Palette, Sprite, SpriteStore};
use sbx_core::text::TextOverlays;
use sbx_core::units::Units;

use crate::canvas::Canvas;

pub const ERROR_COLOR: &str = "red";
pub const ERROR_TEXT_SIZE: f32 = 12.0;
pub const ERROR_MARGIN: f32 = 10.0;

/// Borrowed view of everything one frame draws.
#[derive(Clone, Copy)]
pub struct FrameView<'a> {
    pub units: &'a Units,
    pub palette: &'a Palette,
    pub sprites: &'a SpriteStore,
    pub map: &'a MapModel,
    pub texts: &'a TextOverlays,
}

/// Draws `sprite` with its top-left corner at `origin` (pixels). Transparent
/// cells are skipped.
pub fn draw_sprite(
    canvas: &mut dyn Canvas,
    sprite: &Sprite,
    origin: Vec2,
    palette: &Palette,
    square_pixels: f32,
) {
    let side = sprite.side();
    if side == 0 {
        return;
    }
    for (index, &cell) in sprite.cells().iter().enumerate() {
        let Some(color) = palette.get(cell) else {
            continue;
        };
        let offset = Vec2::new((index % side) as f32, (index / side) as f32) * square_pixels;
        let at = origin + offset;
        canvas.fill_rect(at.x, at.y, square_pixels, square_pixels, color);
    }
}

pub fn render_frame(canvas: &mut dyn Canvas, view: FrameView<'_>) {
    let square_pixels = view.units.square_pixels() as f32;
    let sprite_squares = view.units.sprite_squares as f32;
    canvas.clear();

    let side = view.map.tiles.side();
    for (slot, &tile) in view.map.tiles.tiles().iter().enumerate() {
        if tile == EMPTY_TILE {
            continue;
        }
        let Some(sprite) = usize::try_from(tile)
            .ok()
            .and_then(|index| view.sprites.tile_sprites.get(index))
        else {
            log::trace!("Tile slot {slot} references missing tile sprite {tile}");
            continue;
        };
        let squares = Vec2::new((slot % side) as f32, (slot / side) as f32) * sprite_squares;
        draw_sprite(canvas, sprite, squares * square_pixels, view.palette, square_pixels);
    }

    for entity in view.map.entities() {
        let Some(sprite) = view.sprites.object_sprites.get(entity.placement.object_index) else {
            log::trace!(
                "Entity {} references missing object sprite {}",
                entity.id,
                entity.placement.object_index
            );
            continue;
        };
        let origin = entity.placement.position() * square_pixels;
        draw_sprite(canvas, sprite, origin, view.palette, square_pixels);
    }

    for text in view.texts.iter() {
        canvas.fill_text(
            &text.text,
            text.x * square_pixels,
            text.y * square_pixels + text.size,
            text.size,
            &text.color,
        );
    }
}

/// Paints the fault overlay over whatever the canvas currently shows.
pub fn draw_error_overlay(canvas: &mut dyn Canvas, lines: &[String]) {
    for (row, line) in lines.iter().enumerate() {
        let baseline = ERROR_MARGIN + ERROR_TEXT_SIZE * (row as f32 + 1.0);
        canvas.fill_text(line, ERROR_MARGIN, baseline, ERROR_TEXT_SIZE, ERROR_COLOR);
    }
}
