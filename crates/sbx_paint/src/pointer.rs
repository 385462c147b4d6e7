//! Pointer positions (canvas pixels) to sprite cells and back.

use glam::Vec2;

/// Cell under `pointer` on a `side * side` grid drawn at `square_pixels`
/// per cell. `None` when the pointer is outside the grid.
pub fn square_index(pointer: Vec2, square_pixels: f32, side: usize) -> Option<usize> {
    if square_pixels <= 0.0 || !pointer.is_finite() {
        return None;
    }
    let cell = (pointer / square_pixels).floor();
    if cell.x < 0.0 || cell.y < 0.0 {
        return None;
    }
    let (x, y) = (cell.x as usize, cell.y as usize);
    if x >= side || y >= side {
        return None;
    }
    Some(y * side + x)
}

/// Top-left pixel of cell `index`, for drawing the hover highlight.
pub fn square_origin(index: usize, square_pixels: f32, side: usize) -> Vec2 {
    if side == 0 {
        return Vec2::ZERO;
    }
    Vec2::new((index % side) as f32, (index / side) as f32) * square_pixels
}
