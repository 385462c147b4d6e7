//! Copy-on-write sprite tools.
//!
//! Every tool borrows the current sprite and hands back a *new* sprite, or
//! `None` when the stroke would change nothing. The input sprite is never
//! touched, so an editor can keep it for undo and for redrawing the previous
//! state while the new one is committed.
//!
//! The bucket fill walks an explicit work-list instead of recursing, so a
//! large uniform sprite cannot exhaust the call stack.

use sbx_core::sprite::{ColorIndex, Sprite, TRANSPARENT};

/// Set one cell to `color`. `None` if it already has that colour or `index`
/// is outside the sprite.
pub fn paint_pencil(sprite: &Sprite, index: usize, color: ColorIndex) -> Option<Sprite> {
    let current = sprite.get(index)?;
    if current == color {
        return None;
    }
    let mut cells = sprite.cells().to_vec();
    cells[index] = color;
    Some(Sprite::from_cells(cells))
}

/// Make one cell transparent. Always produces a new sprite for an in-range
/// index, even when the cell was already transparent.
pub fn paint_eraser(sprite: &Sprite, index: usize) -> Option<Sprite> {
    sprite.get(index)?;
    let mut cells = sprite.cells().to_vec();
    cells[index] = TRANSPARENT;
    Some(Sprite::from_cells(cells))
}

/// 4-connected flood fill from `index`, recolouring every cell reachable
/// through cells of the start colour. Edges do not wrap.
pub fn paint_bucket(sprite: &Sprite, index: usize, color: ColorIndex) -> Option<Sprite> {
    let start_color = sprite.get(index)?;
    if start_color == color {
        return None;
    }
    let side = sprite.side();
    if side == 0 {
        log::warn!(
            "Bucket fill skipped: sprite with {} cells is not square",
            sprite.len()
        );
        return None;
    }

    let mut cells = sprite.cells().to_vec();
    let mut pending = vec![index];
    while let Some(cell) = pending.pop() {
        // A cell can be queued twice before it is reached; the colour check
        // doubles as the visited mark since `color != start_color`.
        if cells[cell] != start_color {
            continue;
        }
        cells[cell] = color;

        let (x, y) = (cell % side, cell / side);
        if y > 0 {
            pending.push(cell - side);
        }
        if y + 1 < side {
            pending.push(cell + side);
        }
        if x > 0 {
            pending.push(cell - 1);
        }
        if x + 1 < side {
            pending.push(cell + 1);
        }
    }
    Some(Sprite::from_cells(cells))
}

/// A fully transparent sprite of `side * side` cells. Destructive; the host
/// confirms with the user before calling it.
pub fn clear_sprite(side: usize) -> Sprite {
    Sprite::blank(side)
}
