//! Map editor placement tool: drop, pick up and drag object placements.
//!
//! Positions are whole squares with the sprite centred on the pointer and
//! clamped so the sprite stays on the map. Picking a placement moves it to the
//! end of the list, which puts it on top in draw order.

use glam::Vec2;
use sbx_core::map::Placement;
use sbx_core::units::Units;

#[derive(Debug, Clone)]
pub struct PlacementTool {
    units: Units,
    dragging: bool,
    hover: Option<Vec2>,
}

impl PlacementTool {
    pub fn new(units: Units) -> Self {
        Self {
            units,
            dragging: false,
            hover: None,
        }
    }

    pub fn dragging(&self) -> bool {
        self.dragging
    }

    /// Square position a dropped sprite would take, for the hover outline.
    pub fn hover(&self) -> Option<Vec2> {
        self.hover
    }

    /// Sprite top-left, in squares, for a sprite centred on `pointer`.
    pub fn clamped_position(&self, pointer: Vec2) -> Vec2 {
        let square_pixels = self.units.square_pixels().max(1) as f32;
        let half = (self.units.sprite_squares as f32 / 2.0).round();
        let max = self
            .units
            .map_squares()
            .saturating_sub(self.units.sprite_squares) as f32;
        ((pointer / square_pixels).floor() - half).clamp(Vec2::ZERO, Vec2::splat(max))
    }

    /// Topmost placement whose sprite covers `pointer`.
    pub fn hit(&self, placements: &[Placement], pointer: Vec2) -> Option<usize> {
        let square_pixels = self.units.square_pixels() as f32;
        let sprite_pixels = self.units.sprite_pixels() as f32;
        placements.iter().rposition(|placement| {
            let origin = placement.position() * square_pixels;
            origin.cmple(pointer).all() && (origin + sprite_pixels).cmpge(pointer).all()
        })
    }

    /// Picks up the placement under the pointer, or drops a new one of
    /// `object_index`. Returns the new placement list.
    pub fn pointer_down(
        &mut self,
        placements: &[Placement],
        pointer: Vec2,
        object_index: usize,
    ) -> Vec<Placement> {
        self.dragging = true;
        let target = self.clamped_position(pointer);
        let mut next = placements.to_vec();
        match self.hit(placements, pointer) {
            Some(index) => {
                let mut held = next.remove(index);
                held.set_position(target);
                next.push(held);
            }
            None => next.push(Placement::new(object_index, target.x, target.y)),
        }
        next
    }

    /// Drags the held (last) placement. `None` when nothing changes.
    pub fn pointer_move(&mut self, placements: &[Placement], pointer: Vec2) -> Option<Vec<Placement>> {
        let target = self.clamped_position(pointer);
        self.hover = Some(target);
        if !self.dragging {
            return None;
        }
        let held = placements.last()?;
        if held.position() == target {
            return None;
        }
        let mut next = placements.to_vec();
        if let Some(last) = next.last_mut() {
            last.set_position(target);
        }
        Some(next)
    }

    pub fn pointer_up(&mut self) {
        self.dragging = false;
    }

    pub fn pointer_leave(&mut self) {
        self.dragging = false;
        self.hover = None;
    }
}
