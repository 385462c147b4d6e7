//! Sprite editor pointer session.
//!
//! Holds the selected tool, colour and target sprite, turns pointer events
//! into strokes, and commits each stroke to a [`SpriteStore`] as a whole new
//! sprite. The replaced version is pushed onto [`SpriteHistory`].
//!
//! A drag only paints when the pointer enters a *different* cell than the last
//! one it painted, so holding the pointer still never re-applies a tool.

use glam::Vec2;
use sbx_core::sprite::{is_paintable, ColorIndex, Palette, Sprite, SpriteRef, SpriteStore};

use crate::paint::{clear_sprite, paint_bucket, paint_eraser, paint_pencil};
use crate::pointer::square_index;

/// Pixels per cell in the sprite editor, independent of the map scale.
pub const EDITOR_SQUARE_PIXELS: f32 = 16.0;

const HISTORY_LIMIT: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tool {
    #[default]
    Pencil,
    Eraser,
    Bucket,
    Clear,
}

impl Tool {
    pub const ALL: [Tool; 4] = [Tool::Pencil, Tool::Eraser, Tool::Bucket, Tool::Clear];

    pub fn label(self) -> &'static str {
        match self {
            Tool::Pencil => "pencil",
            Tool::Eraser => "eraser",
            Tool::Bucket => "bucket",
            Tool::Clear => "clear",
        }
    }
}

impl std::fmt::Display for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Asked before the destructive clear tool runs.
pub trait ConfirmClear {
    fn confirm_clear(&mut self) -> bool;
}

impl<F: FnMut() -> bool> ConfirmClear for F {
    fn confirm_clear(&mut self) -> bool {
        self()
    }
}

/// Bounded stack of replaced sprite versions.
#[derive(Debug, Clone, Default)]
pub struct SpriteHistory {
    entries: Vec<(SpriteRef, Sprite)>,
}

impl SpriteHistory {
    pub fn push(&mut self, target: SpriteRef, previous: Sprite) {
        if self.entries.len() == HISTORY_LIMIT {
            self.entries.remove(0);
        }
        self.entries.push((target, previous));
    }

    /// Restore the most recent replaced version into `store`.
    pub fn undo(&mut self, store: &mut SpriteStore) -> Result<Option<SpriteRef>, String> {
        let Some((target, previous)) = self.entries.pop() else {
            return Ok(None);
        };
        store.replace(target, previous)?;
        Ok(Some(target))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct SketchSession {
    pub tool: Tool,
    color: ColorIndex,
    pub target: SpriteRef,
    pub history: SpriteHistory,
    side: usize,
    square_pixels: f32,
    sketching: bool,
    hover: Option<usize>,
    last_index: Option<usize>,
}

impl SketchSession {
    pub fn new(side: usize, target: SpriteRef) -> Self {
        Self {
            tool: Tool::default(),
            color: 0,
            target,
            history: SpriteHistory::default(),
            side,
            square_pixels: EDITOR_SQUARE_PIXELS,
            sketching: false,
            hover: None,
            last_index: None,
        }
    }

    pub fn with_square_pixels(mut self, square_pixels: f32) -> Self {
        self.square_pixels = square_pixels;
        self
    }

    pub fn sketching(&self) -> bool {
        self.sketching
    }

    /// Cell under the pointer, for the hover highlight.
    pub fn hover(&self) -> Option<usize> {
        self.hover
    }

    pub fn color(&self) -> ColorIndex {
        self.color
    }

    /// Selects the paint colour. Anything outside `palette` (other than
    /// transparent) is rejected so strokes can never produce an invalid sprite.
    pub fn select_color(&mut self, color: ColorIndex, palette: &Palette) -> Result<(), String> {
        if !is_paintable(color, palette.len()) {
            return Err(format!(
                "colour {color} is not in the palette ({} entries)",
                palette.len()
            ));
        }
        self.color = color;
        Ok(())
    }

    pub fn select_target(&mut self, target: SpriteRef) {
        self.target = target;
        self.last_index = None;
    }

    /// Starts a stroke. Returns true when the store changed.
    pub fn pointer_down(
        &mut self,
        store: &mut SpriteStore,
        pointer: Vec2,
        confirm: &mut dyn ConfirmClear,
    ) -> Result<bool, String> {
        self.last_index = None;
        self.sketching = true;
        self.hover = square_index(pointer, self.square_pixels, self.side);
        self.sketch(store, pointer, confirm)
    }

    pub fn pointer_move(
        &mut self,
        store: &mut SpriteStore,
        pointer: Vec2,
        confirm: &mut dyn ConfirmClear,
    ) -> Result<bool, String> {
        let changed = if self.sketching {
            self.sketch(store, pointer, confirm)?
        } else {
            false
        };
        self.hover = square_index(pointer, self.square_pixels, self.side);
        Ok(changed)
    }

    pub fn pointer_up(&mut self) {
        self.sketching = false;
    }

    pub fn pointer_leave(&mut self) {
        self.sketching = false;
        self.hover = None;
    }

    fn sketch(
        &mut self,
        store: &mut SpriteStore,
        pointer: Vec2,
        confirm: &mut dyn ConfirmClear,
    ) -> Result<bool, String> {
        let current = store
            .get(self.target)
            .ok_or_else(|| format!("no sprite at {:?}", self.target))?;

        let next = if self.tool == Tool::Clear {
            if !confirm.confirm_clear() {
                return Ok(false);
            }
            self.sketching = false;
            Some(clear_sprite(self.side))
        } else {
            let Some(index) = square_index(pointer, self.square_pixels, self.side) else {
                return Ok(false);
            };
            if self.last_index == Some(index) {
                return Ok(false);
            }
            self.last_index = Some(index);
            match self.tool {
                Tool::Pencil => paint_pencil(current, index, self.color),
                Tool::Eraser => paint_eraser(current, index),
                Tool::Bucket => paint_bucket(current, index, self.color),
                Tool::Clear => None,
            }
        };

        let Some(next) = next else {
            return Ok(false);
        };
        let previous = store.replace(self.target, next)?;
        self.history.push(self.target, previous);
        Ok(true)
    }
}
