//! Text overlays added by entity scripts. Keyed by id; drawn after every
//! sprite in insertion order. Overlays belong to one run and are never
//! persisted.

pub const DEFAULT_TEXT_COLOR: &str = "black";
pub const DEFAULT_TEXT_SIZE: f32 = 16.0;

#[derive(Debug, Clone, PartialEq)]
pub struct TextOverlay {
    pub id: String,
    pub text: String,
    /// Square coordinates of the text's top-left corner.
    pub x: f32,
    pub y: f32,
    pub color: String,
    /// Font size in pixels.
    pub size: f32,
}

#[derive(Debug, Clone, Default)]
pub struct TextOverlays {
    items: Vec<TextOverlay>,
}

impl TextOverlays {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `overlay`, or replace the overlay with the same id in place.
    /// Returns true when an existing overlay was replaced.
    pub fn upsert(&mut self, overlay: TextOverlay) -> bool {
        match self.items.iter_mut().find(|item| item.id == overlay.id) {
            Some(existing) => {
                *existing = overlay;
                true
            }
            None => {
                self.items.push(overlay);
                false
            }
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<TextOverlay> {
        let index = self.items.iter().position(|item| item.id == id)?;
        Some(self.items.remove(index))
    }

    pub fn get(&self, id: &str) -> Option<&TextOverlay> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TextOverlay> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
