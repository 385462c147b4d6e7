pub mod input;
pub mod map;
pub mod sprite;
pub mod text;
pub mod time;
pub mod units;

pub use input::InputTracker;
pub use map::{Entity, EntityId, MapModel, Placement, TileIndex, TileMap, EMPTY_TILE};
pub use sprite::{is_paintable, ColorIndex, Palette, Sprite, SpriteRef, SpriteStore, TRANSPARENT};
pub use text::{TextOverlay, TextOverlays};
pub use time::FrameClock;
pub use units::Units;
