pub mod paint;
pub mod placement;
pub mod pointer;
pub mod session;

pub use paint::{clear_sprite, paint_bucket, paint_eraser, paint_pencil};
pub use placement::PlacementTool;
pub use pointer::{square_index, square_origin};
pub use session::{ConfirmClear, SketchSession, SpriteHistory, Tool};
