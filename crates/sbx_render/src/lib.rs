pub mod canvas;
pub mod color;
pub mod font;
pub mod pipeline;
pub mod surface;

pub use canvas::{Canvas, DisplayList, DrawCommand};
pub use color::{parse_color, Rgba};
pub use pipeline::{draw_error_overlay, draw_sprite, render_frame, FrameView};
pub use surface::RgbaSurface;
