//! CPU raster canvas backed by an `image::RgbaImage`.

use std::collections::HashSet;
use std::path::Path;

use image::{Rgba as Pixel, RgbaImage};

use crate::canvas::Canvas;
use crate::color::{parse_color, Rgba};
use crate::font;

pub struct RgbaSurface {
    image: RgbaImage,
    warned: HashSet<String>,
}

impl RgbaSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbaImage::new(width, height),
            warned: HashSet::new(),
        }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        self.image.get_pixel_checked(x, y).map(|pixel| Rgba(pixel.0))
    }

    pub fn save_png(&self, path: &Path) -> Result<(), String> {
        self.image
            .save_with_format(path, image::ImageFormat::Png)
            .map_err(|e| format!("Failed to write frame {}: {e}", path.display()))?;
        log::info!(
            "Frame written: {} ({}x{})",
            path.display(),
            self.image.width(),
            self.image.height()
        );
        Ok(())
    }

    fn resolve(&mut self, text: &str) -> Rgba {
        if let Some(color) = parse_color(text) {
            return color;
        }
        if self.warned.insert(text.to_string()) {
            log::warn!("Unrecognised colour '{text}', drawing magenta");
        }
        Rgba::MAGENTA
    }

    /// Source-over blend of `color` into one pixel.
    fn blend(&mut self, x: u32, y: u32, color: Rgba) {
        let Some(pixel) = self.image.get_pixel_mut_checked(x, y) else {
            return;
        };
        let src_alpha = color.alpha() as u32;
        if src_alpha == 255 {
            *pixel = Pixel(color.0);
            return;
        }
        if src_alpha == 0 {
            return;
        }
        let dst = pixel.0;
        let dst_alpha = dst[3] as u32;
        let out_alpha = src_alpha + dst_alpha * (255 - src_alpha) / 255;
        let mut out = [0u8; 4];
        for channel in 0..3 {
            let src = color.0[channel] as u32 * src_alpha;
            let dst = dst[channel] as u32 * dst_alpha * (255 - src_alpha) / 255;
            out[channel] = ((src + dst) / out_alpha.max(1)) as u8;
        }
        out[3] = out_alpha as u8;
        *pixel = Pixel(out);
    }

    fn fill_pixels(&mut self, x0: i64, y0: i64, x1: i64, y1: i64, color: Rgba) {
        let x0 = x0.clamp(0, self.image.width() as i64) as u32;
        let x1 = x1.clamp(0, self.image.width() as i64) as u32;
        let y0 = y0.clamp(0, self.image.height() as i64) as u32;
        let y1 = y1.clamp(0, self.image.height() as i64) as u32;
        for y in y0..y1 {
            for x in x0..x1 {
                self.blend(x, y, color);
            }
        }
    }
}

impl Canvas for RgbaSurface {
    fn size(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    fn clear(&mut self) {
        self.image.pixels_mut().for_each(|pixel| *pixel = Pixel([0; 4]));
        self.warned.clear();
    }

    fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: &str) {
        let color = self.resolve(color);
        self.fill_pixels(
            x.round() as i64,
            y.round() as i64,
            (x + width).round() as i64,
            (y + height).round() as i64,
            color,
        );
    }

    fn fill_text(&mut self, text: &str, x: f32, y: f32, size: f32, color: &str) {
        let color = self.resolve(color);
        let scale = font::scale_for(size) as i64;
        let top = y.round() as i64 - font::GLYPH_HEIGHT as i64 * scale;
        let mut left = x.round() as i64;
        for ch in text.chars() {
            for (row, bits) in font::glyph(ch).iter().enumerate() {
                for col in 0..font::GLYPH_WIDTH {
                    if bits & (0b100 >> col) == 0 {
                        continue;
                    }
                    let px = left + col as i64 * scale;
                    let py = top + row as i64 * scale;
                    self.fill_pixels(px, py, px + scale, py + scale, color);
                }
            }
            left += font::advance(scale as u32) as i64;
        }
    }
}
