//! CSS colour strings as stored in palettes and text overlays.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba(pub [u8; 4]);

impl Rgba {
    pub const TRANSPARENT: Rgba = Rgba([0, 0, 0, 0]);
    pub const BLACK: Rgba = Rgba([0, 0, 0, 255]);
    pub const WHITE: Rgba = Rgba([255, 255, 255, 255]);
    pub const RED: Rgba = Rgba([255, 0, 0, 255]);
    /// Stand-in for colours that fail to parse.
    pub const MAGENTA: Rgba = Rgba([255, 0, 255, 255]);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Rgba([r, g, b, 255])
    }

    pub fn alpha(self) -> u8 {
        self.0[3]
    }
}

const NAMED: &[(&str, Rgba)] = &[
    ("black", Rgba::BLACK),
    ("white", Rgba::WHITE),
    ("red", Rgba::RED),
    ("green", Rgba::rgb(0, 128, 0)),
    ("lime", Rgba::rgb(0, 255, 0)),
    ("blue", Rgba::rgb(0, 0, 255)),
    ("navy", Rgba::rgb(0, 0, 128)),
    ("yellow", Rgba::rgb(255, 255, 0)),
    ("orange", Rgba::rgb(255, 165, 0)),
    ("purple", Rgba::rgb(128, 0, 128)),
    ("magenta", Rgba::MAGENTA),
    ("fuchsia", Rgba::MAGENTA),
    ("cyan", Rgba::rgb(0, 255, 255)),
    ("aqua", Rgba::rgb(0, 255, 255)),
    ("gray", Rgba::rgb(128, 128, 128)),
    ("grey", Rgba::rgb(128, 128, 128)),
    ("silver", Rgba::rgb(192, 192, 192)),
    ("brown", Rgba::rgb(165, 42, 42)),
    ("pink", Rgba::rgb(255, 192, 203)),
    ("transparent", Rgba::TRANSPARENT),
];

/// Parses `#rgb`, `#rrggbb`, `#rrggbbaa` or a known CSS colour name.
pub fn parse_color(text: &str) -> Option<Rgba> {
    let text = text.trim();
    let Some(hex) = text.strip_prefix('#') else {
        let name = text.to_ascii_lowercase();
        return NAMED
            .iter()
            .find(|(known, _)| *known == name)
            .map(|(_, color)| *color);
    };
    if !hex.is_ascii() {
        return None;
    }

    let channel = |slice: &str| u8::from_str_radix(slice, 16).ok();
    match hex.len() {
        3 => {
            let mut rgba = [255u8; 4];
            for (slot, digit) in rgba.iter_mut().zip(hex.chars()) {
                let value = digit.to_digit(16)? as u8;
                *slot = value * 17;
            }
            Some(Rgba(rgba))
        }
        6 | 8 => {
            let mut rgba = [255u8; 4];
            for (slot, start) in rgba.iter_mut().zip((0..hex.len()).step_by(2)) {
                *slot = channel(&hex[start..start + 2])?;
            }
            Some(Rgba(rgba))
        }
        _ => None,
    }
}
