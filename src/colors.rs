use crossterm::style::Color;

/// 24-bit colour used by geometry and the renderer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#RRGGBB` or `RRGGBB`. Short `#RGB` forms are expanded.
    pub const fn from_hex(hex: &str) -> Option<Self> {
        let bytes = hex.as_bytes();
        let start = if !bytes.is_empty() && bytes[0] == b'#' { 1 } else { 0 };
        let len = bytes.len() - start;
        if len != 6 && len != 3 {
            return None;
        }

        let mut value: u32 = 0;
        let mut i = start;
        while i < bytes.len() {
            let Some(digit) = hex_digit(bytes[i]) else {
                return None;
            };
            value = (value << 4) | digit as u32;
            i += 1;
        }

        if len == 6 {
            Some(Self::new((value >> 16) as u8, (value >> 8) as u8, value as u8))
        } else {
            let r = ((value >> 8) & 0xF) * 0x11;
            let g = ((value >> 4) & 0xF) * 0x11;
            let b = (value & 0xF) * 0x11;
            Some(Self::new(r as u8, g as u8, b as u8))
        }
    }

    /// Multiply every channel, saturating at 255.
    pub fn scale(self, k: f32) -> Self {
        let f = |c: u8| (c as f32 * k).round().clamp(0.0, 255.0) as u8;
        Self::new(f(self.r), f(self.g), f(self.b))
    }

    /// Add `amount` (0..1) of white, like the `color + lighting` shading term.
    pub fn lighten(self, amount: f32) -> Self {
        let f = |c: u8| (c as f32 + amount * 255.0).round().clamp(0.0, 255.0) as u8;
        Self::new(f(self.r), f(self.g), f(self.b))
    }

}

const fn hex_digit(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

impl From<Rgb> for Color {
    fn from(c: Rgb) -> Self {
        Color::Rgb { r: c.r, g: c.g, b: c.b }
    }
}

/// Palette shared by geometry builders and the renderer
pub mod palette {
    use super::Rgb;

    /// Fails the build on a typo
    const fn hex(code: &str) -> Rgb {
        match Rgb::from_hex(code) {
            Some(color) => color,
            None => panic!("invalid palette colour"),
        }
    }

    pub const OCEAN: Rgb = hex("#2D68C4");
    pub const LAND: Rgb = hex("#008000");
    pub const COUNTRY_SELECTED: Rgb = hex("#880000");
    pub const REGION_SELECTED: Rgb = hex("#AA0000");
    pub const BEACON_STALK: Rgb = hex("#61AFEF");
    pub const BEACON_TIP: Rgb = hex("#FFF");
    pub const TRACE: Rgb = hex("#00D390");
    pub const COASTLINE: Rgb = hex("#C8D2DC");
    pub const GRATICULE: Rgb = hex("#3A4450");
    pub const HUD: Rgb = hex("#ABB2BF");
    pub const HUD_ACCENT: Rgb = hex("#E5C07B");
    pub const HUD_ERROR: Rgb = hex("#E06C75");
}
