use serde::{Deserialize, Serialize};

/// Opaque sRGB color as used by scene fills, strokes and gradients.
///
/// Serialized form is a hex string; `#rgb` shorthand expands per-channel, so
/// `#f0a` and `#ff00aa` deserialize to the same value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rgb8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb8 {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const BLACK: Self = Self::new(0, 0, 0);
    pub const WHITE: Self = Self::new(255, 255, 255);

    /// Opaque straight-alpha RGBA8 (identical to premultiplied at full alpha).
    pub fn to_rgba8(self) -> [u8; 4] {
        [self.r, self.g, self.b, 255]
    }

    /// Per-channel linear interpolation at `t` in `[0, 1]`.
    pub fn lerp(self, other: Self, t: f64) -> Self {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| -> u8 {
            let af = f64::from(a);
            let bf = f64::from(b);
            (af + (bf - af) * t).round().clamp(0.0, 255.0) as u8
        };
        Self::new(
            mix(self.r, other.r),
            mix(self.g, other.g),
            mix(self.b, other.b),
        )
    }

    pub fn parse_hex(s: &str) -> Result<Self, String> {
        let raw = s.trim();
        let raw = raw.strip_prefix('#').unwrap_or(raw);

        fn hex_byte(pair: &str) -> Result<u8, String> {
            u8::from_str_radix(pair, 16).map_err(|_| format!("invalid hex byte \"{pair}\""))
        }

        match raw.len() {
            3 => {
                // Expand each nibble: "f0a" -> "ff00aa".
                let mut bytes = [0u8; 3];
                for (i, c) in raw.chars().enumerate() {
                    let pair: String = [c, c].iter().collect();
                    bytes[i] = hex_byte(&pair)?;
                }
                Ok(Self::new(bytes[0], bytes[1], bytes[2]))
            }
            6 => Ok(Self::new(
                hex_byte(&raw[0..2])?,
                hex_byte(&raw[2..4])?,
                hex_byte(&raw[4..6])?,
            )),
            _ => Err(format!(
                "color must be #rgb or #rrggbb (case-insensitive), got \"{s}\""
            )),
        }
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl std::fmt::Display for Rgb8 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for Rgb8 {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Rgb8 {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse_hex(&s).map_err(serde::de::Error::custom)
    }
}
