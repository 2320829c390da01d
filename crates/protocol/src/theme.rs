use serde::{Deserialize, Serialize};

/// Named color palette for flame graph frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Palette {
    /// Warm red/orange/yellow.
    #[default]
    Hot,
    Mem,
    Io,
    Wakeup,
    Red,
    Green,
    Blue,
    Aqua,
    Yellow,
    Purple,
    Orange,
}

impl Palette {
    /// Palettes that produce a single hue family.
    pub fn is_flat(self) -> bool {
        matches!(
            self,
            Palette::Red
                | Palette::Green
                | Palette::Blue
                | Palette::Aqua
                | Palette::Yellow
                | Palette::Purple
                | Palette::Orange
        )
    }
}

/// How a frame label is turned into the pseudo-random inputs of a palette.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorHash {
    /// A 32-bit string hash seeds a linear congruential step.
    #[default]
    Seeded,
    /// Weighted vector over the first characters, so similar names get
    /// similar colors.
    Name,
}

/// Background of the flame graph image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Background {
    /// Chosen from the palette.
    Auto,
    Yellow,
    Blue,
    Green,
    #[default]
    Grey,
    /// A single `#rrggbb` color.
    Flat(String),
}
