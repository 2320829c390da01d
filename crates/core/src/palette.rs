//! Deterministic frame colors.
//!
//! A frame's color depends only on its label, so the same symbol gets the
//! same color in every graph.

use timetrace_protocol::{Background, ColorHash, Palette, Rgb};

/// Color of frames named `--` (stack separators).
pub const SEPARATOR_COLOR: Rgb = Rgb::new(160, 160, 160);
/// Color of frames named `-`.
pub const DASH_COLOR: Rgb = Rgb::new(200, 200, 200);
/// Color of the root frame.
pub const ROOT_COLOR: Rgb = Rgb::new(220, 220, 220);

pub fn frame_color(palette: Palette, hash: ColorHash, name: &str) -> Rgb {
    let (v1, v2, v3) = match hash {
        ColorHash::Name => {
            let reversed: String = name.chars().rev().collect();
            let v = namehash(&reversed);
            (namehash(name), v, v)
        }
        ColorHash::Seeded => {
            let mut rng = SeededRandom::new(sum_namehash(name));
            (rng.next_f64(), rng.next_f64(), rng.next_f64())
        }
    };

    match palette {
        Palette::Hot => Rgb::new(scale(205, 50.0, v3), scale(0, 230.0, v1), scale(0, 55.0, v2)),
        Palette::Mem => Rgb::new(0, scale(190, 50.0, v2), scale(0, 210.0, v1)),
        Palette::Io => {
            let rg = scale(80, 60.0, v1);
            Rgb::new(rg, rg, scale(190, 55.0, v2))
        }
        Palette::Red => {
            let x = scale(50, 80.0, v1);
            Rgb::new(scale(200, 55.0, v1), x, x)
        }
        Palette::Green => {
            let x = scale(50, 60.0, v1);
            Rgb::new(x, scale(200, 55.0, v1), x)
        }
        Palette::Blue => {
            let x = scale(80, 60.0, v1);
            Rgb::new(x, x, scale(205, 50.0, v1))
        }
        Palette::Yellow => {
            let x = scale(175, 55.0, v1);
            Rgb::new(x, x, scale(50, 20.0, v1))
        }
        Palette::Purple => {
            let x = scale(190, 65.0, v1);
            Rgb::new(x, scale(80, 60.0, v1), x)
        }
        Palette::Aqua | Palette::Wakeup => Rgb::new(
            scale(50, 60.0, v1),
            scale(165, 55.0, v1),
            scale(165, 55.0, v1),
        ),
        Palette::Orange => Rgb::new(scale(190, 65.0, v1), scale(90, 65.0, v1), 0),
    }
}

fn scale(base: u32, range: f64, v: f64) -> u8 {
    let offset = (range * v.clamp(0.0, 1.0)).floor() as u32;
    (base + offset).min(255) as u8
}

/// Vector hash of a label, weighting early characters over later ones so
/// that similar names get similar colors. Result in `(0, 1]`.
pub fn namehash(name: &str) -> f64 {
    // `module`function keeps only the function part
    let name = match name.find('`') {
        Some(pos) if pos > 0 => &name[pos + 1..],
        _ => name,
    };

    let mut vector = 0.0;
    let mut weight = 1.0;
    let mut max = 1.0;
    let mut modulus = 10u32;
    for unit in name.encode_utf16() {
        let val = f64::from(u32::from(unit) % modulus);
        vector += val / f64::from(modulus - 1) * weight;
        modulus += 1;
        max += weight;
        weight *= 0.70;
        if modulus > 12 {
            break;
        }
    }
    1.0 - vector / max
}

/// 32-bit string hash over UTF-16 code units (`h = h * 31 + c`).
pub fn sum_namehash(name: &str) -> u32 {
    name.encode_utf16()
        .fold(0i32, |hash, unit| {
            hash.wrapping_shl(5)
                .wrapping_sub(hash)
                .wrapping_add(i32::from(unit))
        }) as u32
}

/// Linear congruential generator seeded from a label hash.
#[derive(Debug, Clone)]
struct SeededRandom {
    seed: u64,
}

impl SeededRandom {
    const MULTIPLIER: u64 = 9301;
    const INCREMENT: u64 = 49297;
    const MODULUS: u64 = 233_280;

    fn new(seed: u32) -> Self {
        Self {
            seed: u64::from(seed),
        }
    }

    fn next_f64(&mut self) -> f64 {
        self.seed = (self.seed * Self::MULTIPLIER + Self::INCREMENT) % Self::MODULUS;
        self.seed as f64 / Self::MODULUS as f64
    }
}

/// Diverging red/blue color for differential graphs: positive deltas are
/// red, negative blue, zero white.
pub fn color_scale(value: f64, max: f64, negate: bool) -> Rgb {
    let value = if negate { -value } else { value };
    if max <= 0.0 || value == 0.0 {
        return Rgb::new(255, 255, 255);
    }
    let shade = |v: f64| (210.0 * v / max).clamp(0.0, 255.0).floor() as u8;
    if value > 0.0 {
        let gb = shade(max - value);
        Rgb::new(255, gb, gb)
    } else {
        let rg = shade(max + value);
        Rgb::new(rg, rg, 255)
    }
}

/// Gradient stops of the image background, or `None` when a flat color is
/// not of the form `#rrggbb`.
pub fn background_stops(background: &Background, palette: Palette) -> Option<(String, String)> {
    let named = |a: &str, b: &str| Some((a.to_string(), b.to_string()));
    match background {
        Background::Auto => {
            let resolved = match palette {
                Palette::Mem => Background::Green,
                Palette::Io | Palette::Wakeup => Background::Blue,
                p if p.is_flat() => Background::Grey,
                _ => Background::Yellow,
            };
            background_stops(&resolved, palette)
        }
        Background::Yellow => named("#eeeeee", "#eeeeb0"),
        Background::Blue => named("#eeeeee", "#e0e0ff"),
        Background::Green => named("#eef2ee", "#e0ffe0"),
        Background::Grey => named("#f8f8f8", "#e8e8e8"),
        Background::Flat(color) => is_hex_color(color).then(|| (color.clone(), color.clone())),
    }
}

fn is_hex_color(color: &str) -> bool {
    color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colors_are_deterministic() {
        for hash in [ColorHash::Seeded, ColorHash::Name] {
            let a = frame_color(Palette::Hot, hash, "std::vector<int>::push_back");
            let b = frame_color(Palette::Hot, hash, "std::vector<int>::push_back");
            assert_eq!(a, b);
        }
    }

    #[test]
    fn hot_palette_stays_warm() {
        for name in ["main", "<stdio.h>", "InstantiateFunction", ""] {
            let c = frame_color(Palette::Hot, ColorHash::Seeded, name);
            assert!(c.r >= 205);
            assert!(c.g <= 230);
            assert!(c.b <= 55);
        }
    }

    #[test]
    fn sum_namehash_matches_java_string_hash() {
        assert_eq!(sum_namehash(""), 0);
        assert_eq!(sum_namehash("a"), 97);
        assert_eq!(sum_namehash("ab"), 97 * 31 + 98);
        // wraps like a signed 32-bit integer
        assert_eq!(sum_namehash("hello world, this is long"), {
            let mut h: i32 = 0;
            for c in "hello world, this is long".bytes() {
                h = h.wrapping_mul(31).wrapping_add(i32::from(c));
            }
            h as u32
        });
    }

    #[test]
    fn namehash_is_in_unit_interval() {
        for name in ["", "a", "zzzz", "libfoo.so`bar"] {
            let v = namehash(name);
            assert!(v > 0.0 && v <= 1.0, "{name}: {v}");
        }
        assert_eq!(namehash("libfoo.so`bar"), namehash("bar"));
    }

    #[test]
    fn color_scale_diverges() {
        assert_eq!(color_scale(0.0, 10.0, false), Rgb::new(255, 255, 255));
        assert_eq!(color_scale(10.0, 10.0, false), Rgb::new(255, 0, 0));
        assert_eq!(color_scale(-10.0, 10.0, false), Rgb::new(0, 0, 255));
        assert_eq!(color_scale(10.0, 10.0, true), Rgb::new(0, 0, 255));
    }

    #[test]
    fn background_stops_resolve() {
        assert_eq!(
            background_stops(&Background::Grey, Palette::Hot),
            Some(("#f8f8f8".into(), "#e8e8e8".into()))
        );
        assert_eq!(
            background_stops(&Background::Auto, Palette::Mem),
            background_stops(&Background::Green, Palette::Mem)
        );
        assert_eq!(
            background_stops(&Background::Flat("#123abc".into()), Palette::Hot),
            Some(("#123abc".into(), "#123abc".into()))
        );
        assert_eq!(
            background_stops(&Background::Flat("red".into()), Palette::Hot),
            None
        );
    }
}
