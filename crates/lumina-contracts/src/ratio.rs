//! Aspect ratio and size tier resolution.
//!
//! Every sizing request collapses onto one of the five supported
//! [`AspectRatio`] values; explicit dimensions additionally pick a
//! [`SizeTier`] for the high-quality generation path.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static DIMENSIONS_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d{3,5})\s*(?:x|by)\s*(\d{3,5})").expect("dimensions pattern compiles")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AspectRatio {
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "3:4")]
    Portrait,
    #[serde(rename = "4:3")]
    Landscape,
    #[serde(rename = "9:16")]
    Tall,
    #[serde(rename = "16:9")]
    Wide,
}

impl AspectRatio {
    /// Declaration order; ties in [`resolve_closest_ratio`] go to the earlier entry.
    pub const ALL: [AspectRatio; 5] = [
        AspectRatio::Square,
        AspectRatio::Portrait,
        AspectRatio::Landscape,
        AspectRatio::Tall,
        AspectRatio::Wide,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Portrait => "3:4",
            AspectRatio::Landscape => "4:3",
            AspectRatio::Tall => "9:16",
            AspectRatio::Wide => "16:9",
        }
    }

    pub fn parts(self) -> (u32, u32) {
        match self {
            AspectRatio::Square => (1, 1),
            AspectRatio::Portrait => (3, 4),
            AspectRatio::Landscape => (4, 3),
            AspectRatio::Tall => (9, 16),
            AspectRatio::Wide => (16, 9),
        }
    }

    pub fn value(self) -> f64 {
        let (w, h) = self.parts();
        w as f64 / h as f64
    }
}

impl Default for AspectRatio {
    fn default() -> Self {
        AspectRatio::Square
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AspectRatio {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "square" => return Ok(AspectRatio::Square),
            "portrait" => return Ok(AspectRatio::Portrait),
            "landscape" => return Ok(AspectRatio::Landscape),
            "tall" | "story" => return Ok(AspectRatio::Tall),
            "wide" | "widescreen" => return Ok(AspectRatio::Wide),
            _ => {}
        }
        AspectRatio::ALL
            .into_iter()
            .find(|ratio| ratio.as_str() == normalized)
            .ok_or_else(|| format!("unsupported aspect ratio '{}'", raw.trim()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SizeTier {
    #[serde(rename = "1K")]
    OneK,
    #[serde(rename = "2K")]
    TwoK,
    #[serde(rename = "4K")]
    FourK,
}

impl SizeTier {
    /// `> 2048` is 4K, `> 1024` is 2K, everything else 1K.
    pub fn for_max_dimension(max_dim: u32) -> Self {
        if max_dim > 2048 {
            SizeTier::FourK
        } else if max_dim > 1024 {
            SizeTier::TwoK
        } else {
            SizeTier::OneK
        }
    }

    pub fn for_dimensions(width: u32, height: u32) -> Self {
        Self::for_max_dimension(width.max(height))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SizeTier::OneK => "1K",
            SizeTier::TwoK => "2K",
            SizeTier::FourK => "4K",
        }
    }

    /// Pixel length of the longer edge for this tier.
    pub fn long_edge(self) -> u32 {
        match self {
            SizeTier::OneK => 1024,
            SizeTier::TwoK => 2048,
            SizeTier::FourK => 4096,
        }
    }
}

impl Default for SizeTier {
    fn default() -> Self {
        SizeTier::OneK
    }
}

impl fmt::Display for SizeTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SizeTier {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "1K" => Ok(SizeTier::OneK),
            "2K" => Ok(SizeTier::TwoK),
            "4K" => Ok(SizeTier::FourK),
            other => Err(format!("unsupported size tier '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn max_dim(&self) -> u32 {
        self.width.max(self.height)
    }
}

/// Returns the supported ratio closest to `width / height`.
///
/// Zero dimensions are clamped to 1 so the division is always defined.
pub fn resolve_closest_ratio(width: u32, height: u32) -> AspectRatio {
    let target = width.max(1) as f64 / height.max(1) as f64;
    let mut best = AspectRatio::ALL[0];
    let mut best_delta = f64::MAX;
    for candidate in AspectRatio::ALL {
        let delta = (candidate.value() - target).abs();
        if delta < best_delta {
            best = candidate;
            best_delta = delta;
        }
    }
    best
}

/// Finds the first `WIDTHxHEIGHT` / `WIDTH by HEIGHT` pair in free text.
///
/// Both numbers must have 3 to 5 digits, so "top 10 colors" and "a 4x4 grid"
/// are ignored while "1920x1080" and "1000 by 1000 pixels" match.
pub fn extract_dimensions(text: &str) -> Option<Dimensions> {
    let captures = DIMENSIONS_PATTERN.captures(text)?;
    let width = captures.get(1)?.as_str().parse::<u32>().ok()?;
    let height = captures.get(2)?.as_str().parse::<u32>().ok()?;
    Some(Dimensions { width, height })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sizing {
    pub ratio: AspectRatio,
    pub tier: SizeTier,
    pub dimensions: Option<Dimensions>,
}

/// Explicit dimensions win, then dimensions found in the prompt, then the
/// caller's ratio at the 1K tier.
pub fn resolve_sizing(
    explicit: Option<Dimensions>,
    prompt: &str,
    default_ratio: AspectRatio,
) -> Sizing {
    let dimensions = explicit
        .filter(|dims| dims.width > 0 && dims.height > 0)
        .or_else(|| extract_dimensions(prompt));
    match dimensions {
        Some(dims) => Sizing {
            ratio: resolve_closest_ratio(dims.width, dims.height),
            tier: SizeTier::for_max_dimension(dims.max_dim()),
            dimensions: Some(dims),
        },
        None => Sizing {
            ratio: default_ratio,
            tier: SizeTier::OneK,
            dimensions: None,
        },
    }
}

/// `(width, height)` in pixels for a ratio whose longer edge matches the tier.
pub fn pixel_size(ratio: AspectRatio, tier: SizeTier) -> (u32, u32) {
    let (w, h) = ratio.parts();
    let long = tier.long_edge();
    if w >= h {
        (long, ((long as f64) * h as f64 / w as f64).round() as u32)
    } else {
        (((long as f64) * w as f64 / h as f64).round() as u32, long)
    }
}
