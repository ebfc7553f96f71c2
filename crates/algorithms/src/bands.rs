//! Typed band and feature names
//!
//! Feature vectors are keyed by [`FeatureName`] values instead of strings.
//! The `NDVI_E`-style text form exists only through `Display` / `FromStr`,
//! for file properties, reports and logs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sentinel-2 reflectance bands used by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SpectralBand {
    /// B2, 490 nm
    #[serde(rename = "B2")]
    Blue,
    /// B3, 560 nm
    #[serde(rename = "B3")]
    Green,
    /// B4, 665 nm
    #[serde(rename = "B4")]
    Red,
    /// B8, 842 nm
    #[serde(rename = "B8")]
    Nir,
    /// B11, 1610 nm
    #[serde(rename = "B11")]
    Swir1,
    /// B12, 2190 nm
    #[serde(rename = "B12")]
    Swir2,
}

impl SpectralBand {
    pub const ALL: [SpectralBand; 6] = [
        SpectralBand::Blue,
        SpectralBand::Green,
        SpectralBand::Red,
        SpectralBand::Nir,
        SpectralBand::Swir1,
        SpectralBand::Swir2,
    ];

    /// Bands carried into a composite (blue only feeds EVI)
    pub const COMPOSITE: [SpectralBand; 5] = [
        SpectralBand::Green,
        SpectralBand::Red,
        SpectralBand::Nir,
        SpectralBand::Swir1,
        SpectralBand::Swir2,
    ];

    pub fn code(self) -> &'static str {
        match self {
            SpectralBand::Blue => "B2",
            SpectralBand::Green => "B3",
            SpectralBand::Red => "B4",
            SpectralBand::Nir => "B8",
            SpectralBand::Swir1 => "B11",
            SpectralBand::Swir2 => "B12",
        }
    }
}

impl fmt::Display for SpectralBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Spectral indices derived per composite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SpectralIndex {
    /// Normalized Difference Vegetation Index, ND(B8, B4)
    Ndvi,
    /// Land Surface Water Index, ND(B8, B11)
    Lswi,
    /// Modified Normalized Difference Water Index, ND(B3, B11)
    Mndwi,
    /// Enhanced Vegetation Index
    Evi,
}

impl SpectralIndex {
    pub const ALL: [SpectralIndex; 4] = [
        SpectralIndex::Ndvi,
        SpectralIndex::Lswi,
        SpectralIndex::Mndwi,
        SpectralIndex::Evi,
    ];

    pub fn code(self) -> &'static str {
        match self {
            SpectralIndex::Ndvi => "NDVI",
            SpectralIndex::Lswi => "LSWI",
            SpectralIndex::Mndwi => "MNDWI",
            SpectralIndex::Evi => "EVI",
        }
    }
}

impl fmt::Display for SpectralIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Seasonal compositing window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Window {
    /// Flooding and transplanting; serialized suffix `E`
    Planting,
    /// Canopy development; serialized suffix `B`
    Growth,
}

impl Window {
    pub fn suffix(self) -> &'static str {
        match self {
            Window::Planting => "E",
            Window::Growth => "B",
        }
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Window::Planting => f.write_str("planting"),
            Window::Growth => f.write_str("growth"),
        }
    }
}

impl FromStr for Window {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "planting" | "e" => Ok(Window::Planting),
            "growth" | "b" => Ok(Window::Growth),
            other => Err(format!("unknown window '{other}', expected planting or growth")),
        }
    }
}

/// One entry of the per-pixel feature vector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureName {
    Band(SpectralBand, Window),
    Index(SpectralIndex, Window),
    /// Terrain slope in degrees
    Slope,
    /// Elevation in meters
    Elevation,
}

impl FeatureName {
    /// Composite bands for `window`, in stack order
    pub fn composite(window: Window) -> Vec<FeatureName> {
        SpectralBand::COMPOSITE
            .iter()
            .map(|b| FeatureName::Band(*b, window))
            .chain(SpectralIndex::ALL.iter().map(|i| FeatureName::Index(*i, window)))
            .collect()
    }

    /// Full feature order: planting composite, growth composite, slope,
    /// elevation
    pub fn stack_order() -> Vec<FeatureName> {
        let mut names = Self::composite(Window::Planting);
        names.extend(Self::composite(Window::Growth));
        names.push(FeatureName::Slope);
        names.push(FeatureName::Elevation);
        names
    }
}

impl fmt::Display for FeatureName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureName::Band(b, w) => write!(f, "{}_{}", b.code(), w.suffix()),
            FeatureName::Index(i, w) => write!(f, "{}_{}", i.code(), w.suffix()),
            FeatureName::Slope => f.write_str("slope"),
            FeatureName::Elevation => f.write_str("elevation"),
        }
    }
}

impl FromStr for FeatureName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "slope" => return Ok(FeatureName::Slope),
            "elevation" => return Ok(FeatureName::Elevation),
            _ => {}
        }
        let (code, suffix) = s
            .rsplit_once('_')
            .ok_or_else(|| format!("feature name '{s}' has no window suffix"))?;
        let window = match suffix {
            "E" => Window::Planting,
            "B" => Window::Growth,
            other => return Err(format!("unknown window suffix '{other}' in '{s}'")),
        };
        if let Some(band) = SpectralBand::ALL.iter().find(|b| b.code() == code) {
            return Ok(FeatureName::Band(*band, window));
        }
        if let Some(index) = SpectralIndex::ALL.iter().find(|i| i.code() == code) {
            return Ok(FeatureName::Index(*index, window));
        }
        Err(format!("unknown band or index '{code}'"))
    }
}

impl Serialize for FeatureName {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FeatureName {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
