//! Scene manifest: where the imagery and reference layers of a run live
//!
//! ```toml
//! region = "region.geojson"
//! positives = "paddy_fields.geojson"
//! dem = "dem.tif"
//! landcover = "worldcover.tif"
//!
//! [[scenes]]
//! date = "2024-06-01"
//! cloud_percentage = 4.2
//! scl = "2024-06-01/SCL.tif"
//! [scenes.bands]
//! B2 = "2024-06-01/B2.tif"
//! B3 = "2024-06-01/B3.tif"
//! # ... B4, B8, B11, B12
//! ```
//!
//! Relative paths resolve against the manifest's directory.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use paddyscan_algorithms::bands::SpectralBand;
use paddyscan_algorithms::composite::{Scene, SceneCollection};
use paddyscan_algorithms::pipeline::PipelineInputs;
use paddyscan_core::io::{read_geotiff, read_polygons, read_region};
use paddyscan_core::raster::{Raster, RasterStack};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
pub struct SceneEntry {
    pub date: NaiveDate,
    #[serde(default)]
    pub cloud_percentage: f64,
    pub bands: BTreeMap<SpectralBand, PathBuf>,
    pub scl: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
pub struct Manifest {
    pub region: Option<PathBuf>,
    pub positives: Option<PathBuf>,
    pub dem: Option<PathBuf>,
    pub landcover: Option<PathBuf>,
    #[serde(default)]
    pub scenes: Vec<SceneEntry>,
    #[serde(skip)]
    base: PathBuf,
}

impl Manifest {
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest {}", path.display()))?;
        let mut manifest: Manifest =
            toml::from_str(&text).with_context(|| format!("Invalid manifest {}", path.display()))?;
        manifest.base = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(manifest)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base.join(path)
        }
    }

    fn require(&self, entry: &Option<PathBuf>, name: &str) -> Result<PathBuf> {
        match entry {
            Some(p) => Ok(self.resolve(p)),
            None => bail!("Manifest has no '{}' entry", name),
        }
    }

    /// Load every scene; each must carry all six reflectance bands
    pub fn load_scenes(&self) -> Result<SceneCollection> {
        if self.scenes.is_empty() {
            bail!("Manifest lists no scenes");
        }
        let mut scenes = Vec::with_capacity(self.scenes.len());
        for entry in &self.scenes {
            let mut bands = RasterStack::new();
            for band in SpectralBand::ALL {
                let Some(path) = entry.bands.get(&band) else {
                    bail!("Scene {} has no {} band", entry.date, band);
                };
                let path = self.resolve(path);
                let raster: Raster<f64> = read_geotiff(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                bands
                    .push(band, raster)
                    .with_context(|| format!("Scene {} band {}", entry.date, band))?;
            }
            let mut scene = Scene::new(entry.date, entry.cloud_percentage, bands);
            if let Some(scl) = &entry.scl {
                let path = self.resolve(scl);
                let scl: Raster<u8> = read_geotiff(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                scene = scene.with_scl(scl);
            }
            debug!("Loaded scene {} ({}% cloud)", entry.date, entry.cloud_percentage);
            scenes.push(scene);
        }
        info!("Loaded {} scenes", scenes.len());
        Ok(SceneCollection::new(scenes))
    }

    /// Scenes plus the region, positives, DEM and land-cover layers
    pub fn load_inputs(&self) -> Result<PipelineInputs> {
        let region_path = self.require(&self.region, "region")?;
        let region = read_region(&region_path)
            .with_context(|| format!("Failed to read region {}", region_path.display()))?;
        let positives_path = self.require(&self.positives, "positives")?;
        let positives = read_polygons(&positives_path)
            .with_context(|| format!("Failed to read positives {}", positives_path.display()))?;
        let dem_path = self.require(&self.dem, "dem")?;
        let dem: Raster<f64> = read_geotiff(&dem_path)
            .with_context(|| format!("Failed to read DEM {}", dem_path.display()))?;
        let landcover_path = self.require(&self.landcover, "landcover")?;
        let landcover: Raster<u16> = read_geotiff(&landcover_path)
            .with_context(|| format!("Failed to read land cover {}", landcover_path.display()))?;

        info!(
            "Inputs: {} positive polygons, DEM {} x {}, land cover {} x {}",
            positives.len(),
            dem.cols(),
            dem.rows(),
            landcover.cols(),
            landcover.rows()
        );
        Ok(PipelineInputs {
            scenes: self.load_scenes()?,
            dem,
            landcover,
            region,
            positives,
        })
    }
}
