//! Full detection run over a synthetic 40x40 scene series.
//!
//! A 16x20 pixel paddy block is flooded during planting and green during
//! growth; everything else has a flat vegetation signal in both windows.

use chrono::NaiveDate;
use geo::{LineString, Polygon};
use paddyscan_algorithms::bands::SpectralBand;
use paddyscan_algorithms::composite::{Scene, SceneCollection};
use paddyscan_algorithms::config::PipelineConfig;
use paddyscan_algorithms::export::GeoJsonDirectorySink;
use paddyscan_algorithms::morphology::count_true;
use paddyscan_algorithms::pipeline::{DetectionPipeline, PipelineInputs};
use paddyscan_core::io::{read_geotiff, read_polygons, write_geotiff};
use paddyscan_core::{GeoTransform, Raster, RasterElement, RasterStack, Region, CRS};
use std::path::Path;

const SIZE: usize = 40;
const CELL: f64 = 10.0;
const PADDY_ROWS: std::ops::Range<usize> = 8..24;
const PADDY_COLS: std::ops::Range<usize> = 8..28;
/// UTM 36N upper-left corner of the grid
const X0: f64 = 500_000.0;
const Y0: f64 = 4_600_400.0;

fn grid<T: RasterElement>(value: T) -> Raster<T> {
    let mut r = Raster::filled(SIZE, SIZE, value);
    r.set_transform(GeoTransform::new(X0, Y0, CELL, -CELL));
    r.set_crs(Some(CRS::from_epsg(32636)));
    r
}

fn is_paddy(row: usize, col: usize) -> bool {
    PADDY_ROWS.contains(&row) && PADDY_COLS.contains(&col)
}

fn date(m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, m, d).unwrap()
}

/// Reflectance per band: `paddy` inside the block, `other` outside
fn scene(day: NaiveDate, cloud: f64, paddy: [f64; 6], other: [f64; 6]) -> Scene {
    let mut bands = RasterStack::new();
    for (i, band) in SpectralBand::ALL.into_iter().enumerate() {
        let mut r = grid(other[i]);
        for row in PADDY_ROWS {
            for col in PADDY_COLS {
                r.set(row, col, paddy[i]).unwrap();
            }
        }
        bands.push(band, r).unwrap();
    }
    Scene::new(day, cloud, bands)
}

// B2, B3, B4, B8, B11, B12
const FLOODED: [f64; 6] = [0.05, 0.08, 0.06, 0.12, 0.05, 0.03];
const CANOPY: [f64; 6] = [0.03, 0.07, 0.04, 0.45, 0.20, 0.10];
const SCRUB: [f64; 6] = [0.05, 0.08, 0.08, 0.30, 0.25, 0.15];

fn scenes() -> SceneCollection {
    let mut scl = grid(4u8);
    scl.set(10, 10, 9).unwrap();
    SceneCollection::new(vec![
        scene(date(6, 1), 3.0, FLOODED, SCRUB).with_scl(scl),
        scene(date(6, 15), 8.0, FLOODED, SCRUB),
        // dropped by the cloud filter; its values would break the block
        scene(date(6, 20), 85.0, CANOPY, CANOPY),
        scene(date(8, 1), 2.0, CANOPY, SCRUB),
        scene(date(8, 20), 5.0, CANOPY, SCRUB),
    ])
}

/// Rectangle in grid-local meters, offset to map coordinates
fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> Polygon<f64> {
    let (ox, oy) = (X0, Y0 - SIZE as f64 * CELL);
    let (x0, x1, y0, y1) = (x0 + ox, x1 + ox, y0 + oy, y1 + oy);
    Polygon::new(
        LineString::from(vec![(x0, y0), (x1, y0), (x1, y1), (x0, y1), (x0, y0)]),
        vec![],
    )
}

fn inputs() -> PipelineInputs {
    let mut landcover = grid(10u16);
    for row in 0..SIZE {
        for col in 0..SIZE {
            if is_paddy(row, col) || row >= 30 {
                landcover.set(row, col, 40).unwrap();
            }
        }
    }
    let extent = SIZE as f64 * CELL;
    PipelineInputs {
        scenes: scenes(),
        dem: grid(50.0),
        landcover,
        region: Region::from_polygon(square(0.0, 0.0, extent, extent)).unwrap(),
        // well inside the block: x 80..280, y 160..320
        positives: vec![square(100.0, 180.0, 260.0, 300.0)],
    }
}

fn config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.forest.trees = 25;
    config.sampling.random_negatives = 50;
    config
}

#[test]
fn detects_the_paddy_block_and_exports_it() {
    let dir = tempfile::tempdir().unwrap();
    let sink = GeoJsonDirectorySink::new(dir.path().join("fields")).unwrap();
    let pipeline = DetectionPipeline::new(config()).unwrap();
    let out = pipeline.run_and_export(inputs(), sink).unwrap();
    let s = &out.summary;

    assert_eq!(s.planting_scenes, 2);
    assert_eq!(s.growth_scenes, 2);
    assert_eq!(s.feature_names.len(), 20);
    assert!(s.samples.positive > 0 && s.samples.negative > 0);
    assert_eq!(s.samples.train + s.samples.test, s.samples.total);
    assert!(s.validation.accuracy > 0.9, "accuracy {}", s.validation.accuracy);

    // Every block pixel passes; the mode filter trims the four corners
    assert_eq!(s.candidate_pixels, 320);
    assert_eq!(s.cleaned_pixels, 316);
    assert_eq!(count_true(&out.mask), 316);
    assert!(out.mask.data().iter().all(|v| *v <= 1));
    assert!((s.detected_area - 31.6).abs() < 1e-9);
    assert_eq!(s.cropland_share, Some(1.0));

    // 200 x 160 m block, 12 m inward buffer
    assert_eq!(s.field_count, 1);
    assert!(s.field_area > 20.0 && s.field_area < 28.0, "field area {}", s.field_area);

    let export = s.export.as_ref().unwrap();
    assert!(export.is_complete());
    assert_eq!(export.chunk_count(), 1);
    let written = read_polygons(dir.path().join("fields").join("PaddyScan_Fields_Chunk_0.geojson")).unwrap();
    assert_eq!(written.len(), 1);

    let json = s.to_json().unwrap();
    assert!(json.contains("\"field_count\": 1"));
}

#[test]
fn mask_survives_a_geotiff_round_trip() {
    let pipeline = DetectionPipeline::new(config()).unwrap();
    let out = pipeline.run(inputs()).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mask.tif");
    write_geotiff(&out.mask, &path).unwrap();
    let back: Raster<u8> = read_geotiff(&path).unwrap();

    assert_eq!(back.shape(), out.mask.shape());
    assert_eq!(back.transform(), out.mask.transform());
    assert_eq!(back.crs(), out.mask.crs());
    assert_eq!(back.nodata(), Some(0));
    assert_eq!(count_true(&back), count_true(&out.mask));
}

#[test]
fn missing_growth_scenes_fail_with_no_data() {
    let mut inputs = inputs();
    let planting_only: Vec<Scene> = inputs
        .scenes
        .iter()
        .filter(|s| s.date < date(7, 1))
        .cloned()
        .collect();
    inputs.scenes = SceneCollection::new(planting_only);

    let err = DetectionPipeline::new(config()).unwrap().run(inputs).unwrap_err();
    assert!(err.to_string().contains("growth"), "{err}");
}

fn through_geotiff<T: RasterElement>(raster: &Raster<T>, dir: &Path, name: &str) -> Raster<T> {
    let path = dir.join(format!("{name}.tif"));
    write_geotiff(raster, &path).unwrap();
    read_geotiff(&path).unwrap()
}

#[test]
fn geotiff_inputs_keep_areas_in_donum() {
    let dir = tempfile::tempdir().unwrap();
    let mem = inputs();

    let scenes: Vec<Scene> = mem
        .scenes
        .iter()
        .map(|scene| {
            let mut bands = RasterStack::new();
            for (band, raster) in scene.bands.iter() {
                let name = format!("{}_{}", scene.date, band);
                bands.push(band, through_geotiff(raster, dir.path(), &name)).unwrap();
            }
            let mut loaded = Scene::new(scene.date, scene.cloud_percentage, bands);
            if let Some(scl) = &scene.scl {
                loaded = loaded.with_scl(through_geotiff(scl, dir.path(), &format!("{}_SCL", scene.date)));
            }
            loaded
        })
        .collect();
    let dem: Raster<f64> = through_geotiff(&mem.dem, dir.path(), "dem");
    assert_eq!(dem.transform(), mem.dem.transform());
    assert_eq!(dem.crs(), mem.dem.crs());

    let loaded = PipelineInputs {
        scenes: SceneCollection::new(scenes),
        dem,
        landcover: through_geotiff(&mem.landcover, dir.path(), "landcover"),
        region: mem.region,
        positives: mem.positives,
    };
    let out = DetectionPipeline::new(config()).unwrap().run(loaded).unwrap();
    let s = &out.summary;

    // 316 cells of 100 m² in 1000 m² units
    assert_eq!(s.cleaned_pixels, 316);
    assert!((s.detected_area - 31.6).abs() < 1e-9, "detected {}", s.detected_area);
    assert_eq!(s.field_count, 1);
    assert!(s.field_area > 20.0 && s.field_area < 28.0, "field area {}", s.field_area);

    let field = out.fields.iter().next().unwrap();
    for c in field.geometry.exterior().coords() {
        assert!(c.x > X0 && c.x < X0 + SIZE as f64 * CELL, "x {}", c.x);
        assert!(c.y < Y0 && c.y > Y0 - SIZE as f64 * CELL, "y {}", c.y);
    }
}
