//! Single-band GeoTIFF reading and writing via the `tiff` crate
//!
//! Georeferencing is read from ModelPixelScale/ModelTiepoint, the CRS from
//! the GeoKey directory (EPSG codes only) and no-data from the GDAL_NODATA
//! tag. Output is always written as 32-bit float.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::Gray32Float;
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;

const KEY_MODEL_TYPE: u16 = 1024;
const KEY_RASTER_TYPE: u16 = 1025;
const KEY_GEOGRAPHIC_TYPE: u16 = 2048;
const KEY_PROJECTED_TYPE: u16 = 3072;

/// Read the first band of a GeoTIFF file
pub fn read_geotiff<T, P>(path: P) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::open(path.as_ref())?;
    decode_geotiff(BufReader::new(file))
}

/// Write a raster as a float32 GeoTIFF
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    encode_geotiff(raster, &mut writer)?;
    writer.flush()?;
    Ok(())
}

fn cast_all<S, T>(buf: Vec<S>) -> Vec<T>
where
    S: num_traits::NumCast + Copy,
    T: RasterElement,
{
    buf.into_iter()
        .map(|v| num_traits::cast(v).unwrap_or_else(T::default_nodata))
        .collect()
}

fn decode_geotiff<T, R>(reader: R) -> Result<Raster<T>>
where
    T: RasterElement,
    R: Read + Seek,
{
    let mut decoder = Decoder::new(reader)?;
    let (width, height) = decoder.dimensions()?;
    let (rows, cols) = (height as usize, width as usize);

    let data: Vec<T> = match decoder.read_image()? {
        DecodingResult::F32(buf) => cast_all(buf),
        DecodingResult::F64(buf) => cast_all(buf),
        DecodingResult::U8(buf) => cast_all(buf),
        DecodingResult::U16(buf) => cast_all(buf),
        DecodingResult::U32(buf) => cast_all(buf),
        DecodingResult::I8(buf) => cast_all(buf),
        DecodingResult::I16(buf) => cast_all(buf),
        DecodingResult::I32(buf) => cast_all(buf),
        _ => {
            return Err(Error::UnsupportedDataType(
                "unsupported TIFF sample format".to_string(),
            ))
        }
    };

    // Multi-band interleaved files decode to rows*cols*bands samples
    if data.len() < rows * cols {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }
    let bands = data.len() / (rows * cols);
    let data = if bands > 1 {
        data.into_iter().step_by(bands).collect()
    } else {
        data
    };

    let mut raster = Raster::from_vec(data, rows, cols)?;
    if let Some(transform) = read_geotransform(&mut decoder) {
        raster.set_transform(transform);
    }
    raster.set_crs(read_crs(&mut decoder));
    raster.set_nodata(read_nodata::<T, R>(&mut decoder));
    Ok(raster)
}

fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<GeoTransform> {
    let scale = decoder.get_tag_f64_vec(Tag::ModelPixelScaleTag).ok()?;
    let tiepoint = decoder.get_tag_f64_vec(Tag::ModelTiepointTag).ok()?;
    if scale.len() < 2 || tiepoint.len() < 6 {
        return None;
    }
    // tiepoint: [I, J, K, X, Y, Z]
    let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
    let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
    Some(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]))
}

fn read_crs<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<CRS> {
    let keys = decoder.get_tag_u16_vec(Tag::GeoKeyDirectoryTag).ok()?;
    parse_epsg(&keys).map(CRS::from_epsg)
}

/// EPSG code from a GeoKey directory: projected code first, then geographic
fn parse_epsg(keys: &[u16]) -> Option<u32> {
    let count = *keys.get(3)? as usize;
    let mut geographic = None;
    let mut projected = None;
    for entry in keys.get(4..4 + count * 4)?.chunks_exact(4) {
        let (key, location, value) = (entry[0], entry[1], entry[3]);
        if location != 0 || value == 0 || value == 32767 {
            continue;
        }
        match key {
            KEY_GEOGRAPHIC_TYPE => geographic = Some(value as u32),
            KEY_PROJECTED_TYPE => projected = Some(value as u32),
            _ => {}
        }
    }
    projected.or(geographic)
}

fn read_nodata<T: RasterElement, R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<T> {
    let text = decoder.get_tag_ascii_string(Tag::GdalNodata).ok()?;
    let value: f64 = text.trim_matches(char::from(0)).trim().parse().ok()?;
    T::from_f64(value)
}

fn encode_geotiff<T, W>(raster: &Raster<T>, writer: W) -> Result<()>
where
    T: RasterElement,
    W: Write + Seek,
{
    let mut encoder = TiffEncoder::new(writer)?;
    let (rows, cols) = raster.shape();

    let data: Vec<f32> = raster
        .data()
        .iter()
        .map(|&v| num_traits::cast(v).unwrap_or(f32::NAN))
        .collect();

    let mut image = encoder.new_image::<Gray32Float>(cols as u32, rows as u32)?;
    let gt = raster.transform();

    let scale = [gt.pixel_width, gt.pixel_height.abs(), 0.0];
    image
        .encoder()
        .write_tag(Tag::ModelPixelScaleTag, &scale[..])?;

    let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
    image
        .encoder()
        .write_tag(Tag::ModelTiepointTag, &tiepoint[..])?;

    let geokeys = geokey_directory(raster.crs());
    image
        .encoder()
        .write_tag(Tag::GeoKeyDirectoryTag, &geokeys[..])?;

    if let Some(nodata) = raster.nodata().and_then(RasterElement::to_f64) {
        let text = if nodata.is_nan() {
            "nan".to_string()
        } else {
            nodata.to_string()
        };
        image
            .encoder()
            .write_tag(Tag::GdalNodata, text.as_str())?;
    }

    image.write_data(&data)?;
    Ok(())
}

/// Minimal GeoKey directory: model type, raster-is-area, and the EPSG code
/// when one is known.
fn geokey_directory(crs: Option<&CRS>) -> Vec<u16> {
    let geographic = crs.is_some_and(CRS::is_geographic);
    let model_type = if geographic { 2 } else { 1 };
    let mut entries = vec![
        [KEY_MODEL_TYPE, 0, 1, model_type],
        [KEY_RASTER_TYPE, 0, 1, 1],
    ];
    if let Some(code) = crs.and_then(CRS::epsg).and_then(|c| u16::try_from(c).ok()) {
        let key = if geographic {
            KEY_GEOGRAPHIC_TYPE
        } else {
            KEY_PROJECTED_TYPE
        };
        entries.push([key, 0, 1, code]);
    }
    let mut keys = vec![1, 1, 0, entries.len() as u16];
    keys.extend(entries.into_iter().flatten());
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_geokey_directory_roundtrip_epsg() {
        let keys = geokey_directory(Some(&CRS::from_epsg(32636)));
        assert_eq!(keys[3], 3);
        assert_eq!(parse_epsg(&keys), Some(32636));

        let keys = geokey_directory(Some(&CRS::wgs84()));
        assert_eq!(parse_epsg(&keys), Some(4326));

        assert_eq!(parse_epsg(&geokey_directory(None)), None);
    }

    #[test]
    fn test_write_then_read_keeps_georeferencing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ndvi.tif");

        let mut raster: Raster<f64> = Raster::filled(4, 6, 0.25);
        raster.set(1, 2, f64::NAN).unwrap();
        raster.set_transform(GeoTransform::new(500_000.0, 4_600_000.0, 10.0, -10.0));
        raster.set_crs(Some(CRS::from_epsg(32636)));
        raster.set_nodata(Some(f64::NAN));
        write_geotiff(&raster, &path).unwrap();

        let back: Raster<f64> = read_geotiff(&path).unwrap();
        assert_eq!(back.shape(), (4, 6));
        assert_relative_eq!(back.transform().origin_x, 500_000.0);
        assert_relative_eq!(back.transform().pixel_height, -10.0);
        assert_eq!(back.crs().and_then(CRS::epsg), Some(32636));
        assert!(back.get(1, 2).unwrap().is_nan());
        assert_relative_eq!(back.get(0, 0).unwrap(), 0.25);
    }

    #[test]
    fn test_georeferencing_stored_in_geotiff_tags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dem.tif");

        let mut raster: Raster<f64> = Raster::filled(2, 2, 120.0);
        raster.set_transform(GeoTransform::new(500_000.0, 4_600_000.0, 10.0, -10.0));
        raster.set_crs(Some(CRS::from_epsg(32636)));
        raster.set_nodata(Some(-9999.0));
        write_geotiff(&raster, &path).unwrap();

        let mut decoder = Decoder::new(BufReader::new(File::open(&path).unwrap())).unwrap();
        assert_eq!(
            decoder.get_tag_f64_vec(Tag::ModelPixelScaleTag).unwrap(),
            vec![10.0, 10.0, 0.0]
        );
        let tiepoint = decoder.get_tag_f64_vec(Tag::ModelTiepointTag).unwrap();
        assert_relative_eq!(tiepoint[3], 500_000.0);
        assert_relative_eq!(tiepoint[4], 4_600_000.0);
        let keys = decoder.get_tag_u16_vec(Tag::GeoKeyDirectoryTag).unwrap();
        assert_eq!(parse_epsg(&keys), Some(32636));
        assert_eq!(decoder.get_tag_ascii_string(Tag::GdalNodata).unwrap().trim_matches(char::from(0)), "-9999");
    }

    #[test]
    fn test_mask_written_with_zero_nodata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mask.tif");

        let mut mask: Raster<u8> = Raster::new(3, 3);
        mask.set(1, 1, 1).unwrap();
        mask.set_nodata(Some(0));
        write_geotiff(&mask, &path).unwrap();

        let back: Raster<u8> = read_geotiff(&path).unwrap();
        assert_eq!(back.nodata(), Some(0));
        assert_eq!(back.valid_count(), 1);
    }
}
