//! GeoTIFF reading/writing on top of the `tiff` crate
//!
//! Only north-up grids are supported: the transform is taken from the
//! ModelPixelScale and ModelTiepoint tags, the EPSG code from the
//! GeoKeyDirectory and the no-data value from the GDAL_NODATA ascii tag.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};
use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor};
use ndarray::Array3;
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::{Gray32Float, RGBA8};
use tiff::encoder::{DirectoryEncoder, TiffEncoder, TiffKindStandard};
use tiff::tags::Tag;

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GDAL_NODATA: u16 = 42113;

const GT_MODEL_TYPE_KEY: u16 = 1024;
const GT_RASTER_TYPE_KEY: u16 = 1025;
const GEOGRAPHIC_TYPE_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_KEY: u16 = 3072;

/// Options for writing GeoTIFF files
#[derive(Debug, Clone, Default)]
pub struct GeoTiffOptions {
    /// EPSG code to record when the raster carries no CRS
    pub fallback_epsg: Option<u32>,
}

/// Read the first band of a GeoTIFF file into a Raster
pub fn read_geotiff<T, P>(path: P) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::open(path.as_ref())?;
    decode_geotiff(BufReader::new(file))
}

/// Read a GeoTIFF from an in-memory buffer into a Raster
pub fn read_geotiff_from_buffer<T>(data: &[u8]) -> Result<Raster<T>>
where
    T: RasterElement,
{
    decode_geotiff(Cursor::new(data))
}

fn decode_geotiff<T, R>(reader: R) -> Result<Raster<T>>
where
    T: RasterElement,
    R: std::io::Read + std::io::Seek,
{
    let mut decoder =
        Decoder::new(reader).map_err(|e| Error::Other(format!("TIFF decode error: {}", e)))?;

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| Error::Other(format!("Cannot read dimensions: {}", e)))?;
    let rows = height as usize;
    let cols = width as usize;

    let result = decoder
        .read_image()
        .map_err(|e| Error::Other(format!("Cannot read image data: {}", e)))?;

    let data: Vec<T> = match result {
        DecodingResult::F32(buf) => convert(&buf),
        DecodingResult::F64(buf) => convert(&buf),
        DecodingResult::U8(buf) => convert(&buf),
        DecodingResult::U16(buf) => convert(&buf),
        DecodingResult::U32(buf) => convert(&buf),
        DecodingResult::I8(buf) => convert(&buf),
        DecodingResult::I16(buf) => convert(&buf),
        DecodingResult::I32(buf) => convert(&buf),
        _ => {
            return Err(Error::UnsupportedDataType(
                "Unsupported TIFF pixel format".to_string(),
            ))
        }
    };

    if data.len() != rows * cols {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }

    let mut raster = Raster::from_vec(data, rows, cols)?;

    raster.set_transform(read_geotransform(&mut decoder)?);
    raster.set_crs(read_epsg(&mut decoder).map(CRS::from_epsg));
    if let Some(nodata) = read_nodata(&mut decoder) {
        raster.set_nodata(Some(T::from_f64_or_nodata(nodata)));
    }

    Ok(raster)
}

fn convert<S, T>(buf: &[S]) -> Vec<T>
where
    S: num_traits::ToPrimitive + Copy,
    T: RasterElement,
{
    buf.iter()
        .map(|&v| v.to_f64().map_or_else(T::default_nodata, T::from_f64_or_nodata))
        .collect()
}

/// GeoTIFF tags are parsed into named variants, so look them up by code
fn geo_tag(code: u16) -> Tag {
    Tag::from_u16_exhaustive(code)
}

/// Transform from ModelPixelScale and ModelTiepoint. Both tags are required:
/// a layer without them cannot be placed on the map.
fn read_geotransform<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
) -> Result<GeoTransform> {
    let scale = decoder
        .find_tag(geo_tag(MODEL_PIXEL_SCALE))
        .ok()
        .flatten()
        .and_then(|v| v.into_f64_vec().ok())
        .filter(|v| v.len() >= 2 && v[0] > 0.0 && v[1] > 0.0)
        .ok_or(Error::MissingGeoTag("ModelPixelScale"))?;
    let tiepoint = decoder
        .find_tag(geo_tag(MODEL_TIEPOINT))
        .ok()
        .flatten()
        .and_then(|v| v.into_f64_vec().ok())
        .filter(|v| v.len() >= 6)
        .ok_or(Error::MissingGeoTag("ModelTiepoint"))?;

    // tiepoint: [I, J, K, X, Y, Z], scale: [ScaleX, ScaleY, ScaleZ]
    let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
    let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
    Ok(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]))
}

/// EPSG code from GeographicTypeGeoKey or ProjectedCSTypeGeoKey
fn read_epsg<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Option<u32> {
    let keys = decoder.get_tag_u32_vec(geo_tag(GEO_KEY_DIRECTORY)).ok()?;
    if keys.len() < 4 {
        return None;
    }
    let count = keys[3] as usize;
    keys[4..]
        .chunks_exact(4)
        .take(count)
        .find(|entry| {
            let id = entry[0] as u16;
            (id == GEOGRAPHIC_TYPE_KEY || id == PROJECTED_CS_TYPE_KEY) && entry[1] == 0
        })
        .map(|entry| entry[3])
}

fn read_nodata<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Option<f64> {
    let text = decoder.get_tag_ascii_string(geo_tag(GDAL_NODATA)).ok()?;
    text.trim_matches(char::from(0)).trim().parse::<f64>().ok()
}

/// Write a Raster to a GeoTIFF file as 32-bit float
pub fn write_geotiff<T, P>(
    raster: &Raster<T>,
    path: P,
    options: Option<GeoTiffOptions>,
) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::create(path.as_ref())?;
    encode_geotiff(raster, BufWriter::new(file), &options.unwrap_or_default())
}

/// Write a Raster to an in-memory GeoTIFF buffer
pub fn write_geotiff_to_buffer<T>(
    raster: &Raster<T>,
    options: Option<GeoTiffOptions>,
) -> Result<Vec<u8>>
where
    T: RasterElement,
{
    let mut buf = Vec::new();
    encode_geotiff(raster, Cursor::new(&mut buf), &options.unwrap_or_default())?;
    Ok(buf)
}

fn encode_geotiff<T, W>(raster: &Raster<T>, writer: W, options: &GeoTiffOptions) -> Result<()>
where
    T: RasterElement,
    W: std::io::Write + std::io::Seek,
{
    let mut encoder =
        TiffEncoder::new(writer).map_err(|e| Error::Other(format!("TIFF encoder error: {}", e)))?;

    let (rows, cols) = raster.shape();

    // No-data cells are written as NaN whatever their sentinel was
    let data: Vec<f32> = raster
        .data()
        .iter()
        .map(|&v| {
            if raster.is_nodata(v) {
                f32::NAN
            } else {
                v.to_f64().map_or(f32::NAN, |x| x as f32)
            }
        })
        .collect();

    let mut image = encoder
        .new_image::<Gray32Float>(cols as u32, rows as u32)
        .map_err(|e| Error::Other(format!("Cannot create TIFF image: {}", e)))?;

    let epsg = raster.crs().and_then(CRS::epsg).or(options.fallback_epsg);
    write_georeferencing(image.encoder(), raster.transform(), epsg)?;

    image
        .encoder()
        .write_tag(geo_tag(GDAL_NODATA), "nan")
        .map_err(|e| Error::Other(format!("Cannot write nodata tag: {}", e)))?;

    image
        .write_data(&data)
        .map_err(|e| Error::Other(format!("Cannot write image data: {}", e)))?;

    Ok(())
}

/// Write an RGBA rendering `(row, col, 4)` as an 8-bit georeferenced TIFF
pub fn write_rgba_geotiff<P: AsRef<Path>>(
    rgba: &Array3<u8>,
    transform: &GeoTransform,
    epsg: Option<u32>,
    path: P,
) -> Result<()> {
    let (rows, cols, channels) = rgba.dim();
    if channels != 4 {
        return Err(Error::InvalidParameter {
            name: "rgba",
            value: channels.to_string(),
            reason: "expected 4 channels".into(),
        });
    }
    let file = File::create(path.as_ref())?;
    let mut encoder = TiffEncoder::new(BufWriter::new(file))
        .map_err(|e| Error::Other(format!("TIFF encoder error: {}", e)))?;
    let mut image = encoder
        .new_image::<RGBA8>(cols as u32, rows as u32)
        .map_err(|e| Error::Other(format!("Cannot create TIFF image: {}", e)))?;
    write_georeferencing(image.encoder(), transform, epsg)?;

    let data: Vec<u8> = rgba.iter().copied().collect();
    image
        .write_data(&data)
        .map_err(|e| Error::Other(format!("Cannot write image data: {}", e)))?;
    Ok(())
}

fn write_georeferencing<W>(
    dir: &mut DirectoryEncoder<'_, W, TiffKindStandard>,
    gt: &GeoTransform,
    epsg: Option<u32>,
) -> Result<()>
where
    W: std::io::Write + std::io::Seek,
{
    let scale = [gt.pixel_width, gt.pixel_height.abs(), 0.0];
    dir.write_tag(geo_tag(MODEL_PIXEL_SCALE), &scale[..])
        .map_err(|e| Error::Other(format!("Cannot write scale tag: {}", e)))?;

    let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
    dir.write_tag(geo_tag(MODEL_TIEPOINT), &tiepoint[..])
        .map_err(|e| Error::Other(format!("Cannot write tiepoint tag: {}", e)))?;

    let geokeys = geokey_directory(epsg);
    dir.write_tag(geo_tag(GEO_KEY_DIRECTORY), geokeys.as_slice())
        .map_err(|e| Error::Other(format!("Cannot write geokey tag: {}", e)))?;
    Ok(())
}

/// GeoKeyDirectory with model type, raster type and, when known, the EPSG code.
///
/// EPSG 4000..5000 is treated as geographic, anything else as projected.
fn geokey_directory(epsg: Option<u32>) -> Vec<u16> {
    let geographic = epsg.map_or(true, |c| (4000..5000).contains(&c));
    let model_type = if geographic { 2 } else { 1 };

    let mut keys: Vec<u16> = vec![
        GT_MODEL_TYPE_KEY, 0, 1, model_type,
        GT_RASTER_TYPE_KEY, 0, 1, 1, // RasterPixelIsArea
    ];
    if let Some(code) = epsg.and_then(|c| u16::try_from(c).ok()) {
        let key = if geographic { GEOGRAPHIC_TYPE_KEY } else { PROJECTED_CS_TYPE_KEY };
        keys.extend_from_slice(&[key, 0, 1, code]);
    }
    let count = (keys.len() / 4) as u16;
    let mut directory = vec![1, 1, 0, count];
    directory.extend(keys);
    directory
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::BBox;

    #[test]
    fn test_stock_raster_keeps_georeferencing() {
        let mut stock = Raster::from_vec(vec![12.5, f64::NAN, -3.0, 40.0], 2, 2).unwrap();
        stock.set_transform(GeoTransform::new(113.5, -1.9, 0.25, -0.25));
        stock.set_crs(Some(CRS::wgs84()));

        let bytes = write_geotiff_to_buffer(&stock, None).unwrap();
        let back: Raster<f64> = read_geotiff_from_buffer(&bytes).unwrap();

        assert_eq!(back.shape(), (2, 2));
        assert_eq!(back.get(0, 0).unwrap(), 12.5);
        assert!(back.get(0, 1).unwrap().is_nan());
        assert_eq!(back.transform(), stock.transform());
        assert_eq!(back.crs().and_then(CRS::epsg), Some(4326));
    }

    #[test]
    fn test_class_raster_nan_becomes_integer_nodata() {
        let mut classes: Raster<i32> = Raster::from_vec(vec![10, 60, 0, 190], 2, 2).unwrap();
        classes.set_nodata(Some(0));

        let bytes = write_geotiff_to_buffer(&classes, None).unwrap();
        let back: Raster<i32> = read_geotiff_from_buffer(&bytes).unwrap();

        assert_eq!(back.get(0, 1).unwrap(), 60);
        assert_eq!(back.get(1, 0).unwrap(), 0);
        assert_eq!(back.get(1, 1).unwrap(), 190);
    }

    #[test]
    fn test_georeferencing_survives_a_round_trip_at_fine_resolution() {
        let mut stock: Raster<f64> = Raster::filled(4, 4, 30.0);
        stock.set_transform(GeoTransform::new(113.0, -1.0, 0.01, -0.01));
        let before = stock.clip(&BBox::new(113.0, -1.02, 113.02, -1.0));
        assert_eq!(before.shape(), (2, 2));

        let bytes = write_geotiff_to_buffer(&stock, None).unwrap();
        let back: Raster<f64> = read_geotiff_from_buffer(&bytes).unwrap();
        assert_eq!(back.transform().origin_x, 113.0);
        assert_eq!(back.transform().origin_y, -1.0);
        assert_eq!(back.transform().pixel_width, 0.01);
        assert_eq!(back.transform().pixel_height, -0.01);
        assert_eq!(back.clip(&BBox::new(113.0, -1.02, 113.02, -1.0)).shape(), (2, 2));
    }

    #[test]
    fn test_plain_tiff_without_georeferencing_is_rejected() {
        let mut buf = Vec::new();
        {
            let mut encoder = TiffEncoder::new(Cursor::new(&mut buf)).unwrap();
            encoder
                .write_image::<Gray32Float>(2, 2, &[1.0f32, 2.0, 3.0, 4.0])
                .unwrap();
        }
        let result: Result<Raster<f64>> = read_geotiff_from_buffer(&buf);
        assert!(matches!(result, Err(Error::MissingGeoTag("ModelPixelScale"))));
    }

    #[test]
    fn test_geokey_directory_layout() {
        let keys = geokey_directory(Some(4326));
        assert_eq!(&keys[..4], &[1, 1, 0, 3]);
        assert_eq!(&keys[12..], &[GEOGRAPHIC_TYPE_KEY, 0, 1, 4326]);

        let projected = geokey_directory(Some(32750));
        assert_eq!(projected[7], 1);
        assert_eq!(&projected[12..], &[PROJECTED_CS_TYPE_KEY, 0, 1, 32750]);
    }
}
