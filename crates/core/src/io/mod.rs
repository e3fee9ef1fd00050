//! GeoTIFF reading and writing for stock, land-cover and composite rasters

mod native;

pub use native::{
    read_geotiff, read_geotiff_from_buffer, write_geotiff, write_geotiff_to_buffer,
    write_rgba_geotiff, GeoTiffOptions,
};
