use ndarray::{Array2, Axis};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tiff::encoder::{colortype::Gray32Float, TiffEncoder};
use tiff::tags::Tag;
use tracing::debug;

use crate::error::Result;
use crate::models::GridDefinition;

const MODEL_PIXEL_SCALE_TAG: u16 = 33550;
const MODEL_TIEPOINT_TAG: u16 = 33922;
const GEO_KEY_DIRECTORY_TAG: u16 = 34735;
const GDAL_NODATA_TAG: u16 = 42113;

const GT_MODEL_TYPE_KEY: u16 = 1024;
const GT_RASTER_TYPE_KEY: u16 = 1025;
const GEOGRAPHIC_TYPE_KEY: u16 = 2048;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;

/// Geo-referenced single-band float raster of a composite.
#[derive(Debug, Clone, Copy)]
pub struct GeoTiffWriter {
    epsg: u16,
}

impl GeoTiffWriter {
    pub fn new(epsg: u16) -> Self {
        Self { epsg }
    }

    #[rustfmt::skip]
    fn geo_keys(&self) -> [u16; 16] {
        [
            1, 1, 0, 3,
            GT_MODEL_TYPE_KEY, 0, 1, MODEL_TYPE_GEOGRAPHIC,
            GT_RASTER_TYPE_KEY, 0, 1, RASTER_PIXEL_IS_AREA,
            GEOGRAPHIC_TYPE_KEY, 0, 1, self.epsg,
        ]
    }

    pub fn write(&self, values: &Array2<f32>, grid: &GridDefinition, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // TIFF rows run north to south.
        let mut north_up = values.clone();
        north_up.invert_axis(Axis(0));
        let data: Vec<f32> = north_up.iter().copied().collect();

        let extent = grid.extent();
        let file = File::create(path)?;
        let mut encoder = TiffEncoder::new(BufWriter::new(file))?;
        let mut image = encoder.new_image::<Gray32Float>(grid.cols as u32, grid.rows as u32)?;

        image.encoder().write_tag(
            Tag::Unknown(MODEL_PIXEL_SCALE_TAG),
            &[grid.lon_step, grid.lat_step, 0.0][..],
        )?;
        image.encoder().write_tag(
            Tag::Unknown(MODEL_TIEPOINT_TAG),
            &[0.0, 0.0, 0.0, extent.lon_min, extent.lat_max, 0.0][..],
        )?;
        image
            .encoder()
            .write_tag(Tag::Unknown(GEO_KEY_DIRECTORY_TAG), &self.geo_keys()[..])?;
        image
            .encoder()
            .write_tag(Tag::Unknown(GDAL_NODATA_TAG), "nan")?;
        image.write_data(&data)?;

        debug!(path = %path.display(), epsg = self.epsg, "GeoTIFF written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use std::io::BufReader;
    use tempfile::TempDir;
    use tiff::decoder::{Decoder, DecodingResult};

    #[test]
    fn test_geotiff_is_north_up_and_georeferenced() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("NO2_2023_05_08-2023_05_15.tif");
        let grid = GridDefinition::new(2, 3, 5.0, 95.0, 0.5, 0.25);
        let values = array![[1.0, 2.0, 3.0], [4.0, 5.0, f32::NAN]];

        GeoTiffWriter::new(4326).write(&values, &grid, &path).unwrap();

        let mut decoder = Decoder::new(BufReader::new(File::open(&path).unwrap())).unwrap();
        assert_eq!(decoder.dimensions().unwrap(), (3, 2));

        let tiepoint = decoder
            .get_tag_f64_vec(Tag::Unknown(MODEL_TIEPOINT_TAG))
            .unwrap();
        assert_eq!(tiepoint, vec![0.0, 0.0, 0.0, 95.0, 6.0, 0.0]);
        let scale = decoder
            .get_tag_f64_vec(Tag::Unknown(MODEL_PIXEL_SCALE_TAG))
            .unwrap();
        assert_eq!(scale, vec![0.25, 0.5, 0.0]);
        let keys = decoder
            .get_tag_u16_vec(Tag::Unknown(GEO_KEY_DIRECTORY_TAG))
            .unwrap();
        assert_eq!(keys[15], 4326);

        match decoder.read_image().unwrap() {
            DecodingResult::F32(data) => {
                assert_eq!(&data[..2], &[4.0, 5.0]);
                assert!(data[2].is_nan());
                assert_eq!(&data[3..], &[1.0, 2.0, 3.0]);
            }
            other => panic!("unexpected sample format {:?}", std::mem::discriminant(&other)),
        }
    }
}
