use std::path::Path;

use image::DynamicImage;

use crate::{
    error::{FramepipeError, FramepipeResult},
    source::{PackedPlane, PixelBounds, PixelModel, PixelQuery, SourceImage, WidePixel},
};

/// Decodes an image file into a [`SourceImage`].
///
/// Decode failures (unreadable file, unsupported format) are not retried;
/// they surface as [`FramepipeError::Decode`].
pub fn decode_image(path: impl AsRef<Path>) -> FramepipeResult<SourceImage> {
    let path = path.as_ref();
    let reader = image::ImageReader::open(path)
        .map_err(|e| FramepipeError::decode(format!("open '{}': {e}", path.display())))?;
    let img = reader
        .decode()
        .map_err(|e| FramepipeError::decode(format!("decode '{}': {e}", path.display())))?;
    Ok(source_from_dynamic(img))
}

/// Maps a decoded [`DynamicImage`] onto the closed pixel-model set.
///
/// Variants without a dedicated path fall through to the generic per-pixel
/// arm; the mapping never fails.
pub fn source_from_dynamic(img: DynamicImage) -> SourceImage {
    let (width, height) = (img.width(), img.height());
    let model = match img {
        DynamicImage::ImageRgba8(buf) => PixelModel::Rgba8(PackedPlane {
            stride: width as usize * 4,
            pix: buf.into_raw(),
        }),
        DynamicImage::ImageRgba16(buf) => PixelModel::Rgba16(PackedPlane {
            stride: width as usize * 8,
            pix: be_bytes(buf.into_raw()),
        }),
        DynamicImage::ImageLuma8(buf) => PixelModel::Gray8(PackedPlane {
            stride: width as usize,
            pix: buf.into_raw(),
        }),
        DynamicImage::ImageLuma16(buf) => PixelModel::Gray16(PackedPlane {
            stride: width as usize * 2,
            pix: be_bytes(buf.into_raw()),
        }),
        other => PixelModel::Generic(Box::new(DynamicQuery(other))),
    };
    SourceImage::new(PixelBounds::of(width, height), model)
}

fn be_bytes(samples: Vec<u16>) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for s in samples {
        out.extend_from_slice(&s.to_be_bytes());
    }
    out
}

struct DynamicQuery(DynamicImage);

impl PixelQuery for DynamicQuery {
    fn pixel(&self, x: u32, y: u32) -> WidePixel {
        use image::GenericImageView;
        WidePixel::from_straight_rgba8(self.0.get_pixel(x, y).0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{convert::convert, parallel::Partitioner};

    #[test]
    fn rgba8_maps_to_the_packed_fast_path() {
        let buf = image::RgbaImage::from_raw(2, 1, vec![1, 2, 3, 255, 4, 5, 6, 255]).unwrap();
        let src = source_from_dynamic(DynamicImage::ImageRgba8(buf));
        assert!(matches!(src.model(), PixelModel::Rgba8(_)));
        assert_eq!(src.bounds().dimensions(), (2, 1));

        let frame = convert(&src, &Partitioner::serial());
        assert_eq!(frame.data, vec![1, 2, 3, 255, 4, 5, 6, 255]);
    }

    #[test]
    fn luma16_repacks_big_endian() {
        let buf = image::ImageBuffer::<image::Luma<u16>, _>::from_raw(1, 1, vec![0xAB01u16])
            .unwrap();
        let src = source_from_dynamic(DynamicImage::ImageLuma16(buf));
        let frame = convert(&src, &Partitioner::serial());
        assert_eq!(frame.data, vec![0xAB, 0xAB, 0xAB, 0xFF]);
    }

    #[test]
    fn rgb8_falls_back_to_the_generic_arm() {
        let buf = image::RgbImage::from_raw(1, 1, vec![10, 20, 30]).unwrap();
        let src = source_from_dynamic(DynamicImage::ImageRgb8(buf));
        assert!(matches!(src.model(), PixelModel::Generic(_)));

        let frame = convert(&src, &Partitioner::serial());
        assert_eq!(frame.data, vec![10, 20, 30, 255]);
    }

    #[test]
    fn missing_file_is_a_decode_error() {
        let err = decode_image("definitely/not/here.png").unwrap_err();
        assert!(matches!(err, FramepipeError::Decode(_)));
    }
}
