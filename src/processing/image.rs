use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, RgbaImage};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};

use crate::models::RawFrame;
use crate::utils::ScanError;

/// Region-of-interest and binarization settings for one scan session.
#[derive(Debug, Clone)]
pub struct PreprocessOptions {
    /// Height of the band kept at the bottom of the frame, as a fraction
    /// of frame height. The machine-readable zone sits in the bottom
    /// third of a document.
    pub band_ratio: f32,
    /// Fraction of the width trimmed from each side.
    pub horizontal_margin: f32,
    /// Integer upscale factor applied before recognition. Small glyphs
    /// recognize poorly below a minimum pixel height.
    pub upscale: u32,
    /// Fixed luminance threshold; below is black, at or above is white.
    pub threshold: u8,
    /// Optional rotation correction in degrees, for capture rigs with a
    /// known tilt.
    pub rotate_degrees: f32,
    /// Skip the band crop entirely. Used for uploads already cropped to
    /// the document.
    pub full_frame: bool,
}

impl Default for PreprocessOptions {
    fn default() -> Self {
        PreprocessOptions {
            band_ratio: 0.32,
            horizontal_margin: 0.05,
            upscale: 2,
            threshold: 140,
            rotate_degrees: 0.0,
            full_frame: false,
        }
    }
}

pub struct Preprocessor;

impl Preprocessor {
    /// Turn a captured frame into the binarized raster handed to OCR.
    /// Crop to the MRZ band, upscale, convert to luminance, optionally
    /// rotate, threshold. Fully deterministic for a given input and
    /// options.
    pub fn preprocess(
        frame: &RawFrame,
        options: &PreprocessOptions,
    ) -> Result<GrayImage, ScanError> {
        if frame.width() == 0 || frame.height() == 0 {
            return Err(ScanError::InvalidInput(
                "cannot preprocess a zero-size frame".to_string(),
            ));
        }

        let rgba = frame.to_rgba_image()?;
        let region = if options.full_frame {
            rgba
        } else {
            Self::crop_band(&rgba, options)
        };

        let region = if options.upscale > 1 {
            imageops::resize(
                &region,
                region.width() * options.upscale,
                region.height() * options.upscale,
                FilterType::CatmullRom,
            )
        } else {
            region
        };

        let mut gray = GrayImage::from_fn(region.width(), region.height(), |x, y| {
            let p = region.get_pixel(x, y);
            let luma =
                0.299 * f32::from(p[0]) + 0.587 * f32::from(p[1]) + 0.114 * f32::from(p[2]);
            Luma([luma.round() as u8])
        });

        if options.rotate_degrees != 0.0 {
            gray = rotate_about_center(
                &gray,
                options.rotate_degrees.to_radians(),
                Interpolation::Bilinear,
                Luma([255u8]),
            );
        }

        for pixel in gray.pixels_mut() {
            pixel[0] = if pixel[0] < options.threshold { 0 } else { 255 };
        }
        Ok(gray)
    }

    fn crop_band(rgba: &RgbaImage, options: &PreprocessOptions) -> RgbaImage {
        let (width, height) = rgba.dimensions();
        let ratio = options.band_ratio.clamp(0.05, 1.0);
        let band_height = ((height as f32 * ratio) as u32).clamp(1, height);
        let margin = (width as f32 * options.horizontal_margin.clamp(0.0, 0.45)) as u32;
        let band_width = (width - 2 * margin).max(1);
        imageops::crop_imm(rgba, margin, height - band_height, band_width, band_height)
            .to_image()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_frame(width: u32, height: u32) -> RawFrame {
        let mut pixels = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            for x in 0..width {
                let v = ((x * 7 + y * 13) % 256) as u8;
                pixels.extend_from_slice(&[v, v.wrapping_add(40), v.wrapping_add(80), 255]);
            }
        }
        RawFrame::from_rgba(width, height, pixels).unwrap()
    }

    #[test]
    fn zero_size_frame_is_invalid_input() {
        let frame = RawFrame::from_rgba(0, 0, Vec::new()).unwrap();
        let err = Preprocessor::preprocess(&frame, &PreprocessOptions::default());
        assert!(matches!(err, Err(ScanError::InvalidInput(_))));
    }

    #[test]
    fn preprocessing_is_deterministic() {
        let frame = gradient_frame(40, 40);
        let options = PreprocessOptions::default();
        let first = Preprocessor::preprocess(&frame, &options).unwrap();
        let second = Preprocessor::preprocess(&frame, &options).unwrap();
        assert_eq!(first.as_raw(), second.as_raw());
    }

    #[test]
    fn band_crop_geometry() {
        let frame = gradient_frame(100, 50);
        let options = PreprocessOptions {
            band_ratio: 0.3,
            horizontal_margin: 0.05,
            upscale: 1,
            ..PreprocessOptions::default()
        };
        let raster = Preprocessor::preprocess(&frame, &options).unwrap();
        assert_eq!(raster.dimensions(), (90, 15));
    }

    #[test]
    fn upscale_doubles_dimensions() {
        let frame = gradient_frame(10, 10);
        let options = PreprocessOptions {
            upscale: 2,
            full_frame: true,
            ..PreprocessOptions::default()
        };
        let raster = Preprocessor::preprocess(&frame, &options).unwrap();
        assert_eq!(raster.dimensions(), (20, 20));
    }

    #[test]
    fn threshold_is_inclusive_at_white() {
        let at = RawFrame::from_rgba(1, 1, vec![140, 140, 140, 255]).unwrap();
        let below = RawFrame::from_rgba(1, 1, vec![139, 139, 139, 255]).unwrap();
        let options = PreprocessOptions {
            upscale: 1,
            full_frame: true,
            threshold: 140,
            ..PreprocessOptions::default()
        };
        let white = Preprocessor::preprocess(&at, &options).unwrap();
        let black = Preprocessor::preprocess(&below, &options).unwrap();
        assert_eq!(white.get_pixel(0, 0)[0], 255);
        assert_eq!(black.get_pixel(0, 0)[0], 0);
    }

    #[test]
    fn output_is_strictly_two_level() {
        let frame = gradient_frame(32, 32);
        let raster = Preprocessor::preprocess(&frame, &PreprocessOptions::default()).unwrap();
        assert!(raster.pixels().all(|p| p[0] == 0 || p[0] == 255));
    }
}
