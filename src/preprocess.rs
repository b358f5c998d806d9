use std::path::Path;

use image::{imageops, GrayImage};
use imageproc::{contrast::threshold, filter::gaussian_blur_f32};
use log::debug;
use logging_timer::time;

use crate::config::PreprocessOptions;
use crate::evaluate::EvaluateError;

/// Foreground/background labels for every pixel of a sheet image. Foreground
/// (dark ink on the original) is stored as 255, background as 0.
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryMask(GrayImage);

impl BinaryMask {
    pub fn from_gray(img: GrayImage) -> Self {
        Self(img)
    }

    pub fn image(&self) -> &GrayImage {
        &self.0
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.0.dimensions()
    }
}

/// Loads a sheet image from disk as 8-bit grayscale.
#[time]
pub fn load_sheet_image(image_path: &Path) -> Result<GrayImage, EvaluateError> {
    let img = match image::open(image_path) {
        Ok(img) => img.into_luma8(),
        Err(e) => {
            return Err(EvaluateError::InvalidImage(
                image_path.display().to_string(),
                e.to_string(),
            ))
        }
    };
    ensure_not_empty(img, &image_path.display().to_string())
}

/// Loads a sheet image from an in-memory upload as 8-bit grayscale.
#[time]
pub fn load_sheet_image_from_bytes(bytes: &[u8]) -> Result<GrayImage, EvaluateError> {
    let source = "<memory>";
    let img = match image::load_from_memory(bytes) {
        Ok(img) => img.into_luma8(),
        Err(e) => {
            return Err(EvaluateError::InvalidImage(
                source.to_string(),
                e.to_string(),
            ))
        }
    };
    ensure_not_empty(img, source)
}

fn ensure_not_empty(img: GrayImage, source: &str) -> Result<GrayImage, EvaluateError> {
    if img.width() == 0 || img.height() == 0 {
        return Err(EvaluateError::InvalidImage(
            source.to_string(),
            "image has no pixels".to_string(),
        ));
    }
    Ok(img)
}

/// Smooths the image and marks every pixel at or below the configured
/// intensity as foreground.
#[time]
pub fn binarize(img: &GrayImage, options: &PreprocessOptions) -> BinaryMask {
    let sigma = options.blur_sigma();
    debug!(
        "binarizing {}x{} image (kernel {}, sigma {:.2}, threshold {})",
        img.width(),
        img.height(),
        options.blur_kernel_size,
        sigma,
        options.threshold
    );
    let blurred = gaussian_blur_f32(img, sigma);
    let mut mask = threshold(&blurred, options.threshold);
    imageops::invert(&mut mask);
    BinaryMask(mask)
}

#[cfg(test)]
mod tests {
    use image::{ImageOutputFormat, Luma};
    use imageproc::drawing::draw_filled_rect_mut;
    use imageproc::rect::Rect;

    use super::*;
    use crate::image_utils::{count_pixels, BLACK, WHITE};

    #[test]
    fn test_binarize_marks_dark_regions_as_foreground() {
        let mut img = GrayImage::from_pixel(60, 60, WHITE);
        draw_filled_rect_mut(&mut img, Rect::at(20, 20).of_size(20, 20), BLACK);

        let mask = binarize(&img, &PreprocessOptions::default());
        assert_eq!(mask.dimensions(), (60, 60));
        assert_eq!(*mask.image().get_pixel(30, 30), WHITE);
        assert_eq!(*mask.image().get_pixel(2, 2), BLACK);
        assert!(mask
            .image()
            .pixels()
            .all(|p| *p == WHITE || *p == BLACK));
    }

    #[test]
    fn test_binarize_respects_threshold() {
        let img = GrayImage::from_pixel(20, 20, Luma([130]));
        let options = PreprocessOptions::default();
        let mask = binarize(&img, &options);
        assert_eq!(count_pixels(mask.image(), &WHITE), 0);

        let img = GrayImage::from_pixel(20, 20, Luma([110]));
        let mask = binarize(&img, &options);
        assert_eq!(count_pixels(mask.image(), &WHITE), 400);
    }

    #[test]
    fn test_load_sheet_image_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.png");
        assert!(matches!(
            load_sheet_image(&missing),
            Err(EvaluateError::InvalidImage(..))
        ));

        let garbage = dir.path().join("garbage.png");
        std::fs::write(&garbage, b"definitely not a png").unwrap();
        assert!(matches!(
            load_sheet_image(&garbage),
            Err(EvaluateError::InvalidImage(..))
        ));
    }

    #[test]
    fn test_load_sheet_image_from_bytes_converts_to_gray() {
        let rgb = image::RgbImage::from_pixel(8, 4, image::Rgb([200, 200, 200]));
        let mut bytes = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(rgb)
            .write_to(&mut bytes, ImageOutputFormat::Png)
            .unwrap();

        let gray = load_sheet_image_from_bytes(bytes.get_ref()).unwrap();
        assert_eq!(gray.dimensions(), (8, 4));
        assert_eq!(gray.get_pixel(0, 0).0[0], 200);

        assert!(matches!(
            load_sheet_image_from_bytes(&[]),
            Err(EvaluateError::InvalidImage(..))
        ));
    }
}
