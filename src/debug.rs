use std::path::{Path, PathBuf};

use image::{DynamicImage, GrayImage, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use log::{debug, warn};

use crate::image_utils::{DARK_GREEN, RAINBOW};
use crate::types::{BubbleBox, MarkedAnswers, QuestionOptionMap};

/// Creates a path for a debug image.
pub fn debug_image_path(base: &Path, label: &str) -> PathBuf {
    let mut result = PathBuf::from(base);
    result.set_file_name(format!(
        "{}_debug_{}.png",
        base.file_stem().unwrap_or_default().to_string_lossy(),
        label
    ));
    result
}

/// Writes annotated copies of a sheet image next to the original, or does
/// nothing when disabled.
pub struct ImageDebugWriter {
    input: Option<(PathBuf, GrayImage)>,
}

impl ImageDebugWriter {
    pub fn new(input_path: PathBuf, input_image: GrayImage) -> Self {
        Self {
            input: Some((input_path, input_image)),
        }
    }

    pub fn disabled() -> Self {
        Self { input: None }
    }

    /// Draws on a color copy of the input and saves it under `label`.
    /// Returns the path written, if any.
    pub fn write(&self, label: &str, draw: impl FnOnce(&mut RgbImage)) -> Option<PathBuf> {
        let (input_path, input_image) = self.input.as_ref()?;
        let mut canvas = DynamicImage::ImageLuma8(input_image.clone()).into_rgb8();
        draw(&mut canvas);

        let path = debug_image_path(input_path, label);
        match canvas.save(&path) {
            Ok(()) => {
                debug!("wrote debug image {}", path.display());
                Some(path)
            }
            Err(e) => {
                warn!("could not write debug image {}: {}", path.display(), e);
                None
            }
        }
    }
}

/// Outlines every detected bubble, cycling colors per question.
pub fn draw_bubbles_debug_image_mut(canvas: &mut RgbImage, bubbles: &[BubbleBox], group_size: usize) {
    for (i, bubble) in bubbles.iter().enumerate() {
        let color = RAINBOW[(i / group_size.max(1)) % RAINBOW.len()];
        draw_hollow_rect_mut(canvas, (*bubble).into(), color);
    }
}

/// Fills the bubble chosen for each answered question.
pub fn draw_marked_answers_debug_image_mut(
    canvas: &mut RgbImage,
    question_map: &QuestionOptionMap,
    marked: &MarkedAnswers,
) {
    for (question, label) in marked {
        let chosen = question_map
            .get(question)
            .and_then(|options| options.iter().find(|(option, _)| option == label));
        if let Some((_, bubble)) = chosen {
            draw_filled_rect_mut(canvas, (*bubble).into(), DARK_GREEN);
        }
    }
}
