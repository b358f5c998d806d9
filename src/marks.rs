use image::imageops;
use log::debug;
use logging_timer::time;

use crate::config::MarkThresholds;
use crate::image_utils::{ratio, WHITE};
use crate::preprocess::BinaryMask;
use crate::types::{BubbleBox, MarkedAnswers, QuestionOptionMap};

/// Fraction of foreground pixels under `bubble`. The box is clipped to the
/// mask; a box entirely outside it has a ratio of zero.
pub fn fill_ratio(mask: &BinaryMask, bubble: &BubbleBox) -> f32 {
    let (width, height) = mask.dimensions();
    if bubble.x >= width || bubble.y >= height {
        return 0.0;
    }
    let roi_width = bubble.width.min(width - bubble.x);
    let roi_height = bubble.height.min(height - bubble.y);
    let roi = imageops::crop_imm(mask.image(), bubble.x, bubble.y, roi_width, roi_height).to_image();
    ratio(&roi, &WHITE)
}

pub fn is_marked(mask: &BinaryMask, bubble: &BubbleBox, thresholds: &MarkThresholds) -> bool {
    fill_ratio(mask, bubble) > thresholds.fill_ratio
}

/// Picks the first marked option of every question, checking options in
/// label order. Questions with no marked option are left out. Later marks in
/// the same question are not examined.
#[time]
pub fn resolve_marked_answers(
    mask: &BinaryMask,
    question_map: &QuestionOptionMap,
    thresholds: &MarkThresholds,
) -> MarkedAnswers {
    let mut marked = MarkedAnswers::new();
    for (question, options) in question_map {
        if let Some((label, _)) = options
            .iter()
            .find(|(_, bubble)| is_marked(mask, bubble, thresholds))
        {
            marked.insert(*question, *label);
        }
    }

    debug!(
        "{} of {} questions answered",
        marked.len(),
        question_map.len()
    );
    marked
}
