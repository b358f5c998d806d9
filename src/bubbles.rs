use imageproc::contours::{find_contours, BorderType};
use log::debug;
use logging_timer::time;

use crate::config::BubbleAreaBand;
use crate::geometry::{contour_area, contour_bounding_box};
use crate::preprocess::BinaryMask;
use crate::types::BubbleBox;

/// Finds the outermost foreground shapes whose enclosed area falls within
/// `band`, ordered by x and then y.
#[time]
pub fn find_bubble_shapes(mask: &BinaryMask, band: &BubbleAreaBand) -> Vec<BubbleBox> {
    let contours = find_contours::<i32>(mask.image());

    let mut bubbles = contours
        .iter()
        .filter(|contour| contour.border_type == BorderType::Outer && contour.parent.is_none())
        .filter_map(|contour| {
            let area = contour_area(&contour.points);
            if !band.contains(area) {
                return None;
            }
            contour_bounding_box(&contour.points)
        })
        .collect::<Vec<BubbleBox>>();

    bubbles.sort_by_key(|bubble| (bubble.x, bubble.y));

    debug!(
        "kept {} of {} contours as bubbles (area band {}..{})",
        bubbles.len(),
        contours.len(),
        band.min_area,
        band.max_area
    );

    bubbles
}
