//! Synthetic answer sheets for tests.

use image::GrayImage;
use imageproc::drawing::draw_filled_circle_mut;

use crate::image_utils::{BLACK, WHITE};

/// Bubble placement for a rendered sheet. Each question is a column of
/// `options` bubbles stacked top to bottom.
#[derive(Debug, Clone)]
pub struct SheetLayout {
    pub options: u32,
    pub margin: u32,
    pub spacing: u32,
    pub radius: i32,
    pub hole_radius: i32,
}

impl Default for SheetLayout {
    fn default() -> Self {
        Self {
            options: 5,
            margin: 30,
            spacing: 40,
            radius: 11,
            hole_radius: 8,
        }
    }
}

impl SheetLayout {
    pub fn center(&self, question: u32, option: u32) -> (i32, i32) {
        (
            (self.margin + question * self.spacing) as i32,
            (self.margin + option * self.spacing) as i32,
        )
    }
}

/// Renders one column per entry of `marks`; `Some(i)` fills option `i`.
pub fn render_sheet(layout: &SheetLayout, marks: &[Option<u32>]) -> GrayImage {
    let marks = marks
        .iter()
        .map(|mark| mark.iter().copied().collect::<Vec<u32>>())
        .collect::<Vec<_>>();
    render_sheet_with_marks(layout, &marks)
}

/// Like [`render_sheet`], but each question may have any number of filled
/// options.
pub fn render_sheet_with_marks(layout: &SheetLayout, marks: &[Vec<u32>]) -> GrayImage {
    let questions = marks.len().max(1) as u32;
    let width = layout.margin * 2 + (questions - 1) * layout.spacing;
    let height = layout.margin * 2 + (layout.options - 1) * layout.spacing;
    let mut img = GrayImage::from_pixel(width, height, WHITE);

    for (question, filled) in marks.iter().enumerate() {
        for option in 0..layout.options {
            let center = layout.center(question as u32, option);
            draw_filled_circle_mut(&mut img, center, layout.radius, BLACK);
            if !filled.contains(&option) {
                draw_filled_circle_mut(&mut img, center, layout.hole_radius, WHITE);
            }
        }
    }

    img
}
