//! Scores optical mark recognition answer sheets.
//!
//! A sheet image goes through a fixed sequence of stages: binarize
//! ([`preprocess`]), find bubble shapes ([`bubbles`]), group them into
//! questions ([`grid`]), decide which bubbles are filled ([`marks`]) and
//! compare against an answer key ([`scoring`]). [`evaluate`] ties the stages
//! together and reports fatal problems as [`evaluate::EvaluateError`].

pub mod answer_key;
pub mod bubbles;
pub mod config;
pub mod debug;
pub mod evaluate;
pub mod geometry;
pub mod grid;
pub mod image_utils;
pub mod marks;
pub mod preprocess;
pub mod results;
pub mod scoring;
#[cfg(test)]
mod test_sheets;
pub mod types;

pub use evaluate::{
    evaluate_and_record, evaluate_image, evaluate_sheet, EvaluateError, EvaluationRequest,
    SheetEvaluation,
};
