use std::fmt::Display;
use std::path::PathBuf;

use image::GrayImage;
use log::info;
use logging_timer::time;
use serde::{Deserialize, Serialize};

use crate::answer_key::{AnswerKey, AnswerKeyStore};
use crate::bubbles::find_bubble_shapes;
use crate::config::EvaluationConfig;
use crate::debug::{
    draw_bubbles_debug_image_mut, draw_marked_answers_debug_image_mut, ImageDebugWriter,
};
use crate::grid::map_bubbles_to_questions;
use crate::marks::resolve_marked_answers;
use crate::preprocess::{binarize, load_sheet_image, load_sheet_image_from_bytes};
use crate::results::{ResultRecord, ResultSink, ResultSinkError};
use crate::scoring::{score_answers, ScoreResult, ScoreWarning};
use crate::types::{MarkedAnswers, SetName, StudentId};

/// Reasons an evaluation is abandoned. None of these leave a record in the
/// result sink.
#[derive(Debug)]
pub enum EvaluateError {
    /// The image at this location (path or `<memory>`) could not be used.
    InvalidImage(String, String),
    MissingAnswerKey(SetName, PathBuf),
    InvalidAnswerKey(PathBuf, String),
    InvalidConfig(String),
    ResultSink(StudentId, ResultSinkError),
}

impl Display for EvaluateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvaluateError::InvalidImage(source, reason) => {
                write!(f, "invalid image {}: {}", source, reason)
            }
            EvaluateError::MissingAnswerKey(set_name, path) => write!(
                f,
                "no answer key for set {} (expected {})",
                set_name,
                path.display()
            ),
            EvaluateError::InvalidAnswerKey(path, reason) => {
                write!(f, "invalid answer key {}: {}", path.display(), reason)
            }
            EvaluateError::InvalidConfig(reason) => write!(f, "invalid config: {}", reason),
            EvaluateError::ResultSink(student_id, e) => {
                write!(f, "could not record result for {}: {}", student_id, e)
            }
        }
    }
}

impl std::error::Error for EvaluateError {}

/// Where a sheet image comes from: a file on disk, or the encoded bytes of
/// an upload.
#[derive(Debug, Clone, PartialEq)]
pub enum SheetImage {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl SheetImage {
    pub fn load(&self) -> Result<GrayImage, EvaluateError> {
        match self {
            SheetImage::Path(path) => load_sheet_image(path),
            SheetImage::Bytes(bytes) => load_sheet_image_from_bytes(bytes),
        }
    }
}

impl Display for SheetImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SheetImage::Path(path) => write!(f, "{}", path.display()),
            SheetImage::Bytes(bytes) => write!(f, "<memory: {} bytes>", bytes.len()),
        }
    }
}

/// One uploaded sheet to evaluate.
#[derive(Debug, Clone)]
pub struct EvaluationRequest {
    pub image: SheetImage,
    pub student_id: StudentId,
    pub set_name: SetName,
}

/// Everything learned from one sheet image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetEvaluation {
    pub bubble_count: usize,
    pub question_count: usize,
    pub marked_answers: MarkedAnswers,
    pub score: ScoreResult,
    pub warnings: Vec<ScoreWarning>,
}

/// Runs the whole pipeline on an already-loaded grayscale sheet.
#[time]
pub fn evaluate_image(img: &GrayImage, key: &AnswerKey, config: &EvaluationConfig) -> SheetEvaluation {
    evaluate_image_with_debug(img, key, config, &ImageDebugWriter::disabled())
}

fn evaluate_image_with_debug(
    img: &GrayImage,
    key: &AnswerKey,
    config: &EvaluationConfig,
    debug: &ImageDebugWriter,
) -> SheetEvaluation {
    let mask = binarize(img, &config.preprocess);
    let bubbles = find_bubble_shapes(&mask, &config.bubbles);
    let question_map = map_bubbles_to_questions(&bubbles, &config.grid);
    let marked_answers = resolve_marked_answers(&mask, &question_map, &config.marks);
    let scored = score_answers(&marked_answers, key);

    debug.write("bubbles", |canvas| {
        draw_bubbles_debug_image_mut(canvas, &bubbles, config.grid.group_size());
    });
    debug.write("marks", |canvas| {
        draw_marked_answers_debug_image_mut(canvas, &question_map, &marked_answers);
    });

    SheetEvaluation {
        bubble_count: bubbles.len(),
        question_count: question_map.len(),
        marked_answers,
        score: scored.result,
        warnings: scored.warnings,
    }
}

/// Loads the sheet image and answer key for `request` and evaluates it.
#[time]
pub fn evaluate_sheet(
    request: &EvaluationRequest,
    store: &AnswerKeyStore,
    config: &EvaluationConfig,
    debug: bool,
) -> Result<SheetEvaluation, EvaluateError> {
    if let Err(e) = config.validate() {
        return Err(EvaluateError::InvalidConfig(e.to_string()));
    }

    let img = request.image.load()?;
    let key = store.load(&request.set_name)?;

    // uploads have no directory to write debug images into
    let debug_writer = match &request.image {
        SheetImage::Path(path) if debug => ImageDebugWriter::new(path.clone(), img.clone()),
        _ => ImageDebugWriter::disabled(),
    };

    let evaluation = evaluate_image_with_debug(&img, &key, config, &debug_writer);
    info!(
        "{} scored {} on set {} ({} bubbles, {} questions, {} answered)",
        request.student_id,
        evaluation.score.total,
        request.set_name,
        evaluation.bubble_count,
        evaluation.question_count,
        evaluation.marked_answers.len()
    );
    Ok(evaluation)
}

/// Appends a successful evaluation to the result sink.
pub fn record_evaluation(
    student_id: &StudentId,
    evaluation: &SheetEvaluation,
    sink: &mut dyn ResultSink,
) -> Result<(), EvaluateError> {
    let record = ResultRecord {
        student_id: student_id.clone(),
        score: evaluation.score.total,
    };
    sink.append(&record)
        .map_err(|e| EvaluateError::ResultSink(student_id.clone(), e))
}

/// Evaluates `request` and records its total score. Nothing is recorded when
/// the evaluation fails.
pub fn evaluate_and_record(
    request: &EvaluationRequest,
    store: &AnswerKeyStore,
    config: &EvaluationConfig,
    sink: &mut dyn ResultSink,
    debug: bool,
) -> Result<SheetEvaluation, EvaluateError> {
    let evaluation = evaluate_sheet(request, store, config, debug)?;
    record_evaluation(&request.student_id, &evaluation, sink)?;
    Ok(evaluation)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::results::SqliteResultSink;
    use crate::test_sheets::{render_sheet, render_sheet_with_marks, SheetLayout};
    use crate::types::SubjectName;

    const KEY_JSON: &str = r#"{ "Math": { "1": "A", "2": "B" }, "Physics": { "3": "c", "4": "E", "5": "D" } }"#;

    fn key_store(dir: &Path) -> AnswerKeyStore {
        std::fs::write(dir.join("set_a.json"), KEY_JSON).unwrap();
        AnswerKeyStore::new(dir)
    }

    fn request(dir: &Path, img: &GrayImage) -> EvaluationRequest {
        let image_path = dir.join("sheet.png");
        img.save(&image_path).unwrap();
        EvaluationRequest {
            image: SheetImage::Path(image_path),
            student_id: StudentId::from("ada"),
            set_name: SetName::from("set_a"),
        }
    }

    #[test]
    fn test_evaluate_rendered_sheet() {
        // answers: A, C, C, none, D
        let img = render_sheet(
            &SheetLayout::default(),
            &[Some(0), Some(2), Some(2), None, Some(3)],
        );
        let key = AnswerKey::from_json(KEY_JSON).unwrap();
        let evaluation = evaluate_image(&img, &key, &EvaluationConfig::default());

        assert_eq!(evaluation.bubble_count, 25);
        assert_eq!(evaluation.question_count, 5);
        assert_eq!(
            evaluation.marked_answers,
            MarkedAnswers::from([(1, 'A'), (2, 'C'), (3, 'C'), (5, 'D')])
        );
        assert_eq!(evaluation.score.total, 3);
        assert_eq!(evaluation.score.subject_scores[&SubjectName::from("Math")], 1);
        assert_eq!(evaluation.score.subject_scores[&SubjectName::from("Physics")], 2);
        assert!(evaluation.warnings.is_empty());
    }

    #[test]
    fn test_double_mark_records_first_option() {
        let img = render_sheet_with_marks(&SheetLayout::default(), &[vec![1, 3]]);
        let key = AnswerKey::from_json(r#"{ "Math": { "1": "D" } }"#).unwrap();
        let evaluation = evaluate_image(&img, &key, &EvaluationConfig::default());

        assert_eq!(evaluation.marked_answers, MarkedAnswers::from([(1, 'B')]));
        assert_eq!(evaluation.score.total, 0);
    }

    #[test]
    fn test_blank_image_scores_zero() {
        let img = GrayImage::from_pixel(200, 200, crate::image_utils::WHITE);
        let key = AnswerKey::from_json(KEY_JSON).unwrap();
        let evaluation = evaluate_image(&img, &key, &EvaluationConfig::default());

        assert_eq!(evaluation.bubble_count, 0);
        assert!(evaluation.marked_answers.is_empty());
        assert_eq!(evaluation.score.total, 0);
        assert_eq!(evaluation.score.subject_scores.len(), 2);
    }

    #[test]
    fn test_evaluation_is_repeatable() {
        let dir = tempfile::tempdir().unwrap();
        let store = key_store(dir.path());
        let img = render_sheet(&SheetLayout::default(), &[Some(0), Some(1), None, Some(4)]);
        let request = request(dir.path(), &img);
        let config = EvaluationConfig::default();

        let first = evaluate_sheet(&request, &store, &config, false).unwrap();
        let second = evaluate_sheet(&request, &store, &config, false).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.score.total, 3);
    }

    #[test]
    fn test_evaluate_and_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = key_store(dir.path());
        let img = render_sheet(&SheetLayout::default(), &[Some(0), Some(1)]);
        let request = request(dir.path(), &img);
        let mut sink = SqliteResultSink::open_in_memory().unwrap();

        let evaluation =
            evaluate_and_record(&request, &store, &EvaluationConfig::default(), &mut sink, false)
                .unwrap();
        assert_eq!(evaluation.score.total, 2);
        assert_eq!(
            sink.records().unwrap(),
            vec![ResultRecord {
                student_id: StudentId::from("ada"),
                score: 2,
            }]
        );
    }

    #[test]
    fn test_missing_answer_key_records_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = key_store(dir.path());
        let img = render_sheet(&SheetLayout::default(), &[Some(0)]);
        let mut request = request(dir.path(), &img);
        request.set_name = SetName::from("set_z");
        let mut sink = SqliteResultSink::open_in_memory().unwrap();

        let result =
            evaluate_and_record(&request, &store, &EvaluationConfig::default(), &mut sink, false);
        match result {
            Err(EvaluateError::MissingAnswerKey(set_name, _)) => {
                assert_eq!(set_name.as_str(), "set_z")
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(sink.records().unwrap().is_empty());
    }

    #[test]
    fn test_invalid_image_records_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = key_store(dir.path());
        let request = EvaluationRequest {
            image: SheetImage::Path(dir.path().join("nope.png")),
            student_id: StudentId::from("ada"),
            set_name: SetName::from("set_a"),
        };
        let mut sink = SqliteResultSink::open_in_memory().unwrap();

        let result =
            evaluate_and_record(&request, &store, &EvaluationConfig::default(), &mut sink, false);
        match result {
            Err(e @ EvaluateError::InvalidImage(..)) => {
                assert!(e.to_string().contains("nope.png"))
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(sink.records().unwrap().is_empty());
    }

    #[test]
    fn test_invalid_config_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let store = key_store(dir.path());
        let img = render_sheet(&SheetLayout::default(), &[Some(0)]);
        let request = request(dir.path(), &img);
        let mut config = EvaluationConfig::default();
        config.preprocess.blur_kernel_size = 4;

        assert!(matches!(
            evaluate_sheet(&request, &store, &config, false),
            Err(EvaluateError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_debug_images_are_written() {
        let dir = tempfile::tempdir().unwrap();
        let store = key_store(dir.path());
        let img = render_sheet(&SheetLayout::default(), &[Some(0)]);
        let request = request(dir.path(), &img);

        evaluate_sheet(&request, &store, &EvaluationConfig::default(), true).unwrap();
        assert!(dir.path().join("sheet_debug_bubbles.png").is_file());
        assert!(dir.path().join("sheet_debug_marks.png").is_file());
    }

    fn png_bytes(img: &GrayImage) -> Vec<u8> {
        let mut bytes = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageLuma8(img.clone())
            .write_to(&mut bytes, image::ImageOutputFormat::Png)
            .unwrap();
        bytes.into_inner()
    }

    #[test]
    fn test_evaluate_and_record_uploaded_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let store = key_store(dir.path());
        let img = render_sheet(&SheetLayout::default(), &[Some(0), Some(1), Some(2)]);
        let request = EvaluationRequest {
            image: SheetImage::Bytes(png_bytes(&img)),
            student_id: StudentId::from("grace"),
            set_name: SetName::from("set_a"),
        };
        let mut sink = SqliteResultSink::open_in_memory().unwrap();

        let evaluation =
            evaluate_and_record(&request, &store, &EvaluationConfig::default(), &mut sink, true)
                .unwrap();
        assert_eq!(evaluation.score.total, 3);
        assert_eq!(
            sink.records().unwrap(),
            vec![ResultRecord {
                student_id: StudentId::from("grace"),
                score: 3,
            }]
        );
        // nothing to write debug images next to
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_undecodable_upload_records_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = key_store(dir.path());
        let request = EvaluationRequest {
            image: SheetImage::Bytes(b"not an image".to_vec()),
            student_id: StudentId::from("grace"),
            set_name: SetName::from("set_a"),
        };
        let mut sink = SqliteResultSink::open_in_memory().unwrap();

        let result =
            evaluate_and_record(&request, &store, &EvaluationConfig::default(), &mut sink, false);
        assert!(matches!(result, Err(EvaluateError::InvalidImage(..))));
        assert!(sink.records().unwrap().is_empty());
    }

    struct UnavailableSink;

    impl ResultSink for UnavailableSink {
        fn append(&mut self, _record: &ResultRecord) -> Result<(), ResultSinkError> {
            Err("storage is offline".into())
        }
    }

    #[test]
    fn test_sink_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = key_store(dir.path());
        let img = render_sheet(&SheetLayout::default(), &[Some(0)]);
        let request = request(dir.path(), &img);

        let result = evaluate_and_record(
            &request,
            &store,
            &EvaluationConfig::default(),
            &mut UnavailableSink,
            false,
        );
        match result {
            Err(e @ EvaluateError::ResultSink(..)) => {
                assert_eq!(e.to_string(), "could not record result for ada: storage is offline")
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_parallel_evaluations_are_independent() {
        use rayon::prelude::*;

        let dir = tempfile::tempdir().unwrap();
        let store = key_store(dir.path());
        let sheets = [
            vec![Some(0), Some(1), Some(2), Some(4), Some(3)],
            vec![Some(1), Some(1), None, None, None],
            vec![None, None, None, None, None],
            vec![Some(0), Some(4), Some(2), Some(4), Some(0)],
        ];
        let requests = sheets
            .iter()
            .enumerate()
            .map(|(i, marks)| {
                let image_path = dir.path().join(format!("sheet-{}.png", i));
                render_sheet(&SheetLayout::default(), marks)
                    .save(&image_path)
                    .unwrap();
                EvaluationRequest {
                    image: SheetImage::Path(image_path),
                    student_id: StudentId::from(format!("student-{}", i)),
                    set_name: SetName::from("set_a"),
                }
            })
            .collect::<Vec<_>>();
        let config = EvaluationConfig::default();

        let sequential = requests
            .iter()
            .map(|request| evaluate_sheet(request, &store, &config, false).unwrap())
            .collect::<Vec<_>>();
        let parallel = requests
            .par_iter()
            .map(|request| evaluate_sheet(request, &store, &config, false).unwrap())
            .collect::<Vec<_>>();

        assert_eq!(parallel, sequential);
        let totals = parallel.iter().map(|e| e.score.total).collect::<Vec<_>>();
        assert_eq!(totals, vec![5, 1, 0, 3]);
    }
}
