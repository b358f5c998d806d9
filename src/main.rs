extern crate log;
extern crate pretty_env_logger;

use std::path::{Path, PathBuf};
use std::process::exit;

use clap::{arg, command, Command};
use log::error;
use rayon::prelude::*;

use omr_eval::answer_key::AnswerKeyStore;
use omr_eval::config::EvaluationConfig;
use omr_eval::evaluate::{
    evaluate_sheet, record_evaluation, EvaluationRequest, SheetEvaluation, SheetImage,
};
use omr_eval::results::SqliteResultSink;
use omr_eval::types::{SetName, StudentId};

fn main() {
    pretty_env_logger::init_custom_env("LOG");

    let matches = cli().get_matches();
    let debug = matches.get_flag("debug");
    let json = matches.get_flag("json");
    let no_save = matches.get_flag("no-save");
    let answer_keys = matches
        .get_one::<String>("answer-keys")
        .expect("answer keys directory has a default");
    let set_name = matches
        .get_one::<String>("set")
        .expect("set name has a default");
    let results_path = matches
        .get_one::<String>("results")
        .expect("results path has a default");

    let config = match matches.get_one::<String>("config") {
        Some(path) => match EvaluationConfig::load(Path::new(path)) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error loading config {}: {}", path, e);
                exit(1);
            }
        },
        None => EvaluationConfig::default(),
    };

    let mut requests = Vec::new();
    for submission in matches
        .get_many::<String>("submissions")
        .expect("at least one submission is required")
    {
        match parse_submission(submission, set_name) {
            Some(request) => requests.push(request),
            None => {
                eprintln!(
                    "Error: submission {:?} is not of the form STUDENT_ID=IMAGE_PATH",
                    submission
                );
                exit(1);
            }
        }
    }

    let store = AnswerKeyStore::new(answer_keys);
    let outcomes = requests
        .par_iter()
        .map(|request| evaluate_sheet(request, &store, &config, debug))
        .collect::<Vec<_>>();

    let mut sink = if no_save {
        None
    } else {
        match SqliteResultSink::open(results_path) {
            Ok(sink) => Some(sink),
            Err(e) => {
                eprintln!("Error opening results database {}: {}", results_path, e);
                exit(1);
            }
        }
    };

    let mut failed = false;
    for (request, outcome) in requests.iter().zip(outcomes) {
        let recorded = outcome.and_then(|evaluation| {
            if let Some(sink) = sink.as_mut() {
                record_evaluation(&request.student_id, &evaluation, sink)?;
            }
            Ok(evaluation)
        });

        match recorded {
            Ok(evaluation) => print_evaluation(&request.student_id, &evaluation, json),
            Err(e) => {
                error!("evaluation of {} failed: {:?}", request.image, e);
                eprintln!("Error evaluating {}: {}", request.student_id, e);
                failed = true;
            }
        }
    }

    if failed {
        exit(1);
    }
}

fn parse_submission(submission: &str, set_name: &str) -> Option<EvaluationRequest> {
    let (student_id, image_path) = submission.split_once('=')?;
    if student_id.trim().is_empty() || image_path.is_empty() {
        return None;
    }
    Some(EvaluationRequest {
        image: SheetImage::Path(PathBuf::from(image_path)),
        student_id: StudentId::from(student_id.trim()),
        set_name: SetName::from(set_name),
    })
}

fn print_evaluation(student_id: &StudentId, evaluation: &SheetEvaluation, json: bool) {
    if json {
        match serde_json::to_string_pretty(evaluation) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Error serializing result for {}: {}", student_id, e),
        }
        return;
    }

    println!("Result for {}", student_id);
    println!("Total Score: {}", evaluation.score.total);
    println!("Subject-wise Scores:");
    for (subject, marks) in &evaluation.score.subject_scores {
        println!("- {}: {}", subject, marks);
    }
    for warning in &evaluation.warnings {
        println!("Warning: {}", warning);
    }
}

#[allow(clippy::cognitive_complexity)]
fn cli() -> Command {
    command!()
        .arg(
            arg!(-k --"answer-keys" <DIR> "Directory of answer key JSON files")
                .required(false)
                .default_value(AnswerKeyStore::DEFAULT_DIR),
        )
        .arg(
            arg!(-s --set <NAME> "Answer key set name")
                .required(false)
                .default_value("set_a"),
        )
        .arg(
            arg!(-r --results <PATH> "Path to the results database")
                .required(false)
                .default_value(SqliteResultSink::DEFAULT_PATH),
        )
        .arg(arg!(-c --config <PATH> "Path to an evaluation config JSON file").required(false))
        .arg(arg!(-d --debug "Write debug images next to each sheet"))
        .arg(arg!(--json "Print results as JSON"))
        .arg(arg!(--"no-save" "Do not record results"))
        .arg(
            arg!(submissions: <SUBMISSION> "STUDENT_ID=IMAGE_PATH")
                .required(true)
                .num_args(1..),
        )
}
