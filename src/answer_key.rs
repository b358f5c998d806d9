use std::path::PathBuf;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::evaluate::EvaluateError;
use crate::types::{OrderedMap, SetName, SubjectName};

/// The correct options for one exam set, grouped by subject.
///
/// Subjects and questions keep the order of the key file. Question ids and
/// option values are kept exactly as written; they are checked when the
/// sheet is scored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerKey {
    pub subjects: OrderedMap<SubjectName, OrderedMap<String, serde_json::Value>>,
}

impl AnswerKey {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn question_count(&self) -> usize {
        self.subjects.values().map(|answers| answers.len()).sum()
    }
}

/// A directory of answer keys, one `<set name>.json` file per set.
#[derive(Debug, Clone)]
pub struct AnswerKeyStore {
    dir: PathBuf,
}

impl AnswerKeyStore {
    pub const DEFAULT_DIR: &'static str = "answer_keys";

    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, set_name: &SetName) -> PathBuf {
        self.dir.join(format!("{}.json", set_name))
    }

    pub fn load(&self, set_name: &SetName) -> Result<AnswerKey, EvaluateError> {
        let path = self.path_for(set_name);
        if !is_plain_set_name(set_name) || !path.is_file() {
            warn!(
                "no answer key for set {} in {}",
                set_name,
                self.dir.display()
            );
            return Err(EvaluateError::MissingAnswerKey(set_name.clone(), path));
        }

        let json = match std::fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) => return Err(EvaluateError::InvalidAnswerKey(path, e.to_string())),
        };

        let key = match AnswerKey::from_json(&json) {
            Ok(key) => key,
            Err(e) => return Err(EvaluateError::InvalidAnswerKey(path, e.to_string())),
        };

        debug!(
            "loaded answer key {} ({} subjects, {} questions)",
            set_name,
            key.subjects.len(),
            key.question_count()
        );
        Ok(key)
    }
}

impl Default for AnswerKeyStore {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DIR)
    }
}

/// Set names must name a file directly inside the store.
fn is_plain_set_name(set_name: &SetName) -> bool {
    let name = set_name.as_str();
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}
