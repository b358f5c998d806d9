use log::{debug, warn};
use logging_timer::time;

use crate::config::GridOptions;
use crate::types::{BubbleBox, QuestionOptionMap};

/// Groups ordered bubbles into questions.
///
/// Consecutive runs of `group_size` bubbles form one question each, numbered
/// from 1 in the order they appear. Within a question the bubbles are sorted
/// top to bottom and paired with the option labels. A trailing run shorter
/// than the group size still becomes a question, with only as many options
/// as there are bubbles left.
#[time]
pub fn map_bubbles_to_questions(bubbles: &[BubbleBox], options: &GridOptions) -> QuestionOptionMap {
    let labels = options.labels();
    let mut question_map = QuestionOptionMap::new();
    if labels.is_empty() {
        return question_map;
    }

    for (i, group) in bubbles.chunks(labels.len()).enumerate() {
        let question = i as u32 + 1;
        let mut column = group.to_vec();
        column.sort_by_key(|bubble| bubble.y);

        if column.len() < labels.len() {
            warn!(
                "question {} has only {} of {} option bubbles",
                question,
                column.len(),
                labels.len()
            );
        }

        question_map.insert(question, labels.iter().copied().zip(column).collect());
    }

    debug!(
        "mapped {} bubbles to {} questions",
        bubbles.len(),
        question_map.len()
    );

    question_map
}
