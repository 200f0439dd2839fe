//! Quiz auto-grading.
//!
//! Single choice questions award the chosen option's points only when it is
//! correct. Multiple choice questions give partial credit: every correct
//! option that was selected adds its points, incorrect selections are
//! ignored. Free-text and unanswered questions score zero.

use std::collections::HashSet;

use crate::model::{Form, FormSubmission, OptionId, Question, QuestionKind, SubmittedAnswer};

/// Score for one submission; both fields are `None` for non-quiz forms.
///
/// Totals saturate at `u32::MAX` rather than wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScoreSummary {
    pub score: Option<u32>,
    pub max_score: Option<u32>,
}

impl ScoreSummary {
    /// Score as a whole percentage of the maximum, rounded half up.
    ///
    /// A quiz with no attainable points counts as 100%.
    #[must_use]
    pub fn percent(&self) -> Option<u32> {
        let score = self.score?;
        let max = self.max_score?;
        if max == 0 {
            return Some(100);
        }
        let score = u64::from(score.min(max));
        let max = u64::from(max);
        u32::try_from((200 * score + max) / (2 * max)).ok()
    }
}

/// Points awarded for a single answered question.
#[must_use]
pub fn score_question(question: &Question, selected: &[OptionId]) -> u32 {
    match question.kind {
        QuestionKind::SingleChoice => selected
            .first()
            .and_then(|id| question.option(*id))
            .filter(|option| option.is_correct)
            .map_or(0, |option| option.points),
        QuestionKind::MultipleChoice => {
            let selected: HashSet<OptionId> = selected.iter().copied().collect();
            question
                .options
                .iter()
                .filter(|option| option.is_correct && selected.contains(&option.id))
                .fold(0, |total: u32, option| total.saturating_add(option.points))
        }
        QuestionKind::ShortText | QuestionKind::Paragraph => 0,
    }
}

/// Best achievable points for a question.
#[must_use]
pub fn max_question_score(question: &Question) -> u32 {
    let correct = question.options.iter().filter(|o| o.is_correct);
    match question.kind {
        QuestionKind::SingleChoice => correct.map(|o| o.points).max().unwrap_or(0),
        QuestionKind::MultipleChoice => {
            correct.fold(0, |total: u32, o| total.saturating_add(o.points))
        }
        QuestionKind::ShortText | QuestionKind::Paragraph => 0,
    }
}

/// Scores a submission against its form definition.
///
/// Answers to questions that are not part of the form are ignored here;
/// `FormSubmission::validate_against` rejects them before scoring.
#[must_use]
pub fn score_submission(form: &Form, submission: &FormSubmission) -> ScoreSummary {
    if !form.is_quiz {
        return ScoreSummary::default();
    }

    let score = form
        .questions
        .iter()
        .map(|question| {
            find_answer(&submission.answers, question)
                .map_or(0, |answer| score_question(question, &answer.selected_option_ids))
        })
        .fold(0, u32::saturating_add);
    let max_score = form
        .questions
        .iter()
        .map(max_question_score)
        .fold(0, u32::saturating_add);

    ScoreSummary {
        score: Some(score),
        max_score: Some(max_score),
    }
}

fn find_answer<'a>(answers: &'a [SubmittedAnswer], question: &Question) -> Option<&'a SubmittedAnswer> {
    answers.iter().find(|a| a.question_id == question.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AnswerOption, FormId, FormStatus, QuestionId, UserId};
    use crate::time::fixed_now;

    fn option(id: u64, correct: bool, points: u32) -> AnswerOption {
        AnswerOption {
            id: OptionId::new(id),
            text: String::new(),
            is_correct: correct,
            points,
        }
    }

    fn question(id: u64, kind: QuestionKind, options: Vec<AnswerOption>) -> Question {
        Question {
            id: QuestionId::new(id),
            text: format!("q{id}"),
            kind,
            required: false,
            position: 0,
            options,
        }
    }

    fn quiz(is_quiz: bool) -> Form {
        Form {
            id: FormId::new(1),
            title: "Quiz".into(),
            description: None,
            is_quiz,
            status: FormStatus::Published,
            creator_id: UserId::new(1),
            created_at: fixed_now(),
            questions: vec![
                question(
                    1,
                    QuestionKind::SingleChoice,
                    vec![option(10, true, 4), option(11, false, 9)],
                ),
                question(
                    2,
                    QuestionKind::MultipleChoice,
                    vec![option(20, true, 2), option(21, true, 3), option(22, false, 5)],
                ),
                question(3, QuestionKind::ShortText, Vec::new()),
            ],
        }
    }

    fn answer(question: u64, options: &[u64]) -> SubmittedAnswer {
        SubmittedAnswer {
            question_id: QuestionId::new(question),
            selected_option_ids: options.iter().copied().map(OptionId::new).collect(),
            text: None,
        }
    }

    #[test]
    fn single_choice_awards_points_only_when_correct() {
        let form = quiz(true);
        let q = &form.questions[0];
        assert_eq!(score_question(q, &[OptionId::new(10)]), 4);
        assert_eq!(score_question(q, &[OptionId::new(11)]), 0);
        assert_eq!(score_question(q, &[]), 0);
    }

    #[test]
    fn multiple_choice_gives_partial_credit() {
        let form = quiz(true);
        let q = &form.questions[1];
        assert_eq!(score_question(q, &[OptionId::new(20)]), 2);
        assert_eq!(
            score_question(q, &[OptionId::new(20), OptionId::new(21)]),
            5
        );
        // an extra wrong pick does not cost anything
        assert_eq!(
            score_question(q, &[OptionId::new(21), OptionId::new(22)]),
            3
        );
    }

    #[test]
    fn unanswered_questions_score_zero() {
        let form = quiz(true);
        let summary = score_submission(
            &form,
            &FormSubmission {
                answers: vec![answer(1, &[10])],
            },
        );
        assert_eq!(summary.score, Some(4));
        assert_eq!(summary.max_score, Some(9));
        assert_eq!(summary.percent(), Some(44));
    }

    #[test]
    fn full_marks() {
        let form = quiz(true);
        let summary = score_submission(
            &form,
            &FormSubmission {
                answers: vec![answer(1, &[10]), answer(2, &[20, 21])],
            },
        );
        assert_eq!(summary.score, Some(9));
        assert_eq!(summary.percent(), Some(100));
    }

    #[test]
    fn non_quiz_forms_have_no_score() {
        let form = quiz(false);
        let summary = score_submission(
            &form,
            &FormSubmission {
                answers: vec![answer(1, &[10])],
            },
        );
        assert_eq!(summary, ScoreSummary::default());
        assert_eq!(summary.percent(), None);
    }

    #[test]
    fn zero_point_quiz_counts_as_full_percent() {
        let summary = ScoreSummary {
            score: Some(0),
            max_score: Some(0),
        };
        assert_eq!(summary.percent(), Some(100));
    }

    #[test]
    fn oversized_points_saturate_instead_of_overflowing() {
        let mut form = quiz(true);
        form.questions[1] = question(
            2,
            QuestionKind::MultipleChoice,
            vec![option(20, true, u32::MAX), option(21, true, 1)],
        );
        let summary = score_submission(
            &form,
            &FormSubmission {
                answers: vec![answer(1, &[10]), answer(2, &[20, 21])],
            },
        );
        assert_eq!(summary.score, Some(u32::MAX));
        assert_eq!(summary.max_score, Some(u32::MAX));
        assert_eq!(summary.percent(), Some(100));
    }
}
