use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{FormId, OptionId, QuestionId, ResponseId, UserId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum FormError {
    #[error("form title cannot be empty")]
    EmptyTitle,

    #[error("question text cannot be empty")]
    EmptyQuestion,

    #[error("choice question {0} needs at least two options")]
    TooFewOptions(usize),

    #[error("quiz question {0} has no correct option")]
    NoCorrectOption(usize),

    #[error("single choice question {0} has more than one correct option")]
    MultipleCorrectOptions(usize),

    #[error("question {0} has an option worth more than {max} points", max = MAX_OPTION_POINTS)]
    PointsTooLarge(usize),

    #[error("form is not accepting responses")]
    NotPublished,

    #[error("form is already published")]
    AlreadyPublished,

    #[error("question {0} does not belong to this form")]
    UnknownQuestion(QuestionId),

    #[error("option {option} does not belong to question {question}")]
    UnknownOption {
        question: QuestionId,
        option: OptionId,
    },

    #[error("question {0} accepts a single selection")]
    TooManySelections(QuestionId),

    #[error("question {0} was answered more than once")]
    DuplicateAnswer(QuestionId),

    #[error("required question {0} was not answered")]
    MissingRequiredAnswer(QuestionId),

    #[error("unknown {kind}: {value}")]
    UnknownEnum { kind: &'static str, value: String },
}

//
// ─── ENUMS ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionKind {
    ShortText,
    Paragraph,
    SingleChoice,
    MultipleChoice,
}

impl QuestionKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionKind::ShortText => "SHORT_TEXT",
            QuestionKind::Paragraph => "PARAGRAPH",
            QuestionKind::SingleChoice => "SINGLE_CHOICE",
            QuestionKind::MultipleChoice => "MULTIPLE_CHOICE",
        }
    }

    /// # Errors
    ///
    /// Returns `FormError::UnknownEnum` for unrecognized values.
    pub fn parse(s: &str) -> Result<Self, FormError> {
        match s {
            "SHORT_TEXT" => Ok(QuestionKind::ShortText),
            "PARAGRAPH" => Ok(QuestionKind::Paragraph),
            "SINGLE_CHOICE" => Ok(QuestionKind::SingleChoice),
            "MULTIPLE_CHOICE" => Ok(QuestionKind::MultipleChoice),
            other => Err(FormError::UnknownEnum {
                kind: "question kind",
                value: other.to_owned(),
            }),
        }
    }

    #[must_use]
    pub fn is_choice(self) -> bool {
        matches!(self, QuestionKind::SingleChoice | QuestionKind::MultipleChoice)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FormStatus {
    Draft,
    Published,
    Archived,
}

impl FormStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FormStatus::Draft => "DRAFT",
            FormStatus::Published => "PUBLISHED",
            FormStatus::Archived => "ARCHIVED",
        }
    }

    /// # Errors
    ///
    /// Returns `FormError::UnknownEnum` for unrecognized values.
    pub fn parse(s: &str) -> Result<Self, FormError> {
        match s {
            "DRAFT" => Ok(FormStatus::Draft),
            "PUBLISHED" => Ok(FormStatus::Published),
            "ARCHIVED" => Ok(FormStatus::Archived),
            other => Err(FormError::UnknownEnum {
                kind: "form status",
                value: other.to_owned(),
            }),
        }
    }
}

//
// ─── FORM DEFINITION ───────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerOption {
    pub id: OptionId,
    pub text: String,
    pub is_correct: bool,
    pub points: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Question {
    pub id: QuestionId,
    pub text: String,
    pub kind: QuestionKind,
    pub required: bool,
    pub position: u32,
    pub options: Vec<AnswerOption>,
}

impl Question {
    #[must_use]
    pub fn option(&self, id: OptionId) -> Option<&AnswerOption> {
        self.options.iter().find(|o| o.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Form {
    pub id: FormId,
    pub title: String,
    pub description: Option<String>,
    pub is_quiz: bool,
    pub status: FormStatus,
    pub creator_id: UserId,
    pub created_at: DateTime<Utc>,
    pub questions: Vec<Question>,
}

impl Form {
    #[must_use]
    pub fn question(&self, id: QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    /// # Errors
    ///
    /// Returns `FormError::AlreadyPublished` unless the form is a draft.
    pub fn publish(&mut self) -> Result<(), FormError> {
        if self.status != FormStatus::Draft {
            return Err(FormError::AlreadyPublished);
        }
        self.status = FormStatus::Published;
        Ok(())
    }
}

//
// ─── DRAFTS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OptionDraft {
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
    #[serde(default)]
    pub points: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct QuestionDraft {
    pub text: String,
    pub kind: QuestionKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub options: Vec<OptionDraft>,
}

/// Upper bound on the points a single answer option may carry.
pub const MAX_OPTION_POINTS: u32 = 1_000;

/// Unvalidated form definition as submitted by an author.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FormDraft {
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub is_quiz: bool,
    #[serde(default)]
    pub questions: Vec<QuestionDraft>,
}

impl FormDraft {
    /// Trims text and checks question shape; quizzes need a correct option
    /// on every choice question.
    ///
    /// # Errors
    ///
    /// Returns the first `FormError` found, with 1-based question numbers.
    pub fn validate(mut self) -> Result<Self, FormError> {
        self.title = self.title.trim().to_owned();
        if self.title.is_empty() {
            return Err(FormError::EmptyTitle);
        }
        self.description = self
            .description
            .map(|d| d.trim().to_owned())
            .filter(|d| !d.is_empty());

        for (index, question) in self.questions.iter_mut().enumerate() {
            let number = index + 1;
            question.text = question.text.trim().to_owned();
            if question.text.is_empty() {
                return Err(FormError::EmptyQuestion);
            }
            if !question.kind.is_choice() {
                question.options.clear();
                continue;
            }
            if question.options.len() < 2 {
                return Err(FormError::TooFewOptions(number));
            }
            let correct = question.options.iter().filter(|o| o.is_correct).count();
            if self.is_quiz && correct == 0 {
                return Err(FormError::NoCorrectOption(number));
            }
            if question.kind == QuestionKind::SingleChoice && correct > 1 {
                return Err(FormError::MultipleCorrectOptions(number));
            }
            if question.options.iter().any(|o| o.points > MAX_OPTION_POINTS) {
                return Err(FormError::PointsTooLarge(number));
            }
        }
        Ok(self)
    }
}

//
// ─── SUBMISSIONS ───────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedAnswer {
    pub question_id: QuestionId,
    #[serde(default)]
    pub selected_option_ids: Vec<OptionId>,
    #[serde(default)]
    pub text: Option<String>,
}

impl SubmittedAnswer {
    fn is_blank(&self) -> bool {
        self.selected_option_ids.is_empty()
            && self.text.as_deref().is_none_or(|t| t.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct FormSubmission {
    #[serde(default)]
    pub answers: Vec<SubmittedAnswer>,
}

impl FormSubmission {
    /// Checks the submission against the form definition.
    ///
    /// # Errors
    ///
    /// Returns `FormError` for unknown questions/options, duplicate answers,
    /// multi-select on single choice, or unanswered required questions.
    pub fn validate_against(&self, form: &Form) -> Result<(), FormError> {
        let mut seen = HashSet::new();
        for answer in &self.answers {
            let question = form
                .question(answer.question_id)
                .ok_or(FormError::UnknownQuestion(answer.question_id))?;
            if !seen.insert(answer.question_id) {
                return Err(FormError::DuplicateAnswer(answer.question_id));
            }
            for option in &answer.selected_option_ids {
                if question.option(*option).is_none() {
                    return Err(FormError::UnknownOption {
                        question: question.id,
                        option: *option,
                    });
                }
            }
            if question.kind == QuestionKind::SingleChoice && answer.selected_option_ids.len() > 1
            {
                return Err(FormError::TooManySelections(question.id));
            }
        }

        for question in form.questions.iter().filter(|q| q.required) {
            let answered = self
                .answers
                .iter()
                .any(|a| a.question_id == question.id && !a.is_blank());
            if !answered {
                return Err(FormError::MissingRequiredAnswer(question.id));
            }
        }
        Ok(())
    }
}

/// Persisted submission with its computed score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormResponse {
    pub id: ResponseId,
    pub form_id: FormId,
    pub user_id: UserId,
    pub submitted_at: DateTime<Utc>,
    /// `None` when the form is not a quiz.
    pub score: Option<u32>,
    pub max_score: Option<u32>,
    pub answers: Vec<SubmittedAnswer>,
}
