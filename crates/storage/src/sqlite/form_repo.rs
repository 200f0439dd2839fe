use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nexus_core::model::{
    AnswerOption, Form, FormDraft, FormId, FormResponse, FormStatus, OptionId, Question,
    QuestionId, QuestionKind, ResponseId, SubmittedAnswer, UserId,
};
use sqlx::sqlite::SqliteRow;

use super::SqliteRepository;
use super::mapping::{
    bind_id, bool_col, db, id_col, opt_text_col, opt_u32_col, ser, text_col, time_col, u32_col,
};
use crate::repository::{FormRepository, NewFormResponse, StorageError};

const FORM_COLUMNS: &str = "id, title, description, is_quiz, status, creator_id, created_at";

fn form_from_row(row: &SqliteRow) -> Result<Form, StorageError> {
    Ok(Form {
        id: id_col(row, "id", FormId::new)?,
        title: text_col(row, "title")?,
        description: opt_text_col(row, "description")?,
        is_quiz: bool_col(row, "is_quiz")?,
        status: FormStatus::parse(&text_col(row, "status")?).map_err(ser)?,
        creator_id: id_col(row, "creator_id", UserId::new)?,
        created_at: time_col(row, "created_at")?,
        questions: Vec::new(),
    })
}

fn response_from_row(row: &SqliteRow) -> Result<FormResponse, StorageError> {
    let answers: Vec<SubmittedAnswer> =
        serde_json::from_str(&text_col(row, "answers")?).map_err(ser)?;
    Ok(FormResponse {
        id: id_col(row, "id", ResponseId::new)?,
        form_id: id_col(row, "form_id", FormId::new)?,
        user_id: id_col(row, "user_id", UserId::new)?,
        submitted_at: time_col(row, "submitted_at")?,
        score: opt_u32_col(row, "score")?,
        max_score: opt_u32_col(row, "max_score")?,
        answers,
    })
}

fn rowid_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

impl SqliteRepository {
    /// Load questions and options for a form definition row.
    async fn load_questions(&self, form: &mut Form) -> Result<(), StorageError> {
        let form_id = bind_id("form_id", form.id.value())?;
        let question_rows = sqlx::query(
            r"
            SELECT id, text, kind, required, position
            FROM form_questions
            WHERE form_id = ?1
            ORDER BY position, id
            ",
        )
        .bind(form_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;

        let option_rows = sqlx::query(
            r"
            SELECT o.id, o.question_id, o.text, o.is_correct, o.points
            FROM form_options o
            JOIN form_questions q ON q.id = o.question_id
            WHERE q.form_id = ?1
            ORDER BY o.question_id, o.position, o.id
            ",
        )
        .bind(form_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;

        let mut options: HashMap<QuestionId, Vec<AnswerOption>> = HashMap::new();
        for row in &option_rows {
            options
                .entry(id_col(row, "question_id", QuestionId::new)?)
                .or_default()
                .push(AnswerOption {
                    id: id_col(row, "id", OptionId::new)?,
                    text: text_col(row, "text")?,
                    is_correct: bool_col(row, "is_correct")?,
                    points: u32_col(row, "points")?,
                });
        }

        form.questions = question_rows
            .iter()
            .map(|row| {
                let id = id_col(row, "id", QuestionId::new)?;
                Ok(Question {
                    id,
                    text: text_col(row, "text")?,
                    kind: QuestionKind::parse(&text_col(row, "kind")?).map_err(ser)?,
                    required: bool_col(row, "required")?,
                    position: u32_col(row, "position")?,
                    options: options.remove(&id).unwrap_or_default(),
                })
            })
            .collect::<Result<Vec<_>, StorageError>>()?;
        Ok(())
    }
}

#[async_trait]
impl FormRepository for SqliteRepository {
    async fn insert_form(
        &self,
        draft: &FormDraft,
        creator_id: UserId,
        created_at: DateTime<Utc>,
    ) -> Result<Form, StorageError> {
        let mut tx = self.pool.begin().await.map_err(db)?;

        let res = sqlx::query(
            r"
            INSERT INTO forms (title, description, is_quiz, status, creator_id, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )
        .bind(&draft.title)
        .bind(&draft.description)
        .bind(i64::from(draft.is_quiz))
        .bind(FormStatus::Draft.as_str())
        .bind(bind_id("creator_id", creator_id.value())?)
        .bind(created_at)
        .execute(&mut *tx)
        .await
        .map_err(db)?;
        let form_id = FormId::new(rowid_to_u64("form_id", res.last_insert_rowid())?);

        let mut questions = Vec::with_capacity(draft.questions.len());
        for (position, question) in (1_u32..).zip(&draft.questions) {
            let res = sqlx::query(
                r"
                INSERT INTO form_questions (form_id, text, kind, required, position)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ",
            )
            .bind(bind_id("form_id", form_id.value())?)
            .bind(&question.text)
            .bind(question.kind.as_str())
            .bind(i64::from(question.required))
            .bind(i64::from(position))
            .execute(&mut *tx)
            .await
            .map_err(db)?;
            let question_id =
                QuestionId::new(rowid_to_u64("question_id", res.last_insert_rowid())?);

            let mut options = Vec::with_capacity(question.options.len());
            for (option_position, option) in (1_u32..).zip(&question.options) {
                let res = sqlx::query(
                    r"
                    INSERT INTO form_options (question_id, text, is_correct, points, position)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                    ",
                )
                .bind(bind_id("question_id", question_id.value())?)
                .bind(&option.text)
                .bind(i64::from(option.is_correct))
                .bind(i64::from(option.points))
                .bind(i64::from(option_position))
                .execute(&mut *tx)
                .await
                .map_err(db)?;
                options.push(AnswerOption {
                    id: OptionId::new(rowid_to_u64("option_id", res.last_insert_rowid())?),
                    text: option.text.clone(),
                    is_correct: option.is_correct,
                    points: option.points,
                });
            }

            questions.push(Question {
                id: question_id,
                text: question.text.clone(),
                kind: question.kind,
                required: question.required,
                position,
                options,
            });
        }

        tx.commit().await.map_err(db)?;
        Ok(Form {
            id: form_id,
            title: draft.title.clone(),
            description: draft.description.clone(),
            is_quiz: draft.is_quiz,
            status: FormStatus::Draft,
            creator_id,
            created_at,
            questions,
        })
    }

    async fn get_form(&self, id: FormId) -> Result<Option<Form>, StorageError> {
        let row = sqlx::query(&format!("SELECT {FORM_COLUMNS} FROM forms WHERE id = ?1"))
            .bind(bind_id("form_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?;
        let Some(row) = row else {
            return Ok(None);
        };
        let mut form = form_from_row(&row)?;
        self.load_questions(&mut form).await?;
        Ok(Some(form))
    }

    async fn list_forms(&self) -> Result<Vec<Form>, StorageError> {
        let rows = sqlx::query(&format!("SELECT {FORM_COLUMNS} FROM forms ORDER BY id ASC"))
            .fetch_all(&self.pool)
            .await
            .map_err(db)?;
        let mut forms = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut form = form_from_row(row)?;
            self.load_questions(&mut form).await?;
            forms.push(form);
        }
        Ok(forms)
    }

    async fn update_form_status(
        &self,
        id: FormId,
        status: FormStatus,
    ) -> Result<(), StorageError> {
        let res = sqlx::query("UPDATE forms SET status = ?1 WHERE id = ?2")
            .bind(status.as_str())
            .bind(bind_id("form_id", id.value())?)
            .execute(&self.pool)
            .await
            .map_err(db)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn delete_form(&self, id: FormId) -> Result<(), StorageError> {
        let res = sqlx::query("DELETE FROM forms WHERE id = ?1")
            .bind(bind_id("form_id", id.value())?)
            .execute(&self.pool)
            .await
            .map_err(db)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn insert_response(
        &self,
        response: &NewFormResponse,
    ) -> Result<FormResponse, StorageError> {
        let answers = serde_json::to_string(&response.answers).map_err(ser)?;
        let res = sqlx::query(
            r"
            INSERT INTO form_responses (form_id, user_id, submitted_at, score, max_score, answers)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )
        .bind(bind_id("form_id", response.form_id.value())?)
        .bind(bind_id("user_id", response.user_id.value())?)
        .bind(response.submitted_at)
        .bind(response.score.map(i64::from))
        .bind(response.max_score.map(i64::from))
        .bind(answers)
        .execute(&self.pool)
        .await
        .map_err(db)?;

        Ok(FormResponse {
            id: ResponseId::new(rowid_to_u64("response_id", res.last_insert_rowid())?),
            form_id: response.form_id,
            user_id: response.user_id,
            submitted_at: response.submitted_at,
            score: response.score,
            max_score: response.max_score,
            answers: response.answers.clone(),
        })
    }

    async fn list_responses(&self, form_id: FormId) -> Result<Vec<FormResponse>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, form_id, user_id, submitted_at, score, max_score, answers
            FROM form_responses
            WHERE form_id = ?1
            ORDER BY submitted_at ASC, id ASC
            ",
        )
        .bind(bind_id("form_id", form_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;
        rows.iter().map(response_from_row).collect()
    }
}
