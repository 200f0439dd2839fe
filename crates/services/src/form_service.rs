use std::sync::Arc;

use nexus_core::model::{
    Form, FormDraft, FormError, FormId, FormResponse, FormStatus, FormSubmission, User,
};
use nexus_core::scoring::score_submission;
use storage::repository::{FormRepository, NewFormResponse, StorageError};
use tracing::{debug, info};

use crate::Clock;
use crate::error::FormServiceError;

/// Form and quiz authoring, submission, and auto-grading.
#[derive(Clone)]
pub struct FormService {
    clock: Clock,
    forms: Arc<dyn FormRepository>,
}

impl FormService {
    #[must_use]
    pub fn new(clock: Clock, forms: Arc<dyn FormRepository>) -> Self {
        Self { clock, forms }
    }

    /// # Errors
    ///
    /// Returns `FormServiceError::Forbidden` for students and
    /// `FormServiceError::Form` when the draft is malformed.
    pub async fn create_form(
        &self,
        actor: &User,
        draft: FormDraft,
    ) -> Result<Form, FormServiceError> {
        if !actor.role.can_author() {
            return Err(FormServiceError::Forbidden);
        }
        let draft = draft.validate()?;
        let form = self
            .forms
            .insert_form(&draft, actor.id, self.clock.now())
            .await?;
        info!(form = %form.id, quiz = form.is_quiz, "form created");
        Ok(form)
    }

    /// # Errors
    ///
    /// Returns `FormServiceError::Form` unless the form is a draft.
    pub async fn publish_form(&self, actor: &User, id: FormId) -> Result<Form, FormServiceError> {
        let mut form = self.managed_form(actor, id).await?;
        form.publish()?;
        self.forms.update_form_status(form.id, form.status).await?;
        Ok(form)
    }

    /// Fetch a form as `viewer` may see it.
    ///
    /// Drafts are hidden from non-managers, and the answer key is stripped
    /// from quizzes they can only take.
    ///
    /// # Errors
    ///
    /// Returns `FormServiceError::NotFound` when missing or hidden.
    pub async fn get_form(&self, viewer: &User, id: FormId) -> Result<Form, FormServiceError> {
        let form = self.forms.get_form(id).await?.ok_or(FormServiceError::NotFound)?;
        present(form, viewer).ok_or(FormServiceError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `FormServiceError::Storage` if repository access fails.
    pub async fn list_forms(&self, viewer: &User) -> Result<Vec<Form>, FormServiceError> {
        let forms = self.forms.list_forms().await?;
        Ok(forms
            .into_iter()
            .filter_map(|form| present(form, viewer))
            .collect())
    }

    /// Delete a form along with its responses.
    ///
    /// # Errors
    ///
    /// Returns `FormServiceError::Forbidden` unless `actor` owns the form or is an admin.
    pub async fn delete_form(&self, actor: &User, id: FormId) -> Result<(), FormServiceError> {
        let form = self.managed_form(actor, id).await?;
        self.forms.delete_form(form.id).await?;
        info!(form = %form.id, "form deleted");
        Ok(())
    }

    /// Validate, score, and store a submission.
    ///
    /// # Errors
    ///
    /// Returns `FormServiceError::Form` when the form is closed or the
    /// submission does not fit it.
    pub async fn submit_response(
        &self,
        user: &User,
        id: FormId,
        submission: FormSubmission,
    ) -> Result<FormResponse, FormServiceError> {
        let form = self.forms.get_form(id).await?.ok_or(FormServiceError::NotFound)?;
        self.submit_to(&form, user, submission).await
    }

    /// Submit against an already loaded form.
    pub(crate) async fn submit_to(
        &self,
        form: &Form,
        user: &User,
        submission: FormSubmission,
    ) -> Result<FormResponse, FormServiceError> {
        if form.status != FormStatus::Published {
            return Err(FormError::NotPublished.into());
        }
        submission.validate_against(form)?;
        let summary = score_submission(form, &submission);
        let response = self
            .forms
            .insert_response(&NewFormResponse {
                form_id: form.id,
                user_id: user.id,
                submitted_at: self.clock.now(),
                score: summary.score,
                max_score: summary.max_score,
                answers: submission.answers,
            })
            .await?;
        debug!(
            form = %form.id,
            user = %user.id,
            score = ?response.score,
            max_score = ?response.max_score,
            "form response stored"
        );
        Ok(response)
    }

    /// # Errors
    ///
    /// Returns `FormServiceError::Forbidden` unless `actor` owns the form or is an admin.
    pub async fn list_responses(
        &self,
        actor: &User,
        id: FormId,
    ) -> Result<Vec<FormResponse>, FormServiceError> {
        let form = self.managed_form(actor, id).await?;
        Ok(self.forms.list_responses(form.id).await?)
    }

    /// Raw lookup without visibility rules.
    pub(crate) async fn load(&self, id: FormId) -> Result<Option<Form>, StorageError> {
        self.forms.get_form(id).await
    }

    async fn managed_form(&self, actor: &User, id: FormId) -> Result<Form, FormServiceError> {
        let form = self.forms.get_form(id).await?.ok_or(FormServiceError::NotFound)?;
        if !can_manage(&form, actor) {
            return Err(FormServiceError::Forbidden);
        }
        Ok(form)
    }
}

fn can_manage(form: &Form, user: &User) -> bool {
    user.role.is_admin() || form.creator_id == user.id
}

fn present(mut form: Form, viewer: &User) -> Option<Form> {
    if can_manage(&form, viewer) {
        return Some(form);
    }
    if form.status != FormStatus::Published {
        return None;
    }
    for option in form.questions.iter_mut().flat_map(|q| q.options.iter_mut()) {
        option.is_correct = false;
        option.points = 0;
    }
    Some(form)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexus_core::model::{
        OptionDraft, QuestionDraft, QuestionKind, Role, SubmittedAnswer, UserId,
    };
    use nexus_core::time::{fixed_clock, fixed_now};
    use storage::InMemoryRepository;

    fn user(id: u64, role: Role) -> User {
        User {
            id: UserId::new(id),
            email: format!("u{id}@corp.example"),
            name: format!("User {id}"),
            role,
            xp: 0,
            created_at: fixed_now(),
        }
    }

    fn quiz() -> FormDraft {
        FormDraft {
            title: "Safety quiz".into(),
            description: None,
            is_quiz: true,
            questions: vec![QuestionDraft {
                text: "Exit on fire?".into(),
                kind: QuestionKind::SingleChoice,
                required: true,
                options: vec![
                    OptionDraft {
                        text: "Stairs".into(),
                        is_correct: true,
                        points: 5,
                    },
                    OptionDraft {
                        text: "Elevator".into(),
                        is_correct: false,
                        points: 0,
                    },
                ],
            }],
        }
    }

    #[tokio::test]
    async fn quiz_submission_is_scored_and_key_hidden_from_students() {
        let service = FormService::new(fixed_clock(), Arc::new(InMemoryRepository::new()));
        let author = user(1, Role::Instructor);
        let student = user(2, Role::Student);

        let form = service.create_form(&author, quiz()).await.unwrap();
        assert!(matches!(
            service.get_form(&student, form.id).await,
            Err(FormServiceError::NotFound)
        ));
        service.publish_form(&author, form.id).await.unwrap();

        let seen = service.get_form(&student, form.id).await.unwrap();
        assert!(seen.questions[0].options.iter().all(|o| !o.is_correct));

        let question = &form.questions[0];
        let response = service
            .submit_response(
                &student,
                form.id,
                FormSubmission {
                    answers: vec![SubmittedAnswer {
                        question_id: question.id,
                        selected_option_ids: vec![question.options[0].id],
                        text: None,
                    }],
                },
            )
            .await
            .unwrap();
        assert_eq!(response.score, Some(5));
        assert_eq!(response.max_score, Some(5));

        assert!(matches!(
            service.list_responses(&student, form.id).await,
            Err(FormServiceError::Forbidden)
        ));
        assert_eq!(service.list_responses(&author, form.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn draft_forms_reject_submissions() {
        let service = FormService::new(fixed_clock(), Arc::new(InMemoryRepository::new()));
        let author = user(1, Role::Instructor);
        let form = service.create_form(&author, quiz()).await.unwrap();

        let err = service
            .submit_response(&user(2, Role::Student), form.id, FormSubmission::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FormServiceError::Form(FormError::NotPublished)));
    }

    #[tokio::test]
    async fn students_cannot_author_forms() {
        let service = FormService::new(fixed_clock(), Arc::new(InMemoryRepository::new()));
        let err = service
            .create_form(&user(2, Role::Student), quiz())
            .await
            .unwrap_err();
        assert!(matches!(err, FormServiceError::Forbidden));
    }
}
