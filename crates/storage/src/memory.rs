use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nexus_core::model::gamification::CATALOG;
use nexus_core::model::{
    Achievement, AchievementId, Announcement, AnnouncementId, AnswerOption, CalendarEvent,
    ChatMessage, Conversation, ConversationId, Course, CourseId, CourseProgress, CourseStatus,
    EventDraft, EventId, Form, FormDraft, FormId, FormResponse, FormStatus, Lesson,
    LessonCompletionRecord, LessonId, MessageId, NewAnnouncement, NewCourse, NewLesson,
    NewNotification, NewSecurityLog, NewUser, Notification, NotificationId, OptionId,
    PlatformSettings, ProgressId, Question, QuestionId, ResponseId, Role, SecurityLog,
    SecurityLogId, User, UserAchievement, UserId, XpGrant,
};
use nexus_core::recurrence::DateRange;

use crate::repository::{
    AnnouncementRepository, CalendarRepository, ChatRepository, CourseRepository, FormRepository,
    GamificationRepository, NewEnrollment, NewFormResponse, NotificationRepository,
    ProgressRepository, SecurityLogRepository, SessionRecord, SessionRepository,
    SettingsRepository, StorageError, UserCredentials, UserRepository,
};

#[derive(Default)]
struct State {
    last_id: u64,
    users: BTreeMap<UserId, UserCredentials>,
    sessions: HashMap<String, SessionRecord>,
    courses: BTreeMap<CourseId, Course>,
    lessons: BTreeMap<LessonId, Lesson>,
    enrollments: HashMap<(UserId, CourseId), DateTime<Utc>>,
    progress: BTreeMap<ProgressId, CourseProgress>,
    forms: BTreeMap<FormId, Form>,
    responses: BTreeMap<ResponseId, FormResponse>,
    events: BTreeMap<EventId, CalendarEvent>,
    achievements: Vec<Achievement>,
    unlocks: Vec<UserAchievement>,
    xp_grants: HashSet<(UserId, XpGrant)>,
    notifications: BTreeMap<NotificationId, Notification>,
    announcements: BTreeMap<AnnouncementId, Announcement>,
    conversations: BTreeMap<ConversationId, Conversation>,
    messages: BTreeMap<MessageId, ChatMessage>,
    security_logs: BTreeMap<SecurityLogId, SecurityLog>,
    settings: Option<PlatformSettings>,
}

impl State {
    fn next_id(&mut self) -> u64 {
        self.last_id += 1;
        self.last_id
    }

    fn user_mut(&mut self, id: UserId) -> Result<&mut User, StorageError> {
        self.users
            .get_mut(&id)
            .map(|creds| &mut creds.user)
            .ok_or(StorageError::NotFound)
    }
}

/// In-memory repository implementation for tests and prototyping.
///
/// One lock guards every table so multi-row writes are atomic.
#[derive(Clone)]
pub struct InMemoryRepository {
    state: Arc<Mutex<State>>,
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRepository {
    /// Empty repository with the achievement catalog seeded.
    #[must_use]
    pub fn new() -> Self {
        let mut state = State::default();
        for entry in CATALOG {
            let id = AchievementId::new(state.next_id());
            state.achievements.push(Achievement {
                id,
                slug: entry.slug.to_owned(),
                name: entry.name.to_owned(),
                description: entry.description.to_owned(),
                points: entry.points,
            });
        }
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

//
// ─── USERS & SESSIONS ──────────────────────────────────────────────────────────
//

#[async_trait]
impl UserRepository for InMemoryRepository {
    async fn insert_user(
        &self,
        user: &NewUser,
        password_hash: &str,
        created_at: DateTime<Utc>,
    ) -> Result<User, StorageError> {
        let mut guard = self.lock()?;
        if guard.users.values().any(|c| c.user.email == user.email) {
            return Err(StorageError::Conflict);
        }
        let id = UserId::new(guard.next_id());
        let created = User {
            id,
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
            xp: 0,
            created_at,
        };
        guard.users.insert(
            id,
            UserCredentials {
                user: created.clone(),
                password_hash: password_hash.to_owned(),
            },
        );
        Ok(created)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.users.get(&id).map(|c| c.user.clone()))
    }

    async fn find_credentials(
        &self,
        email: &str,
    ) -> Result<Option<UserCredentials>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.users.values().find(|c| c.user.email == email).cloned())
    }

    async fn list_users(&self, role: Option<Role>) -> Result<Vec<User>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .users
            .values()
            .filter(|c| role.is_none_or(|r| c.user.role == r))
            .map(|c| c.user.clone())
            .collect())
    }

    async fn update_role(&self, id: UserId, role: Role) -> Result<User, StorageError> {
        let mut guard = self.lock()?;
        let user = guard.user_mut(id)?;
        user.role = role;
        Ok(user.clone())
    }

    async fn add_xp(&self, id: UserId, points: u32) -> Result<u32, StorageError> {
        let mut guard = self.lock()?;
        let user = guard.user_mut(id)?;
        user.xp = user.xp.saturating_add(points);
        Ok(user.xp)
    }
}

#[async_trait]
impl SessionRepository for InMemoryRepository {
    async fn create_session(&self, session: &SessionRecord) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        if guard.sessions.contains_key(&session.token) {
            return Err(StorageError::Conflict);
        }
        guard
            .sessions
            .insert(session.token.clone(), session.clone());
        Ok(())
    }

    async fn find_session(&self, token: &str) -> Result<Option<SessionRecord>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.sessions.get(token).cloned())
    }

    async fn delete_session(&self, token: &str) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard.sessions.remove(token);
        Ok(())
    }
}

//
// ─── COURSES & PROGRESS ────────────────────────────────────────────────────────
//

#[async_trait]
impl CourseRepository for InMemoryRepository {
    async fn insert_course(&self, course: &NewCourse) -> Result<Course, StorageError> {
        let mut guard = self.lock()?;
        let id = CourseId::new(guard.next_id());
        let created = Course {
            id,
            title: course.title.clone(),
            description: course.description.clone(),
            instructor_id: course.instructor_id,
            status: CourseStatus::Draft,
            created_at: course.created_at,
            published_at: None,
        };
        guard.courses.insert(id, created.clone());
        Ok(created)
    }

    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.courses.get(&id).cloned())
    }

    async fn list_courses(&self) -> Result<Vec<Course>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.courses.values().cloned().collect())
    }

    async fn update_course(&self, course: &Course) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let stored = guard
            .courses
            .get_mut(&course.id)
            .ok_or(StorageError::NotFound)?;
        *stored = course.clone();
        Ok(())
    }

    async fn insert_lesson(&self, lesson: &NewLesson) -> Result<Lesson, StorageError> {
        let mut guard = self.lock()?;
        if !guard.courses.contains_key(&lesson.course_id) {
            return Err(StorageError::NotFound);
        }
        let position = guard
            .lessons
            .values()
            .filter(|l| l.course_id == lesson.course_id)
            .map(|l| l.position)
            .max()
            .unwrap_or(0)
            + 1;
        let id = LessonId::new(guard.next_id());
        let created = Lesson {
            id,
            course_id: lesson.course_id,
            title: lesson.title.clone(),
            position,
            quiz_form_id: lesson.quiz_form_id,
        };
        guard.lessons.insert(id, created.clone());
        Ok(created)
    }

    async fn get_lesson(&self, id: LessonId) -> Result<Option<Lesson>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.lessons.get(&id).cloned())
    }

    async fn list_lessons(&self, course_id: CourseId) -> Result<Vec<Lesson>, StorageError> {
        let guard = self.lock()?;
        let mut lessons: Vec<Lesson> = guard
            .lessons
            .values()
            .filter(|l| l.course_id == course_id)
            .cloned()
            .collect();
        lessons.sort_by_key(|l| (l.position, l.id));
        Ok(lessons)
    }

    async fn count_lessons(&self, course_id: CourseId) -> Result<u64, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .lessons
            .values()
            .filter(|l| l.course_id == course_id)
            .count() as u64)
    }

    async fn count_published_by(&self, instructor_id: UserId) -> Result<u64, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .courses
            .values()
            .filter(|c| c.instructor_id == instructor_id && c.is_published())
            .count() as u64)
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn enroll(&self, enrollment: &NewEnrollment) -> Result<CourseProgress, StorageError> {
        let mut guard = self.lock()?;
        let key = (enrollment.user_id, enrollment.course_id);
        if guard.enrollments.contains_key(&key) {
            return Err(StorageError::Conflict);
        }
        if !guard.courses.contains_key(&enrollment.course_id)
            || !guard.users.contains_key(&enrollment.user_id)
        {
            return Err(StorageError::NotFound);
        }
        guard.enrollments.insert(key, enrollment.enrolled_at);
        let id = ProgressId::new(guard.next_id());
        let progress = CourseProgress {
            id,
            user_id: enrollment.user_id,
            course_id: enrollment.course_id,
            progress_percentage: enrollment.progress_percentage,
            completed_at: enrollment.completed_at,
            completed_lessons: Vec::new(),
        };
        guard.progress.insert(id, progress.clone());
        Ok(progress)
    }

    async fn unenroll(&self, user_id: UserId, course_id: CourseId) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        if guard.enrollments.remove(&(user_id, course_id)).is_none() {
            return Err(StorageError::NotFound);
        }
        guard
            .progress
            .retain(|_, p| !(p.user_id == user_id && p.course_id == course_id));
        Ok(())
    }

    async fn count_enrollments(&self, user_id: UserId) -> Result<u64, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .enrollments
            .keys()
            .filter(|(user, _)| *user == user_id)
            .count() as u64)
    }

    async fn get_progress(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Option<CourseProgress>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .progress
            .values()
            .find(|p| p.user_id == user_id && p.course_id == course_id)
            .cloned())
    }

    async fn list_progress(&self, user_id: UserId) -> Result<Vec<CourseProgress>, StorageError> {
        let guard = self.lock()?;
        let mut rows: Vec<CourseProgress> = guard
            .progress
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by_key(|p| p.course_id);
        Ok(rows)
    }

    async fn insert_completion(
        &self,
        progress_id: ProgressId,
        record: &LessonCompletionRecord,
    ) -> Result<bool, StorageError> {
        let mut guard = self.lock()?;
        let progress = guard
            .progress
            .get_mut(&progress_id)
            .ok_or(StorageError::NotFound)?;
        if progress.has_completed(record.lesson_id) {
            return Ok(false);
        }
        progress.completed_lessons.push(record.clone());
        Ok(true)
    }

    async fn update_progress(
        &self,
        progress_id: ProgressId,
        percentage: u8,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let progress = guard
            .progress
            .get_mut(&progress_id)
            .ok_or(StorageError::NotFound)?;
        progress.progress_percentage = percentage;
        progress.completed_at = completed_at;
        Ok(())
    }

    async fn count_completed_courses(&self, user_id: UserId) -> Result<u64, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .progress
            .values()
            .filter(|p| p.user_id == user_id && p.completed_at.is_some())
            .count() as u64)
    }
}

//
// ─── FORMS ─────────────────────────────────────────────────────────────────────
//

#[async_trait]
impl FormRepository for InMemoryRepository {
    async fn insert_form(
        &self,
        draft: &FormDraft,
        creator_id: UserId,
        created_at: DateTime<Utc>,
    ) -> Result<Form, StorageError> {
        let mut guard = self.lock()?;
        let id = FormId::new(guard.next_id());
        let mut questions = Vec::with_capacity(draft.questions.len());
        for (position, question) in (1_u32..).zip(&draft.questions) {
            let question_id = QuestionId::new(guard.next_id());
            let options = question
                .options
                .iter()
                .map(|option| AnswerOption {
                    id: OptionId::new(guard.next_id()),
                    text: option.text.clone(),
                    is_correct: option.is_correct,
                    points: option.points,
                })
                .collect();
            questions.push(Question {
                id: question_id,
                text: question.text.clone(),
                kind: question.kind,
                required: question.required,
                position,
                options,
            });
        }
        let form = Form {
            id,
            title: draft.title.clone(),
            description: draft.description.clone(),
            is_quiz: draft.is_quiz,
            status: FormStatus::Draft,
            creator_id,
            created_at,
            questions,
        };
        guard.forms.insert(id, form.clone());
        Ok(form)
    }

    async fn get_form(&self, id: FormId) -> Result<Option<Form>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.forms.get(&id).cloned())
    }

    async fn list_forms(&self) -> Result<Vec<Form>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.forms.values().cloned().collect())
    }

    async fn update_form_status(
        &self,
        id: FormId,
        status: FormStatus,
    ) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let form = guard.forms.get_mut(&id).ok_or(StorageError::NotFound)?;
        form.status = status;
        Ok(())
    }

    async fn delete_form(&self, id: FormId) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        if guard.forms.remove(&id).is_none() {
            return Err(StorageError::NotFound);
        }
        guard.responses.retain(|_, r| r.form_id != id);
        for lesson in guard.lessons.values_mut() {
            if lesson.quiz_form_id == Some(id) {
                lesson.quiz_form_id = None;
            }
        }
        Ok(())
    }

    async fn insert_response(
        &self,
        response: &NewFormResponse,
    ) -> Result<FormResponse, StorageError> {
        let mut guard = self.lock()?;
        if !guard.forms.contains_key(&response.form_id) {
            return Err(StorageError::NotFound);
        }
        let id = ResponseId::new(guard.next_id());
        let stored = FormResponse {
            id,
            form_id: response.form_id,
            user_id: response.user_id,
            submitted_at: response.submitted_at,
            score: response.score,
            max_score: response.max_score,
            answers: response.answers.clone(),
        };
        guard.responses.insert(id, stored.clone());
        Ok(stored)
    }

    async fn list_responses(&self, form_id: FormId) -> Result<Vec<FormResponse>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .responses
            .values()
            .filter(|r| r.form_id == form_id)
            .cloned()
            .collect())
    }
}

//
// ─── CALENDAR ──────────────────────────────────────────────────────────────────
//

fn event_from_draft(id: EventId, draft: &EventDraft, created_by: UserId) -> CalendarEvent {
    CalendarEvent {
        id,
        title: draft.title.clone(),
        description: draft.description.clone(),
        location: draft.location.clone(),
        start: draft.start,
        end: draft.end,
        all_day: draft.all_day,
        audience: draft.audience,
        recurrence: draft.recurrence,
        recurrence_end_date: draft.recurrence_end_date,
        created_by,
    }
}

#[async_trait]
impl CalendarRepository for InMemoryRepository {
    async fn insert_event(
        &self,
        draft: &EventDraft,
        created_by: UserId,
    ) -> Result<CalendarEvent, StorageError> {
        let mut guard = self.lock()?;
        let id = EventId::new(guard.next_id());
        let event = event_from_draft(id, draft, created_by);
        guard.events.insert(id, event.clone());
        Ok(event)
    }

    async fn update_event(
        &self,
        id: EventId,
        draft: &EventDraft,
    ) -> Result<CalendarEvent, StorageError> {
        let mut guard = self.lock()?;
        let stored = guard.events.get_mut(&id).ok_or(StorageError::NotFound)?;
        *stored = event_from_draft(id, draft, stored.created_by);
        Ok(stored.clone())
    }

    async fn get_event(&self, id: EventId) -> Result<Option<CalendarEvent>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.events.get(&id).cloned())
    }

    async fn delete_event(&self, id: EventId) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard
            .events
            .remove(&id)
            .map(|_| ())
            .ok_or(StorageError::NotFound)
    }

    async fn list_candidate_events(
        &self,
        range: DateRange,
    ) -> Result<Vec<CalendarEvent>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .events
            .values()
            .filter(|e| {
                e.start <= range.end()
                    && if e.recurrence.is_recurring() {
                        e.recurrence_end_date.is_none_or(|until| until >= range.start())
                    } else {
                        e.end >= range.start()
                    }
            })
            .cloned()
            .collect())
    }
}

//
// ─── GAMIFICATION ──────────────────────────────────────────────────────────────
//

#[async_trait]
impl GamificationRepository for InMemoryRepository {
    async fn list_achievements(&self) -> Result<Vec<Achievement>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.achievements.clone())
    }

    async fn find_achievement(&self, slug: &str) -> Result<Option<Achievement>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.achievements.iter().find(|a| a.slug == slug).cloned())
    }

    async fn has_achievement(
        &self,
        user_id: UserId,
        achievement: &Achievement,
    ) -> Result<bool, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .unlocks
            .iter()
            .any(|u| u.user_id == user_id && u.achievement.id == achievement.id))
    }

    async fn grant_achievement(
        &self,
        user_id: UserId,
        achievement: &Achievement,
        unlocked_at: DateTime<Utc>,
    ) -> Result<u32, StorageError> {
        let mut guard = self.lock()?;
        if guard
            .unlocks
            .iter()
            .any(|u| u.user_id == user_id && u.achievement.id == achievement.id)
        {
            return Err(StorageError::Conflict);
        }
        let user = guard.user_mut(user_id)?;
        user.xp = user.xp.saturating_add(achievement.points);
        let xp = user.xp;
        guard.unlocks.push(UserAchievement {
            user_id,
            achievement: achievement.clone(),
            unlocked_at,
        });
        Ok(xp)
    }

    async fn grant_xp_once(
        &self,
        user_id: UserId,
        grant: XpGrant,
        _granted_at: DateTime<Utc>,
    ) -> Result<Option<u32>, StorageError> {
        let mut guard = self.lock()?;
        if guard.xp_grants.contains(&(user_id, grant)) {
            return Ok(None);
        }
        let user = guard.user_mut(user_id)?;
        user.xp = user.xp.saturating_add(grant.points());
        let xp = user.xp;
        guard.xp_grants.insert((user_id, grant));
        Ok(Some(xp))
    }

    async fn list_user_achievements(
        &self,
        user_id: UserId,
    ) -> Result<Vec<UserAchievement>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .unlocks
            .iter()
            .filter(|u| u.user_id == user_id)
            .cloned()
            .collect())
    }
}

//
// ─── NOTIFICATIONS & ANNOUNCEMENTS ─────────────────────────────────────────────
//

#[async_trait]
impl NotificationRepository for InMemoryRepository {
    async fn insert_notifications(
        &self,
        notifications: &[NewNotification],
        created_at: DateTime<Utc>,
    ) -> Result<Vec<Notification>, StorageError> {
        let mut guard = self.lock()?;
        let mut created = Vec::with_capacity(notifications.len());
        for draft in notifications {
            let id = NotificationId::new(guard.next_id());
            let notification = Notification {
                id,
                user_id: draft.user_id,
                title: draft.title.clone(),
                description: draft.description.clone(),
                link: draft.link.clone(),
                read: false,
                created_at,
            };
            guard.notifications.insert(id, notification.clone());
            created.push(notification);
        }
        Ok(created)
    }

    async fn list_notifications(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Notification>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .notifications
            .values()
            .rev()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn mark_read(&self, user_id: UserId, id: NotificationId) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        match guard.notifications.get_mut(&id) {
            Some(n) if n.user_id == user_id => {
                n.read = true;
                Ok(())
            }
            _ => Err(StorageError::NotFound),
        }
    }

    async fn mark_all_read(&self, user_id: UserId) -> Result<u64, StorageError> {
        let mut guard = self.lock()?;
        let mut changed = 0;
        for n in guard.notifications.values_mut() {
            if n.user_id == user_id && !n.read {
                n.read = true;
                changed += 1;
            }
        }
        Ok(changed)
    }
}

#[async_trait]
impl AnnouncementRepository for InMemoryRepository {
    async fn insert_announcement(
        &self,
        announcement: &NewAnnouncement,
    ) -> Result<Announcement, StorageError> {
        let mut guard = self.lock()?;
        let id = AnnouncementId::new(guard.next_id());
        let stored = Announcement {
            id,
            title: announcement.title.clone(),
            content: announcement.content.clone(),
            author_id: announcement.author_id,
            audience: announcement.audience,
            created_at: announcement.created_at,
        };
        guard.announcements.insert(id, stored.clone());
        Ok(stored)
    }

    async fn list_announcements(&self) -> Result<Vec<Announcement>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.announcements.values().rev().cloned().collect())
    }
}

//
// ─── CHAT ──────────────────────────────────────────────────────────────────────
//

#[async_trait]
impl ChatRepository for InMemoryRepository {
    async fn find_or_create_conversation(
        &self,
        participants: [UserId; 2],
        at: DateTime<Utc>,
    ) -> Result<Conversation, StorageError> {
        let mut guard = self.lock()?;
        if let Some(existing) = guard
            .conversations
            .values()
            .find(|c| c.participants == participants)
        {
            return Ok(existing.clone());
        }
        let id = ConversationId::new(guard.next_id());
        let conversation = Conversation {
            id,
            participants,
            created_at: at,
            updated_at: at,
        };
        guard.conversations.insert(id, conversation.clone());
        Ok(conversation)
    }

    async fn get_conversation(
        &self,
        id: ConversationId,
    ) -> Result<Option<Conversation>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.conversations.get(&id).cloned())
    }

    async fn list_conversations(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Conversation>, StorageError> {
        let guard = self.lock()?;
        let mut rows: Vec<Conversation> = guard
            .conversations
            .values()
            .filter(|c| c.includes(user_id))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
        Ok(rows)
    }

    async fn insert_message(
        &self,
        conversation_id: ConversationId,
        sender_id: UserId,
        content: &str,
        at: DateTime<Utc>,
    ) -> Result<ChatMessage, StorageError> {
        let mut guard = self.lock()?;
        let id = MessageId::new(guard.next_id());
        let conversation = guard
            .conversations
            .get_mut(&conversation_id)
            .ok_or(StorageError::NotFound)?;
        conversation.updated_at = at;
        let message = ChatMessage {
            id,
            conversation_id,
            sender_id,
            content: content.to_owned(),
            created_at: at,
        };
        guard.messages.insert(id, message.clone());
        Ok(message)
    }

    async fn list_messages(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Vec<ChatMessage>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .messages
            .values()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect())
    }

    async fn get_message(&self, id: MessageId) -> Result<Option<ChatMessage>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.messages.get(&id).cloned())
    }
}

//
// ─── SECURITY & SETTINGS ───────────────────────────────────────────────────────
//

#[async_trait]
impl SecurityLogRepository for InMemoryRepository {
    async fn insert_log(&self, log: &NewSecurityLog) -> Result<SecurityLog, StorageError> {
        let mut guard = self.lock()?;
        let id = SecurityLogId::new(guard.next_id());
        let stored = SecurityLog {
            id,
            event: log.event,
            user_id: log.user_id,
            email_attempt: log.email_attempt.clone(),
            ip_address: log.ip_address.clone(),
            details: log.details.clone(),
            created_at: log.created_at,
        };
        guard.security_logs.insert(id, stored.clone());
        Ok(stored)
    }

    async fn list_logs(&self, limit: u32) -> Result<Vec<SecurityLog>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .security_logs
            .values()
            .rev()
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl SettingsRepository for InMemoryRepository {
    async fn get_settings(&self) -> Result<Option<PlatformSettings>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.settings.clone())
    }

    async fn save_settings(&self, settings: &PlatformSettings) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard.settings = Some(settings.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexus_core::model::InteractionType;
    use nexus_core::time::fixed_now;

    async fn seed_user(repo: &InMemoryRepository, email: &str) -> User {
        let draft = NewUser {
            email: email.into(),
            name: "Ada".into(),
            role: Role::Student,
        }
        .validate()
        .unwrap();
        repo.insert_user(&draft, "hash", fixed_now()).await.unwrap()
    }

    #[tokio::test]
    async fn duplicate_email_is_conflict() {
        let repo = InMemoryRepository::new();
        seed_user(&repo, "ada@corp.example").await;
        let dup = NewUser {
            email: "ada@corp.example".into(),
            name: "Other".into(),
            role: Role::Student,
        };
        let err = repo.insert_user(&dup, "hash", fixed_now()).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict));
    }

    #[tokio::test]
    async fn completion_is_recorded_once() {
        let repo = InMemoryRepository::new();
        let user = seed_user(&repo, "ada@corp.example").await;
        let course = repo
            .insert_course(&NewCourse::new("Rust", None, user.id, fixed_now()).unwrap())
            .await
            .unwrap();
        let lesson = repo
            .insert_lesson(&NewLesson::new(course.id, "Intro", None).unwrap())
            .await
            .unwrap();
        let progress = repo
            .enroll(&NewEnrollment {
                user_id: user.id,
                course_id: course.id,
                enrolled_at: fixed_now(),
                progress_percentage: 0,
                completed_at: None,
            })
            .await
            .unwrap();

        let record =
            LessonCompletionRecord::new(lesson.id, InteractionType::View, None, fixed_now())
                .unwrap();
        assert!(repo.insert_completion(progress.id, &record).await.unwrap());
        assert!(!repo.insert_completion(progress.id, &record).await.unwrap());

        let fetched = repo.get_progress(user.id, course.id).await.unwrap().unwrap();
        assert_eq!(fetched.completed_lessons.len(), 1);
    }

    #[tokio::test]
    async fn unenroll_removes_progress() {
        let repo = InMemoryRepository::new();
        let user = seed_user(&repo, "ada@corp.example").await;
        let course = repo
            .insert_course(&NewCourse::new("Rust", None, user.id, fixed_now()).unwrap())
            .await
            .unwrap();
        let enrollment = NewEnrollment {
            user_id: user.id,
            course_id: course.id,
            enrolled_at: fixed_now(),
            progress_percentage: 100,
            completed_at: Some(fixed_now()),
        };
        repo.enroll(&enrollment).await.unwrap();
        assert!(matches!(
            repo.enroll(&enrollment).await.unwrap_err(),
            StorageError::Conflict
        ));

        repo.unenroll(user.id, course.id).await.unwrap();
        assert!(repo.get_progress(user.id, course.id).await.unwrap().is_none());
        assert_eq!(repo.count_enrollments(user.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn grant_is_unique_and_adds_points() {
        let repo = InMemoryRepository::new();
        let user = seed_user(&repo, "ada@corp.example").await;
        let achievement = repo
            .find_achievement("first-enrollment")
            .await
            .unwrap()
            .unwrap();

        let xp = repo
            .grant_achievement(user.id, &achievement, fixed_now())
            .await
            .unwrap();
        assert_eq!(xp, achievement.points);
        assert!(matches!(
            repo.grant_achievement(user.id, &achievement, fixed_now())
                .await
                .unwrap_err(),
            StorageError::Conflict
        ));
        assert_eq!(repo.list_user_achievements(user.id).await.unwrap().len(), 1);
    }
}
