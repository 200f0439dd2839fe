use chrono::Duration;
use nexus_core::model::{
    Audience, CourseId, EventDraft, FormDraft, FormStatus, InteractionType,
    LessonCompletionRecord, NewCourse, NewLesson, NewSecurityLog, NewUser, OptionDraft,
    PlatformSettingsDraft, QuestionDraft, QuestionKind, Recurrence, Role, SecurityEvent,
    SubmittedAnswer, User, XpGrant, participant_pair,
};
use nexus_core::recurrence::DateRange;
use nexus_core::time::fixed_now;
use storage::StorageError;
use storage::repository::{
    CalendarRepository, ChatRepository, CourseRepository, FormRepository, GamificationRepository,
    NewEnrollment, NewFormResponse, ProgressRepository, SecurityLogRepository, SettingsRepository,
    UserRepository,
};
use storage::sqlite::SqliteRepository;

async fn connect(name: &str) -> SqliteRepository {
    let repo = SqliteRepository::connect(&format!("sqlite:file:{name}?mode=memory&cache=shared"))
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

async fn user(repo: &SqliteRepository, email: &str, role: Role) -> User {
    let draft = NewUser {
        email: email.into(),
        name: "Test User".into(),
        role,
    }
    .validate()
    .unwrap();
    repo.insert_user(&draft, "$argon2id$stub", fixed_now())
        .await
        .unwrap()
}

#[tokio::test]
async fn sqlite_enrollment_tracks_completions_and_cascades() {
    let repo = connect("memdb_progress").await;
    let instructor = user(&repo, "teach@corp.example", Role::Instructor).await;
    let learner = user(&repo, "learn@corp.example", Role::Student).await;

    let course = repo
        .insert_course(&NewCourse::new("Safety", None, instructor.id, fixed_now()).unwrap())
        .await
        .unwrap();
    let first = repo
        .insert_lesson(&NewLesson::new(course.id, "One", None).unwrap())
        .await
        .unwrap();
    let second = repo
        .insert_lesson(&NewLesson::new(course.id, "Two", None).unwrap())
        .await
        .unwrap();
    assert_eq!((first.position, second.position), (1, 2));
    assert_eq!(repo.count_lessons(course.id).await.unwrap(), 2);

    let enrollment = NewEnrollment {
        user_id: learner.id,
        course_id: course.id,
        enrolled_at: fixed_now(),
        progress_percentage: 0,
        completed_at: None,
    };
    let progress = repo.enroll(&enrollment).await.unwrap();
    assert!(matches!(
        repo.enroll(&enrollment).await.unwrap_err(),
        StorageError::Conflict
    ));

    let record = LessonCompletionRecord::new(
        first.id,
        InteractionType::Quiz,
        Some(80),
        fixed_now() + Duration::minutes(5),
    )
    .unwrap();
    assert!(repo.insert_completion(progress.id, &record).await.unwrap());
    assert!(!repo.insert_completion(progress.id, &record).await.unwrap());
    repo.update_progress(progress.id, 50, None).await.unwrap();

    let fetched = repo
        .get_progress(learner.id, course.id)
        .await
        .unwrap()
        .expect("progress");
    assert_eq!(fetched.progress_percentage, 50);
    assert_eq!(fetched.completed_lessons, vec![record]);
    assert_eq!(repo.count_completed_courses(learner.id).await.unwrap(), 0);

    repo.unenroll(learner.id, course.id).await.unwrap();
    assert!(repo.get_progress(learner.id, course.id).await.unwrap().is_none());
    assert!(repo.list_progress(learner.id).await.unwrap().is_empty());
    assert!(matches!(
        repo.unenroll(learner.id, course.id).await.unwrap_err(),
        StorageError::NotFound
    ));
}

#[tokio::test]
async fn sqlite_forms_round_trip_questions_and_responses() {
    let repo = connect("memdb_forms").await;
    let author = user(&repo, "author@corp.example", Role::Instructor).await;

    let draft = FormDraft {
        title: "Fire drill".into(),
        description: None,
        is_quiz: true,
        questions: vec![QuestionDraft {
            text: "Which exit?".into(),
            kind: QuestionKind::SingleChoice,
            required: true,
            options: vec![
                OptionDraft {
                    text: "North".into(),
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
    .validate()
    .unwrap();

    let form = repo.insert_form(&draft, author.id, fixed_now()).await.unwrap();
    repo.update_form_status(form.id, FormStatus::Published)
        .await
        .unwrap();

    let fetched = repo.get_form(form.id).await.unwrap().expect("form");
    assert_eq!(fetched.status, FormStatus::Published);
    assert_eq!(fetched.questions, form.questions);

    let question = &fetched.questions[0];
    let response = repo
        .insert_response(&NewFormResponse {
            form_id: form.id,
            user_id: author.id,
            submitted_at: fixed_now(),
            score: Some(5),
            max_score: Some(5),
            answers: vec![SubmittedAnswer {
                question_id: question.id,
                selected_option_ids: vec![question.options[0].id],
                text: None,
            }],
        })
        .await
        .unwrap();

    let responses = repo.list_responses(form.id).await.unwrap();
    assert_eq!(responses, vec![response]);

    repo.delete_form(form.id).await.unwrap();
    assert!(repo.list_responses(form.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn sqlite_candidate_events_cover_open_ended_series() {
    let repo = connect("memdb_calendar").await;
    let admin = user(&repo, "admin@corp.example", Role::Administrator).await;
    let start = fixed_now() - Duration::days(30);

    let weekly = EventDraft {
        title: "Stand-up".into(),
        description: None,
        location: None,
        start,
        end: start + Duration::minutes(30),
        all_day: false,
        audience: Audience::All,
        recurrence: Recurrence::Weekly,
        recurrence_end_date: None,
    };
    let one_off = EventDraft {
        title: "Old town hall".into(),
        recurrence: Recurrence::None,
        ..weekly.clone()
    };
    let weekly = repo.insert_event(&weekly, admin.id).await.unwrap();
    repo.insert_event(&one_off, admin.id).await.unwrap();

    let range = DateRange::new(fixed_now(), fixed_now() + Duration::days(7)).unwrap();
    let events = repo.list_candidate_events(range).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].id, weekly.id);
}

#[tokio::test]
async fn sqlite_achievements_are_seeded_and_granted_once() {
    let repo = connect("memdb_gamification").await;
    let learner = user(&repo, "learner@corp.example", Role::Student).await;

    let catalog = repo.list_achievements().await.unwrap();
    assert_eq!(catalog.len(), 4);

    let first = repo
        .find_achievement("first-enrollment")
        .await
        .unwrap()
        .expect("seeded");
    let xp = repo
        .grant_achievement(learner.id, &first, fixed_now())
        .await
        .unwrap();
    assert_eq!(xp, first.points);
    assert!(matches!(
        repo.grant_achievement(learner.id, &first, fixed_now())
            .await
            .unwrap_err(),
        StorageError::Conflict
    ));

    let stored = repo.get_user(learner.id).await.unwrap().unwrap();
    assert_eq!(stored.xp, first.points);
    assert!(repo.has_achievement(learner.id, &first).await.unwrap());
}

#[tokio::test]
async fn sqlite_xp_grants_pay_once_per_key() {
    let repo = connect("memdb_xp_grants").await;
    let learner = user(&repo, "learner@corp.example", Role::Student).await;
    let course = XpGrant::CourseCompleted(CourseId::new(7));

    assert_eq!(
        repo.grant_xp_once(learner.id, course, fixed_now())
            .await
            .unwrap(),
        Some(100)
    );
    assert_eq!(
        repo.grant_xp_once(learner.id, course, fixed_now())
            .await
            .unwrap(),
        None
    );
    assert_eq!(
        repo.grant_xp_once(learner.id, XpGrant::CourseCompleted(CourseId::new(8)), fixed_now())
            .await
            .unwrap(),
        Some(200)
    );
    assert_eq!(repo.get_user(learner.id).await.unwrap().unwrap().xp, 200);
}

#[tokio::test]
async fn sqlite_chat_reuses_conversation_and_bumps_activity() {
    let repo = connect("memdb_chat").await;
    let a = user(&repo, "a@corp.example", Role::Student).await;
    let b = user(&repo, "b@corp.example", Role::Student).await;

    let pair = participant_pair(b.id, a.id).unwrap();
    let conversation = repo
        .find_or_create_conversation(pair, fixed_now())
        .await
        .unwrap();
    let again = repo
        .find_or_create_conversation(pair, fixed_now() + Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(conversation.id, again.id);

    let later = fixed_now() + Duration::minutes(10);
    repo.insert_message(conversation.id, a.id, "hello", later)
        .await
        .unwrap();

    let refreshed = repo
        .get_conversation(conversation.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(refreshed.updated_at, later);
    assert_eq!(repo.list_messages(conversation.id).await.unwrap().len(), 1);
    assert_eq!(repo.list_conversations(b.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn sqlite_settings_and_security_logs_persist() {
    let repo = connect("memdb_admin").await;
    assert!(repo.get_settings().await.unwrap().is_none());

    let settings = PlatformSettingsDraft {
        platform_name: Some("Acme Academy".into()),
        allow_public_registration: true,
        email_notifications_enabled: true,
        email_whitelist: vec!["qa@corp.example".into()],
        email_provider_url: Some("https://mail.corp.example/send".into()),
    }
    .validate()
    .unwrap();
    repo.save_settings(&settings).await.unwrap();
    assert_eq!(repo.get_settings().await.unwrap(), Some(settings));

    repo.insert_log(&NewSecurityLog::new(SecurityEvent::FailedLogin, fixed_now()).email("x@y.z"))
        .await
        .unwrap();
    repo.insert_log(&NewSecurityLog::new(
        SecurityEvent::LoginRateLimited,
        fixed_now() + Duration::minutes(1),
    ))
    .await
    .unwrap();

    let logs = repo.list_logs(10).await.unwrap();
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0].event, SecurityEvent::LoginRateLimited);
    assert_eq!(logs[1].email_attempt.as_deref(), Some("x@y.z"));
}
