use nexus_core::model::gamification::slugs;
use nexus_core::model::{
    CourseId, FormDraft, FormSubmission, InteractionType, LessonId, NewUser, OptionDraft,
    QuestionDraft, QuestionKind, Role, SubmittedAnswer, User,
};
use nexus_core::time::{Clock, fixed_now};
use services::{AppServices, ProgressServiceError, ServiceOptions};
use storage::repository::{GamificationRepository, Storage, UserRepository};

struct Harness {
    app: AppServices,
    storage: Storage,
    instructor: User,
    student: User,
}

async fn harness() -> Harness {
    let storage = Storage::in_memory();
    let app = AppServices::from_storage(
        storage.clone(),
        Clock::manual(fixed_now()),
        ServiceOptions::default(),
    );
    let instructor = add_user(&storage, "ines@corp.example", Role::Instructor).await;
    let student = add_user(&storage, "sam@corp.example", Role::Student).await;
    Harness {
        app,
        storage,
        instructor,
        student,
    }
}

async fn add_user(storage: &Storage, email: &str, role: Role) -> User {
    let user = NewUser {
        email: email.into(),
        name: email.into(),
        role,
    };
    storage
        .users
        .insert_user(&user, "unused-hash", fixed_now())
        .await
        .expect("insert user")
}

async fn published_course(h: &Harness, lessons: usize) -> (CourseId, Vec<LessonId>) {
    let courses = h.app.courses();
    let course = courses
        .create_course(&h.instructor, "Onboarding", None)
        .await
        .expect("create course");
    let mut ids = Vec::new();
    for n in 0..lessons {
        let lesson = courses
            .add_lesson(&h.instructor, course.id, &format!("Lesson {n}"), None)
            .await
            .expect("add lesson");
        ids.push(lesson.id);
    }
    courses
        .publish(&h.instructor, course.id)
        .await
        .expect("publish");
    (course.id, ids)
}

async fn xp(h: &Harness, user: &User) -> u32 {
    h.app
        .gamification()
        .summary(user.id)
        .await
        .expect("summary")
        .xp
}

#[tokio::test]
async fn four_lesson_course_reaches_completion() {
    let h = harness().await;
    let (course_id, lessons) = published_course(&h, 4).await;
    let progress = h.app.progress();

    let enrolled = progress.enroll(h.student.id, course_id).await.unwrap();
    assert_eq!(enrolled.progress_percentage, 0);
    assert!(enrolled.completed_at.is_none());

    let first = progress
        .complete_lesson(h.student.id, course_id, lessons[0])
        .await
        .unwrap();
    assert!(first.recorded);
    assert_eq!(first.progress.progress_percentage, 25);

    let again = progress
        .complete_lesson(h.student.id, course_id, lessons[0])
        .await
        .unwrap();
    assert!(!again.recorded);
    assert_eq!(again.progress.progress_percentage, 25);

    let mut last = None;
    for lesson in &lessons[1..] {
        last = Some(
            progress
                .complete_lesson(h.student.id, course_id, *lesson)
                .await
                .unwrap(),
        );
    }
    let last = last.unwrap();
    assert!(last.course_completed);
    assert_eq!(last.progress.progress_percentage, 100);
    assert_eq!(last.progress.completed_at, Some(fixed_now()));

    // 4 lessons, course completion, first enrollment, first completion
    assert_eq!(xp(&h, &h.student).await, 4 * 10 + 100 + 10 + 50);
    let unlocked: Vec<String> = h
        .app
        .gamification()
        .summary(h.student.id)
        .await
        .unwrap()
        .achievements
        .into_iter()
        .map(|a| a.achievement.slug)
        .collect();
    assert_eq!(
        unlocked,
        vec![slugs::FIRST_ENROLLMENT, slugs::FIRST_COURSE_COMPLETED]
    );
    assert_eq!(
        h.app.notifications().list(h.student.id).await.unwrap().len(),
        2
    );
    assert_eq!(xp(&h, &h.instructor).await, 50);
}

#[tokio::test]
async fn zero_lesson_course_is_complete_on_enrollment() {
    let h = harness().await;
    let (course_id, _) = published_course(&h, 0).await;

    let progress = h
        .app
        .progress()
        .enroll(h.student.id, course_id)
        .await
        .unwrap();
    assert_eq!(progress.progress_percentage, 100);
    assert!(progress.completed_at.is_some());
    assert_eq!(xp(&h, &h.student).await, 10 + 100 + 50);
}

#[tokio::test]
async fn re_enrolling_does_not_pay_completion_xp_again() {
    let h = harness().await;
    let progress = h.app.progress();

    let (empty, _) = published_course(&h, 0).await;
    for _ in 0..5 {
        progress.enroll(h.student.id, empty).await.unwrap();
        progress.unenroll(h.student.id, empty).await.unwrap();
    }
    assert_eq!(xp(&h, &h.student).await, 10 + 100 + 50);

    let (course_id, lessons) = published_course(&h, 2).await;
    for _ in 0..2 {
        progress.enroll(h.student.id, course_id).await.unwrap();
        for lesson in &lessons {
            let outcome = progress
                .complete_lesson(h.student.id, course_id, *lesson)
                .await
                .unwrap();
            assert!(outcome.recorded);
        }
        progress.unenroll(h.student.id, course_id).await.unwrap();
    }
    assert_eq!(xp(&h, &h.student).await, 10 + 100 + 50 + 2 * 10 + 100);
}

#[tokio::test]
async fn enrollment_rules() {
    let h = harness().await;
    let draft = h
        .app
        .courses()
        .create_course(&h.instructor, "Draft", None)
        .await
        .unwrap();
    assert!(matches!(
        h.app.progress().enroll(h.student.id, draft.id).await,
        Err(ProgressServiceError::CourseNotPublished)
    ));

    let (course_id, lessons) = published_course(&h, 2).await;
    let progress = h.app.progress();
    progress.enroll(h.student.id, course_id).await.unwrap();
    assert!(matches!(
        progress.enroll(h.student.id, course_id).await,
        Err(ProgressServiceError::AlreadyEnrolled)
    ));

    progress
        .complete_lesson(h.student.id, course_id, lessons[0])
        .await
        .unwrap();
    progress.unenroll(h.student.id, course_id).await.unwrap();
    assert!(matches!(
        progress.get_progress(h.student.id, course_id).await,
        Err(ProgressServiceError::NotEnrolled)
    ));
    assert!(matches!(
        progress.unenroll(h.student.id, course_id).await,
        Err(ProgressServiceError::NotEnrolled)
    ));
}

#[tokio::test]
async fn lesson_must_belong_to_course() {
    let h = harness().await;
    let (course_a, _) = published_course(&h, 1).await;
    let (_, lessons_b) = published_course(&h, 1).await;
    let progress = h.app.progress();
    progress.enroll(h.student.id, course_a).await.unwrap();

    let err = progress
        .record_lesson_interaction(
            h.student.id,
            course_a,
            lessons_b[0],
            InteractionType::View,
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ProgressServiceError::LessonNotInCourse));
}

#[tokio::test]
async fn lesson_quiz_records_percent_score() {
    let h = harness().await;
    let forms = h.app.forms();
    let quiz = forms
        .create_form(
            &h.instructor,
            FormDraft {
                title: "Check".into(),
                description: None,
                is_quiz: true,
                questions: vec![
                    QuestionDraft {
                        text: "Pick one".into(),
                        kind: QuestionKind::SingleChoice,
                        required: true,
                        options: vec![
                            OptionDraft {
                                text: "right".into(),
                                is_correct: true,
                                points: 5,
                            },
                            OptionDraft {
                                text: "wrong".into(),
                                is_correct: false,
                                points: 0,
                            },
                        ],
                    },
                    QuestionDraft {
                        text: "Pick many".into(),
                        kind: QuestionKind::MultipleChoice,
                        required: false,
                        options: vec![
                            OptionDraft {
                                text: "a".into(),
                                is_correct: true,
                                points: 3,
                            },
                            OptionDraft {
                                text: "b".into(),
                                is_correct: true,
                                points: 2,
                            },
                            OptionDraft {
                                text: "c".into(),
                                is_correct: false,
                                points: 0,
                            },
                        ],
                    },
                ],
            },
        )
        .await
        .unwrap();
    forms.publish_form(&h.instructor, quiz.id).await.unwrap();

    let courses = h.app.courses();
    let course = courses
        .create_course(&h.instructor, "Quizzed", None)
        .await
        .unwrap();
    let plain = courses
        .add_lesson(&h.instructor, course.id, "Read", None)
        .await
        .unwrap();
    let gated = courses
        .add_lesson(&h.instructor, course.id, "Check", Some(quiz.id))
        .await
        .unwrap();
    courses.publish(&h.instructor, course.id).await.unwrap();

    let progress = h.app.progress();
    progress.enroll(h.student.id, course.id).await.unwrap();
    assert!(matches!(
        progress
            .submit_lesson_quiz(&h.student, course.id, plain.id, FormSubmission::default())
            .await,
        Err(ProgressServiceError::NoQuiz)
    ));

    let single = &quiz.questions[0];
    let multi = &quiz.questions[1];
    let submission = FormSubmission {
        answers: vec![
            SubmittedAnswer {
                question_id: single.id,
                selected_option_ids: vec![single.options[0].id],
                text: None,
            },
            SubmittedAnswer {
                question_id: multi.id,
                selected_option_ids: vec![multi.options[0].id, multi.options[2].id],
                text: None,
            },
        ],
    };
    let outcome = progress
        .submit_lesson_quiz(&h.student, course.id, gated.id, submission)
        .await
        .unwrap();
    assert_eq!(outcome.response.score, Some(8));
    assert_eq!(outcome.response.max_score, Some(10));
    assert_eq!(outcome.percent, Some(80));
    assert!(outcome.outcome.recorded);
    assert_eq!(outcome.outcome.progress.progress_percentage, 50);

    let record = &outcome.outcome.progress.completed_lessons[0];
    assert_eq!(record.interaction, InteractionType::Quiz);
    assert_eq!(record.score, Some(80));
}

#[tokio::test]
async fn achievement_is_granted_once() {
    let h = harness().await;
    let gamification = h.app.gamification();

    assert!(
        gamification
            .award_achievement(h.student.id, slugs::FIRST_ENROLLMENT)
            .await
            .unwrap()
    );
    assert!(
        !gamification
            .award_achievement(h.student.id, slugs::FIRST_ENROLLMENT)
            .await
            .unwrap()
    );
    assert!(
        !gamification
            .award_achievement(h.student.id, "no-such-badge")
            .await
            .unwrap()
    );
    assert_eq!(xp(&h, &h.student).await, 10);
    assert_eq!(
        h.storage
            .gamification
            .list_user_achievements(h.student.id)
            .await
            .unwrap()
            .len(),
        1
    );
}
