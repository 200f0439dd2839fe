use chrono::Utc;
use nexus_core::model::gamification::CATALOG;
use sqlx::SqlitePool;

use super::SqliteInitError;

const SCHEMA_V1: &[&str] = &[
    r"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY,
        email TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL,
        role TEXT NOT NULL CHECK (role IN ('ADMINISTRATOR', 'INSTRUCTOR', 'STUDENT')),
        xp INTEGER NOT NULL DEFAULT 0 CHECK (xp >= 0),
        password_hash TEXT NOT NULL,
        created_at TEXT NOT NULL
    );
    ",
    r"
    CREATE TABLE IF NOT EXISTS sessions (
        token TEXT PRIMARY KEY,
        user_id INTEGER NOT NULL,
        created_at TEXT NOT NULL,
        expires_at TEXT NOT NULL,
        FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
    );
    ",
    r"
    CREATE TABLE IF NOT EXISTS forms (
        id INTEGER PRIMARY KEY,
        title TEXT NOT NULL,
        description TEXT,
        is_quiz INTEGER NOT NULL CHECK (is_quiz IN (0, 1)),
        status TEXT NOT NULL,
        creator_id INTEGER NOT NULL,
        created_at TEXT NOT NULL,
        FOREIGN KEY (creator_id) REFERENCES users(id)
    );
    ",
    r"
    CREATE TABLE IF NOT EXISTS form_questions (
        id INTEGER PRIMARY KEY,
        form_id INTEGER NOT NULL,
        text TEXT NOT NULL,
        kind TEXT NOT NULL,
        required INTEGER NOT NULL CHECK (required IN (0, 1)),
        position INTEGER NOT NULL CHECK (position >= 0),
        FOREIGN KEY (form_id) REFERENCES forms(id) ON DELETE CASCADE
    );
    ",
    r"
    CREATE TABLE IF NOT EXISTS form_options (
        id INTEGER PRIMARY KEY,
        question_id INTEGER NOT NULL,
        text TEXT NOT NULL,
        is_correct INTEGER NOT NULL CHECK (is_correct IN (0, 1)),
        points INTEGER NOT NULL CHECK (points >= 0),
        position INTEGER NOT NULL CHECK (position >= 0),
        FOREIGN KEY (question_id) REFERENCES form_questions(id) ON DELETE CASCADE
    );
    ",
    r"
    CREATE TABLE IF NOT EXISTS form_responses (
        id INTEGER PRIMARY KEY,
        form_id INTEGER NOT NULL,
        user_id INTEGER NOT NULL,
        submitted_at TEXT NOT NULL,
        score INTEGER CHECK (score >= 0),
        max_score INTEGER CHECK (max_score >= 0),
        answers TEXT NOT NULL,
        FOREIGN KEY (form_id) REFERENCES forms(id) ON DELETE CASCADE,
        FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
    );
    ",
    r"
    CREATE TABLE IF NOT EXISTS courses (
        id INTEGER PRIMARY KEY,
        title TEXT NOT NULL,
        description TEXT,
        instructor_id INTEGER NOT NULL,
        status TEXT NOT NULL,
        created_at TEXT NOT NULL,
        published_at TEXT,
        FOREIGN KEY (instructor_id) REFERENCES users(id)
    );
    ",
    r"
    CREATE TABLE IF NOT EXISTS lessons (
        id INTEGER PRIMARY KEY,
        course_id INTEGER NOT NULL,
        title TEXT NOT NULL,
        position INTEGER NOT NULL CHECK (position >= 0),
        quiz_form_id INTEGER,
        FOREIGN KEY (course_id) REFERENCES courses(id) ON DELETE CASCADE,
        FOREIGN KEY (quiz_form_id) REFERENCES forms(id) ON DELETE SET NULL
    );
    ",
    r"
    CREATE TABLE IF NOT EXISTS enrollments (
        user_id INTEGER NOT NULL,
        course_id INTEGER NOT NULL,
        enrolled_at TEXT NOT NULL,
        PRIMARY KEY (user_id, course_id),
        FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
        FOREIGN KEY (course_id) REFERENCES courses(id) ON DELETE CASCADE
    );
    ",
    r"
    CREATE TABLE IF NOT EXISTS course_progress (
        id INTEGER PRIMARY KEY,
        user_id INTEGER NOT NULL,
        course_id INTEGER NOT NULL,
        progress_percentage INTEGER NOT NULL CHECK (progress_percentage BETWEEN 0 AND 100),
        completed_at TEXT,
        UNIQUE (user_id, course_id),
        FOREIGN KEY (user_id, course_id)
            REFERENCES enrollments(user_id, course_id) ON DELETE CASCADE
    );
    ",
    r"
    CREATE TABLE IF NOT EXISTS lesson_completions (
        progress_id INTEGER NOT NULL,
        lesson_id INTEGER NOT NULL,
        interaction TEXT NOT NULL CHECK (interaction IN ('VIEW', 'QUIZ')),
        score INTEGER CHECK (score BETWEEN 0 AND 100),
        completed_at TEXT NOT NULL,
        PRIMARY KEY (progress_id, lesson_id),
        FOREIGN KEY (progress_id) REFERENCES course_progress(id) ON DELETE CASCADE,
        FOREIGN KEY (lesson_id) REFERENCES lessons(id) ON DELETE CASCADE
    );
    ",
    r"
    CREATE TABLE IF NOT EXISTS calendar_events (
        id INTEGER PRIMARY KEY,
        title TEXT NOT NULL,
        description TEXT,
        location TEXT,
        start_at TEXT NOT NULL,
        end_at TEXT NOT NULL,
        all_day INTEGER NOT NULL CHECK (all_day IN (0, 1)),
        audience TEXT NOT NULL,
        recurrence TEXT NOT NULL,
        recurrence_end_date TEXT,
        created_by INTEGER NOT NULL,
        FOREIGN KEY (created_by) REFERENCES users(id)
    );
    ",
    r"
    CREATE TABLE IF NOT EXISTS achievements (
        id INTEGER PRIMARY KEY,
        slug TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL,
        description TEXT NOT NULL,
        points INTEGER NOT NULL CHECK (points >= 0)
    );
    ",
    r"
    CREATE TABLE IF NOT EXISTS user_achievements (
        user_id INTEGER NOT NULL,
        achievement_id INTEGER NOT NULL,
        unlocked_at TEXT NOT NULL,
        PRIMARY KEY (user_id, achievement_id),
        FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
        FOREIGN KEY (achievement_id) REFERENCES achievements(id) ON DELETE CASCADE
    );
    ",
    r"
    CREATE TABLE IF NOT EXISTS notifications (
        id INTEGER PRIMARY KEY,
        user_id INTEGER NOT NULL,
        title TEXT NOT NULL,
        description TEXT,
        link TEXT,
        read INTEGER NOT NULL DEFAULT 0 CHECK (read IN (0, 1)),
        created_at TEXT NOT NULL,
        FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
    );
    ",
    r"
    CREATE TABLE IF NOT EXISTS announcements (
        id INTEGER PRIMARY KEY,
        title TEXT NOT NULL,
        content TEXT NOT NULL,
        author_id INTEGER NOT NULL,
        audience TEXT NOT NULL,
        created_at TEXT NOT NULL,
        FOREIGN KEY (author_id) REFERENCES users(id)
    );
    ",
    r"
    CREATE TABLE IF NOT EXISTS conversations (
        id INTEGER PRIMARY KEY,
        participant_a INTEGER NOT NULL,
        participant_b INTEGER NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        UNIQUE (participant_a, participant_b),
        CHECK (participant_a < participant_b),
        FOREIGN KEY (participant_a) REFERENCES users(id) ON DELETE CASCADE,
        FOREIGN KEY (participant_b) REFERENCES users(id) ON DELETE CASCADE
    );
    ",
    r"
    CREATE TABLE IF NOT EXISTS chat_messages (
        id INTEGER PRIMARY KEY,
        conversation_id INTEGER NOT NULL,
        sender_id INTEGER NOT NULL,
        content TEXT NOT NULL,
        created_at TEXT NOT NULL,
        FOREIGN KEY (conversation_id) REFERENCES conversations(id) ON DELETE CASCADE,
        FOREIGN KEY (sender_id) REFERENCES users(id) ON DELETE CASCADE
    );
    ",
    r"
    CREATE TABLE IF NOT EXISTS security_logs (
        id INTEGER PRIMARY KEY,
        event TEXT NOT NULL,
        user_id INTEGER,
        email_attempt TEXT,
        ip_address TEXT,
        details TEXT,
        created_at TEXT NOT NULL,
        FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE SET NULL
    );
    ",
    r"
    CREATE TABLE IF NOT EXISTS platform_settings (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        platform_name TEXT NOT NULL,
        allow_public_registration INTEGER NOT NULL CHECK (allow_public_registration IN (0, 1)),
        email_notifications_enabled INTEGER NOT NULL
            CHECK (email_notifications_enabled IN (0, 1)),
        email_whitelist TEXT NOT NULL,
        email_provider_url TEXT
    );
    ",
    r"
    CREATE INDEX IF NOT EXISTS idx_lessons_course_position
        ON lessons (course_id, position);
    ",
    r"
    CREATE INDEX IF NOT EXISTS idx_form_questions_form_position
        ON form_questions (form_id, position);
    ",
    r"
    CREATE INDEX IF NOT EXISTS idx_calendar_events_start
        ON calendar_events (start_at);
    ",
    r"
    CREATE INDEX IF NOT EXISTS idx_notifications_user_created
        ON notifications (user_id, created_at);
    ",
    r"
    CREATE INDEX IF NOT EXISTS idx_chat_messages_conversation_created
        ON chat_messages (conversation_id, created_at);
    ",
    r"
    CREATE INDEX IF NOT EXISTS idx_security_logs_created
        ON security_logs (created_at);
    ",
];

const SCHEMA_V3: &[&str] = &[r"
    CREATE TABLE IF NOT EXISTS xp_grants (
        user_id INTEGER NOT NULL,
        grant_key TEXT NOT NULL,
        points INTEGER NOT NULL CHECK (points >= 0),
        granted_at TEXT NOT NULL,
        PRIMARY KEY (user_id, grant_key),
        FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
    );
    "];

/// Runs versioned migrations, each inside its own transaction.
///
/// Version 1 creates the schema, version 2 seeds the achievement catalog,
/// version 3 adds the one-time XP ledger.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;
        for statement in SCHEMA_V1 {
            sqlx::query(statement).execute(&mut *tx).await?;
        }
        mark_applied(&mut tx, 1).await?;
        tx.commit().await?;
    }

    if !is_applied(pool, 2).await? {
        let mut tx = pool.begin().await?;
        for entry in CATALOG {
            sqlx::query(
                r"
                    INSERT INTO achievements (slug, name, description, points)
                    VALUES (?1, ?2, ?3, ?4)
                    ON CONFLICT(slug) DO NOTHING
                ",
            )
            .bind(entry.slug)
            .bind(entry.name)
            .bind(entry.description)
            .bind(i64::from(entry.points))
            .execute(&mut *tx)
            .await?;
        }
        mark_applied(&mut tx, 2).await?;
        tx.commit().await?;
    }

    if !is_applied(pool, 3).await? {
        let mut tx = pool.begin().await?;
        for statement in SCHEMA_V3 {
            sqlx::query(statement).execute(&mut *tx).await?;
        }
        mark_applied(&mut tx, 3).await?;
        tx.commit().await?;
    }

    Ok(())
}

async fn mark_applied(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    version: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r"
            INSERT INTO schema_migrations (version, applied_at)
            VALUES (?1, ?2)
            ON CONFLICT(version) DO NOTHING
        ",
    )
    .bind(version)
    .bind(Utc::now())
    .execute(&mut **tx)
    .await?;
    Ok(())
}
