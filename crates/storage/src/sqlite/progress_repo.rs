use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nexus_core::model::{
    CourseId, CourseProgress, InteractionType, LessonCompletionRecord, LessonId, ProgressId,
    UserId,
};
use sqlx::sqlite::SqliteRow;

use super::SqliteRepository;
use super::mapping::{
    bind_id, count_col, db, id_col, opt_time_col, opt_u32_col, ser, text_col, time_col, u32_col,
};
use crate::repository::{NewEnrollment, ProgressRepository, StorageError};

const PROGRESS_COLUMNS: &str = "id, user_id, course_id, progress_percentage, completed_at";

fn progress_from_row(row: &SqliteRow) -> Result<CourseProgress, StorageError> {
    let percentage = u32_col(row, "progress_percentage")?;
    Ok(CourseProgress {
        id: id_col(row, "id", ProgressId::new)?,
        user_id: id_col(row, "user_id", UserId::new)?,
        course_id: id_col(row, "course_id", CourseId::new)?,
        progress_percentage: u8::try_from(percentage)
            .map_err(|_| StorageError::Serialization(format!("invalid percentage: {percentage}")))?,
        completed_at: opt_time_col(row, "completed_at")?,
        completed_lessons: Vec::new(),
    })
}

fn completion_from_row(row: &SqliteRow) -> Result<LessonCompletionRecord, StorageError> {
    Ok(LessonCompletionRecord {
        lesson_id: id_col(row, "lesson_id", LessonId::new)?,
        interaction: InteractionType::parse(&text_col(row, "interaction")?).map_err(ser)?,
        score: opt_u32_col(row, "score")?,
        completed_at: time_col(row, "completed_at")?,
    })
}

impl SqliteRepository {
    /// Attach completion records to already-loaded progress rows.
    async fn load_completions(
        &self,
        rows: &mut [CourseProgress],
        user_id: UserId,
    ) -> Result<(), StorageError> {
        if rows.is_empty() {
            return Ok(());
        }
        let completions = sqlx::query(
            r"
            SELECT lc.progress_id, lc.lesson_id, lc.interaction, lc.score, lc.completed_at
            FROM lesson_completions lc
            JOIN course_progress cp ON cp.id = lc.progress_id
            WHERE cp.user_id = ?1
            ORDER BY lc.completed_at ASC, lc.lesson_id ASC
            ",
        )
        .bind(bind_id("user_id", user_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;

        let mut by_progress: HashMap<ProgressId, Vec<LessonCompletionRecord>> = HashMap::new();
        for row in &completions {
            let progress_id = id_col(row, "progress_id", ProgressId::new)?;
            by_progress
                .entry(progress_id)
                .or_default()
                .push(completion_from_row(row)?);
        }
        for progress in rows.iter_mut() {
            if let Some(records) = by_progress.remove(&progress.id) {
                progress.completed_lessons = records;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ProgressRepository for SqliteRepository {
    async fn enroll(&self, enrollment: &NewEnrollment) -> Result<CourseProgress, StorageError> {
        let user_id = bind_id("user_id", enrollment.user_id.value())?;
        let course_id = bind_id("course_id", enrollment.course_id.value())?;

        let mut tx = self.pool.begin().await.map_err(db)?;
        sqlx::query(
            "INSERT INTO enrollments (user_id, course_id, enrolled_at) VALUES (?1, ?2, ?3)",
        )
        .bind(user_id)
        .bind(course_id)
        .bind(enrollment.enrolled_at)
        .execute(&mut *tx)
        .await
        .map_err(db)?;

        let row = sqlx::query(&format!(
            r"
            INSERT INTO course_progress (user_id, course_id, progress_percentage, completed_at)
            VALUES (?1, ?2, ?3, ?4)
            RETURNING {PROGRESS_COLUMNS}
            "
        ))
        .bind(user_id)
        .bind(course_id)
        .bind(i64::from(enrollment.progress_percentage))
        .bind(enrollment.completed_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(db)?;
        let progress = progress_from_row(&row)?;

        tx.commit().await.map_err(db)?;
        Ok(progress)
    }

    async fn unenroll(&self, user_id: UserId, course_id: CourseId) -> Result<(), StorageError> {
        let user_id = bind_id("user_id", user_id.value())?;
        let course_id = bind_id("course_id", course_id.value())?;

        let mut tx = self.pool.begin().await.map_err(db)?;
        sqlx::query(
            r"
            DELETE FROM lesson_completions
            WHERE progress_id IN (
                SELECT id FROM course_progress WHERE user_id = ?1 AND course_id = ?2
            )
            ",
        )
        .bind(user_id)
        .bind(course_id)
        .execute(&mut *tx)
        .await
        .map_err(db)?;
        sqlx::query("DELETE FROM course_progress WHERE user_id = ?1 AND course_id = ?2")
            .bind(user_id)
            .bind(course_id)
            .execute(&mut *tx)
            .await
            .map_err(db)?;
        let res = sqlx::query("DELETE FROM enrollments WHERE user_id = ?1 AND course_id = ?2")
            .bind(user_id)
            .bind(course_id)
            .execute(&mut *tx)
            .await
            .map_err(db)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        tx.commit().await.map_err(db)?;
        Ok(())
    }

    async fn count_enrollments(&self, user_id: UserId) -> Result<u64, StorageError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM enrollments WHERE user_id = ?1")
            .bind(bind_id("user_id", user_id.value())?)
            .fetch_one(&self.pool)
            .await
            .map_err(db)?;
        count_col(&row)
    }

    async fn get_progress(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Option<CourseProgress>, StorageError> {
        let row = sqlx::query(&format!(
            "SELECT {PROGRESS_COLUMNS} FROM course_progress WHERE user_id = ?1 AND course_id = ?2"
        ))
        .bind(bind_id("user_id", user_id.value())?)
        .bind(bind_id("course_id", course_id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut rows = [progress_from_row(&row)?];
        self.load_completions(&mut rows, user_id).await?;
        let [progress] = rows;
        Ok(Some(progress))
    }

    async fn list_progress(&self, user_id: UserId) -> Result<Vec<CourseProgress>, StorageError> {
        let rows = sqlx::query(&format!(
            "SELECT {PROGRESS_COLUMNS} FROM course_progress WHERE user_id = ?1 ORDER BY course_id"
        ))
        .bind(bind_id("user_id", user_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;

        let mut progress = rows
            .iter()
            .map(progress_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        self.load_completions(&mut progress, user_id).await?;
        Ok(progress)
    }

    async fn insert_completion(
        &self,
        progress_id: ProgressId,
        record: &LessonCompletionRecord,
    ) -> Result<bool, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO lesson_completions (progress_id, lesson_id, interaction, score, completed_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(progress_id, lesson_id) DO NOTHING
            ",
        )
        .bind(bind_id("progress_id", progress_id.value())?)
        .bind(bind_id("lesson_id", record.lesson_id.value())?)
        .bind(record.interaction.as_str())
        .bind(record.score.map(i64::from))
        .bind(record.completed_at)
        .execute(&self.pool)
        .await
        .map_err(db)?;
        Ok(res.rows_affected() == 1)
    }

    async fn update_progress(
        &self,
        progress_id: ProgressId,
        percentage: u8,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<(), StorageError> {
        let res = sqlx::query(
            "UPDATE course_progress SET progress_percentage = ?1, completed_at = ?2 WHERE id = ?3",
        )
        .bind(i64::from(percentage))
        .bind(completed_at)
        .bind(bind_id("progress_id", progress_id.value())?)
        .execute(&self.pool)
        .await
        .map_err(db)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn count_completed_courses(&self, user_id: UserId) -> Result<u64, StorageError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM course_progress WHERE user_id = ?1 AND completed_at IS NOT NULL",
        )
        .bind(bind_id("user_id", user_id.value())?)
        .fetch_one(&self.pool)
        .await
        .map_err(db)?;
        count_col(&row)
    }
}
