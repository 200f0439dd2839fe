use async_trait::async_trait;
use nexus_core::model::{
    Course, CourseId, CourseStatus, FormId, Lesson, LessonId, NewCourse, NewLesson, UserId,
};
use sqlx::sqlite::SqliteRow;

use super::SqliteRepository;
use super::mapping::{
    bind_id, count_col, db, id_col, opt_id_col, opt_text_col, opt_time_col, ser, text_col,
    time_col, u32_col,
};
use crate::repository::{CourseRepository, StorageError};

const COURSE_COLUMNS: &str =
    "id, title, description, instructor_id, status, created_at, published_at";
const LESSON_COLUMNS: &str = "id, course_id, title, position, quiz_form_id";

fn course_from_row(row: &SqliteRow) -> Result<Course, StorageError> {
    Ok(Course {
        id: id_col(row, "id", CourseId::new)?,
        title: text_col(row, "title")?,
        description: opt_text_col(row, "description")?,
        instructor_id: id_col(row, "instructor_id", UserId::new)?,
        status: CourseStatus::parse(&text_col(row, "status")?).map_err(ser)?,
        created_at: time_col(row, "created_at")?,
        published_at: opt_time_col(row, "published_at")?,
    })
}

fn lesson_from_row(row: &SqliteRow) -> Result<Lesson, StorageError> {
    Ok(Lesson {
        id: id_col(row, "id", LessonId::new)?,
        course_id: id_col(row, "course_id", CourseId::new)?,
        title: text_col(row, "title")?,
        position: u32_col(row, "position")?,
        quiz_form_id: opt_id_col(row, "quiz_form_id", FormId::new)?,
    })
}

#[async_trait]
impl CourseRepository for SqliteRepository {
    async fn insert_course(&self, course: &NewCourse) -> Result<Course, StorageError> {
        let row = sqlx::query(&format!(
            r"
            INSERT INTO courses (title, description, instructor_id, status, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            RETURNING {COURSE_COLUMNS}
            "
        ))
        .bind(&course.title)
        .bind(&course.description)
        .bind(bind_id("instructor_id", course.instructor_id.value())?)
        .bind(CourseStatus::Draft.as_str())
        .bind(course.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(db)?;
        course_from_row(&row)
    }

    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, StorageError> {
        let row = sqlx::query(&format!("SELECT {COURSE_COLUMNS} FROM courses WHERE id = ?1"))
            .bind(bind_id("course_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?;
        row.as_ref().map(course_from_row).transpose()
    }

    async fn list_courses(&self) -> Result<Vec<Course>, StorageError> {
        let rows = sqlx::query(&format!("SELECT {COURSE_COLUMNS} FROM courses ORDER BY id ASC"))
            .fetch_all(&self.pool)
            .await
            .map_err(db)?;
        rows.iter().map(course_from_row).collect()
    }

    async fn update_course(&self, course: &Course) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
            UPDATE courses
            SET title = ?1, description = ?2, status = ?3, published_at = ?4
            WHERE id = ?5
            ",
        )
        .bind(&course.title)
        .bind(&course.description)
        .bind(course.status.as_str())
        .bind(course.published_at)
        .bind(bind_id("course_id", course.id.value())?)
        .execute(&self.pool)
        .await
        .map_err(db)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn insert_lesson(&self, lesson: &NewLesson) -> Result<Lesson, StorageError> {
        let quiz_form_id = lesson
            .quiz_form_id
            .map(|id| bind_id("quiz_form_id", id.value()))
            .transpose()?;
        let row = sqlx::query(&format!(
            r"
            INSERT INTO lessons (course_id, title, position, quiz_form_id)
            VALUES (
                ?1,
                ?2,
                (SELECT COALESCE(MAX(position), 0) + 1 FROM lessons WHERE course_id = ?1),
                ?3
            )
            RETURNING {LESSON_COLUMNS}
            "
        ))
        .bind(bind_id("course_id", lesson.course_id.value())?)
        .bind(&lesson.title)
        .bind(quiz_form_id)
        .fetch_one(&self.pool)
        .await
        .map_err(db)?;
        lesson_from_row(&row)
    }

    async fn get_lesson(&self, id: LessonId) -> Result<Option<Lesson>, StorageError> {
        let row = sqlx::query(&format!("SELECT {LESSON_COLUMNS} FROM lessons WHERE id = ?1"))
            .bind(bind_id("lesson_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?;
        row.as_ref().map(lesson_from_row).transpose()
    }

    async fn list_lessons(&self, course_id: CourseId) -> Result<Vec<Lesson>, StorageError> {
        let rows = sqlx::query(&format!(
            "SELECT {LESSON_COLUMNS} FROM lessons WHERE course_id = ?1 ORDER BY position, id"
        ))
        .bind(bind_id("course_id", course_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;
        rows.iter().map(lesson_from_row).collect()
    }

    async fn count_lessons(&self, course_id: CourseId) -> Result<u64, StorageError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM lessons WHERE course_id = ?1")
            .bind(bind_id("course_id", course_id.value())?)
            .fetch_one(&self.pool)
            .await
            .map_err(db)?;
        count_col(&row)
    }

    async fn count_published_by(&self, instructor_id: UserId) -> Result<u64, StorageError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM courses WHERE instructor_id = ?1 AND status = ?2",
        )
        .bind(bind_id("instructor_id", instructor_id.value())?)
        .bind(CourseStatus::Published.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(db)?;
        count_col(&row)
    }
}
