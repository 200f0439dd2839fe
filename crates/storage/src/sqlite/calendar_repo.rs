use async_trait::async_trait;
use nexus_core::model::{Audience, CalendarEvent, EventDraft, EventId, Recurrence, UserId};
use nexus_core::recurrence::DateRange;
use sqlx::sqlite::SqliteRow;

use super::SqliteRepository;
use super::mapping::{
    bind_id, bool_col, db, id_col, opt_text_col, opt_time_col, ser, text_col, time_col,
};
use crate::repository::{CalendarRepository, StorageError};

const EVENT_COLUMNS: &str = "id, title, description, location, start_at, end_at, all_day, \
     audience, recurrence, recurrence_end_date, created_by";

fn event_from_row(row: &SqliteRow) -> Result<CalendarEvent, StorageError> {
    Ok(CalendarEvent {
        id: id_col(row, "id", EventId::new)?,
        title: text_col(row, "title")?,
        description: opt_text_col(row, "description")?,
        location: opt_text_col(row, "location")?,
        start: time_col(row, "start_at")?,
        end: time_col(row, "end_at")?,
        all_day: bool_col(row, "all_day")?,
        audience: Audience::parse(&text_col(row, "audience")?).map_err(ser)?,
        recurrence: Recurrence::parse(&text_col(row, "recurrence")?).map_err(ser)?,
        recurrence_end_date: opt_time_col(row, "recurrence_end_date")?,
        created_by: id_col(row, "created_by", UserId::new)?,
    })
}

#[async_trait]
impl CalendarRepository for SqliteRepository {
    async fn insert_event(
        &self,
        draft: &EventDraft,
        created_by: UserId,
    ) -> Result<CalendarEvent, StorageError> {
        let row = sqlx::query(&format!(
            r"
            INSERT INTO calendar_events (
                title, description, location, start_at, end_at, all_day,
                audience, recurrence, recurrence_end_date, created_by
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            RETURNING {EVENT_COLUMNS}
            "
        ))
        .bind(&draft.title)
        .bind(&draft.description)
        .bind(&draft.location)
        .bind(draft.start)
        .bind(draft.end)
        .bind(i64::from(draft.all_day))
        .bind(draft.audience.as_str())
        .bind(draft.recurrence.as_str())
        .bind(draft.recurrence_end_date)
        .bind(bind_id("created_by", created_by.value())?)
        .fetch_one(&self.pool)
        .await
        .map_err(db)?;
        event_from_row(&row)
    }

    async fn update_event(
        &self,
        id: EventId,
        draft: &EventDraft,
    ) -> Result<CalendarEvent, StorageError> {
        let row = sqlx::query(&format!(
            r"
            UPDATE calendar_events
            SET title = ?1, description = ?2, location = ?3, start_at = ?4, end_at = ?5,
                all_day = ?6, audience = ?7, recurrence = ?8, recurrence_end_date = ?9
            WHERE id = ?10
            RETURNING {EVENT_COLUMNS}
            "
        ))
        .bind(&draft.title)
        .bind(&draft.description)
        .bind(&draft.location)
        .bind(draft.start)
        .bind(draft.end)
        .bind(i64::from(draft.all_day))
        .bind(draft.audience.as_str())
        .bind(draft.recurrence.as_str())
        .bind(draft.recurrence_end_date)
        .bind(bind_id("event_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?
        .ok_or(StorageError::NotFound)?;
        event_from_row(&row)
    }

    async fn get_event(&self, id: EventId) -> Result<Option<CalendarEvent>, StorageError> {
        let row = sqlx::query(&format!(
            "SELECT {EVENT_COLUMNS} FROM calendar_events WHERE id = ?1"
        ))
        .bind(bind_id("event_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?;
        row.as_ref().map(event_from_row).transpose()
    }

    async fn delete_event(&self, id: EventId) -> Result<(), StorageError> {
        let res = sqlx::query("DELETE FROM calendar_events WHERE id = ?1")
            .bind(bind_id("event_id", id.value())?)
            .execute(&self.pool)
            .await
            .map_err(db)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn list_candidate_events(
        &self,
        range: DateRange,
    ) -> Result<Vec<CalendarEvent>, StorageError> {
        let rows = sqlx::query(&format!(
            r"
            SELECT {EVENT_COLUMNS}
            FROM calendar_events
            WHERE start_at <= ?2
              AND (
                    (recurrence = ?3 AND end_at >= ?1)
                 OR (recurrence <> ?3
                     AND (recurrence_end_date IS NULL OR recurrence_end_date >= ?1))
              )
            ORDER BY start_at ASC, id ASC
            "
        ))
        .bind(range.start())
        .bind(range.end())
        .bind(Recurrence::None.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;
        rows.iter().map(event_from_row).collect()
    }
}
