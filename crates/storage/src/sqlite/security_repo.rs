use async_trait::async_trait;
use nexus_core::model::{
    NewSecurityLog, PlatformSettings, PlatformSettingsDraft, SecurityEvent, SecurityLog,
    SecurityLogId, UserId,
};
use sqlx::sqlite::SqliteRow;

use super::SqliteRepository;
use super::mapping::{bind_id, bool_col, db, id_col, opt_id_col, opt_text_col, ser, text_col, time_col};
use crate::repository::{SecurityLogRepository, SettingsRepository, StorageError};

fn log_from_row(row: &SqliteRow) -> Result<SecurityLog, StorageError> {
    let raw = text_col(row, "event")?;
    Ok(SecurityLog {
        id: id_col(row, "id", SecurityLogId::new)?,
        event: SecurityEvent::parse(&raw)
            .ok_or_else(|| StorageError::Serialization(format!("invalid security event: {raw}")))?,
        user_id: opt_id_col(row, "user_id", UserId::new)?,
        email_attempt: opt_text_col(row, "email_attempt")?,
        ip_address: opt_text_col(row, "ip_address")?,
        details: opt_text_col(row, "details")?,
        created_at: time_col(row, "created_at")?,
    })
}

#[async_trait]
impl SecurityLogRepository for SqliteRepository {
    async fn insert_log(&self, log: &NewSecurityLog) -> Result<SecurityLog, StorageError> {
        let user_id = log
            .user_id
            .map(|id| bind_id("user_id", id.value()))
            .transpose()?;
        let row = sqlx::query(
            r"
            INSERT INTO security_logs (event, user_id, email_attempt, ip_address, details, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            RETURNING id, event, user_id, email_attempt, ip_address, details, created_at
            ",
        )
        .bind(log.event.as_str())
        .bind(user_id)
        .bind(&log.email_attempt)
        .bind(&log.ip_address)
        .bind(&log.details)
        .bind(log.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(db)?;
        log_from_row(&row)
    }

    async fn list_logs(&self, limit: u32) -> Result<Vec<SecurityLog>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, event, user_id, email_attempt, ip_address, details, created_at
            FROM security_logs
            ORDER BY created_at DESC, id DESC
            LIMIT ?1
            ",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;
        rows.iter().map(log_from_row).collect()
    }
}

#[async_trait]
impl SettingsRepository for SqliteRepository {
    async fn get_settings(&self) -> Result<Option<PlatformSettings>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT
                platform_name,
                allow_public_registration,
                email_notifications_enabled,
                email_whitelist,
                email_provider_url
            FROM platform_settings
            WHERE id = 1
            ",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let email_whitelist: Vec<String> =
            serde_json::from_str(&text_col(&row, "email_whitelist")?).map_err(ser)?;

        PlatformSettingsDraft {
            platform_name: Some(text_col(&row, "platform_name")?),
            allow_public_registration: bool_col(&row, "allow_public_registration")?,
            email_notifications_enabled: bool_col(&row, "email_notifications_enabled")?,
            email_whitelist,
            email_provider_url: opt_text_col(&row, "email_provider_url")?,
        }
        .validate()
        .map(Some)
        .map_err(ser)
    }

    async fn save_settings(&self, settings: &PlatformSettings) -> Result<(), StorageError> {
        let whitelist = serde_json::to_string(settings.email_whitelist()).map_err(ser)?;
        sqlx::query(
            r"
            INSERT INTO platform_settings (
                id,
                platform_name,
                allow_public_registration,
                email_notifications_enabled,
                email_whitelist,
                email_provider_url
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(id) DO UPDATE SET
                platform_name = excluded.platform_name,
                allow_public_registration = excluded.allow_public_registration,
                email_notifications_enabled = excluded.email_notifications_enabled,
                email_whitelist = excluded.email_whitelist,
                email_provider_url = excluded.email_provider_url
            ",
        )
        .bind(1_i64)
        .bind(settings.platform_name())
        .bind(i64::from(settings.allow_public_registration()))
        .bind(i64::from(settings.email_notifications_enabled()))
        .bind(whitelist)
        .bind(settings.email_provider_url())
        .execute(&self.pool)
        .await
        .map_err(db)?;
        Ok(())
    }
}
