use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nexus_core::model::{Achievement, AchievementId, UserAchievement, UserId, XpGrant};
use sqlx::sqlite::SqliteRow;

use super::SqliteRepository;
use super::mapping::{bind_id, db, id_col, text_col, time_col, u32_col};
use crate::repository::{GamificationRepository, StorageError};

fn achievement_from_row(row: &SqliteRow) -> Result<Achievement, StorageError> {
    Ok(Achievement {
        id: id_col(row, "id", AchievementId::new)?,
        slug: text_col(row, "slug")?,
        name: text_col(row, "name")?,
        description: text_col(row, "description")?,
        points: u32_col(row, "points")?,
    })
}

#[async_trait]
impl GamificationRepository for SqliteRepository {
    async fn list_achievements(&self) -> Result<Vec<Achievement>, StorageError> {
        let rows = sqlx::query(
            "SELECT id, slug, name, description, points FROM achievements ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;
        rows.iter().map(achievement_from_row).collect()
    }

    async fn find_achievement(&self, slug: &str) -> Result<Option<Achievement>, StorageError> {
        let row = sqlx::query(
            "SELECT id, slug, name, description, points FROM achievements WHERE slug = ?1",
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?;
        row.as_ref().map(achievement_from_row).transpose()
    }

    async fn has_achievement(
        &self,
        user_id: UserId,
        achievement: &Achievement,
    ) -> Result<bool, StorageError> {
        let row = sqlx::query(
            "SELECT 1 FROM user_achievements WHERE user_id = ?1 AND achievement_id = ?2",
        )
        .bind(bind_id("user_id", user_id.value())?)
        .bind(bind_id("achievement_id", achievement.id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?;
        Ok(row.is_some())
    }

    async fn grant_achievement(
        &self,
        user_id: UserId,
        achievement: &Achievement,
        unlocked_at: DateTime<Utc>,
    ) -> Result<u32, StorageError> {
        let user = bind_id("user_id", user_id.value())?;
        let mut tx = self.pool.begin().await.map_err(db)?;

        sqlx::query(
            r"
            INSERT INTO user_achievements (user_id, achievement_id, unlocked_at)
            VALUES (?1, ?2, ?3)
            ",
        )
        .bind(user)
        .bind(bind_id("achievement_id", achievement.id.value())?)
        .bind(unlocked_at)
        .execute(&mut *tx)
        .await
        .map_err(db)?;

        let row = sqlx::query("UPDATE users SET xp = xp + ?1 WHERE id = ?2 RETURNING xp")
            .bind(i64::from(achievement.points))
            .bind(user)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db)?
            .ok_or(StorageError::NotFound)?;
        let xp = u32_col(&row, "xp")?;

        tx.commit().await.map_err(db)?;
        Ok(xp)
    }

    async fn grant_xp_once(
        &self,
        user_id: UserId,
        grant: XpGrant,
        granted_at: DateTime<Utc>,
    ) -> Result<Option<u32>, StorageError> {
        let user = bind_id("user_id", user_id.value())?;
        let mut tx = self.pool.begin().await.map_err(db)?;

        let inserted = sqlx::query(
            r"
            INSERT INTO xp_grants (user_id, grant_key, points, granted_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(user_id, grant_key) DO NOTHING
            ",
        )
        .bind(user)
        .bind(grant.key())
        .bind(i64::from(grant.points()))
        .bind(granted_at)
        .execute(&mut *tx)
        .await
        .map_err(db)?
        .rows_affected();
        if inserted == 0 {
            return Ok(None);
        }

        let row = sqlx::query("UPDATE users SET xp = xp + ?1 WHERE id = ?2 RETURNING xp")
            .bind(i64::from(grant.points()))
            .bind(user)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db)?
            .ok_or(StorageError::NotFound)?;
        let xp = u32_col(&row, "xp")?;

        tx.commit().await.map_err(db)?;
        Ok(Some(xp))
    }

    async fn list_user_achievements(
        &self,
        user_id: UserId,
    ) -> Result<Vec<UserAchievement>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT a.id, a.slug, a.name, a.description, a.points, ua.unlocked_at
            FROM user_achievements ua
            JOIN achievements a ON a.id = ua.achievement_id
            WHERE ua.user_id = ?1
            ORDER BY ua.unlocked_at ASC, a.id ASC
            ",
        )
        .bind(bind_id("user_id", user_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;

        rows.iter()
            .map(|row| {
                Ok(UserAchievement {
                    user_id,
                    achievement: achievement_from_row(row)?,
                    unlocked_at: time_col(row, "unlocked_at")?,
                })
            })
            .collect()
    }
}
