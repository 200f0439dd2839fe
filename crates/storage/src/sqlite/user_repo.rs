use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nexus_core::model::{NewUser, Role, User, UserId};
use sqlx::sqlite::SqliteRow;

use super::SqliteRepository;
use super::mapping::{bind_id, db, id_col, ser, text_col, time_col, u32_col};
use crate::repository::{
    SessionRecord, SessionRepository, StorageError, UserCredentials, UserRepository,
};

const USER_COLUMNS: &str = "id, email, name, role, xp, created_at";

pub(crate) fn user_from_row(row: &SqliteRow) -> Result<User, StorageError> {
    Ok(User {
        id: id_col(row, "id", UserId::new)?,
        email: text_col(row, "email")?,
        name: text_col(row, "name")?,
        role: Role::parse(&text_col(row, "role")?).map_err(ser)?,
        xp: u32_col(row, "xp")?,
        created_at: time_col(row, "created_at")?,
    })
}

#[async_trait]
impl UserRepository for SqliteRepository {
    async fn insert_user(
        &self,
        user: &NewUser,
        password_hash: &str,
        created_at: DateTime<Utc>,
    ) -> Result<User, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO users (email, name, role, xp, password_hash, created_at)
            VALUES (?1, ?2, ?3, 0, ?4, ?5)
            ",
        )
        .bind(&user.email)
        .bind(&user.name)
        .bind(user.role.as_str())
        .bind(password_hash)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(db)?;

        Ok(User {
            id: UserId::new(
                u64::try_from(res.last_insert_rowid())
                    .map_err(|_| StorageError::Serialization("user id sign overflow".into()))?,
            ),
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
            xp: 0,
            created_at,
        })
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StorageError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"))
            .bind(bind_id("user_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_credentials(
        &self,
        email: &str,
    ) -> Result<Option<UserCredentials>, StorageError> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS}, password_hash FROM users WHERE email = ?1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(UserCredentials {
            user: user_from_row(&row)?,
            password_hash: text_col(&row, "password_hash")?,
        }))
    }

    async fn list_users(&self, role: Option<Role>) -> Result<Vec<User>, StorageError> {
        let rows = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE ?1 IS NULL OR role = ?1 ORDER BY id ASC"
        ))
        .bind(role.map(Role::as_str))
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;
        rows.iter().map(user_from_row).collect()
    }

    async fn update_role(&self, id: UserId, role: Role) -> Result<User, StorageError> {
        let res = sqlx::query("UPDATE users SET role = ?1 WHERE id = ?2")
            .bind(role.as_str())
            .bind(bind_id("user_id", id.value())?)
            .execute(&self.pool)
            .await
            .map_err(db)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        self.get_user(id).await?.ok_or(StorageError::NotFound)
    }

    async fn add_xp(&self, id: UserId, points: u32) -> Result<u32, StorageError> {
        let row = sqlx::query("UPDATE users SET xp = xp + ?1 WHERE id = ?2 RETURNING xp")
            .bind(i64::from(points))
            .bind(bind_id("user_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?
            .ok_or(StorageError::NotFound)?;
        u32_col(&row, "xp")
    }
}

fn session_from_row(row: &SqliteRow) -> Result<SessionRecord, StorageError> {
    Ok(SessionRecord {
        token: text_col(row, "token")?,
        user_id: id_col(row, "user_id", UserId::new)?,
        created_at: time_col(row, "created_at")?,
        expires_at: time_col(row, "expires_at")?,
    })
}

#[async_trait]
impl SessionRepository for SqliteRepository {
    async fn create_session(&self, session: &SessionRecord) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO sessions (token, user_id, created_at, expires_at)
            VALUES (?1, ?2, ?3, ?4)
            ",
        )
        .bind(&session.token)
        .bind(bind_id("user_id", session.user_id.value())?)
        .bind(session.created_at)
        .bind(session.expires_at)
        .execute(&self.pool)
        .await
        .map_err(db)?;
        Ok(())
    }

    async fn find_session(&self, token: &str) -> Result<Option<SessionRecord>, StorageError> {
        let row = sqlx::query(
            "SELECT token, user_id, created_at, expires_at FROM sessions WHERE token = ?1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?;
        row.as_ref().map(session_from_row).transpose()
    }

    async fn delete_session(&self, token: &str) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM sessions WHERE token = ?1")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(db)?;
        Ok(())
    }
}
