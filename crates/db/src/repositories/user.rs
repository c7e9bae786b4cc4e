use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use purchasing_core::domain::user::{Actor, NewUser, Role, RoleId, User, UserId};

use super::{decode_error, decode_timestamp, encode_timestamp, RepositoryError, UserRepository};
use crate::DbPool;

pub struct SqlUserRepository {
    pool: DbPool,
}

impl SqlUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_user(row: &SqliteRow) -> Result<User, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(decode_error)?;
    let email: String = row.try_get("email").map_err(decode_error)?;
    let full_name: String = row.try_get("full_name").map_err(decode_error)?;
    let is_active: bool = row.try_get("is_active").map_err(decode_error)?;
    let created_at: String = row.try_get("created_at").map_err(decode_error)?;
    let updated_at: String = row.try_get("updated_at").map_err(decode_error)?;

    Ok(User {
        id: UserId(id),
        email,
        full_name,
        is_active,
        created_at: decode_timestamp("created_at", &created_at)?,
        updated_at: decode_timestamp("updated_at", &updated_at)?,
    })
}

fn row_to_role(row: &SqliteRow) -> Result<Role, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(decode_error)?;
    let name: String = row.try_get("name").map_err(decode_error)?;
    let description: Option<String> = row.try_get("description").map_err(decode_error)?;
    Ok(Role { id: RoleId(id), name, description })
}

#[async_trait::async_trait]
impl UserRepository for SqlUserRepository {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, email, full_name, is_active, created_at, updated_at
             FROM users WHERE id = ?",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_user).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, email, full_name, is_active, created_at, updated_at
             FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_user).transpose()
    }

    async fn create_user(&self, user: NewUser) -> Result<User, RepositoryError> {
        let now = Utc::now();
        let stamp = encode_timestamp(&now);
        let result = sqlx::query(
            "INSERT INTO users (email, full_name, is_active, created_at, updated_at)
             VALUES (?, ?, 1, ?, ?)",
        )
        .bind(&user.email)
        .bind(&user.full_name)
        .bind(&stamp)
        .bind(&stamp)
        .execute(&self.pool)
        .await?;

        Ok(User {
            id: UserId(result.last_insert_rowid()),
            email: user.email,
            full_name: user.full_name,
            is_active: true,
            created_at: now,
            updated_at: now,
        })
    }

    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>, RepositoryError> {
        let row = sqlx::query("SELECT id, name, description FROM roles WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_role).transpose()
    }

    async fn create_role(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<Role, RepositoryError> {
        let result = sqlx::query("INSERT INTO roles (name, description) VALUES (?, ?)")
            .bind(name)
            .bind(description)
            .execute(&self.pool)
            .await?;

        Ok(Role {
            id: RoleId(result.last_insert_rowid()),
            name: name.to_string(),
            description: description.map(ToString::to_string),
        })
    }

    async fn roles_for(&self, user_id: UserId) -> Result<Vec<Role>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT r.id, r.name, r.description
             FROM roles r
             JOIN user_roles ur ON ur.role_id = r.id
             WHERE ur.user_id = ?
             ORDER BY r.name ASC",
        )
        .bind(user_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_role).collect()
    }

    async fn attach_role(&self, user_id: UserId, role_id: RoleId) -> Result<(), RepositoryError> {
        sqlx::query("INSERT OR IGNORE INTO user_roles (user_id, role_id) VALUES (?, ?)")
            .bind(user_id.0)
            .bind(role_id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn detach_role(&self, user_id: UserId, role_id: RoleId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM user_roles WHERE user_id = ? AND role_id = ?")
            .bind(user_id.0)
            .bind(role_id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn resolve_actor(&self, user_id: UserId) -> Result<Option<Actor>, RepositoryError> {
        let Some(user) = self.find_by_id(user_id).await? else {
            return Ok(None);
        };
        if !user.is_active {
            return Ok(None);
        }

        let roles = self.roles_for(user.id).await?;
        Ok(Some(Actor::new(user.id, roles.into_iter().map(|role| role.name))))
    }
}
