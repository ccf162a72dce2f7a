//! Workspace storage. Every query is scoped to the owning subject.

use serde::Serialize;
use sqlx::sqlite::SqlitePool;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Workspace {
    pub id: String,
    #[serde(skip)]
    pub owner_id: String,
    pub name: String,
    pub description: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Clone)]
pub struct WorkspaceStore {
    pool: SqlitePool,
}

impl WorkspaceStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a workspace owned by `owner_id`.
    pub async fn create(
        &self,
        owner_id: &str,
        name: &str,
        description: &str,
    ) -> Result<Workspace, sqlx::Error> {
        let id = uuid::Uuid::new_v4().to_string();

        sqlx::query("INSERT INTO workspaces (id, owner_id, name, description) VALUES (?, ?, ?, ?)")
            .bind(&id)
            .bind(owner_id)
            .bind(name)
            .bind(description)
            .execute(&self.pool)
            .await?;

        self.get(owner_id, &id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    /// Get a workspace if it exists and belongs to `owner_id`.
    pub async fn get(&self, owner_id: &str, id: &str) -> Result<Option<Workspace>, sqlx::Error> {
        sqlx::query_as::<_, Workspace>(
            "SELECT id, owner_id, name, description, created_at, updated_at FROM workspaces WHERE id = ? AND owner_id = ?",
        )
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// List the owner's workspaces, most recently created first.
    pub async fn list(&self, owner_id: &str) -> Result<Vec<Workspace>, sqlx::Error> {
        sqlx::query_as::<_, Workspace>(
            "SELECT id, owner_id, name, description, created_at, updated_at FROM workspaces WHERE owner_id = ? ORDER BY created_at DESC, rowid DESC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Delete a workspace (and its scripts). Returns false if not found.
    pub async fn delete(&self, owner_id: &str, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM workspaces WHERE id = ? AND owner_id = ?")
            .bind(id)
            .bind(owner_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
