//! Script storage. Scripts belong to a workspace; access goes through the
//! workspace owner.

use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePool;

/// Execution runtime of a script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptRuntime {
    Python,
    Javascript,
    Sql,
}

impl ScriptRuntime {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScriptRuntime::Python => "python",
            ScriptRuntime::Javascript => "javascript",
            ScriptRuntime::Sql => "sql",
        }
    }

    pub fn from_db(s: &str) -> Self {
        match s {
            "javascript" => ScriptRuntime::Javascript,
            "sql" => ScriptRuntime::Sql,
            _ => ScriptRuntime::Python,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Script {
    pub id: String,
    pub workspace_id: String,
    pub name: String,
    pub content: String,
    pub runtime: ScriptRuntime,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(sqlx::FromRow)]
struct ScriptRow {
    id: String,
    workspace_id: String,
    name: String,
    content: String,
    runtime: String,
    created_at: String,
    updated_at: String,
}

impl From<ScriptRow> for Script {
    fn from(row: ScriptRow) -> Self {
        Self {
            id: row.id,
            workspace_id: row.workspace_id,
            name: row.name,
            content: row.content,
            runtime: ScriptRuntime::from_db(&row.runtime),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Partial update; `None` fields are left unchanged.
#[derive(Debug, Default, Clone)]
pub struct ScriptUpdate {
    pub name: Option<String>,
    pub content: Option<String>,
    pub runtime: Option<ScriptRuntime>,
}

#[derive(Clone)]
pub struct ScriptStore {
    pool: SqlitePool,
}

impl ScriptStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a script in a workspace owned by `owner_id`.
    /// Returns None if the workspace does not exist or is not owned.
    pub async fn create(
        &self,
        owner_id: &str,
        workspace_id: &str,
        name: &str,
        content: &str,
        runtime: ScriptRuntime,
    ) -> Result<Option<Script>, sqlx::Error> {
        let id = uuid::Uuid::new_v4().to_string();

        let result = sqlx::query(
            "INSERT INTO scripts (id, workspace_id, name, content, runtime)
             SELECT ?, id, ?, ?, ? FROM workspaces WHERE id = ? AND owner_id = ?",
        )
        .bind(&id)
        .bind(name)
        .bind(content)
        .bind(runtime.as_str())
        .bind(workspace_id)
        .bind(owner_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.get(owner_id, &id).await
    }

    /// Get a script whose workspace belongs to `owner_id`.
    pub async fn get(&self, owner_id: &str, id: &str) -> Result<Option<Script>, sqlx::Error> {
        let row: Option<ScriptRow> = sqlx::query_as(
            "SELECT s.id, s.workspace_id, s.name, s.content, s.runtime, s.created_at, s.updated_at
             FROM scripts s JOIN workspaces w ON w.id = s.workspace_id
             WHERE s.id = ? AND w.owner_id = ?",
        )
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Script::from))
    }

    /// List scripts of an owned workspace, oldest first.
    pub async fn list_by_workspace(
        &self,
        owner_id: &str,
        workspace_id: &str,
    ) -> Result<Vec<Script>, sqlx::Error> {
        let rows: Vec<ScriptRow> = sqlx::query_as(
            "SELECT s.id, s.workspace_id, s.name, s.content, s.runtime, s.created_at, s.updated_at
             FROM scripts s JOIN workspaces w ON w.id = s.workspace_id
             WHERE s.workspace_id = ? AND w.owner_id = ?
             ORDER BY s.created_at ASC, s.rowid ASC",
        )
        .bind(workspace_id)
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Script::from).collect())
    }

    /// Apply a partial update. Returns None if the script is not found or not owned.
    pub async fn update(
        &self,
        owner_id: &str,
        id: &str,
        update: &ScriptUpdate,
    ) -> Result<Option<Script>, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE scripts SET
                name = COALESCE(?, name),
                content = COALESCE(?, content),
                runtime = COALESCE(?, runtime),
                updated_at = datetime('now')
             WHERE id = ? AND workspace_id IN (SELECT id FROM workspaces WHERE owner_id = ?)",
        )
        .bind(update.name.as_deref())
        .bind(update.content.as_deref())
        .bind(update.runtime.map(|r| r.as_str()))
        .bind(id)
        .bind(owner_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.get(owner_id, id).await
    }
}
