use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::debug;
use uuid::Uuid;

use shared::domain::{Group, GroupDraft, GroupId};

const GROUP_COLUMNS: &str = "id, name, trashed, extra, created_at, updated_at";

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

#[derive(Debug, Clone)]
pub struct StoredGroup {
    pub group: Group,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        // Each connection to `sqlite::memory:` opens its own database.
        let pool = if is_memory_url(database_url) {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(connect_options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(5)
                .connect_with(connect_options)
                .await?
        };
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn create_group(&self, draft: &GroupDraft) -> Result<Group> {
        let id = GroupId(Uuid::new_v4().to_string());
        let now = Utc::now();
        let extra = encode_extra(&draft.extra)?;
        let row = sqlx::query(&format!(
            "INSERT INTO groups (id, name, trashed, extra, created_at, updated_at)
             VALUES (?, ?, 0, ?, ?, ?)
             RETURNING {GROUP_COLUMNS}"
        ))
        .bind(id.as_str())
        .bind(&draft.name)
        .bind(extra)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("failed to insert group '{}'", draft.name))?;
        let stored = stored_group_from_row(&row)?;
        debug!(group_id = %stored.group.id, "inserted group");
        Ok(stored.group)
    }

    /// Replaces the mutable fields of an existing group.
    pub async fn update_group(&self, group: &Group) -> Result<Group> {
        let extra = encode_extra(&group.extra)?;
        let row = sqlx::query(&format!(
            "UPDATE groups SET name = ?, trashed = ?, extra = ?, updated_at = ?
             WHERE id = ?
             RETURNING {GROUP_COLUMNS}"
        ))
        .bind(&group.name)
        .bind(group.trashed)
        .bind(extra)
        .bind(Utc::now())
        .bind(group.id.as_str())
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("failed to update group {}", group.id))?
        .ok_or_else(|| anyhow!("group {} does not exist", group.id))?;
        Ok(stored_group_from_row(&row)?.group)
    }

    pub async fn get_group(&self, id: &GroupId) -> Result<Option<Group>> {
        let row = sqlx::query(&format!("SELECT {GROUP_COLUMNS} FROM groups WHERE id = ?"))
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| stored_group_from_row(&row).map(|stored| stored.group))
            .transpose()
    }

    pub async fn list_groups(&self) -> Result<Vec<Group>> {
        Ok(self
            .list_group_records()
            .await?
            .into_iter()
            .map(|stored| stored.group)
            .collect())
    }

    pub async fn list_group_records(&self) -> Result<Vec<StoredGroup>> {
        let rows = sqlx::query(&format!(
            "SELECT {GROUP_COLUMNS} FROM groups ORDER BY created_at ASC, name ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(stored_group_from_row).collect()
    }

    /// Permanently deletes every trashed group and returns how many were removed.
    pub async fn clean_trashed_groups(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM groups WHERE trashed = 1")
            .execute(&self.pool)
            .await
            .context("failed to purge trashed groups")?;
        Ok(result.rows_affected())
    }
}

fn encode_extra(extra: &Map<String, Value>) -> Result<String> {
    serde_json::to_string(extra).context("failed to encode opaque group fields")
}

fn stored_group_from_row(row: &SqliteRow) -> Result<StoredGroup> {
    let raw_extra: String = row.try_get("extra")?;
    let extra = serde_json::from_str::<Map<String, Value>>(&raw_extra)
        .context("stored group has malformed opaque fields")?;
    Ok(StoredGroup {
        group: Group {
            id: GroupId(row.try_get("id")?),
            name: row.try_get("name")?,
            trashed: row.try_get("trashed")?,
            extra,
        },
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn is_memory_url(database_url: &str) -> bool {
    database_url.starts_with("sqlite::memory:") || database_url.contains("mode=memory")
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if is_memory_url(database_url) || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
