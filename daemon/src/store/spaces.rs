//! Space persistence.

use anyhow::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::{debug, error, info};

use super::Store;
use crate::models::Space;

fn row_to_space(row: &SqliteRow) -> Result<Space> {
    let emails: String = row.try_get("notification_emails")?;
    Ok(Space {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        notification_emails: serde_json::from_str(&emails).unwrap_or_default(),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

impl Store {
    /// Upsert by id. `created_at` is preserved on update.
    pub async fn save_space(&self, space: &Space) -> Result<()> {
        debug!("Saving space: {} ({})", space.name, space.id);

        let emails = serde_json::to_string(&space.notification_emails)?;
        match sqlx::query(
            r#"
            INSERT INTO spaces (id, name, description, notification_emails, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                description = excluded.description,
                notification_emails = excluded.notification_emails,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&space.id)
        .bind(&space.name)
        .bind(&space.description)
        .bind(&emails)
        .bind(space.created_at)
        .bind(space.updated_at)
        .execute(&self.pool)
        .await
        {
            Ok(_) => Ok(()),
            Err(e) => {
                error!("Failed to save space {}: {}", space.id, e);
                Err(e.into())
            }
        }
    }

    pub async fn get_space(&self, space_id: &str) -> Result<Option<Space>> {
        let row = sqlx::query("SELECT * FROM spaces WHERE id = ?")
            .bind(space_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_space).transpose()
    }

    pub async fn get_space_by_name(&self, name: &str) -> Result<Option<Space>> {
        let row = sqlx::query("SELECT * FROM spaces WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_space).transpose()
    }

    pub async fn list_spaces(&self) -> Result<Vec<Space>> {
        let rows = sqlx::query("SELECT * FROM spaces ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_space).collect()
    }

    /// Delete a space together with its monitors and their results, in one
    /// transaction. Returns false when the space does not exist.
    pub async fn delete_space(&self, space_id: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM monitor_results WHERE space_id = ?")
            .bind(space_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM monitors WHERE space_id = ?")
            .bind(space_id)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM spaces WHERE id = ?")
            .bind(space_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        if deleted > 0 {
            info!("Deleted space {} with its monitors and results", space_id);
        }
        Ok(deleted > 0)
    }
}
