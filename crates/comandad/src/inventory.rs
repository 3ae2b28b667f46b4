//! Inventory catalog and batch-submission store.
//!
//! Parameterized SQL over the two databases: the externally-owned catalog
//! (read-only) and the operational batch tables. No domain logic lives here.

use crate::store::StoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgPool;
use sqlx::Row;

/// One searchable catalog entry.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogItem {
    pub code: String,
    pub warehouse: Option<String>,
    pub description: String,
    pub uom: Option<String>,
}

/// One line of a batch being submitted.
#[derive(Debug, Clone, Deserialize)]
pub struct NewBatchItem {
    pub item_code: String,
    pub item_name: String,
    #[serde(default = "default_uom")]
    pub uom_code: String,
    pub quantity: f64,
    pub issuer: String,
    pub destination: String,
    pub submitted_at: DateTime<Utc>,
    pub destination_branch: String,
    pub chef: i32,
    pub observations: Option<String>,
}

fn default_uom() -> String {
    "N/A".to_string()
}

/// One submitted line as the review screens see it.
#[derive(Debug, Clone, Serialize)]
pub struct BatchItemRecord {
    pub id: i64,
    pub item_code: String,
    pub item_name: String,
    pub uom_code: Option<String>,
    pub quantity: f64,
    pub issuer: String,
    pub destination: String,
    pub submitted_date: String,
    pub submitted_time: String,
    pub destination_branch: String,
    pub chef_name: Option<String>,
    pub collaborator_id: Option<i32>,
    pub batch_id: i64,
    pub sent: bool,
    pub warehouse_quantity: Option<f64>,
    pub warehouse_status: Option<String>,
    pub observations: Option<String>,
}

/// Warehouse approval for one line.
#[derive(Debug, Clone, Deserialize)]
pub struct Approval {
    pub id: i64,
    pub warehouse_quantity: f64,
}

pub struct InventoryStore {
    ops: PgPool,
    catalog: PgPool,
    display_timezone: String,
}

impl InventoryStore {
    pub fn new(ops: PgPool, catalog: PgPool, display_timezone: String) -> Self {
        Self {
            ops,
            catalog,
            display_timezone,
        }
    }

    /// Case-insensitive prefix search over catalog code and description.
    pub async fn search_items(
        &self,
        term: &str,
        limit: i64,
    ) -> Result<Vec<CatalogItem>, StoreError> {
        let pattern = format!("{}%", term.to_lowercase());
        let rows = sqlx::query(
            "SELECT code, warehouse, description, uom
             FROM catalog_items
             WHERE LOWER(description) LIKE $1 OR LOWER(code) LIKE $1
             ORDER BY description
             LIMIT $2",
        )
        .bind(&pattern)
        .bind(limit)
        .fetch_all(&self.catalog)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<CatalogItem, StoreError> {
                Ok(CatalogItem {
                    code: row.try_get("code")?,
                    warehouse: row.try_get("warehouse")?,
                    description: row.try_get("description")?,
                    uom: row.try_get("uom")?,
                })
            })
            .collect()
    }

    /// Persist a submission under one fresh batch id; all lines or none.
    pub async fn save_batch(&self, items: &[NewBatchItem]) -> Result<i64, StoreError> {
        let mut tx = self.ops.begin().await?;

        let batch_id: i64 = sqlx::query_scalar("SELECT nextval('batch_items_batch_id_seq')")
            .fetch_one(&mut *tx)
            .await?;

        for item in items {
            sqlx::query(
                "INSERT INTO batch_items
                     (item_code, item_name, uom_code, quantity, issuer, destination,
                      submitted_at, destination_branch, chef, batch_id, observations)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
            )
            .bind(&item.item_code)
            .bind(&item.item_name)
            .bind(&item.uom_code)
            .bind(item.quantity)
            .bind(&item.issuer)
            .bind(&item.destination)
            .bind(item.submitted_at)
            .bind(&item.destination_branch)
            .bind(item.chef)
            .bind(batch_id)
            .bind(&item.observations)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        tracing::info!(batch_id, lines = items.len(), "batch saved");
        Ok(batch_id)
    }

    /// All submissions joined with chef names, newest first. Dates and times
    /// are rendered in the configured display timezone, matching what the
    /// review screens print.
    pub async fn recent_batches(&self) -> Result<Vec<BatchItemRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT b.id, b.item_code, b.item_name, b.uom_code, b.quantity,
                    b.issuer, b.destination,
                    TO_CHAR(b.submitted_at AT TIME ZONE $1, 'YYYY-MM-DD') AS submitted_date,
                    TO_CHAR(b.submitted_at AT TIME ZONE $1, 'HH12:MI') AS submitted_time,
                    b.destination_branch,
                    c.display_name AS chef_name,
                    c.collaborator_id,
                    b.batch_id, b.sent,
                    b.warehouse_quantity, b.warehouse_status, b.observations
             FROM batch_items b
             LEFT JOIN chefs c ON b.chef = c.collaborator_id
             ORDER BY b.submitted_at DESC",
        )
        .bind(&self.display_timezone)
        .fetch_all(&self.ops)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<BatchItemRecord, StoreError> {
                Ok(BatchItemRecord {
                    id: row.try_get("id")?,
                    item_code: row.try_get("item_code")?,
                    item_name: row.try_get("item_name")?,
                    uom_code: row.try_get("uom_code")?,
                    quantity: row.try_get("quantity")?,
                    issuer: row.try_get("issuer")?,
                    destination: row.try_get("destination")?,
                    submitted_date: row.try_get("submitted_date")?,
                    submitted_time: row.try_get("submitted_time")?,
                    destination_branch: row.try_get("destination_branch")?,
                    chef_name: row.try_get("chef_name")?,
                    collaborator_id: row.try_get("collaborator_id")?,
                    batch_id: row.try_get("batch_id")?,
                    sent: row.try_get("sent")?,
                    warehouse_quantity: row.try_get("warehouse_quantity")?,
                    warehouse_status: row.try_get("warehouse_status")?,
                    observations: row.try_get("observations")?,
                })
            })
            .collect()
    }

    /// Mark one line as sent to the warehouse.
    pub async fn mark_sent(&self, id: i64) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE batch_items SET sent = TRUE WHERE id = $1")
            .bind(id)
            .execute(&self.ops)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Delete one submitted line.
    pub async fn delete_item(&self, id: i64) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM batch_items WHERE id = $1")
            .bind(id)
            .execute(&self.ops)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Apply warehouse approvals; one transaction for the lot.
    pub async fn approve(&self, approvals: &[Approval]) -> Result<(), StoreError> {
        let mut tx = self.ops.begin().await?;
        for approval in approvals {
            sqlx::query(
                "UPDATE batch_items
                 SET warehouse_quantity = $1,
                     warehouse_status = 'approved'
                 WHERE id = $2",
            )
            .bind(approval.warehouse_quantity)
            .bind(approval.id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        tracing::info!(lines = approvals.len(), "approvals applied");
        Ok(())
    }

    /// Replace the observations text on one line.
    pub async fn update_observations(
        &self,
        id: i64,
        observations: Option<&str>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE batch_items SET observations = $1 WHERE id = $2")
            .bind(observations)
            .bind(id)
            .execute(&self.ops)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}
