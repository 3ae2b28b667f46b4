//! Chef identity store.
//!
//! The face flows only ever see the [`ChefStore`] capability; the PostgreSQL
//! implementation draws a pooled connection per statement, so every exit path
//! releases it and no ambient connection state survives a request.

use async_trait::async_trait;
use comanda_core::{Embedding, EnrolledChef};
use serde::Serialize;
use sqlx::postgres::PgPool;
use sqlx::Row;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Chef fields for the roster listing. Credential material stays out.
#[derive(Debug, Clone, Serialize)]
pub struct ChefRecord {
    pub collaborator_id: i32,
    pub display_name: String,
    pub is_admin: bool,
}

/// Enrollment payload for the upsert.
#[derive(Debug, Clone)]
pub struct NewChef {
    pub collaborator_id: i32,
    pub display_name: String,
    pub secret_hash: String,
    pub secret_salt: String,
    pub embedding: Embedding,
}

#[async_trait]
pub trait ChefStore: Send + Sync {
    /// All chefs with an enrolled embedding, in authentication-candidate form.
    async fn list_enrolled(&self) -> Result<Vec<EnrolledChef>, StoreError>;

    /// Insert a chef or, on collaborator-id conflict, overwrite name,
    /// credential digest and embedding in one statement. `is_admin` gets its
    /// column default on insert and keeps its stored value on conflict; it is
    /// never set through this path.
    async fn upsert(&self, chef: &NewChef) -> Result<(), StoreError>;

    /// Roster ordered by display name.
    async fn roster(&self) -> Result<Vec<ChefRecord>, StoreError>;
}

pub struct PgChefStore {
    pool: PgPool,
}

impl PgChefStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChefStore for PgChefStore {
    async fn list_enrolled(&self) -> Result<Vec<EnrolledChef>, StoreError> {
        let rows = sqlx::query(
            "SELECT collaborator_id, display_name, is_admin, embedding
             FROM chefs
             WHERE embedding IS NOT NULL",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<EnrolledChef, StoreError> {
                Ok(EnrolledChef {
                    collaborator_id: row.try_get("collaborator_id")?,
                    display_name: row.try_get("display_name")?,
                    is_admin: row.try_get("is_admin")?,
                    embedding: Embedding {
                        values: row.try_get("embedding")?,
                    },
                })
            })
            .collect()
    }

    async fn upsert(&self, chef: &NewChef) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO chefs
                 (collaborator_id, display_name, secret_hash, secret_salt, is_admin, embedding)
             VALUES ($1, $2, $3, $4, DEFAULT, $5)
             ON CONFLICT (collaborator_id) DO UPDATE
             SET display_name = EXCLUDED.display_name,
                 secret_hash = EXCLUDED.secret_hash,
                 secret_salt = EXCLUDED.secret_salt,
                 embedding = EXCLUDED.embedding",
        )
        .bind(chef.collaborator_id)
        .bind(&chef.display_name)
        .bind(&chef.secret_hash)
        .bind(&chef.secret_salt)
        .bind(&chef.embedding.values)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn roster(&self) -> Result<Vec<ChefRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT collaborator_id, display_name, is_admin
             FROM chefs
             ORDER BY display_name ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<ChefRecord, StoreError> {
                Ok(ChefRecord {
                    collaborator_id: row.try_get("collaborator_id")?,
                    display_name: row.try_get("display_name")?,
                    is_admin: row.try_get("is_admin")?,
                })
            })
            .collect()
    }
}
