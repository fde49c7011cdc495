// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! PostgreSQL-backed store implementation.

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::CoreError;
use crate::model::{ActionRecord, ActionStatus, DispatchRecord, UserRecord, epoch_now};

use super::{ActionRow, DispatchRow, Store, UserRow};

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new PostgreSQL store from an existing pool. Migrations must
    /// already have been applied (see [`crate::migrations`]).
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to a PostgreSQL database and run all migrations.
    pub async fn connect(database_url: &str) -> Result<Self, CoreError> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| CoreError::DatabaseError {
                operation: "connect".to_string(),
                details: format!("Failed to connect to PostgreSQL: {}", e),
            })?;

        crate::migrations::run_postgres(&pool)
            .await
            .map_err(|e| CoreError::DatabaseError {
                operation: "migrate".to_string(),
                details: format!("Failed to run migrations: {}", e),
            })?;

        Ok(Self { pool })
    }
}

#[async_trait::async_trait]
impl Store for PostgresStore {
    async fn create_action(&self, name: &str, owner: &str) -> Result<ActionRecord, CoreError> {
        let action_id = Uuid::new_v4().to_string();
        let now = epoch_now();
        sqlx::query(
            r#"
            INSERT INTO actions (action_id, name, owner, status, created_at, updated_at)
            VALUES ($1, $2, $3, 'PENDING', $4, $5)
            "#,
        )
        .bind(&action_id)
        .bind(name)
        .bind(owner)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(ActionRecord {
            action_id,
            name: name.to_string(),
            owner: owner.to_string(),
            status: ActionStatus::Pending,
            result: None,
            task_args: None,
            created_at: now,
            updated_at: now,
        })
    }

    async fn get_action(&self, action_id: &str) -> Result<Option<ActionRecord>, CoreError> {
        let row = sqlx::query_as::<_, ActionRow>(
            r#"
            SELECT action_id, name, owner, status, result, task_args, created_at, updated_at
            FROM actions
            WHERE action_id = $1
            "#,
        )
        .bind(action_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ActionRow::into_record).transpose()
    }

    async fn set_action_status(
        &self,
        action_id: &str,
        status: ActionStatus,
    ) -> Result<bool, CoreError> {
        let result = sqlx::query(
            r#"
            UPDATE actions SET status = $1, updated_at = $2
            WHERE action_id = $3 AND status IN ('PENDING', 'RUNNING')
            "#,
        )
        .bind(status.as_str())
        .bind(epoch_now())
        .bind(action_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(true);
        }
        // No row written: unknown id, or the action is already terminal.
        self.get_action_or_fail(action_id).await?;
        Ok(false)
    }

    async fn finalize_action(
        &self,
        action_id: &str,
        status: ActionStatus,
        result: &str,
        task_args: &serde_json::Value,
    ) -> Result<bool, CoreError> {
        if !matches!(status, ActionStatus::Success | ActionStatus::Failure) {
            return Err(CoreError::ValidationError {
                field: "status".to_string(),
                message: format!("'{}' is not a worker terminal status", status),
            });
        }

        // Conditional terminal write: a racing cancel that landed first wins.
        let outcome = sqlx::query(
            r#"
            UPDATE actions SET status = $1, result = $2, task_args = $3, updated_at = $4
            WHERE action_id = $5 AND status IN ('PENDING', 'RUNNING')
            "#,
        )
        .bind(status.as_str())
        .bind(result)
        .bind(serde_json::to_string(task_args)?)
        .bind(epoch_now())
        .bind(action_id)
        .execute(&self.pool)
        .await?;

        Ok(outcome.rows_affected() == 1)
    }

    async fn cancel_action(&self, action_id: &str) -> Result<ActionRecord, CoreError> {
        sqlx::query(
            r#"
            UPDATE actions SET status = 'CANCELLED', updated_at = $1
            WHERE action_id = $2 AND status IN ('PENDING', 'RUNNING')
            "#,
        )
        .bind(epoch_now())
        .bind(action_id)
        .execute(&self.pool)
        .await?;

        self.get_action_or_fail(action_id).await
    }

    async fn list_actions_by_owner(
        &self,
        owner: &str,
        status: Option<ActionStatus>,
        max_age_seconds: Option<u64>,
    ) -> Result<Vec<ActionRecord>, CoreError> {
        let cutoff = max_age_seconds.map(|age| epoch_now() - age as f64);

        let rows = match (status, cutoff) {
            (None, None) => {
                sqlx::query_as::<_, ActionRow>(
                    r#"
                    SELECT action_id, name, owner, status, result, task_args, created_at, updated_at
                    FROM actions
                    WHERE owner = $1
                    ORDER BY updated_at DESC
                    "#,
                )
                .bind(owner)
                .fetch_all(&self.pool)
                .await?
            }
            (None, Some(cutoff)) => {
                sqlx::query_as::<_, ActionRow>(
                    r#"
                    SELECT action_id, name, owner, status, result, task_args, created_at, updated_at
                    FROM actions
                    WHERE owner = $1 AND updated_at >= $2
                    ORDER BY updated_at DESC
                    "#,
                )
                .bind(owner)
                .bind(cutoff)
                .fetch_all(&self.pool)
                .await?
            }
            (Some(status), None) => {
                sqlx::query_as::<_, ActionRow>(
                    r#"
                    SELECT action_id, name, owner, status, result, task_args, created_at, updated_at
                    FROM actions
                    WHERE owner = $1 AND status = $2
                    ORDER BY updated_at DESC
                    "#,
                )
                .bind(owner)
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            (Some(status), Some(cutoff)) => {
                sqlx::query_as::<_, ActionRow>(
                    r#"
                    SELECT action_id, name, owner, status, result, task_args, created_at, updated_at
                    FROM actions
                    WHERE owner = $1 AND status = $2 AND updated_at >= $3
                    ORDER BY updated_at DESC
                    "#,
                )
                .bind(owner)
                .bind(status.as_str())
                .bind(cutoff)
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.into_iter().map(ActionRow::into_record).collect()
    }

    async fn upsert_user(
        &self,
        email: &str,
        name: &str,
        username: &str,
    ) -> Result<UserRecord, CoreError> {
        if let Some(existing) = self.get_user(email).await? {
            if existing.name == name && existing.username == username {
                // Unchanged identity attributes: avoid the write entirely.
                return Ok(existing);
            }
            sqlx::query(
                r#"
                UPDATE users SET name = $1, username = $2, updated_at = $3
                WHERE email = $4
                "#,
            )
            .bind(name)
            .bind(username)
            .bind(epoch_now())
            .bind(email)
            .execute(&self.pool)
            .await?;
        } else {
            let now = epoch_now();
            sqlx::query(
                r#"
                INSERT INTO users (email, username, name, allowed_actions, created_at, updated_at)
                VALUES ($1, $2, $3, '[]', $4, $5)
                "#,
            )
            .bind(email)
            .bind(username)
            .bind(name)
            .bind(now)
            .bind(now)
            .execute(&self.pool)
            .await?;
        }

        self.get_user(email).await?.ok_or_else(|| CoreError::NotFound {
            kind: "user",
            id: email.to_string(),
        })
    }

    async fn get_user(&self, email: &str) -> Result<Option<UserRecord>, CoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT email, username, name, allowed_actions, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.map(UserRow::into_record).transpose()
    }

    async fn set_allowed_actions(&self, email: &str, actions: &[String]) -> Result<(), CoreError> {
        let result = sqlx::query(
            r#"
            UPDATE users SET allowed_actions = $1, updated_at = $2
            WHERE email = $3
            "#,
        )
        .bind(serde_json::to_string(actions)?)
        .bind(epoch_now())
        .bind(email)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound {
                kind: "user",
                id: email.to_string(),
            });
        }
        Ok(())
    }

    async fn enqueue_dispatch(
        &self,
        action_id: &str,
        operation: &str,
        args: &serde_json::Value,
    ) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            INSERT INTO dispatches (action_id, operation, args, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (action_id) DO NOTHING
            "#,
        )
        .bind(action_id)
        .bind(operation)
        .bind(serde_json::to_string(args)?)
        .bind(epoch_now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn claim_dispatch(
        &self,
        lease_seconds: u64,
    ) -> Result<Option<DispatchRecord>, CoreError> {
        let now = epoch_now();
        let lease_cutoff = now - lease_seconds as f64;

        // SKIP LOCKED keeps concurrent workers from claiming the same row.
        let row = sqlx::query_as::<_, DispatchRow>(
            r#"
            UPDATE dispatches SET claimed_at = $1
            WHERE action_id = (
                SELECT action_id FROM dispatches
                WHERE claimed_at IS NULL OR claimed_at < $2
                ORDER BY created_at
                FOR UPDATE SKIP LOCKED
                LIMIT 1
            )
            RETURNING action_id, operation, args, claimed_at, created_at
            "#,
        )
        .bind(now)
        .bind(lease_cutoff)
        .fetch_optional(&self.pool)
        .await?;

        row.map(DispatchRow::into_record).transpose()
    }

    async fn complete_dispatch(&self, action_id: &str) -> Result<(), CoreError> {
        sqlx::query("DELETE FROM dispatches WHERE action_id = $1")
            .bind(action_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn health_check(&self) -> Result<bool, CoreError> {
        let result = sqlx::query("SELECT 1").fetch_one(&self.pool).await;
        Ok(result.is_ok())
    }
}
