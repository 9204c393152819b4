//! Data access for the `todo_items` table.

use sqlx::PgPool;
use tracing::debug;

use crate::error::{ApiError, Result};
use crate::models::{CreateTodoItem, TodoItem};

const SELECT_COLUMNS: &str = "id, name, is_complete";

/// Advisory lock key taken by inserts with an explicit id.
const EXPLICIT_ID_LOCK: i64 = 0x746f_646f_5f69_64;

/// Move the identity sequence up to `$1`, never down.
const ADVANCE_SEQUENCE: &str = "\
    WITH seq AS (SELECT pg_get_serial_sequence('todo_items', 'id')::regclass AS id) \
    SELECT setval(seq.id, GREATEST($1, pg_sequence_last_value(seq.id), 1)) FROM seq";

#[derive(Clone)]
pub struct TodoRepository {
    pool: PgPool,
}

impl TodoRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_all(&self) -> Result<Vec<TodoItem>> {
        let items = sqlx::query_as::<_, TodoItem>(&format!(
            "SELECT {SELECT_COLUMNS} FROM todo_items ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<TodoItem>> {
        let item = sqlx::query_as::<_, TodoItem>(&format!(
            "SELECT {SELECT_COLUMNS} FROM todo_items WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(item)
    }

    /// Insert a new item, honouring a client-supplied identifier.
    ///
    /// After an explicit identifier the identity sequence is moved up to it.
    /// The sequence only ever moves forward, so later generated ids cannot
    /// collide with an explicit id even while its transaction is still open.
    pub async fn create(&self, dto: CreateTodoItem) -> Result<TodoItem> {
        let mut tx = self.pool.begin().await?;

        let inserted = match dto.requested_id() {
            Some(id) => {
                sqlx::query("SELECT pg_advisory_xact_lock($1)")
                    .bind(EXPLICIT_ID_LOCK)
                    .execute(&mut *tx)
                    .await?;

                let item = sqlx::query_as::<_, TodoItem>(&format!(
                    "INSERT INTO todo_items (id, name, is_complete) VALUES ($1, $2, $3) \
                     RETURNING {SELECT_COLUMNS}"
                ))
                .bind(id)
                .bind(&dto.name)
                .bind(dto.is_complete)
                .fetch_one(&mut *tx)
                .await;

                if item.is_ok() {
                    sqlx::query(ADVANCE_SEQUENCE)
                        .bind(id)
                        .execute(&mut *tx)
                        .await?;
                }
                item
            }
            None => {
                sqlx::query_as::<_, TodoItem>(&format!(
                    "INSERT INTO todo_items (name, is_complete) VALUES ($1, $2) \
                     RETURNING {SELECT_COLUMNS}"
                ))
                .bind(&dto.name)
                .bind(dto.is_complete)
                .fetch_one(&mut *tx)
                .await
            }
        };

        let item = match inserted {
            Ok(item) => item,
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                let _ = tx.rollback().await;
                return Err(match dto.requested_id() {
                    Some(id) => ApiError::TodoExists(id),
                    None => ApiError::Database(sqlx::Error::Database(db_err)),
                });
            }
            Err(e) => {
                let _ = tx.rollback().await;
                return Err(ApiError::from(e));
            }
        };

        tx.commit().await?;
        debug!(id = item.id, "Created todo item");
        Ok(item)
    }

    /// Replace name and completion flag. Returns `false` when no row matched.
    pub async fn update(&self, id: i64, dto: &CreateTodoItem) -> Result<bool> {
        let result = sqlx::query("UPDATE todo_items SET name = $2, is_complete = $3 WHERE id = $1")
            .bind(id)
            .bind(&dto.name)
            .bind(dto.is_complete)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM todo_items WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
