//! SQLite-backed [`Store`].
//!
//! The schema is applied inline via `include_str!` on open. Timestamps are
//! stored as RFC 3339 UTC text with fixed precision so they sort lexically.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::{info, trace};

use super::{MessageRecord, Store, StoreError};
use crate::tickets::{Priority, Ticket, TicketStatus};

/// Schema applied on every open; statements are idempotent.
pub const SCHEMA_SQL: &str = include_str!("../../migrations/001_schema.sql");

/// Maximum pool connections for the service database.
const MAX_CONNECTIONS: u32 = 4;

/// Row type returned by SQLite queries for tickets.
type TicketRow = (
    i64,
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    Option<String>,
    Option<String>,
    Option<i64>,
    String,
    String,
    String,
);

const TICKET_COLUMNS: &str = "id, ticket_number, subject, description, status, stage, \
     priority, customer_phone, contact_name, contact_email, initial_message_id, \
     message_ids, created_at, updated_at";

/// [`Store`] implementation over a SQLite connection pool.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and apply the schema.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the file cannot be opened or the
    /// schema fails to apply.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .pragma("trusted_schema", "OFF")
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await?;

        apply_schema(&pool).await?;
        info!(path = %path.display(), "ticket database opened");
        Ok(Self { pool })
    }

    /// Wrap an existing pool. The schema must already be applied.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the underlying SQLite pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Load a ticket by its ticket number.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on SQLite failure or undecodable rows.
    pub async fn ticket_by_number(&self, number: &str) -> Result<Option<Ticket>, StoreError> {
        let sql = format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE ticket_number = ?1");
        let row: Option<TicketRow> = sqlx::query_as(&sql)
            .bind(number)
            .fetch_optional(&self.pool)
            .await?;
        row.map(ticket_from_row).transpose()
    }

    /// Message records exchanged with `phone`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on SQLite failure or undecodable rows.
    pub async fn conversation(&self, phone: &str) -> Result<Vec<MessageRecord>, StoreError> {
        let rows: Vec<(i64, String, String, String, String, String, Option<String>, String)> =
            sqlx::query_as(
                "SELECT id, direction, from_addr, to_addr, body, status, external_id, received_at \
                 FROM messages WHERE from_addr = ?1 OR to_addr = ?1 \
                 ORDER BY received_at ASC, id ASC",
            )
            .bind(phone)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(
                |(id, direction, from, to, body, status, external_id, received_at)| {
                    Ok(MessageRecord {
                        id: Some(id),
                        direction: super::Direction::parse(&direction)?,
                        from,
                        to,
                        body,
                        status,
                        external_id,
                        received_at: parse_timestamp("received_at", &received_at)?,
                    })
                },
            )
            .collect()
    }
}

/// Apply the schema to `pool`.
///
/// # Errors
///
/// Returns [`StoreError::Database`] if a statement fails.
pub async fn apply_schema(pool: &SqlitePool) -> Result<(), StoreError> {
    sqlx::raw_sql(SCHEMA_SQL).execute(pool).await?;
    Ok(())
}

#[async_trait]
impl Store for SqliteStore {
    async fn insert_message(&self, record: &MessageRecord) -> Result<i64, StoreError> {
        let result = sqlx::query(
            "INSERT INTO messages (direction, from_addr, to_addr, body, status, \
             external_id, received_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(record.direction.as_str())
        .bind(&record.from)
        .bind(&record.to)
        .bind(&record.body)
        .bind(&record.status)
        .bind(&record.external_id)
        .bind(format_timestamp(record.received_at))
        .execute(&self.pool)
        .await?;
        let id = result.last_insert_rowid();
        trace!(
            message_id = id,
            direction = record.direction.as_str(),
            "message recorded"
        );
        Ok(id)
    }

    async fn find_open_tickets(&self, phone: &str) -> Result<Vec<Ticket>, StoreError> {
        let sql = format!(
            "SELECT {TICKET_COLUMNS} FROM tickets \
             WHERE customer_phone = ?1 AND status IN ('Open', 'InProgress') \
             ORDER BY created_at DESC, id DESC"
        );
        let rows: Vec<TicketRow> = sqlx::query_as(&sql)
            .bind(phone)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(ticket_from_row).collect()
    }

    async fn insert_ticket(&self, ticket: &Ticket) -> Result<i64, StoreError> {
        let message_ids = encode_message_ids(&ticket.message_ids)?;
        let result = sqlx::query(
            "INSERT INTO tickets (ticket_number, subject, description, status, stage, \
             priority, customer_phone, contact_name, contact_email, initial_message_id, \
             message_ids, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        )
        .bind(&ticket.ticket_number)
        .bind(&ticket.subject)
        .bind(&ticket.description)
        .bind(ticket.status.as_str())
        .bind(&ticket.stage)
        .bind(ticket.priority.as_str())
        .bind(&ticket.customer_phone)
        .bind(&ticket.contact_name)
        .bind(&ticket.contact_email)
        .bind(ticket.initial_message_id)
        .bind(&message_ids)
        .bind(format_timestamp(ticket.created_at))
        .bind(format_timestamp(ticket.updated_at))
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => {
                let id = done.last_insert_rowid();
                trace!(ticket_id = id, number = %ticket.ticket_number, "ticket inserted");
                Ok(id)
            }
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(
                StoreError::DuplicateTicketNumber(ticket.ticket_number.clone()),
            ),
            Err(e) => Err(e.into()),
        }
    }

    async fn replace_ticket(&self, ticket: &Ticket) -> Result<(), StoreError> {
        let id = ticket
            .id
            .ok_or_else(|| StoreError::TicketNotFound(ticket.ticket_number.clone()))?;
        let message_ids = encode_message_ids(&ticket.message_ids)?;
        let result = sqlx::query(
            "UPDATE tickets SET ticket_number = ?1, subject = ?2, description = ?3, \
             status = ?4, stage = ?5, priority = ?6, customer_phone = ?7, contact_name = ?8, \
             contact_email = ?9, initial_message_id = ?10, message_ids = ?11, \
             created_at = ?12, updated_at = ?13 WHERE id = ?14",
        )
        .bind(&ticket.ticket_number)
        .bind(&ticket.subject)
        .bind(&ticket.description)
        .bind(ticket.status.as_str())
        .bind(&ticket.stage)
        .bind(ticket.priority.as_str())
        .bind(&ticket.customer_phone)
        .bind(&ticket.contact_name)
        .bind(&ticket.contact_email)
        .bind(ticket.initial_message_id)
        .bind(&message_ids)
        .bind(format_timestamp(ticket.created_at))
        .bind(format_timestamp(ticket.updated_at))
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::TicketNotFound(ticket.ticket_number.clone()));
        }
        trace!(ticket_id = id, number = %ticket.ticket_number, "ticket replaced");
        Ok(())
    }

    async fn count_tickets(&self) -> Result<i64, StoreError> {
        let (count,): (i64,) = sqlx::query_as("SELECT count(*) FROM tickets")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

fn ticket_from_row(row: TicketRow) -> Result<Ticket, StoreError> {
    let (
        id,
        ticket_number,
        subject,
        description,
        status,
        stage,
        priority,
        customer_phone,
        contact_name,
        contact_email,
        initial_message_id,
        message_ids,
        created_at,
        updated_at,
    ) = row;

    let message_ids: Vec<i64> =
        serde_json::from_str(&message_ids).map_err(|e| StoreError::Corrupt {
            field: "message_ids",
            reason: e.to_string(),
        })?;

    Ok(Ticket {
        id: Some(id),
        ticket_number,
        subject,
        description,
        status: TicketStatus::parse(&status)?,
        stage,
        priority: Priority::parse(&priority)?,
        customer_phone,
        contact_name,
        contact_email,
        initial_message_id,
        message_ids,
        created_at: parse_timestamp("created_at", &created_at)?,
        updated_at: parse_timestamp("updated_at", &updated_at)?,
    })
}

fn encode_message_ids(ids: &[i64]) -> Result<String, StoreError> {
    serde_json::to_string(ids).map_err(|e| StoreError::Corrupt {
        field: "message_ids",
        reason: e.to_string(),
    })
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(field: &'static str, raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt {
            field,
            reason: e.to_string(),
        })
}
