use {
    async_trait::async_trait,
    chrono::{DateTime, Utc},
    sqlx::{QueryBuilder, Sqlite, SqlitePool},
};

use {
    nudge_channels::{Error, MessageFilter, MessageStore, Result, error::Context},
    nudge_common::types::{MessageKind, MessageRecord},
};

use crate::db_error;

const COLUMNS: &str = "external_id, room, sender, body, body_formatted, sent_at, incoming, kind, \
                       related_event_id, reply_to_id";

#[derive(sqlx::FromRow)]
struct MessageRow {
    external_id: String,
    room: String,
    sender: Option<String>,
    body: String,
    body_formatted: String,
    sent_at: i64,
    incoming: bool,
    kind: String,
    related_event_id: Option<String>,
    reply_to_id: Option<String>,
}

impl TryFrom<MessageRow> for MessageRecord {
    type Error = Error;

    fn try_from(r: MessageRow) -> Result<Self> {
        let sent_at = DateTime::<Utc>::from_timestamp_millis(r.sent_at)
            .with_context(|| format!("timestamp {} out of range", r.sent_at))?;
        Ok(Self {
            external_id: r.external_id,
            room: r.room,
            sender: r.sender,
            body: r.body,
            body_formatted: r.body_formatted,
            sent_at,
            incoming: r.incoming,
            kind: r.kind.parse::<MessageKind>()?,
            related_event_id: r.related_event_id,
            reply_to_id: r.reply_to_id,
        })
    }
}

/// SQLite-backed message store.
pub struct SqliteMessageStore {
    pool: SqlitePool,
}

impl SqliteMessageStore {
    /// The schema must already exist (see [`crate::run_migrations`]).
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageStore for SqliteMessageStore {
    async fn create(&self, record: MessageRecord) -> Result<MessageRecord> {
        let inserted = sqlx::query(
            "INSERT INTO messages
             (external_id, room, sender, body, body_formatted, sent_at, incoming, kind,
              related_event_id, reply_to_id)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.external_id)
        .bind(&record.room)
        .bind(&record.sender)
        .bind(&record.body)
        .bind(&record.body_formatted)
        .bind(record.sent_at.timestamp_millis())
        .bind(record.incoming)
        .bind(record.kind.as_str())
        .bind(&record.related_event_id)
        .bind(&record.reply_to_id)
        .execute(&self.pool)
        .await;

        match inserted {
            Ok(_) => Ok(record),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(Error::duplicate(record.external_id))
            },
            Err(e) => Err(db_error("insert message")(e)),
        }
    }

    async fn get_by_external_id(&self, external_id: &str) -> Result<Option<MessageRecord>> {
        let row = sqlx::query_as::<_, MessageRow>(&format!(
            "SELECT {COLUMNS} FROM messages WHERE external_id = ?"
        ))
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("get message"))?;
        row.map(TryInto::try_into).transpose()
    }

    async fn list(&self, filter: &MessageFilter) -> Result<Vec<MessageRecord>> {
        let mut query =
            QueryBuilder::<Sqlite>::new(format!("SELECT {COLUMNS} FROM messages WHERE 1 = 1"));
        if let Some(room) = &filter.room {
            query.push(" AND room = ").push_bind(room.clone());
        }
        if let Some(incoming) = filter.incoming {
            query.push(" AND incoming = ").push_bind(incoming);
        }
        if let Some(kind) = filter.kind {
            query.push(" AND kind = ").push_bind(kind.as_str());
        }
        if let Some(related) = &filter.related_event_id {
            query
                .push(" AND related_event_id = ")
                .push_bind(related.clone());
        }
        query.push(" ORDER BY sent_at DESC, rowid DESC");
        if let Some(limit) = filter.limit {
            query.push(" LIMIT ").push_bind(i64::from(limit));
        }

        let rows = query
            .build_query_as::<MessageRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("list messages"))?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn delete_all_for_room(&self, room: &str) -> Result<()> {
        sqlx::query("DELETE FROM messages WHERE room = ?")
            .bind(room)
            .execute(&self.pool)
            .await
            .map_err(db_error("delete room messages"))?;
        Ok(())
    }
}
