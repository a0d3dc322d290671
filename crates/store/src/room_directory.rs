use {
    async_trait::async_trait,
    chrono::{DateTime, Utc},
    sqlx::SqlitePool,
    tracing::debug,
};

use {
    nudge_channels::{Error, Result, RoomDirectory, error::Context},
    nudge_common::types::Room,
};

use crate::db_error;

#[derive(sqlx::FromRow)]
struct RoomRow {
    external_id: String,
    name: Option<String>,
    created_at: i64,
}

impl TryFrom<RoomRow> for Room {
    type Error = Error;

    fn try_from(r: RoomRow) -> Result<Self> {
        Ok(Self {
            created_at: DateTime::<Utc>::from_timestamp_millis(r.created_at)
                .with_context(|| format!("timestamp {} out of range", r.created_at))?,
            external_id: r.external_id,
            name: r.name,
        })
    }
}

/// SQLite-backed room directory. Besides the read contract it owns the
/// writes membership handling needs.
pub struct SqliteRoomDirectory {
    pool: SqlitePool,
}

impl SqliteRoomDirectory {
    /// The schema must already exist (see [`crate::run_migrations`]).
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert the room, or refresh its name if it is already known. The
    /// original `created_at` is kept.
    pub async fn upsert_room(&self, external_id: &str, name: Option<&str>) -> Result<()> {
        sqlx::query(
            "INSERT INTO rooms (external_id, name, created_at) VALUES (?, ?, ?)
             ON CONFLICT(external_id) DO UPDATE SET
               name = COALESCE(excluded.name, rooms.name)",
        )
        .bind(external_id)
        .bind(name)
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await
        .map_err(db_error("upsert room"))?;
        Ok(())
    }

    pub async fn add_member(&self, room: &str, user: &str) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO room_members (room, user_id) VALUES (?, ?)")
            .bind(room)
            .bind(user)
            .execute(&self.pool)
            .await
            .map_err(db_error("add member"))?;
        Ok(())
    }

    pub async fn remove_member(&self, room: &str, user: &str) -> Result<()> {
        sqlx::query("DELETE FROM room_members WHERE room = ? AND user_id = ?")
            .bind(room)
            .bind(user)
            .execute(&self.pool)
            .await
            .map_err(db_error("remove member"))?;
        Ok(())
    }

    pub async fn member_count(&self, room: &str) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM room_members WHERE room = ?")
            .bind(room)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("count members"))?;
        Ok(count)
    }

    /// Forget the room and all of its members.
    pub async fn delete_room(&self, external_id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(db_error("delete room"))?;
        sqlx::query("DELETE FROM room_members WHERE room = ?")
            .bind(external_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error("delete room members"))?;
        let deleted = sqlx::query("DELETE FROM rooms WHERE external_id = ?")
            .bind(external_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error("delete room"))?;
        tx.commit().await.map_err(db_error("delete room"))?;
        debug!(room = external_id, rows = deleted.rows_affected(), "room deleted");
        Ok(())
    }
}

#[async_trait]
impl RoomDirectory for SqliteRoomDirectory {
    async fn get_room_by_external_id(&self, external_id: &str) -> Result<Option<Room>> {
        let row = sqlx::query_as::<_, RoomRow>(
            "SELECT external_id, name, created_at FROM rooms WHERE external_id = ?",
        )
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("get room"))?;
        row.map(TryInto::try_into).transpose()
    }

    async fn is_member_known(&self, room: &str, user: &str) -> Result<bool> {
        let found: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM room_members WHERE room = ? AND user_id = ?")
                .bind(room)
                .bind(user)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error("get member"))?;
        Ok(found.is_some())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, crate::test_pool};

    #[tokio::test]
    async fn rooms_and_members_round_trip() {
        let rooms = SqliteRoomDirectory::new(test_pool().await);
        assert!(rooms.get_room_by_external_id("!a:hs").await.unwrap().is_none());

        rooms.upsert_room("!a:hs", Some("Plants")).await.unwrap();
        rooms.add_member("!a:hs", "@alice:hs").await.unwrap();
        rooms.add_member("!a:hs", "@alice:hs").await.unwrap();

        let room = rooms.get_room_by_external_id("!a:hs").await.unwrap().unwrap();
        assert_eq!(room.name.as_deref(), Some("Plants"));
        assert!(rooms.is_member_known("!a:hs", "@alice:hs").await.unwrap());
        assert!(!rooms.is_member_known("!a:hs", "@bob:hs").await.unwrap());
        assert_eq!(rooms.member_count("!a:hs").await.unwrap(), 1);

        rooms.remove_member("!a:hs", "@alice:hs").await.unwrap();
        assert!(!rooms.is_member_known("!a:hs", "@alice:hs").await.unwrap());
    }

    #[tokio::test]
    async fn upsert_keeps_known_name() {
        let rooms = SqliteRoomDirectory::new(test_pool().await);
        rooms.upsert_room("!a:hs", Some("Plants")).await.unwrap();
        let first = rooms.get_room_by_external_id("!a:hs").await.unwrap().unwrap();

        rooms.upsert_room("!a:hs", None).await.unwrap();
        let again = rooms.get_room_by_external_id("!a:hs").await.unwrap().unwrap();
        assert_eq!(again.name.as_deref(), Some("Plants"));
        assert_eq!(again.created_at, first.created_at);
    }

    #[tokio::test]
    async fn delete_room_drops_members() {
        let rooms = SqliteRoomDirectory::new(test_pool().await);
        rooms.upsert_room("!a:hs", None).await.unwrap();
        rooms.upsert_room("!b:hs", None).await.unwrap();
        rooms.add_member("!a:hs", "@alice:hs").await.unwrap();
        rooms.add_member("!b:hs", "@alice:hs").await.unwrap();

        rooms.delete_room("!a:hs").await.unwrap();
        assert!(rooms.get_room_by_external_id("!a:hs").await.unwrap().is_none());
        assert_eq!(rooms.member_count("!a:hs").await.unwrap(), 0);
        assert!(rooms.is_member_known("!b:hs", "@alice:hs").await.unwrap());
    }
}
