// Player HP storage (SQLite via sqlx).

use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteExecutor, SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, Transaction};

/// HP a player starts with. Mirrors the column default in the `Players` table.
pub const DEFAULT_HP: i64 = 6;

/// Discord user snowflake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub u64);

/// Discord guild (server) snowflake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GuildId(pub u64);

// Snowflakes fit in 63 bits, so the INTEGER column round-trips them unchanged.
impl UserId {
    fn as_db(self) -> i64 {
        self.0 as i64
    }
}

impl GuildId {
    fn as_db(self) -> i64 {
        self.0 as i64
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for GuildId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PlayerRecord {
    pub uid: i64,
    pub guild_id: i64,
    pub hp: i64,
}

impl PlayerRecord {
    pub fn user_id(&self) -> UserId {
        UserId(self.uid as u64)
    }

    pub fn guild(&self) -> GuildId {
        GuildId(self.guild_id as u64)
    }
}

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        // Layout is shared with existing state.db files; do not add constraints here.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS Players (
                uid INTEGER,
                guild_id INTEGER,
                hp INTEGER DEFAULT 6,
                PRIMARY KEY(uid, guild_id)
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Start a transaction for composing several store operations atomically.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>, sqlx::Error> {
        self.pool.begin().await
    }

    pub async fn get_or_init_hp(&self, user: UserId, guild: GuildId) -> Result<i64, sqlx::Error> {
        get_or_init_hp(&self.pool, user, guild).await
    }

    pub async fn peek_hp(&self, user: UserId, guild: GuildId) -> Result<Option<i64>, sqlx::Error> {
        peek_hp(&self.pool, user, guild).await
    }

    pub async fn set_hp(&self, user: UserId, guild: GuildId, hp: i64) -> Result<bool, sqlx::Error> {
        set_hp(&self.pool, user, guild, hp).await
    }

    pub async fn delete_player(&self, user: UserId, guild: GuildId) -> Result<bool, sqlx::Error> {
        delete_player(&self.pool, user, guild).await
    }

    pub async fn list_players(&self, guild: GuildId) -> Result<Vec<PlayerRecord>, sqlx::Error> {
        list_players(&self.pool, guild).await
    }
}

// ── Executor-generic operations ───────────────────────────────────────
//
// These run against the pool or against `&mut *tx` so the HP service can
// compose a read-modify-write inside one transaction.

/// Return the player's HP, inserting a row at the column default when the
/// pair has never been seen. Single statement, so concurrent first touches
/// cannot both insert.
pub async fn get_or_init_hp<'e>(
    executor: impl SqliteExecutor<'e>,
    user: UserId,
    guild: GuildId,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        "INSERT INTO Players (uid, guild_id) VALUES (?, ?) \
         ON CONFLICT (uid, guild_id) DO UPDATE SET hp = hp \
         RETURNING hp",
    )
    .bind(user.as_db())
    .bind(guild.as_db())
    .fetch_one(executor)
    .await
}

/// Read the player's HP without creating a row.
pub async fn peek_hp<'e>(
    executor: impl SqliteExecutor<'e>,
    user: UserId,
    guild: GuildId,
) -> Result<Option<i64>, sqlx::Error> {
    sqlx::query_scalar("SELECT hp FROM Players WHERE uid = ? AND guild_id = ?")
        .bind(user.as_db())
        .bind(guild.as_db())
        .fetch_optional(executor)
        .await
}

/// Upsert the player's HP. A value of zero or below deletes the row instead
/// and returns `true`.
pub async fn set_hp<'e>(
    executor: impl SqliteExecutor<'e>,
    user: UserId,
    guild: GuildId,
    hp: i64,
) -> Result<bool, sqlx::Error> {
    if hp <= 0 {
        delete_player(executor, user, guild).await?;
        return Ok(true);
    }

    sqlx::query(
        "INSERT INTO Players (uid, guild_id, hp) VALUES (?, ?, ?) \
         ON CONFLICT (uid, guild_id) DO UPDATE SET hp = excluded.hp",
    )
    .bind(user.as_db())
    .bind(guild.as_db())
    .bind(hp)
    .execute(executor)
    .await?;
    Ok(false)
}

pub async fn delete_player<'e>(
    executor: impl SqliteExecutor<'e>,
    user: UserId,
    guild: GuildId,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM Players WHERE uid = ? AND guild_id = ?")
        .bind(user.as_db())
        .bind(guild.as_db())
        .execute(executor)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn list_players<'e>(
    executor: impl SqliteExecutor<'e>,
    guild: GuildId,
) -> Result<Vec<PlayerRecord>, sqlx::Error> {
    sqlx::query_as::<_, PlayerRecord>(
        "SELECT uid, guild_id, hp FROM Players WHERE guild_id = ? ORDER BY rowid",
    )
    .bind(guild.as_db())
    .fetch_all(executor)
    .await
}
