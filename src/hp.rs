// HP adjustments on top of the player store.
//
// A player whose HP reaches zero is deleted rather than stored at zero, so
// every row in `Players` has hp > 0.

use crate::db::{self, Database, GuildId, UserId};

/// Outcome of an HP adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HpChange {
    pub before: i64,
    pub after: i64,
    /// The adjustment drove HP to zero or below and the row was deleted.
    pub removed: bool,
}

/// HP after adding `amount`. Not clamped; a negative result means removal.
pub fn added(current: i64, amount: i64) -> i64 {
    current.saturating_add(amount)
}

/// HP after removing `amount`, floored at zero.
pub fn subtracted(current: i64, amount: i64) -> i64 {
    current.saturating_sub(amount).max(0)
}

pub async fn get_or_init(db: &Database, user: UserId, guild: GuildId) -> Result<i64, sqlx::Error> {
    db.get_or_init_hp(user, guild).await
}

pub async fn add_hp(
    db: &Database,
    user: UserId,
    guild: GuildId,
    amount: i64,
) -> Result<HpChange, sqlx::Error> {
    adjust(db, user, guild, |current| added(current, amount)).await
}

pub async fn remove_hp(
    db: &Database,
    user: UserId,
    guild: GuildId,
    amount: i64,
) -> Result<HpChange, sqlx::Error> {
    adjust(db, user, guild, |current| subtracted(current, amount)).await
}

async fn adjust(
    db: &Database,
    user: UserId,
    guild: GuildId,
    apply: impl FnOnce(i64) -> i64,
) -> Result<HpChange, sqlx::Error> {
    // The first statement is a write, so SQLite takes the write lock up front
    // and the read-modify-write cannot interleave with another adjustment.
    let mut tx = db.begin().await?;
    let before = db::get_or_init_hp(&mut *tx, user, guild).await?;
    let after = apply(before);
    let removed = db::set_hp(&mut *tx, user, guild, after).await?;
    tx.commit().await?;

    tracing::debug!(%user, %guild, before, after, removed, "hp adjusted");

    Ok(HpChange {
        before,
        after,
        removed,
    })
}
