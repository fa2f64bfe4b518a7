// Heart rendering for HP values.

pub const HEART: &str = "❤️";

/// Default cap on rendered hearts before falling back to " ...".
pub const DEFAULT_MAX_HEARTS: usize = 20;

/// Render `hp` as hearts, capped at `max_hearts`.
///
/// Past the cap the string ends in `" ..."` and the caller is expected to
/// show the numeric total next to it.
pub fn render_hearts(hp: i64, max_hearts: usize) -> String {
    if hp <= 0 {
        return String::new();
    }
    let hp = hp as u64;
    if hp <= max_hearts as u64 {
        return HEART.repeat(hp as usize);
    }
    format!("{} ...", HEART.repeat(max_hearts))
}

/// `"{name}: {hearts} ({hp})"`
pub fn format_player_line(name: &str, hp: i64, max_hearts: usize) -> String {
    format!("{name}: {} ({hp})", render_hearts(hp, max_hearts))
}
