// Discord interaction payloads, REST seams, and response bodies.

pub mod client;
pub mod verify;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::db::{GuildId, UserId};

// ── Errors ────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("discord request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("discord returned {status}: {body}")]
    Status { status: u16, body: String },
}

// ── Payload types ─────────────────────────────────────────────────────

/// Discord ids arrive as decimal strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub struct Snowflake(pub u64);

impl TryFrom<String> for Snowflake {
    type Error = std::num::ParseIntError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse().map(Snowflake)
    }
}

impl From<Snowflake> for UserId {
    fn from(value: Snowflake) -> Self {
        UserId(value.0)
    }
}

impl From<Snowflake> for GuildId {
    fn from(value: Snowflake) -> Self {
        GuildId(value.0)
    }
}

pub const INTERACTION_PING: u8 = 1;
pub const INTERACTION_APPLICATION_COMMAND: u8 = 2;

#[derive(Debug, Clone, Deserialize)]
pub struct Interaction {
    pub id: Snowflake,
    #[serde(rename = "type")]
    pub kind: u8,
    pub token: String,
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
    /// Present when invoked inside a guild.
    #[serde(default)]
    pub member: Option<GuildMember>,
    /// Present when invoked in a DM.
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub data: Option<CommandData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: Snowflake,
    pub username: String,
    #[serde(default)]
    pub global_name: Option<String>,
}

/// Guild member as sent by Discord. `user` is omitted for resolved members.
#[derive(Debug, Clone, Deserialize)]
pub struct GuildMember {
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub nick: Option<String>,
    #[serde(default)]
    pub roles: Vec<Snowflake>,
    /// Computed permissions bitfield, only on interaction members.
    #[serde(default)]
    pub permissions: Option<String>,
}

impl GuildMember {
    pub fn permission_bits(&self) -> u64 {
        self.permissions
            .as_deref()
            .and_then(|p| p.parse().ok())
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommandData {
    pub name: String,
    #[serde(default)]
    pub options: Vec<CommandOption>,
    #[serde(default)]
    pub resolved: Resolved,
}

impl CommandData {
    pub fn option(&self, name: &str) -> Option<&serde_json::Value> {
        self.options
            .iter()
            .find(|o| o.name == name)
            .and_then(|o| o.value.as_ref())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommandOption {
    pub name: String,
    #[serde(default)]
    pub value: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Resolved {
    #[serde(default)]
    pub users: HashMap<Snowflake, User>,
    #[serde(default)]
    pub members: HashMap<Snowflake, GuildMember>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Role {
    pub id: Snowflake,
    pub name: String,
}

/// Name shown for a member: guild nickname, then global name, then username.
pub fn display_name(member: Option<&GuildMember>, user: &User) -> String {
    member
        .and_then(|m| m.nick.clone())
        .or_else(|| user.global_name.clone())
        .unwrap_or_else(|| user.username.clone())
}

/// A guild member as the bot needs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub user_id: UserId,
    pub display_name: String,
    pub role_ids: Vec<u64>,
}

impl Member {
    pub fn from_guild_member(member: &GuildMember) -> Option<Self> {
        let user = member.user.as_ref()?;
        Some(Member {
            user_id: user.id.into(),
            display_name: display_name(Some(member), user),
            role_ids: member.roles.iter().map(|r| r.0).collect(),
        })
    }
}

// ── Response bodies ───────────────────────────────────────────────────

const RESPONSE_PONG: u8 = 1;
const RESPONSE_CHANNEL_MESSAGE: u8 = 4;
const RESPONSE_DEFERRED_CHANNEL_MESSAGE: u8 = 5;

/// Message flag that limits visibility to the invoking user.
pub const FLAG_EPHEMERAL: u64 = 1 << 6;

#[derive(Debug, Clone, Serialize)]
pub struct InteractionResponse {
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<MessageData>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "is_zero")]
    pub flags: u64,
    pub allowed_mentions: AllowedMentions,
}

/// Display names are user-controlled; never let them ping anyone.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AllowedMentions {
    pub parse: Vec<String>,
}

fn is_zero(v: &u64) -> bool {
    *v == 0
}

impl MessageData {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            flags: 0,
            allowed_mentions: AllowedMentions::default(),
        }
    }

    pub fn ephemeral(mut self, ephemeral: bool) -> Self {
        self.flags = if ephemeral { FLAG_EPHEMERAL } else { 0 };
        self
    }
}

impl InteractionResponse {
    pub fn pong() -> Self {
        Self {
            kind: RESPONSE_PONG,
            data: None,
        }
    }

    pub fn message(content: impl Into<String>, ephemeral: bool) -> Self {
        Self {
            kind: RESPONSE_CHANNEL_MESSAGE,
            data: Some(MessageData::text(content).ephemeral(ephemeral)),
        }
    }

    /// "Bot is thinking..." placeholder, completed later through the webhook.
    pub fn deferred() -> Self {
        Self {
            kind: RESPONSE_DEFERRED_CHANNEL_MESSAGE,
            data: None,
        }
    }
}

// ── REST seams ────────────────────────────────────────────────────────

/// File attached to an outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub data: Vec<u8>,
}

/// Guild lookups needed by access checks and the player listing.
#[async_trait]
pub trait GuildDirectory: Send + Sync {
    async fn roles(&self, guild: GuildId) -> Result<Vec<Role>, PlatformError>;

    /// Every current member of the guild.
    async fn members(&self, guild: GuildId) -> Result<Vec<Member>, PlatformError>;
}

/// Completes deferred interactions.
#[async_trait]
pub trait Outbox: Send + Sync {
    async fn edit_original(
        &self,
        token: &str,
        content: &str,
        attachment: Option<Attachment>,
    ) -> Result<(), PlatformError>;

    /// Post an extra message after the original response.
    async fn follow_up(
        &self,
        token: &str,
        content: &str,
        ephemeral: bool,
    ) -> Result<(), PlatformError>;

    /// Remove the deferred placeholder.
    async fn delete_original(&self, token: &str) -> Result<(), PlatformError>;
}
