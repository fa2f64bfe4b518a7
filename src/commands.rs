// Slash commands: parsing, gating, execution, and replies.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde_json::{json, Value};

use crate::access::{AccessPolicy, Invoker};
use crate::db::{Database, GuildId, UserId};
use crate::discord::{display_name, GuildDirectory, Interaction, PlatformError, Snowflake};
use crate::hp::{self, HpChange};
use crate::metrics;
use crate::paginate::{Paged, Paginator};
use crate::render::{format_player_line, render_hearts, DEFAULT_MAX_HEARTS};

pub const LISTING_FILENAME: &str = "players.txt";

const LISTING_HEADER: &str = "**Players HP:**\n";
const PRUNED_NOTE: &str = "(Also removed entries for members who left or had 0 HP.)";

// ── Errors ────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("This command can only be used in a server.")]
    NoGuild,
    #[error("You do not have permission to use this command.")]
    Forbidden,
    #[error("Amount must be at least 1.")]
    InvalidAmount,
    #[error("{0} is not a member of this server.")]
    NotAMember(String),
    #[error("Unknown command `{0}`.")]
    UnknownCommand(String),
    #[error("Missing or invalid option `{0}`.")]
    BadOption(&'static str),
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
    #[error("discord error: {0}")]
    Platform(#[from] PlatformError),
}

impl CommandError {
    fn outcome(&self) -> &'static str {
        match self {
            CommandError::Storage(_) | CommandError::Platform(_) => "failed",
            _ => "rejected",
        }
    }

    /// The message shown to the invoker. Internal failures are logged and
    /// replaced by a generic apology.
    pub fn into_reply(self) -> Reply {
        match self {
            CommandError::Storage(e) => {
                tracing::error!("Database error: {e}");
                Reply::ephemeral("Something went wrong with the HP store. Please try again later.")
            }
            CommandError::Platform(e) => {
                tracing::error!("Discord error: {e}");
                Reply::ephemeral("Could not reach Discord to complete this command. Please try again later.")
            }
            other => Reply::ephemeral(other.to_string()),
        }
    }
}

// ── Commands ──────────────────────────────────────────────────────────

/// A user named in a command option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub user_id: UserId,
    pub display_name: String,
    /// Whether Discord resolved the user as a member of the invoking guild.
    pub in_guild: bool,
}

impl Target {
    fn ensure_member(&self) -> Result<(), CommandError> {
        if !self.in_guild {
            return Err(CommandError::NotAMember(self.display_name.clone()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    ShowSelf,
    ShowMember { target: Target },
    Add { target: Target, amount: i64 },
    Remove { target: Target, amount: i64 },
    ListPlayers,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::ShowSelf => "hp",
            Command::ShowMember { .. } => "hp_show",
            Command::Add { .. } => "hp_add",
            Command::Remove { .. } => "hp_remove",
            Command::ListPlayers => "players",
        }
    }

    pub fn is_privileged(&self) -> bool {
        !matches!(self, Command::ShowSelf)
    }

    /// Commands that may outlive Discord's three second response window.
    pub fn defers(&self) -> bool {
        matches!(self, Command::ListPlayers)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub guild: Option<GuildId>,
    pub invoker: Option<Invoker>,
    pub command: Command,
}

impl Invocation {
    pub fn from_interaction(interaction: &Interaction) -> Result<Self, CommandError> {
        let data = interaction
            .data
            .as_ref()
            .ok_or_else(|| CommandError::UnknownCommand(String::new()))?;

        let invoker = interaction.member.as_ref().and_then(|member| {
            let user = member.user.as_ref()?;
            Some(Invoker {
                user_id: user.id.into(),
                display_name: display_name(Some(member), user),
                role_ids: member.roles.iter().map(|r| r.0).collect(),
                permissions: member.permission_bits(),
            })
        });

        let target = || -> Result<Target, CommandError> {
            let id = data
                .option("member")
                .and_then(Value::as_str)
                .and_then(|s| s.parse::<u64>().ok())
                .ok_or(CommandError::BadOption("member"))?;
            let key = Snowflake(id);
            let name = match data.resolved.users.get(&key) {
                Some(user) => display_name(data.resolved.members.get(&key), user),
                None => format!("<@{id}>"),
            };
            Ok(Target {
                user_id: UserId(id),
                display_name: name,
                in_guild: data.resolved.members.contains_key(&key),
            })
        };

        let amount = || -> Result<i64, CommandError> {
            match data.option("amount") {
                None => Ok(1),
                Some(v) => v.as_i64().ok_or(CommandError::BadOption("amount")),
            }
        };

        let command = match data.name.as_str() {
            "hp" => Command::ShowSelf,
            "hp_show" => Command::ShowMember { target: target()? },
            "hp_add" => Command::Add {
                target: target()?,
                amount: amount()?,
            },
            "hp_remove" => Command::Remove {
                target: target()?,
                amount: amount()?,
            },
            "players" => Command::ListPlayers,
            other => return Err(CommandError::UnknownCommand(other.to_string())),
        };

        Ok(Invocation {
            guild: interaction.guild_id.map(GuildId::from),
            invoker,
            command,
        })
    }
}

// ── Replies ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Message { content: String, ephemeral: bool },
    /// First page answers the interaction; the rest are follow-ups.
    Pages(Vec<String>),
    File {
        notice: String,
        filename: String,
        body: String,
    },
}

impl Reply {
    pub fn public(content: impl Into<String>) -> Self {
        Reply::Message {
            content: content.into(),
            ephemeral: false,
        }
    }

    pub fn ephemeral(content: impl Into<String>) -> Self {
        Reply::Message {
            content: content.into(),
            ephemeral: true,
        }
    }
}

// ── Dispatcher ────────────────────────────────────────────────────────

pub struct Dispatcher {
    db: Arc<Database>,
    directory: Arc<dyn GuildDirectory>,
    policy: AccessPolicy,
    max_hearts: usize,
    paginator: Paginator,
}

impl Dispatcher {
    pub fn new(db: Arc<Database>, directory: Arc<dyn GuildDirectory>, policy: AccessPolicy) -> Self {
        Self {
            db,
            directory,
            policy,
            max_hearts: DEFAULT_MAX_HEARTS,
            paginator: Paginator::default(),
        }
    }

    pub fn with_max_hearts(mut self, max_hearts: usize) -> Self {
        self.max_hearts = max_hearts;
        self
    }

    pub fn with_paginator(mut self, paginator: Paginator) -> Self {
        self.paginator = paginator;
        self
    }

    /// Check guild context and permissions. Nothing is written before this passes.
    pub async fn authorize(&self, invocation: &Invocation) -> Result<GuildId, CommandError> {
        let guild = invocation.guild.ok_or(CommandError::NoGuild)?;
        if invocation.command.is_privileged()
            && !self
                .policy
                .permits(invocation.invoker.as_ref(), guild, self.directory.as_ref())
                .await?
        {
            return Err(CommandError::Forbidden);
        }
        Ok(guild)
    }

    /// Gate, run, and turn any error into a reply.
    pub async fn dispatch(&self, invocation: &Invocation) -> Reply {
        match self.authorize(invocation).await {
            Ok(guild) => self.execute(guild, invocation).await,
            Err(e) => self.reject(&invocation.command, e),
        }
    }

    /// Record a failed gate and build the invoker-facing reply.
    pub fn reject(&self, command: &Command, err: CommandError) -> Reply {
        metrics::COMMANDS_TOTAL
            .with_label_values(&[command.name(), err.outcome()])
            .inc();
        err.into_reply()
    }

    /// Run an already authorized invocation.
    pub async fn execute(&self, guild: GuildId, invocation: &Invocation) -> Reply {
        let name = invocation.command.name();
        let started = Instant::now();
        let result = self.run(guild, invocation).await;
        metrics::COMMAND_DURATION_SECONDS
            .with_label_values(&[name])
            .observe(started.elapsed().as_secs_f64());

        match result {
            Ok(reply) => {
                metrics::COMMANDS_TOTAL.with_label_values(&[name, "ok"]).inc();
                reply
            }
            Err(e) => {
                metrics::COMMANDS_TOTAL
                    .with_label_values(&[name, e.outcome()])
                    .inc();
                e.into_reply()
            }
        }
    }

    async fn run(&self, guild: GuildId, invocation: &Invocation) -> Result<Reply, CommandError> {
        match &invocation.command {
            Command::ShowSelf => {
                let invoker = invocation.invoker.as_ref().ok_or(CommandError::NoGuild)?;
                let hp = hp::get_or_init(&self.db, invoker.user_id, guild).await?;
                Ok(Reply::public(format_player_line(
                    &invoker.display_name,
                    hp,
                    self.max_hearts,
                )))
            }
            Command::ShowMember { target } => {
                target.ensure_member()?;
                let hp = hp::get_or_init(&self.db, target.user_id, guild).await?;
                if hp <= 0 {
                    return Ok(Reply::ephemeral(format!(
                        "{} is not on the HP list.",
                        target.display_name
                    )));
                }
                Ok(Reply::public(format_player_line(
                    &target.display_name,
                    hp,
                    self.max_hearts,
                )))
            }
            Command::Add { target, amount } => {
                target.ensure_member()?;
                validate_amount(*amount)?;
                let change = hp::add_hp(&self.db, target.user_id, guild, *amount).await?;
                Ok(Reply::public(self.adjusted("Added", "to", target, *amount, change)))
            }
            Command::Remove { target, amount } => {
                target.ensure_member()?;
                validate_amount(*amount)?;
                let change = hp::remove_hp(&self.db, target.user_id, guild, *amount).await?;
                Ok(Reply::public(self.adjusted("Removed", "from", target, *amount, change)))
            }
            Command::ListPlayers => self.list_players(guild).await,
        }
    }

    fn adjusted(
        &self,
        verb: &str,
        preposition: &str,
        target: &Target,
        amount: i64,
        change: HpChange,
    ) -> String {
        let name = &target.display_name;
        if change.removed {
            format!(
                "{verb} {amount} HP {preposition} {name}. Now at 0 HP — removed from player list."
            )
        } else {
            format!(
                "{verb} {amount} HP {preposition} {name}. Now at {} ({}).",
                render_hearts(change.after, self.max_hearts),
                change.after
            )
        }
    }

    async fn list_players(&self, guild: GuildId) -> Result<Reply, CommandError> {
        let records = self.db.list_players(guild).await?;
        if records.is_empty() {
            return Ok(Reply::public("No players found."));
        }

        let members: HashMap<UserId, String> = self
            .directory
            .members(guild)
            .await?
            .into_iter()
            .map(|m| (m.user_id, m.display_name))
            .collect();

        let mut lines = Vec::with_capacity(records.len());
        let mut pruned = 0u64;
        for record in records {
            match members.get(&record.user_id()) {
                Some(name) if record.hp > 0 => {
                    lines.push(format_player_line(name, record.hp, self.max_hearts));
                }
                _ => {
                    self.db.delete_player(record.user_id(), guild).await?;
                    pruned += 1;
                }
            }
        }

        if pruned > 0 {
            metrics::RECORDS_PRUNED_TOTAL.inc_by(pruned);
            tracing::info!(%guild, pruned, "pruned player rows while listing");
        }

        if lines.is_empty() {
            let mut msg = String::from("No players found.");
            if pruned > 0 {
                msg.push_str(" (Removed entries for members who left or had 0 HP.)");
            }
            return Ok(Reply::public(msg));
        }

        let mut text = String::from(LISTING_HEADER);
        text.push_str(&lines.join("\n"));
        if pruned > 0 {
            text.push_str("\n\n");
            text.push_str(PRUNED_NOTE);
        }

        Ok(match self.paginator.plan(text) {
            Paged::Single(text) => Reply::public(text),
            Paged::Chunks(pages) => Reply::Pages(pages),
            Paged::File(body) => Reply::File {
                notice: format!("Output too long — uploading as `{LISTING_FILENAME}`."),
                filename: LISTING_FILENAME.to_string(),
                body,
            },
        })
    }
}

fn validate_amount(amount: i64) -> Result<(), CommandError> {
    if amount < 1 {
        return Err(CommandError::InvalidAmount);
    }
    Ok(())
}

// ── Registration ──────────────────────────────────────────────────────

const OPTION_INTEGER: u8 = 4;
const OPTION_USER: u8 = 6;

fn member_option(description: &str) -> Value {
    json!({
        "type": OPTION_USER,
        "name": "member",
        "description": description,
        "required": true,
    })
}

fn amount_option(description: &str) -> Value {
    json!({
        "type": OPTION_INTEGER,
        "name": "amount",
        "description": description,
        "required": false,
        "min_value": 1,
    })
}

/// Slash command definitions for bulk registration.
pub fn definitions() -> Value {
    json!([
        {
            "name": "hp",
            "description": "Check your own HP",
        },
        {
            "name": "hp_show",
            "description": "Check HP of a specific member (mods only)",
            "options": [member_option("The member to check")],
        },
        {
            "name": "hp_add",
            "description": "Add HP to a member (mods only)",
            "options": [
                member_option("Select the member to modify"),
                amount_option("Amount of HP to add"),
            ],
        },
        {
            "name": "hp_remove",
            "description": "Remove HP from a member (mods only)",
            "options": [
                member_option("Select the member to modify"),
                amount_option("Amount of HP to remove"),
            ],
        },
        {
            "name": "players",
            "description": "Show all players and their HP (mods only)",
        },
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{RoleRef, ADMINISTRATOR};
    use crate::discord::{Member, Role};
    use crate::render::HEART;
    use async_trait::async_trait;
    use std::sync::Mutex;

    const GUILD: GuildId = GuildId(500);
    const MOD_ROLE: u64 = 9000;

    #[derive(Default)]
    struct FakeGuild {
        members: Mutex<Vec<Member>>,
    }

    impl FakeGuild {
        fn with_members(names: &[(u64, &str)]) -> Self {
            let members = names
                .iter()
                .map(|(id, name)| Member {
                    user_id: UserId(*id),
                    display_name: name.to_string(),
                    role_ids: vec![],
                })
                .collect();
            Self {
                members: Mutex::new(members),
            }
        }
    }

    #[async_trait]
    impl GuildDirectory for FakeGuild {
        async fn roles(&self, _guild: GuildId) -> Result<Vec<Role>, PlatformError> {
            Ok(vec![Role {
                id: Snowflake(MOD_ROLE),
                name: "slime".into(),
            }])
        }

        async fn members(&self, _guild: GuildId) -> Result<Vec<Member>, PlatformError> {
            Ok(self.members.lock().unwrap().clone())
        }
    }

    async fn setup(directory: FakeGuild) -> (Arc<Database>, Dispatcher) {
        let db = Arc::new(Database::new("sqlite::memory:").await.unwrap());
        let policy = AccessPolicy::Role(RoleRef {
            id: None,
            name: "slime".into(),
        });
        let dispatcher = Dispatcher::new(db.clone(), Arc::new(directory), policy);
        (db, dispatcher)
    }

    fn moderator() -> Invoker {
        Invoker {
            user_id: UserId(1),
            display_name: "Mod".into(),
            role_ids: vec![MOD_ROLE],
            permissions: 0,
        }
    }

    fn regular(id: u64, name: &str) -> Invoker {
        Invoker {
            user_id: UserId(id),
            display_name: name.into(),
            role_ids: vec![],
            permissions: ADMINISTRATOR,
        }
    }

    fn target(id: u64, name: &str) -> Target {
        Target {
            user_id: UserId(id),
            display_name: name.into(),
            in_guild: true,
        }
    }

    fn outsider(id: u64, name: &str) -> Target {
        Target {
            in_guild: false,
            ..target(id, name)
        }
    }

    fn invoke(invoker: Invoker, command: Command) -> Invocation {
        Invocation {
            guild: Some(GUILD),
            invoker: Some(invoker),
            command,
        }
    }

    fn content(reply: &Reply) -> &str {
        match reply {
            Reply::Message { content, .. } => content,
            other => panic!("expected a message, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fresh_user_checks_own_hp() {
        let (db, dispatcher) = setup(FakeGuild::default()).await;

        let reply = dispatcher
            .dispatch(&invoke(regular(2, "Alice"), Command::ShowSelf))
            .await;
        let text = content(&reply);
        assert_eq!(text.matches(HEART).count(), 6);
        assert!(text.starts_with("Alice: "));
        assert!(text.ends_with("(6)"));
        assert_eq!(db.peek_hp(UserId(2), GUILD).await.unwrap(), Some(6));
    }

    #[tokio::test]
    async fn test_show_self_outside_guild() {
        let (_db, dispatcher) = setup(FakeGuild::default()).await;

        let reply = dispatcher
            .dispatch(&Invocation {
                guild: None,
                invoker: None,
                command: Command::ShowSelf,
            })
            .await;
        assert_eq!(
            reply,
            Reply::ephemeral("This command can only be used in a server.")
        );
    }

    #[tokio::test]
    async fn test_privileged_command_rejected_without_role() {
        let (db, dispatcher) = setup(FakeGuild::default()).await;

        let reply = dispatcher
            .dispatch(&invoke(
                regular(2, "Alice"),
                Command::Add {
                    target: target(3, "Bob"),
                    amount: 5,
                },
            ))
            .await;
        assert_eq!(
            reply,
            Reply::ephemeral("You do not have permission to use this command.")
        );
        // No row was created for the target.
        assert_eq!(db.peek_hp(UserId(3), GUILD).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_moderator_adds_hp() {
        let (_db, dispatcher) = setup(FakeGuild::default()).await;

        let reply = dispatcher
            .dispatch(&invoke(
                moderator(),
                Command::Add {
                    target: target(3, "Bob"),
                    amount: 5,
                },
            ))
            .await;
        let text = content(&reply);
        assert!(text.starts_with("Added 5 HP to Bob. Now at "));
        assert_eq!(text.matches(HEART).count(), 11);
        assert!(text.ends_with("(11)."));
    }

    #[tokio::test]
    async fn test_hearts_cap_at_twenty() {
        let (_db, dispatcher) = setup(FakeGuild::default()).await;

        let add_one = invoke(
            moderator(),
            Command::Add {
                target: target(3, "Bob"),
                amount: 1,
            },
        );
        for _ in 0..18 {
            dispatcher.dispatch(&add_one).await;
        }
        let last = dispatcher.dispatch(&add_one).await;
        let text = content(&last);
        assert_eq!(text.matches(HEART).count(), 20);
        assert!(text.contains(" ... (25)."));
    }

    #[tokio::test]
    async fn test_remove_to_zero_removes_player() {
        let (db, dispatcher) = setup(FakeGuild::default()).await;
        db.set_hp(UserId(3), GUILD, 3).await.unwrap();

        let reply = dispatcher
            .dispatch(&invoke(
                moderator(),
                Command::Remove {
                    target: target(3, "Bob"),
                    amount: 10,
                },
            ))
            .await;
        assert_eq!(
            content(&reply),
            "Removed 10 HP from Bob. Now at 0 HP — removed from player list."
        );
        assert_eq!(db.peek_hp(UserId(3), GUILD).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_remove_default_amount() {
        let (_db, dispatcher) = setup(FakeGuild::default()).await;

        let reply = dispatcher
            .dispatch(&invoke(
                moderator(),
                Command::Remove {
                    target: target(3, "Bob"),
                    amount: 1,
                },
            ))
            .await;
        let text = content(&reply);
        assert!(text.starts_with("Removed 1 HP from Bob. Now at "));
        assert!(text.ends_with("(5)."));
    }

    #[tokio::test]
    async fn test_non_positive_amount_rejected() {
        let (db, dispatcher) = setup(FakeGuild::default()).await;

        let reply = dispatcher
            .dispatch(&invoke(
                moderator(),
                Command::Add {
                    target: target(3, "Bob"),
                    amount: 0,
                },
            ))
            .await;
        assert_eq!(reply, Reply::ephemeral("Amount must be at least 1."));
        assert_eq!(db.peek_hp(UserId(3), GUILD).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_show_member_initializes() {
        let (_db, dispatcher) = setup(FakeGuild::default()).await;

        let reply = dispatcher
            .dispatch(&invoke(
                moderator(),
                Command::ShowMember {
                    target: target(4, "Cara"),
                },
            ))
            .await;
        assert!(content(&reply).starts_with("Cara: "));
        assert!(content(&reply).ends_with("(6)"));
    }

    #[tokio::test]
    async fn test_list_players_prunes_departed_members() {
        let (db, dispatcher) = setup(FakeGuild::with_members(&[(10, "Ann"), (11, "Ben")])).await;
        db.set_hp(UserId(10), GUILD, 2).await.unwrap();
        db.set_hp(UserId(99), GUILD, 4).await.unwrap();
        db.set_hp(UserId(11), GUILD, 7).await.unwrap();

        let reply = dispatcher
            .dispatch(&invoke(moderator(), Command::ListPlayers))
            .await;
        let text = content(&reply);
        assert!(text.starts_with("**Players HP:**\n"));
        assert!(text.contains(&format!("Ann: {HEART}{HEART} (2)")));
        assert!(text.contains("Ben: "));
        assert!(text.ends_with(PRUNED_NOTE));

        assert_eq!(db.peek_hp(UserId(99), GUILD).await.unwrap(), None);
        assert_eq!(db.list_players(GUILD).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_list_players_empty() {
        let (db, dispatcher) = setup(FakeGuild::default()).await;

        let reply = dispatcher
            .dispatch(&invoke(moderator(), Command::ListPlayers))
            .await;
        assert_eq!(reply, Reply::public("No players found."));

        db.set_hp(UserId(99), GUILD, 4).await.unwrap();
        let reply = dispatcher
            .dispatch(&invoke(moderator(), Command::ListPlayers))
            .await;
        assert_eq!(
            reply,
            Reply::public("No players found. (Removed entries for members who left or had 0 HP.)")
        );
    }

    #[tokio::test]
    async fn test_long_listing_goes_to_file() {
        let members: Vec<(u64, String)> = (1..=400).map(|i| (i, format!("Player{i:04}"))).collect();
        let refs: Vec<(u64, &str)> = members.iter().map(|(i, n)| (*i, n.as_str())).collect();
        let (db, dispatcher) = setup(FakeGuild::with_members(&refs)).await;
        for (id, _) in &members {
            db.set_hp(UserId(*id), GUILD, 20).await.unwrap();
        }

        let reply = dispatcher
            .dispatch(&invoke(moderator(), Command::ListPlayers))
            .await;
        let Reply::File {
            notice,
            filename,
            body,
        } = reply
        else {
            panic!("expected file reply");
        };
        assert_eq!(filename, "players.txt");
        assert_eq!(notice, "Output too long — uploading as `players.txt`.");
        assert_eq!(body.lines().count(), 401);
    }

    #[tokio::test]
    async fn test_medium_listing_is_paged() {
        let members: Vec<(u64, String)> = (1..=60).map(|i| (i, format!("Player{i:04}"))).collect();
        let refs: Vec<(u64, &str)> = members.iter().map(|(i, n)| (*i, n.as_str())).collect();
        let (db, dispatcher) = setup(FakeGuild::with_members(&refs)).await;
        for (id, _) in &members {
            db.set_hp(UserId(*id), GUILD, 20).await.unwrap();
        }

        let reply = dispatcher
            .dispatch(&invoke(moderator(), Command::ListPlayers))
            .await;
        let Reply::Pages(pages) = reply else {
            panic!("expected paged reply");
        };
        assert!(pages.len() > 1 && pages.len() <= 5);
        assert!(pages.iter().all(|p| p.chars().count() <= 1900));
        assert!(pages[0].starts_with("**Players HP:**"));
    }

    #[tokio::test]
    async fn test_custom_paginator_and_heart_cap() {
        let (db, dispatcher) = setup(FakeGuild::with_members(&[(10, "Ann"), (11, "Ben")])).await;
        let dispatcher = dispatcher
            .with_max_hearts(2)
            .with_paginator(Paginator::new(30, 2).unwrap());
        db.set_hp(UserId(10), GUILD, 5).await.unwrap();
        db.set_hp(UserId(11), GUILD, 1).await.unwrap();

        let reply = dispatcher
            .dispatch(&invoke(moderator(), Command::ListPlayers))
            .await;
        let Reply::Pages(pages) = reply else {
            panic!("expected paged reply");
        };
        assert_eq!(pages.len(), 2);
        let text = pages.concat();
        assert!(text.contains(&format!("Ann: {HEART}{HEART} ... (5)")));
        assert!(text.contains(&format!("Ben: {HEART} (1)")));
    }

    fn command_interaction(name: &str, options: Value) -> Interaction {
        serde_json::from_value(json!({
            "id": "1",
            "type": 2,
            "token": "t",
            "guild_id": "500",
            "member": {
                "user": { "id": "1", "username": "mod" },
                "roles": ["9000"],
                "permissions": "0"
            },
            "data": {
                "name": name,
                "options": options,
                "resolved": {
                    "users": {
                        "3": { "id": "3", "username": "bob", "global_name": "Bob" },
                        "8": { "id": "8", "username": "drifter" }
                    },
                    "members": { "3": { "roles": [] } }
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_parse_add_with_default_amount() {
        let interaction = command_interaction("hp_add", json!([{ "name": "member", "value": "3" }]));
        let invocation = Invocation::from_interaction(&interaction).unwrap();

        assert_eq!(invocation.guild, Some(GUILD));
        assert_eq!(invocation.invoker.as_ref().unwrap().role_ids, vec![MOD_ROLE]);
        assert_eq!(
            invocation.command,
            Command::Add {
                target: target(3, "Bob"),
                amount: 1
            }
        );
    }

    #[test]
    fn test_parse_user_outside_guild() {
        let interaction = command_interaction(
            "hp_remove",
            json!([{ "name": "member", "value": "8" }, { "name": "amount", "value": 4 }]),
        );
        let invocation = Invocation::from_interaction(&interaction).unwrap();
        assert_eq!(
            invocation.command,
            Command::Remove {
                target: outsider(8, "drifter"),
                amount: 4
            }
        );

        let interaction = command_interaction("hp_show", json!([{ "name": "member", "value": "12" }]));
        let invocation = Invocation::from_interaction(&interaction).unwrap();
        assert_eq!(
            invocation.command,
            Command::ShowMember {
                target: outsider(12, "<@12>")
            }
        );
    }

    #[tokio::test]
    async fn test_non_member_target_writes_nothing() {
        let (db, dispatcher) = setup(FakeGuild::default()).await;

        for command in [
            Command::Add {
                target: outsider(7, "stranger"),
                amount: 1,
            },
            Command::Remove {
                target: outsider(7, "stranger"),
                amount: 1,
            },
            Command::ShowMember {
                target: outsider(7, "stranger"),
            },
        ] {
            let reply = dispatcher.dispatch(&invoke(moderator(), command)).await;
            assert_eq!(
                reply,
                Reply::ephemeral("stranger is not a member of this server.")
            );
        }
        assert_eq!(db.peek_hp(UserId(7), GUILD).await.unwrap(), None);
    }

    #[test]
    fn test_parse_errors() {
        let missing = command_interaction("hp_show", json!([]));
        assert!(matches!(
            Invocation::from_interaction(&missing),
            Err(CommandError::BadOption("member"))
        ));

        let unknown = command_interaction("hp_reset", json!([]));
        assert!(matches!(
            Invocation::from_interaction(&unknown),
            Err(CommandError::UnknownCommand(name)) if name == "hp_reset"
        ));
    }

    #[test]
    fn test_definitions_cover_every_command() {
        let defs = definitions();
        let names: Vec<&str> = defs
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, ["hp", "hp_show", "hp_add", "hp_remove", "players"]);
    }
}
