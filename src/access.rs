// Access control for moderator commands.

use crate::db::{GuildId, UserId};
use crate::discord::{GuildDirectory, PlatformError};

/// Discord `ADMINISTRATOR` permission bit.
pub const ADMINISTRATOR: u64 = 1 << 3;

/// The member who invoked a command, as seen in the interaction payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoker {
    pub user_id: UserId,
    pub display_name: String,
    pub role_ids: Vec<u64>,
    /// Computed permissions in the invoking channel.
    pub permissions: u64,
}

/// Moderator role. Matched by `id` when known, otherwise by exact name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleRef {
    pub id: Option<u64>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessPolicy {
    Role(RoleRef),
    Administrator,
}

impl AccessPolicy {
    /// Whether `invoker` may run privileged commands in `guild`.
    ///
    /// A missing invoker (no resolvable guild membership) is a plain `false`.
    pub async fn permits(
        &self,
        invoker: Option<&Invoker>,
        guild: GuildId,
        directory: &dyn GuildDirectory,
    ) -> Result<bool, PlatformError> {
        let Some(invoker) = invoker else {
            return Ok(false);
        };

        match self {
            AccessPolicy::Administrator => Ok(invoker.permissions & ADMINISTRATOR != 0),
            AccessPolicy::Role(RoleRef { id: Some(id), .. }) => {
                Ok(invoker.role_ids.contains(id))
            }
            AccessPolicy::Role(RoleRef { id: None, name }) => {
                // Fallback for deployments that only configured a role name.
                let roles = directory.roles(guild).await?;
                Ok(roles
                    .iter()
                    .filter(|r| r.name == *name)
                    .any(|r| invoker.role_ids.contains(&r.id.0)))
            }
        }
    }
}
