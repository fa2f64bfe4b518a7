// Application configuration, loaded from environment variables and CLI flags.

use crate::access::{AccessPolicy, RoleRef};
use crate::render::DEFAULT_MAX_HEARTS;

/// Role name checked by moderator commands when no role id is configured.
pub const DEFAULT_MOD_ROLE: &str = "slime";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing {0} in environment or .env file")]
    Missing(&'static str),
    #[error("Invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Bot token used for REST calls.
    pub discord_token: String,
    /// Application id, used in webhook and command registration URLs.
    pub application_id: u64,
    /// Hex-encoded Ed25519 key for verifying interaction requests.
    pub public_key: String,
    /// Database URL (SQLite connection string).
    pub database_url: String,
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Who may run moderator commands.
    pub access: AccessPolicy,
    /// Hearts rendered before falling back to " ...".
    pub max_hearts: usize,
    /// Skip bulk-overwriting slash commands at startup.
    pub skip_register: bool,
}

impl Config {
    /// Load configuration from environment variables and CLI arguments.
    ///
    /// Environment variables:
    /// - `DISCORD_TOKEN` - bot token (required)
    /// - `DISCORD_APPLICATION_ID` - application id (required)
    /// - `DISCORD_PUBLIC_KEY` - interaction verification key (required)
    /// - `DATABASE_URL` - SQLite connection string (default: `sqlite:state.db?mode=rwc`)
    /// - `PORT` - HTTP server port (default: 3000)
    /// - `HP_ACCESS` - `role` (default) or `administrator`
    /// - `HP_MOD_ROLE` - moderator role name (default: `slime`)
    /// - `HP_MOD_ROLE_ID` - moderator role id; preferred over the name when set
    /// - `MAX_HEARTS` - heart cap (default: 20)
    /// - `HP_SKIP_REGISTER` - set to `true` to skip command registration
    ///
    /// CLI flags:
    /// - `--port <PORT>` - Override the port
    /// - `--skip-register` - Same as `HP_SKIP_REGISTER=true`
    pub fn load() -> Result<Self, ConfigError> {
        let args: Vec<String> = std::env::args().collect();
        Self::from_sources(&args, |key| std::env::var(key).ok())
    }

    pub fn from_sources(
        args: &[String],
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let required = |key: &'static str| {
            env(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(key))
        };

        let discord_token = required("DISCORD_TOKEN")?;
        let application_id = parse("DISCORD_APPLICATION_ID", required("DISCORD_APPLICATION_ID")?)?;
        let public_key = required("DISCORD_PUBLIC_KEY")?;

        let database_url =
            env("DATABASE_URL").unwrap_or_else(|| "sqlite:state.db?mode=rwc".to_string());

        // Port: CLI flag --port takes precedence, then env var, then default
        let port = match Self::parse_cli_value(args, "--port").or_else(|| env("PORT")) {
            Some(v) => parse("PORT", v)?,
            None => 3000,
        };

        let access = match env("HP_ACCESS").as_deref().map(str::to_ascii_lowercase) {
            None => Self::role_policy(&env)?,
            Some(mode) if mode == "role" => Self::role_policy(&env)?,
            Some(mode) if mode == "administrator" || mode == "admin" => AccessPolicy::Administrator,
            Some(mode) => {
                return Err(ConfigError::Invalid {
                    name: "HP_ACCESS",
                    value: mode,
                })
            }
        };

        let max_hearts = match env("MAX_HEARTS") {
            Some(v) => parse("MAX_HEARTS", v)?,
            None => DEFAULT_MAX_HEARTS,
        };

        let skip_register = args.iter().any(|a| a == "--skip-register")
            || env("HP_SKIP_REGISTER")
                .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
                .unwrap_or(false);

        Ok(Config {
            discord_token,
            application_id,
            public_key,
            database_url,
            port,
            access,
            max_hearts,
            skip_register,
        })
    }

    fn role_policy(env: &impl Fn(&str) -> Option<String>) -> Result<AccessPolicy, ConfigError> {
        let id = match env("HP_MOD_ROLE_ID") {
            Some(v) => Some(parse("HP_MOD_ROLE_ID", v)?),
            None => None,
        };
        let name = env("HP_MOD_ROLE").unwrap_or_else(|| DEFAULT_MOD_ROLE.to_string());
        Ok(AccessPolicy::Role(RoleRef { id, name }))
    }

    /// Parse a CLI flag value like `--port 8080`.
    fn parse_cli_value(args: &[String], flag: &str) -> Option<String> {
        args.windows(2).find_map(|pair| {
            if pair[0] == flag {
                Some(pair[1].clone())
            } else {
                None
            }
        })
    }
}

fn parse<T: std::str::FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid { name, value })
}
