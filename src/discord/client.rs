// Discord REST client (API v10).

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde_json::json;

use super::{
    Attachment, GuildDirectory, GuildMember, Member, MessageData, Outbox, PlatformError, Role,
};
use crate::db::GuildId;

pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

/// Largest page the member list endpoint returns.
const MEMBER_PAGE_SIZE: usize = 1000;

#[derive(Debug, Clone)]
pub struct DiscordClient {
    http: reqwest::Client,
    token: String,
    application_id: u64,
    api_base: String,
}

impl DiscordClient {
    pub fn new(token: impl Into<String>, application_id: u64) -> Self {
        Self {
            http: reqwest::Client::new(),
            token: token.into(),
            application_id,
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    fn webhook_url(&self, token: &str, suffix: &str) -> String {
        self.url(&format!("/webhooks/{}/{}{}", self.application_id, token, suffix))
    }

    fn authorized(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header(reqwest::header::AUTHORIZATION, format!("Bot {}", self.token))
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, PlatformError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(PlatformError::Status {
            status: status.as_u16(),
            body,
        })
    }

    /// Replace the application's global slash commands with `commands`.
    pub async fn register_commands(&self, commands: &serde_json::Value) -> Result<(), PlatformError> {
        let url = self.url(&format!("/applications/{}/commands", self.application_id));
        let resp = self.authorized(self.http.put(url)).json(commands).send().await?;
        Self::check(resp).await?;
        Ok(())
    }
}

#[async_trait]
impl GuildDirectory for DiscordClient {
    async fn roles(&self, guild: GuildId) -> Result<Vec<Role>, PlatformError> {
        let url = self.url(&format!("/guilds/{guild}/roles"));
        let resp = self.authorized(self.http.get(url)).send().await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    async fn members(&self, guild: GuildId) -> Result<Vec<Member>, PlatformError> {
        let mut members = Vec::new();
        let mut after = 0u64;

        loop {
            let url = self.url(&format!(
                "/guilds/{guild}/members?limit={MEMBER_PAGE_SIZE}&after={after}"
            ));
            let resp = self.authorized(self.http.get(url)).send().await?;
            let page: Vec<GuildMember> = Self::check(resp).await?.json().await?;

            let page_len = page.len();
            for member in &page {
                if let Some(m) = Member::from_guild_member(member) {
                    after = after.max(m.user_id.0);
                    members.push(m);
                }
            }

            if page_len < MEMBER_PAGE_SIZE {
                break;
            }
        }

        tracing::debug!(%guild, count = members.len(), "fetched guild members");
        Ok(members)
    }
}

#[async_trait]
impl Outbox for DiscordClient {
    async fn edit_original(
        &self,
        token: &str,
        content: &str,
        attachment: Option<Attachment>,
    ) -> Result<(), PlatformError> {
        let url = self.webhook_url(token, "/messages/@original");
        let req = self.http.patch(url);

        let req = match attachment {
            None => req.json(&json!({
                "content": content,
                "allowed_mentions": { "parse": [] },
            })),
            Some(Attachment { filename, data }) => {
                let payload = json!({
                    "content": content,
                    "allowed_mentions": { "parse": [] },
                    "attachments": [{ "id": 0, "filename": filename }],
                });
                let part = Part::bytes(data)
                    .file_name(filename)
                    .mime_str("text/plain; charset=utf-8")?;
                let form = Form::new()
                    .text("payload_json", payload.to_string())
                    .part("files[0]", part);
                req.multipart(form)
            }
        };

        Self::check(req.send().await?).await?;
        Ok(())
    }

    async fn follow_up(
        &self,
        token: &str,
        content: &str,
        ephemeral: bool,
    ) -> Result<(), PlatformError> {
        let url = self.webhook_url(token, "");
        let body = MessageData::text(content).ephemeral(ephemeral);
        let resp = self.http.post(url).json(&body).send().await?;
        Self::check(resp).await?;
        Ok(())
    }

    async fn delete_original(&self, token: &str) -> Result<(), PlatformError> {
        let url = self.webhook_url(token, "/messages/@original");
        let resp = self.http.delete(url).send().await?;
        Self::check(resp).await?;
        Ok(())
    }
}
