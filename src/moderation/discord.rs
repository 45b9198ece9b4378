//! Discord-backed gateway implementations
//!
//! Adapts the collaborator traits onto serenity's HTTP client. All
//! platform errors are classified here (403 → Forbidden, 404 → NotFound,
//! anything else → Transient) so the engine never sees a raw serenity
//! error.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::Utc;
use poise::serenity_prelude as serenity;
use ::serenity::http::{HttpError, StatusCode};
use serenity::{ChannelId, GuildId, Http, Member, MessageId, PartialGuild, UserId};
use tracing::{debug, info};

use crate::moderation::{
    ModerationError, ModerationResult,
    gateway::{Deletion, Delivery, DirectNotifier, MemberProfile, MembershipGateway,
        MessageGateway},
};

/// One adapter implements all three collaborator contracts
#[derive(Clone)]
pub struct DiscordModeration {
    http: Arc<Http>,
    /// Cached at construction; needed to judge whether the bot outranks a
    /// target
    bot_id: UserId,
}

impl DiscordModeration {
    #[must_use]
    pub fn new(http: Arc<Http>, bot_id: UserId) -> Self {
        Self { http, bot_id }
    }

    /// Build from a live serenity context (commands, event handlers)
    #[must_use]
    pub fn from_context(ctx: &serenity::Context) -> Self {
        let bot_id = ctx.cache.current_user().id;
        Self::new(Arc::clone(&ctx.http), bot_id)
    }

    async fn partial_guild(&self, community: GuildId) -> ModerationResult<PartialGuild> {
        community
            .to_partial_guild(&self.http)
            .await
            .map_err(|e| classify("fetch community", e))
    }
}

/// Position of the member's highest role; members with no roles rank 0
fn highest_role_position(guild: &PartialGuild, member: &Member) -> u16 {
    member
        .roles
        .iter()
        .filter_map(|role_id| guild.roles.get(role_id))
        .map(|role| role.position)
        .max()
        .unwrap_or(0)
}

/// Map a serenity error onto the engine's taxonomy
fn classify(action: &str, err: serenity::Error) -> ModerationError {
    if let serenity::Error::Http(HttpError::UnsuccessfulRequest(ref response)) = err {
        match response.status_code {
            StatusCode::FORBIDDEN => return ModerationError::forbidden(action),
            StatusCode::NOT_FOUND => {
                return ModerationError::NotFound(format!(
                    "{action}: {}",
                    response.error.message
                ));
            }
            _ => {}
        }
    }
    ModerationError::transient(action, err.to_string())
}

#[async_trait]
impl MembershipGateway for DiscordModeration {
    async fn fetch_member(
        &self,
        community: GuildId,
        user: UserId,
    ) -> ModerationResult<MemberProfile> {
        let guild = self.partial_guild(community).await?;
        let member = guild
            .member(&self.http, user)
            .await
            .map_err(|e| classify("fetch member", e))?;

        let role_rank = highest_role_position(&guild, &member);
        let is_owner = guild.owner_id == user;

        // Restrictable means the bot's own highest role sits above the
        // target's and the target does not own the community
        let bot_member = guild
            .member(&self.http, self.bot_id)
            .await
            .map_err(|e| classify("fetch own member", e))?;
        let bot_rank = highest_role_position(&guild, &bot_member);

        Ok(MemberProfile {
            user_id: user.get(),
            role_rank,
            is_owner,
            is_restrictable: !is_owner && bot_rank > role_rank,
            is_automated: member.user.bot,
        })
    }

    async fn set_timeout(
        &self,
        community: GuildId,
        user: UserId,
        duration: Option<Duration>,
        reason: &str,
    ) -> ModerationResult<()> {
        let guild = self.partial_guild(community).await?;
        let mut member = guild
            .member(&self.http, user)
            .await
            .map_err(|e| classify("fetch member", e))?;

        match duration {
            Some(duration) => {
                let until = Utc::now()
                    + chrono::Duration::from_std(duration).map_err(|_| {
                        ModerationError::Validation("timeout duration out of range".to_string())
                    })?;
                member
                    .disable_communication_until_datetime(&self.http, until.into())
                    .await
                    .map_err(|e| classify("time out member", e))?;
                info!(
                    user_id = user.get(),
                    community_id = community.get(),
                    until = %until,
                    reason,
                    "Member timed out"
                );
            }
            None => {
                member
                    .enable_communication(&self.http)
                    .await
                    .map_err(|e| classify("lift timeout", e))?;
                info!(
                    user_id = user.get(),
                    community_id = community.get(),
                    reason,
                    "Member timeout lifted"
                );
            }
        }
        Ok(())
    }

    async fn is_communication_disabled(
        &self,
        community: GuildId,
        user: UserId,
    ) -> ModerationResult<bool> {
        let guild = self.partial_guild(community).await?;
        let member = guild
            .member(&self.http, user)
            .await
            .map_err(|e| classify("fetch member", e))?;

        Ok(member
            .communication_disabled_until
            .is_some_and(|until| until.unix_timestamp() > Utc::now().timestamp()))
    }
}

#[async_trait]
impl DirectNotifier for DiscordModeration {
    async fn send_direct(&self, user: UserId, content: &str) -> ModerationResult<Delivery> {
        // Closed DMs and blocks surface as errors here; both mean the same
        // thing to the caller
        let channel = match user.create_dm_channel(&self.http).await {
            Ok(channel) => channel,
            Err(e) => {
                debug!(user_id = user.get(), error = %e, "DM channel unavailable");
                return Ok(Delivery::Undeliverable);
            }
        };
        match channel.id.say(&self.http, content).await {
            Ok(_) => Ok(Delivery::Delivered),
            Err(e) => {
                debug!(user_id = user.get(), error = %e, "DM rejected");
                Ok(Delivery::Undeliverable)
            }
        }
    }
}

#[async_trait]
impl MessageGateway for DiscordModeration {
    async fn delete_message(
        &self,
        channel: ChannelId,
        message: MessageId,
    ) -> ModerationResult<Deletion> {
        match channel.delete_message(&self.http, message).await {
            Ok(()) => Ok(Deletion::Deleted),
            Err(e) => match classify("delete message", e) {
                ModerationError::NotFound(_) => Ok(Deletion::NotFound),
                other => Err(other),
            },
        }
    }

    async fn post_expiring_notice(
        &self,
        channel: ChannelId,
        content: &str,
        ttl: Duration,
    ) -> ModerationResult<()> {
        let notice = channel
            .say(&self.http, content)
            .await
            .map_err(|e| classify("post notice", e))?;

        let http = Arc::clone(&self.http);
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            if let Err(e) = channel.delete_message(&http, notice.id).await {
                debug!(error = %e, "Expiring notice was already gone");
            }
        });
        Ok(())
    }
}
