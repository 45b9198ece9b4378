use crate::moderation::{DiscordModeration, InboundMessage};
use crate::{Data, EVENT_TARGET, logging};
use poise::serenity_prelude::{
    self as serenity, Context, EventHandler, GuildId, Message, Ready,
};
use tracing::{error, info, warn};

pub struct Handler;

/// Resolve a message author's role names from the cache
///
/// Bypass matching is by role name; a cache miss yields no roles, which
/// fails closed (the member gets filtered like anyone else).
fn author_role_names(ctx: &Context, msg: &Message) -> Vec<String> {
    let Some(guild_id) = msg.guild_id else {
        return Vec::new();
    };
    let Some(member) = &msg.member else {
        return Vec::new();
    };
    ctx.cache
        .guild(guild_id)
        .map(|guild| {
            member
                .roles
                .iter()
                .filter_map(|role_id| guild.roles.get(role_id).map(|role| role.name.clone()))
                .collect()
        })
        .unwrap_or_default()
}

#[serenity::async_trait]
impl EventHandler for Handler {
    /// Called when the bot is ready, but the cache may not be fully populated yet.
    async fn ready(&self, ctx: Context, ready: Ready) {
        let user_name = ready.user.name.clone();
        let shard_id = ctx.shard_id;
        info!(target: EVENT_TARGET, "Connected as {user_name}, shard {shard_id}");
    }

    /// Called when the cache is fully populated.
    async fn cache_ready(&self, ctx: Context, guilds: Vec<GuildId>) {
        let guild_count_cache = ctx.cache.guild_count();
        let guild_count = guilds.len();
        if guild_count != guild_count_cache {
            warn!(
                "Cache guild count mismatch: {guild_count_cache} (cache) vs {guild_count} (actual)"
            );
        }
        info!(target: EVENT_TARGET, "Cache ready! The bot is in {guild_count} guild(s)");
    }

    /// Automod entry point: every guild message runs through the filter
    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot || msg.guild_id.is_none() || msg.content.is_empty() {
            return;
        }

        let data = { ctx.data.read().await.get::<Data>().cloned() };
        let Some(data) = data else {
            warn!(target: EVENT_TARGET, "Bot data not registered; skipping automod");
            return;
        };

        let inbound = InboundMessage {
            id: msg.id,
            channel: msg.channel_id,
            community: msg.guild_id,
            author: msg.author.id,
            author_is_automated: msg.author.bot,
            author_roles: author_role_names(&ctx, &msg),
            content: msg.content.clone(),
        };

        let gateway = DiscordModeration::from_context(&ctx);
        match data.coordinator.automod(&gateway, &gateway, &inbound).await {
            Ok(Some(outcome)) => {
                logging::log_automod_hit(
                    msg.guild_id.map_or(0, |g| g.get()),
                    msg.author.id.get(),
                    &outcome.matched_term,
                );
            }
            Ok(None) => {}
            Err(e) => {
                error!(
                    target: EVENT_TARGET,
                    message_id = msg.id.get(),
                    error = %e,
                    "Automod intervention failed"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_implements_event_handler() {
        // Compile-time check that Handler stays a valid EventHandler
        fn assert_impl<T: EventHandler>() {}
        assert_impl::<Handler>();
    }
}
