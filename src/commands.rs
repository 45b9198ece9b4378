use crate::moderation::{
    DiscordModeration, ModerationError, RestraintOutcome, RestrictRequest, WarnRequest, Warning,
    WarningRemoval,
    gateway::{Delivery, DirectNotifier},
};
use crate::{Context, Error};
use poise::serenity_prelude as serenity;
use poise::{CreateReply, command};
use serenity::{CreateEmbed, Timestamp};

const WARN_COLOUR: u32 = 0xFF9900;
const OK_COLOUR: u32 = 0x00FF00;

/// Send an ephemeral error reply
async fn reply_error(ctx: Context<'_>, text: impl Into<String>) -> Result<(), Error> {
    ctx.send(
        CreateReply::default()
            .content(format!("❌ {}", text.into()))
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

/// Format a ledger timestamp as a Discord timestamp tag
fn discord_timestamp(warning: &Warning) -> String {
    format!("<t:{}:F>", warning.created_at.timestamp())
}

/// Basic ping command
/// This command is used to check if the bot is responsive.
#[command(prefix_command, slash_command)]
pub async fn ping(ctx: Context<'_>) -> Result<(), Error> {
    ctx.say("Pong!").await?;
    Ok(())
}

/// Show a user's avatar
#[command(prefix_command, slash_command)]
pub async fn avatar(
    ctx: Context<'_>,
    #[description = "The user whose avatar you want to see"] user: Option<serenity::User>,
) -> Result<(), Error> {
    let user = user.as_ref().unwrap_or_else(|| ctx.author());
    let embed = CreateEmbed::new()
        .title(format!("{}'s avatar", user.name))
        .image(user.face())
        .timestamp(Timestamp::now());
    ctx.send(CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Warning system commands
#[command(
    slash_command,
    guild_only,
    required_permissions = "MODERATE_MEMBERS",
    subcommands("add", "list", "remove", "clear", "recent")
)]
pub async fn warn(_ctx: Context<'_>) -> Result<(), Error> {
    // Parent command; only the subcommands are invocable
    Ok(())
}

/// Add a warning to a user
#[command(slash_command, guild_only)]
pub async fn add(
    ctx: Context<'_>,
    #[description = "The user to warn"] user: serenity::User,
    #[description = "Reason for the warning"] reason: String,
) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(());
    };
    let gateway = DiscordModeration::from_context(ctx.serenity_context());

    let request = WarnRequest {
        community: guild_id,
        actor: ctx.author().id,
        target: user.id,
        reason: reason.clone(),
    };
    let receipt = match ctx.data().coordinator.warn(&gateway, request).await {
        Ok(receipt) => receipt,
        Err(e) => return reply_error(ctx, e.to_string()).await,
    };

    let mut embed = CreateEmbed::new()
        .colour(WARN_COLOUR)
        .title("⚠️ Warning Issued")
        .field("User", user.name.clone(), true)
        .field("Warning ID", format!("`{}`", receipt.warning.id), true)
        .field("Active Warnings", format!("`{}`", receipt.active_count), true)
        .field("Reason", format!("```{reason}```"), false)
        .timestamp(Timestamp::now());

    // Tell the warned user directly; failure is informational
    let dm = format!(
        "You have been warned (reason: {reason}). You now have {} active warning(s). \
         Please follow the community rules to avoid further action.",
        receipt.active_count
    );
    embed = match gateway.send_direct(user.id, &dm).await {
        Ok(Delivery::Delivered) => embed.field("User Notification", "✅ Notified via DM", false),
        _ => embed.field("User Notification", "❌ Could not send DM", false),
    };

    if let Some(report) = &receipt.escalation {
        let minutes = report.duration.as_secs() / 60;
        embed = match &report.outcome {
            Ok(_) => embed.field(
                "Automatic Action",
                format!("🔇 Timed out for {minutes} minutes"),
                false,
            ),
            Err(e) => embed.field(
                "Automatic Action",
                format!("❌ Timeout for {minutes} minutes could not be applied: {e}"),
                false,
            ),
        };
    }

    ctx.send(CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// List active warnings for a user
#[command(slash_command, guild_only)]
pub async fn list(
    ctx: Context<'_>,
    #[description = "The user to check warnings for"] user: serenity::User,
) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(());
    };
    let warnings = ctx.data().coordinator.warnings_for(guild_id, user.id);

    if warnings.is_empty() {
        let embed = CreateEmbed::new()
            .colour(OK_COLOUR)
            .title(format!("📋 Warnings for {}", user.name))
            .description("✅ This user has no active warnings.");
        ctx.send(CreateReply::default().embed(embed)).await?;
        return Ok(());
    }

    let mut embed = CreateEmbed::new()
        .colour(WARN_COLOUR)
        .title(format!("📋 Warnings for {}", user.name))
        .description(format!("Total active warnings: **{}**", warnings.len()));

    for (index, warning) in warnings.iter().take(10).enumerate() {
        embed = embed.field(
            format!("Warning #{} (ID: {})", index + 1, warning.id),
            format!(
                "**Reason:** {}\n**Date:** {}\n**Moderator:** <@{}>",
                warning.reason,
                discord_timestamp(warning),
                warning.issuer_id
            ),
            false,
        );
    }
    if warnings.len() > 10 {
        embed = embed.footer(serenity::CreateEmbedFooter::new(format!(
            "Showing 10 of {} warnings",
            warnings.len()
        )));
    }

    ctx.send(CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Remove a specific warning by ID
#[command(slash_command, guild_only)]
pub async fn remove(
    ctx: Context<'_>,
    #[description = "The warning ID to remove"]
    #[min = 1]
    id: u64,
) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(());
    };

    match ctx.data().coordinator.remove_warning(guild_id, id).await {
        Ok(WarningRemoval::Removed(prior)) => {
            let embed = CreateEmbed::new()
                .colour(OK_COLOUR)
                .title("✅ Warning Removed")
                .field("Warning ID", format!("{id}"), true)
                .field("User", format!("<@{}>", prior.subject_id), true)
                .field("Original Reason", prior.reason, false)
                .timestamp(Timestamp::now());
            ctx.send(CreateReply::default().embed(embed)).await?;
            Ok(())
        }
        Ok(WarningRemoval::AlreadyRemoved(_)) => {
            reply_error(ctx, "This warning has already been removed.").await
        }
        Err(ModerationError::NotFound(_)) => {
            reply_error(ctx, "Warning not found in this server.").await
        }
        Err(e) => reply_error(ctx, e.to_string()).await,
    }
}

/// Clear all warnings for a user
#[command(slash_command, guild_only)]
pub async fn clear(
    ctx: Context<'_>,
    #[description = "The user to clear warnings for"] user: serenity::User,
) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(());
    };

    match ctx.data().coordinator.clear_warnings(guild_id, user.id).await {
        Ok(cleared) => {
            let embed = CreateEmbed::new()
                .colour(OK_COLOUR)
                .title("🧹 Warnings Cleared")
                .field("User", user.name, true)
                .field("Warnings Cleared", format!("{cleared}"), true)
                .timestamp(Timestamp::now());
            ctx.send(CreateReply::default().embed(embed)).await?;
            Ok(())
        }
        Err(e) => reply_error(ctx, e.to_string()).await,
    }
}

/// Show recent warnings in this server
#[command(slash_command, guild_only)]
pub async fn recent(
    ctx: Context<'_>,
    #[description = "Number of warnings to show (default: 10)"]
    #[min = 1]
    #[max = 25]
    limit: Option<u32>,
) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(());
    };
    let limit = limit.unwrap_or(10) as usize;
    let warnings = ctx.data().coordinator.recent_warnings(guild_id, limit);

    if warnings.is_empty() {
        let embed = CreateEmbed::new()
            .colour(OK_COLOUR)
            .title("📋 Recent Warnings")
            .description("✅ No recent warnings in this server.");
        ctx.send(CreateReply::default().embed(embed)).await?;
        return Ok(());
    }

    let mut embed = CreateEmbed::new()
        .colour(WARN_COLOUR)
        .title("📋 Recent Warnings")
        .description(format!("Showing {} most recent warnings:", warnings.len()));
    for warning in &warnings {
        embed = embed.field(
            format!("ID: {}", warning.id),
            format!(
                "**User:** <@{}>\n**Reason:** {}\n**Moderator:** <@{}>\n**Date:** {}",
                warning.subject_id,
                warning.reason,
                warning.issuer_id,
                discord_timestamp(warning)
            ),
            true,
        );
    }

    ctx.send(CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Timeout a user for a specified duration
#[command(
    prefix_command,
    slash_command,
    guild_only,
    aliases("timeout"),
    required_permissions = "MODERATE_MEMBERS",
    required_bot_permissions = "MODERATE_MEMBERS"
)]
pub async fn mute(
    ctx: Context<'_>,
    #[description = "The user to mute"] user: serenity::User,
    #[description = "Duration in minutes (1-10080, default: 10)"]
    #[min = 1]
    #[max = 10080]
    duration: Option<u32>,
    #[description = "Reason for the mute"] reason: Option<String>,
) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(());
    };
    let gateway = DiscordModeration::from_context(ctx.serenity_context());
    let duration = u64::from(duration.unwrap_or(10));
    let reason = reason.unwrap_or_else(|| "No reason provided".to_string());

    let request = RestrictRequest {
        community: guild_id,
        actor: ctx.author().id,
        target: user.id,
        duration_minutes: duration,
        reason: reason.clone(),
    };
    match ctx.data().coordinator.restrict(&gateway, request).await {
        Ok(_) => {
            let expires = Timestamp::now().unix_timestamp() + (duration as i64) * 60;
            let embed = CreateEmbed::new()
                .colour(WARN_COLOUR)
                .title("🔇 User Timed Out")
                .field("User", user.name, true)
                .field("Duration", format!("`{duration} minutes`"), true)
                .field("Expires", format!("<t:{expires}:R>"), true)
                .field("Reason", format!("```{reason}```"), false)
                .timestamp(Timestamp::now());
            ctx.send(CreateReply::default().embed(embed)).await?;
            Ok(())
        }
        Err(e) => reply_error(ctx, e.to_string()).await,
    }
}

/// Remove timeout from a user
#[command(
    prefix_command,
    slash_command,
    guild_only,
    aliases("untimeout"),
    required_permissions = "MODERATE_MEMBERS",
    required_bot_permissions = "MODERATE_MEMBERS"
)]
pub async fn unmute(
    ctx: Context<'_>,
    #[description = "The user to unmute"] user: serenity::User,
    #[description = "Reason for removing the timeout"] reason: Option<String>,
) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(());
    };
    let gateway = DiscordModeration::from_context(ctx.serenity_context());
    let reason = reason.unwrap_or_else(|| "No reason provided".to_string());

    match ctx
        .data()
        .coordinator
        .unrestrict(&gateway, guild_id, user.id, &reason)
        .await
    {
        Ok(RestraintOutcome::AlreadyInRequestedState) => {
            reply_error(ctx, "This user is not currently timed out.").await
        }
        Ok(_) => {
            let embed = CreateEmbed::new()
                .colour(OK_COLOUR)
                .title("🔊 User Timeout Removed")
                .field("User", user.name, true)
                .field("Reason", format!("```{reason}```"), false)
                .timestamp(Timestamp::now());
            ctx.send(CreateReply::default().embed(embed)).await?;
            Ok(())
        }
        Err(e) => reply_error(ctx, e.to_string()).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warn_command_definition() {
        let cmd = warn();
        assert_eq!(cmd.name, "warn");
        assert!(cmd.guild_only);
        let names: Vec<&str> = cmd.subcommands.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["add", "list", "remove", "clear", "recent"]);
    }

    #[test]
    fn test_mute_command_definition() {
        let cmd = mute();
        assert_eq!(cmd.name, "mute");
        assert!(cmd.guild_only);
        assert!(cmd.aliases.iter().any(|a| a == "timeout"));
    }

    #[test]
    fn test_unmute_command_definition() {
        let cmd = unmute();
        assert_eq!(cmd.name, "unmute");
        assert!(cmd.aliases.iter().any(|a| a == "untimeout"));
    }

    #[test]
    fn test_utility_commands_exist_as_slash_commands() {
        for cmd in [ping(), avatar()] {
            assert!(cmd.create_as_slash_command().is_some());
        }
    }
}
