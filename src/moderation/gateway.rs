//! Collaborator contracts
//!
//! Narrow trait seams in front of the chat platform. The engine only ever
//! talks to these; the serenity-backed implementations live in
//! [`crate::moderation::discord`] and test doubles are generated with
//! mockall.

use std::time::Duration;

use async_trait::async_trait;
use poise::serenity_prelude::{ChannelId, GuildId, MessageId, UserId};

use crate::moderation::ModerationResult;

/// Snapshot of a community member, as the platform reports them
#[derive(Debug, Clone, Copy)]
pub struct MemberProfile {
    pub user_id: u64,
    /// Position of the member's highest role
    pub role_rank: u16,
    /// Whether this member owns the community
    pub is_owner: bool,
    /// Whether the bot itself is able to restrict this member
    pub is_restrictable: bool,
    /// Bot accounts can never be warned
    pub is_automated: bool,
}

/// Outcome of a direct-notification attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// Closed DMs, blocked bot, or any other reason the user is unreachable
    Undeliverable,
}

/// Outcome of a message deletion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deletion {
    Deleted,
    /// Already gone; not an error
    NotFound,
}

/// Membership service: member lookups and communication timeouts
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MembershipGateway: Send + Sync {
    async fn fetch_member(
        &self,
        community: GuildId,
        user: UserId,
    ) -> ModerationResult<MemberProfile>;

    /// Apply (`Some`) or lift (`None`) a communication timeout
    async fn set_timeout(
        &self,
        community: GuildId,
        user: UserId,
        duration: Option<Duration>,
        reason: &str,
    ) -> ModerationResult<()>;

    async fn is_communication_disabled(
        &self,
        community: GuildId,
        user: UserId,
    ) -> ModerationResult<bool>;
}

/// Direct-notification service (DMs)
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DirectNotifier: Send + Sync {
    async fn send_direct(&self, user: UserId, content: &str) -> ModerationResult<Delivery>;
}

/// Message service: deletions and short-lived channel notices
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageGateway: Send + Sync {
    async fn delete_message(
        &self,
        channel: ChannelId,
        message: MessageId,
    ) -> ModerationResult<Deletion>;

    /// Post a notice the platform layer removes again after `ttl`
    async fn post_expiring_notice(
        &self,
        channel: ChannelId,
        content: &str,
        ttl: Duration,
    ) -> ModerationResult<()>;
}
