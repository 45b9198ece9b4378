//! Moderation coordinator
//!
//! Entry point for the three event flows: manual warnings, manual
//! restriction/unrestriction, and automod. Owns the ordering contract —
//! record first, count second, decide third, enforce last — and the rule
//! that a failed automatic restriction never unwinds a recorded warning.
//!
//! Gateway collaborators are passed per call; the coordinator itself holds
//! only the ledger, the policy tables, and the filter, so one instance
//! serves every concurrently handled event.

use std::time::Duration;

use poise::serenity_prelude::{ChannelId, GuildId, MessageId, UserId};
use tracing::{info, warn};

use crate::moderation::{
    ModerationError, ModerationResult,
    authority::{self, AuthorityContext},
    escalation::EscalationPolicy,
    filter::ContentFilter,
    gateway::{Deletion, Delivery, DirectNotifier, MembershipGateway, MessageGateway},
    ledger::{Warning, WarningLedger},
    restraint::{Restrainer, RestraintOutcome, RestrictionOrder},
};

/// Discord caps timeouts at 7 days
pub const MAX_RESTRICTION_MINUTES: u64 = 10_080;
pub const MIN_RESTRICTION_MINUTES: u64 = 1;

/// A moderator asking to warn a member
#[derive(Debug, Clone)]
pub struct WarnRequest {
    pub community: GuildId,
    pub actor: UserId,
    pub target: UserId,
    pub reason: String,
}

/// A moderator asking to time a member out
#[derive(Debug, Clone)]
pub struct RestrictRequest {
    pub community: GuildId,
    pub actor: UserId,
    pub target: UserId,
    pub duration_minutes: u64,
    pub reason: String,
}

/// What the escalation policy did after a warning landed
///
/// Rides along on the warn receipt; an `Err` outcome here is a secondary
/// notice, never a failure of the warn itself.
#[derive(Debug)]
pub struct EscalationReport {
    pub duration: Duration,
    pub outcome: ModerationResult<RestraintOutcome>,
}

/// Result of a successful warn
#[derive(Debug)]
pub struct WarnReceipt {
    pub warning: Warning,
    pub active_count: u64,
    pub escalation: Option<EscalationReport>,
}

/// A message event as the automod path sees it
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub id: MessageId,
    pub channel: ChannelId,
    /// `None` for DMs, which automod ignores
    pub community: Option<GuildId>,
    pub author: UserId,
    pub author_is_automated: bool,
    /// Role names, for bypass matching
    pub author_roles: Vec<String>,
    pub content: String,
}

/// How the author ended up being told about a filtered message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationRoute {
    Direct,
    /// DM was undeliverable; a self-expiring channel notice went out instead
    ChannelNotice,
}

/// What automod did to a matched message
#[derive(Debug)]
pub struct AutomodOutcome {
    pub matched_term: String,
    pub deletion: Deletion,
    pub route: NotificationRoute,
}

/// Result of removing a single warning by id
#[derive(Debug)]
pub enum WarningRemoval {
    Removed(Warning),
    /// It was already inactive; informational, nothing changed
    AlreadyRemoved(Warning),
}

pub struct ModerationCoordinator {
    ledger: WarningLedger,
    policy: EscalationPolicy,
    filter: ContentFilter,
    restrainer: Restrainer,
    /// How long automod channel notices live before the platform layer
    /// removes them
    notice_ttl: Duration,
}

impl ModerationCoordinator {
    #[must_use]
    pub fn new(
        ledger: WarningLedger,
        policy: EscalationPolicy,
        filter: ContentFilter,
        notice_ttl: Duration,
    ) -> Self {
        Self {
            ledger,
            policy,
            filter,
            restrainer: Restrainer,
            notice_ttl,
        }
    }

    /// Manually time a member out
    ///
    /// # Errors
    /// `Validation` on an out-of-range duration, `AuthorizationDenied` when
    /// the actor does not outrank the target (owner excepted) or the
    /// platform reports the target unrestrictable, plus whatever the
    /// gateway classifies. Nothing is mutated on any failure.
    pub async fn restrict(
        &self,
        membership: &dyn MembershipGateway,
        request: RestrictRequest,
    ) -> ModerationResult<RestraintOutcome> {
        if !(MIN_RESTRICTION_MINUTES..=MAX_RESTRICTION_MINUTES).contains(&request.duration_minutes)
        {
            return Err(ModerationError::Validation(format!(
                "duration must be between {MIN_RESTRICTION_MINUTES} and {MAX_RESTRICTION_MINUTES} minutes"
            )));
        }

        let actor = membership
            .fetch_member(request.community, request.actor)
            .await?;
        let target = membership
            .fetch_member(request.community, request.target)
            .await?;

        let ctx = AuthorityContext::derive(&actor, &target);
        if !authority::can_restrict(&ctx) {
            let ground = if ctx.target_restrictable {
                "the target holds an equal or higher role"
            } else {
                "the platform cannot restrict this member"
            };
            return Err(ModerationError::AuthorizationDenied(ground.to_string()));
        }

        let order = RestrictionOrder {
            target: request.target,
            community: request.community,
            duration: Some(Duration::from_secs(request.duration_minutes * 60)),
            reason: request.reason,
        };
        self.restrainer.apply(membership, &order).await
    }

    /// Lift a member's timeout
    ///
    /// Lifting a member who is not timed out is an informational no-op,
    /// not an error.
    pub async fn unrestrict(
        &self,
        membership: &dyn MembershipGateway,
        community: GuildId,
        target: UserId,
        reason: &str,
    ) -> ModerationResult<RestraintOutcome> {
        self.restrainer
            .lift(membership, target, community, reason)
            .await
    }

    /// Record a warning and apply whatever the escalation ladder says
    ///
    /// The warning is durably recorded before escalation is evaluated; a
    /// failed automatic restriction is attached to the receipt and never
    /// rolls the warning back.
    ///
    /// # Errors
    /// `AuthorizationDenied` for self-warns, automated targets, and
    /// issuers who do not outrank the target; `Validation` for an empty
    /// reason; `Persistence` when the ledger write fails (no warning
    /// exists in that case).
    pub async fn warn(
        &self,
        membership: &dyn MembershipGateway,
        request: WarnRequest,
    ) -> ModerationResult<WarnReceipt> {
        if request.actor == request.target {
            return Err(ModerationError::AuthorizationDenied(
                "you cannot warn yourself".to_string(),
            ));
        }

        let target = membership
            .fetch_member(request.community, request.target)
            .await?;
        if !authority::can_warn(request.actor.get(), request.target.get(), target.is_automated) {
            return Err(ModerationError::AuthorizationDenied(
                "automated accounts cannot be warned".to_string(),
            ));
        }

        let actor = membership
            .fetch_member(request.community, request.actor)
            .await?;
        if target.role_rank >= actor.role_rank && !actor.is_owner {
            return Err(ModerationError::AuthorizationDenied(
                "the target holds an equal or higher role".to_string(),
            ));
        }

        let warning = self
            .ledger
            .add(
                request.target.get(),
                request.community.get(),
                request.actor.get(),
                request.reason,
            )
            .await?;

        // The count includes the row just written; a concurrent warn for
        // the same member may not be visible yet, so escalation can fire a
        // tier late but never early.
        let active_count = self
            .ledger
            .active_count(request.target.get(), request.community.get());

        let escalation = match self.policy.duration_for(active_count) {
            Some(duration) => {
                let order = RestrictionOrder {
                    target: request.target,
                    community: request.community,
                    duration: Some(duration),
                    reason: format!("automatic: {active_count} warnings"),
                };
                let outcome = self.restrainer.apply(membership, &order).await;
                if let Err(e) = &outcome {
                    warn!(
                        warning_id = warning.id,
                        target_id = request.target.get(),
                        error = %e,
                        "Automatic restriction failed; warning stands"
                    );
                }
                Some(EscalationReport { duration, outcome })
            }
            None => None,
        };

        info!(
            warning_id = warning.id,
            target_id = request.target.get(),
            community_id = request.community.get(),
            active_count,
            escalated = escalation.is_some(),
            "Warning issued"
        );

        Ok(WarnReceipt {
            warning,
            active_count,
            escalation,
        })
    }

    /// Run the content filter over an inbound message
    ///
    /// On a hit: delete the message, DM the author, and fall back to a
    /// self-expiring channel notice when the DM is undeliverable. Never
    /// writes to the warning ledger.
    pub async fn automod(
        &self,
        messages: &dyn MessageGateway,
        notifier: &dyn DirectNotifier,
        message: &InboundMessage,
    ) -> ModerationResult<Option<AutomodOutcome>> {
        if message.author_is_automated || message.community.is_none() || message.content.is_empty()
        {
            return Ok(None);
        }

        let Some(term) = self.filter.matches(&message.content, &message.author_roles) else {
            return Ok(None);
        };
        let matched_term = term.to_string();

        let deletion = messages.delete_message(message.channel, message.id).await?;

        let notice = format!(
            "Your message was removed because it matched the filtered term \"{matched_term}\". \
             Please follow the community rules."
        );
        let route = match notifier.send_direct(message.author, &notice).await? {
            Delivery::Delivered => NotificationRoute::Direct,
            Delivery::Undeliverable => {
                let fallback = format!(
                    "<@{}>, your message was removed for filtered content.",
                    message.author.get()
                );
                messages
                    .post_expiring_notice(message.channel, &fallback, self.notice_ttl)
                    .await?;
                NotificationRoute::ChannelNotice
            }
        };

        info!(
            author_id = message.author.get(),
            term = %matched_term,
            deleted = ?deletion,
            route = ?route,
            "Automod removed a message"
        );

        Ok(Some(AutomodOutcome {
            matched_term,
            deletion,
            route,
        }))
    }

    /// Active warnings for one member, newest first
    #[must_use]
    pub fn warnings_for(&self, community: GuildId, subject: UserId) -> Vec<Warning> {
        self.ledger.list_active(subject.get(), community.get())
    }

    /// Active warning count for one member
    #[must_use]
    pub fn warning_count(&self, community: GuildId, subject: UserId) -> u64 {
        self.ledger.active_count(subject.get(), community.get())
    }

    /// Remove one warning by id, scoped to the asking community
    ///
    /// A warning that exists in a different community is reported
    /// `NotFound` rather than leaked across the scope boundary.
    pub async fn remove_warning(
        &self,
        community: GuildId,
        id: u64,
    ) -> ModerationResult<WarningRemoval> {
        match self.ledger.get(id) {
            Some(w) if w.community_id == community.get() => {}
            _ => return Err(ModerationError::NotFound(format!("warning {id}"))),
        }

        let prior = self.ledger.deactivate(id).await?;
        if prior.active {
            Ok(WarningRemoval::Removed(prior))
        } else {
            Ok(WarningRemoval::AlreadyRemoved(prior))
        }
    }

    /// Clear every active warning for one member; returns how many fell
    pub async fn clear_warnings(
        &self,
        community: GuildId,
        subject: UserId,
    ) -> ModerationResult<u64> {
        self.ledger
            .deactivate_all(subject.get(), community.get())
            .await
    }

    /// Most recent active warnings across the community
    #[must_use]
    pub fn recent_warnings(&self, community: GuildId, limit: usize) -> Vec<Warning> {
        self.ledger.recent_active(community.get(), limit)
    }
}
