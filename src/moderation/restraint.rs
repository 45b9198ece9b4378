//! Restriction orchestrator
//!
//! Executes a restriction order against the membership gateway and
//! classifies what happened. Whether to act is decided upstream by the
//! coordinator; this layer never second-guesses and never retries.

use std::time::Duration;

use poise::serenity_prelude::{GuildId, UserId};
use tracing::info;

use crate::moderation::{ModerationResult, gateway::MembershipGateway};

/// A request to time out (or un-time-out) a member
///
/// Not persisted anywhere; the platform is authoritative for live
/// restriction state.
#[derive(Debug, Clone)]
pub struct RestrictionOrder {
    pub target: UserId,
    pub community: GuildId,
    /// `None` lifts an existing restriction
    pub duration: Option<Duration>,
    pub reason: String,
}

/// Classified result of executing an order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestraintOutcome {
    /// Timeout applied for the requested duration
    Applied,
    /// Existing timeout removed
    Lifted,
    /// The member was already in the requested state; informational no-op
    AlreadyInRequestedState,
}

/// Executes restriction orders; holds no state of its own
#[derive(Debug, Clone, Copy, Default)]
pub struct Restrainer;

impl Restrainer {
    /// Execute an order, applying or lifting as its duration says
    ///
    /// # Errors
    /// `Forbidden` and `Transient` pass through from the gateway untouched.
    pub async fn apply(
        &self,
        membership: &dyn MembershipGateway,
        order: &RestrictionOrder,
    ) -> ModerationResult<RestraintOutcome> {
        match order.duration {
            Some(duration) => {
                membership
                    .set_timeout(order.community, order.target, Some(duration), &order.reason)
                    .await?;
                info!(
                    target_id = order.target.get(),
                    community_id = order.community.get(),
                    duration_secs = duration.as_secs(),
                    "Restriction applied"
                );
                Ok(RestraintOutcome::Applied)
            }
            None => {
                self.lift(membership, order.target, order.community, &order.reason)
                    .await
            }
        }
    }

    /// Lift any timeout on a member
    ///
    /// A member who is not timed out yields `AlreadyInRequestedState`
    /// without touching the platform further.
    pub async fn lift(
        &self,
        membership: &dyn MembershipGateway,
        target: UserId,
        community: GuildId,
        reason: &str,
    ) -> ModerationResult<RestraintOutcome> {
        if !membership.is_communication_disabled(community, target).await? {
            return Ok(RestraintOutcome::AlreadyInRequestedState);
        }

        membership
            .set_timeout(community, target, None, reason)
            .await?;
        info!(
            target_id = target.get(),
            community_id = community.get(),
            "Restriction lifted"
        );
        Ok(RestraintOutcome::Lifted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moderation::{ModerationError, gateway::MockMembershipGateway};

    const TARGET: UserId = UserId::new(12345);
    const COMMUNITY: GuildId = GuildId::new(67890);

    fn order(duration: Option<Duration>) -> RestrictionOrder {
        RestrictionOrder {
            target: TARGET,
            community: COMMUNITY,
            duration,
            reason: "being a nuisance".to_string(),
        }
    }

    #[tokio::test]
    async fn test_apply_with_duration() {
        let mut membership = MockMembershipGateway::new();
        membership
            .expect_set_timeout()
            .withf(|community, target, duration, _reason| {
                *community == COMMUNITY
                    && *target == TARGET
                    && *duration == Some(Duration::from_secs(600))
            })
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let outcome = Restrainer
            .apply(&membership, &order(Some(Duration::from_secs(600))))
            .await
            .unwrap();
        assert_eq!(outcome, RestraintOutcome::Applied);
    }

    #[tokio::test]
    async fn test_order_without_duration_lifts() {
        let mut membership = MockMembershipGateway::new();
        membership
            .expect_is_communication_disabled()
            .returning(|_, _| Ok(true));
        membership
            .expect_set_timeout()
            .withf(|_, _, duration, _| duration.is_none())
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let outcome = Restrainer.apply(&membership, &order(None)).await.unwrap();
        assert_eq!(outcome, RestraintOutcome::Lifted);
    }

    #[tokio::test]
    async fn test_lift_of_unrestricted_member_is_a_no_op() {
        let mut membership = MockMembershipGateway::new();
        membership
            .expect_is_communication_disabled()
            .returning(|_, _| Ok(false));
        // set_timeout must never fire
        membership.expect_set_timeout().times(0);

        let outcome = Restrainer
            .lift(&membership, TARGET, COMMUNITY, "requested")
            .await
            .unwrap();
        assert_eq!(outcome, RestraintOutcome::AlreadyInRequestedState);
    }

    #[tokio::test]
    async fn test_forbidden_passes_through_unretried() {
        let mut membership = MockMembershipGateway::new();
        membership
            .expect_set_timeout()
            .times(1)
            .returning(|_, _, _, _| Err(ModerationError::forbidden("time out member")));

        let result = Restrainer
            .apply(&membership, &order(Some(Duration::from_secs(60))))
            .await;
        assert!(matches!(result, Err(ModerationError::Forbidden { .. })));
    }
}
