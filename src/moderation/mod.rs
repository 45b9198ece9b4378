//! Moderation policy engine
//!
//! The decision core of the bot: the warning ledger, the authority
//! comparator, the content filter, the escalation policy, and the
//! coordinator that ties them to the platform gateways. Everything here
//! is independent of how commands are parsed or how replies are worded.

pub mod authority;
pub mod coordinator;
pub mod discord;
pub mod error;
pub mod escalation;
pub mod filter;
pub mod gateway;
pub mod ledger;
pub mod restraint;

pub use coordinator::{
    AutomodOutcome, EscalationReport, InboundMessage, ModerationCoordinator, NotificationRoute,
    RestrictRequest, WarnReceipt, WarnRequest, WarningRemoval,
};
pub use discord::DiscordModeration;
pub use error::{ModerationError, ModerationResult};
pub use escalation::{EscalationPolicy, EscalationTier};
pub use filter::ContentFilter;
pub use gateway::{Deletion, Delivery, MemberProfile};
pub use ledger::{Warning, WarningLedger};
pub use restraint::{Restrainer, RestraintOutcome, RestrictionOrder};
