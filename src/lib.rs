pub mod commands;
pub mod data;
pub mod handlers;
pub mod logging;
pub mod moderation;

pub const BOT_NAME: &str = "liminal_warden";
pub const COMMAND_TARGET: &str = "liminal_warden::command";
pub const ERROR_TARGET: &str = "liminal_warden::error";
pub const EVENT_TARGET: &str = "liminal_warden::handlers";
pub const AUTOMOD_TARGET: &str = "liminal_warden::automod";

pub use data::{Data, DataInner, ModerationConfig};
pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;
