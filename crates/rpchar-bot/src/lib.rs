//! RPChar Bot - Kik role-play character sheet bot.
//!
//! Chat messages are parsed against declarative command grammars, answered
//! by handlers and sent back through the Kik API:
//! - Character sheets with pictures, stored per user
//! - Admin-editable static responses rendered as templates
//! - Dice, work rewards, stats and quests for role-play groups

pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod locale;
pub mod server;
pub mod services;
pub mod template;
pub mod users;

pub use config::Config;
pub use dispatcher::Dispatcher;
pub use error::{AppError, AppResult};
pub use locale::Locale;
pub use services::Services;
