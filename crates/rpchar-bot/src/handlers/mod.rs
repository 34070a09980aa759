//! Built-in command handlers.
//!
//! Each submodule owns its handler structs and a `commands()` function that
//! declares names, parameters and requirements.

pub mod admin;
pub mod characters;
pub mod dice;
pub mod info;
pub mod rpg;
pub mod static_commands;

pub use static_commands::StaticHandler;

use crate::engine::CommandRegistry;
use crate::error::AppResult;
use chrono::{Local, TimeZone};
use std::sync::Arc;

/// All built-in commands plus the template-backed fallback.
pub fn registry() -> AppResult<CommandRegistry> {
    let mut commands = Vec::new();
    commands.extend(characters::commands()?);
    commands.extend(admin::commands()?);
    commands.extend(info::commands()?);
    commands.extend(dice::commands()?);
    commands.extend(rpg::commands()?);
    commands.extend(static_commands::commands()?);

    CommandRegistry::new(commands, Arc::new(StaticHandler))
}

/// Local time of an epoch timestamp in `format`.
pub(crate) fn format_timestamp(epoch_seconds: i64, format: &str) -> String {
    match Local.timestamp_opt(epoch_seconds, 0).single() {
        Some(time) => time.format(format).to_string(),
        None => epoch_seconds.to_string(),
    }
}

/// "ersten" for the first character, "2." otherwise.
pub(crate) fn ordinal(char_id: i64) -> String {
    if char_id <= character_store::MIN_CHAR_ID {
        "ersten".to_string()
    } else {
        format!("{char_id}.")
    }
}
